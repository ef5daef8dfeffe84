//! Point store collaborator.
//!
//! The lookup only needs two queries from whatever holds the points: a
//! spatial range query and a plain time-range query, both returning fully
//! materialized lists. [`InMemoryPointStore`] answers them from one R-tree
//! per user.

use std::collections::HashMap;

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::{Bounds, LocationPoint, Result, TimeWindow, UserId};

/// Source of a user's location points.
pub trait PointStore {
    /// Points of `user_id` inside `bounds` (edges inclusive), optionally
    /// restricted to `window`.
    fn points_within(
        &self,
        user_id: UserId,
        bounds: &Bounds,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<LocationPoint>>;

    /// Points of `user_id` with a timestamp inside `window`.
    fn points_between(&self, user_id: UserId, window: &TimeWindow) -> Result<Vec<LocationPoint>>;
}

/// A location point stored in the R-tree, keyed by `[lng, lat]`.
#[derive(Debug, Clone)]
struct IndexedPoint {
    point: LocationPoint,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.longitude, self.point.latitude])
    }
}

/// In-memory point store with one R-tree per user.
///
/// Points without a usable coordinate are dropped on insert.
///
/// # Example
/// ```
/// use location_aggregator::{Bounds, InMemoryPointStore, LocationPoint, PointStore};
///
/// let store = InMemoryPointStore::from_points(vec![
///     LocationPoint::new(1, 1, 10.0, 20.0, 100),
///     LocationPoint::new(2, 2, 10.0, 20.0, 100),
/// ]);
/// let bounds = Bounds { min_lat: 9.0, max_lat: 11.0, min_lng: 19.0, max_lng: 21.0 };
/// assert_eq!(store.points_within(1, &bounds, None).unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryPointStore {
    trees: HashMap<UserId, RTree<IndexedPoint>>,
}

impl InMemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, bulk-loading each user's tree.
    pub fn from_points(points: Vec<LocationPoint>) -> Self {
        let mut by_user: HashMap<UserId, Vec<IndexedPoint>> = HashMap::new();
        let mut dropped = 0usize;

        for point in points {
            if !point.has_valid_coordinate() {
                dropped += 1;
                continue;
            }
            by_user.entry(point.user_id).or_default().push(IndexedPoint { point });
        }

        if dropped > 0 {
            debug!("[PointStore] Dropped {} points without a usable coordinate", dropped);
        }

        let trees = by_user
            .into_iter()
            .map(|(user_id, indexed)| (user_id, RTree::bulk_load(indexed)))
            .collect();

        Self { trees }
    }

    /// Insert a single point. Returns `false` if it was dropped.
    pub fn insert(&mut self, point: LocationPoint) -> bool {
        if !point.has_valid_coordinate() {
            debug!("[PointStore] Dropped point {} without a usable coordinate", point.id);
            return false;
        }
        self.trees
            .entry(point.user_id)
            .or_default()
            .insert(IndexedPoint { point });
        true
    }

    /// Number of points stored for `user_id`.
    pub fn len_for(&self, user_id: UserId) -> usize {
        self.trees.get(&user_id).map_or(0, |t| t.size())
    }
}

impl PointStore for InMemoryPointStore {
    fn points_within(
        &self,
        user_id: UserId,
        bounds: &Bounds,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<LocationPoint>> {
        let Some(tree) = self.trees.get(&user_id) else {
            return Ok(vec![]);
        };

        let envelope = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );

        Ok(tree
            .locate_in_envelope(&envelope)
            .filter(|ip| window.map_or(true, |w| w.contains(ip.point.timestamp)))
            .map(|ip| ip.point.clone())
            .collect())
    }

    fn points_between(&self, user_id: UserId, window: &TimeWindow) -> Result<Vec<LocationPoint>> {
        let Some(tree) = self.trees.get(&user_id) else {
            return Ok(vec![]);
        };

        Ok(tree
            .iter()
            .filter(|ip| window.contains(ip.point.timestamp))
            .map(|ip| ip.point.clone())
            .collect())
    }
}
