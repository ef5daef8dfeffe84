//! Radius lookup over a user's points.
//!
//! Issues a single envelope query against the [`PointStore`], then keeps the
//! points whose geodesic distance to the center is within the radius.

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo_utils::{bounds_around, geodesic_distance};
use crate::{GpsPoint, LocationPoint, PointStore, Result, TimeWindow, UserId};

/// A location point found near a query center.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpatialMatch {
    pub point: LocationPoint,
    /// Geodesic distance to the query center in meters
    pub distance_from_center_meters: f64,
}

/// Find all of a user's points within `radius_meters` of a center.
///
/// Results are ordered most recent first. No matches (or a negative radius)
/// yields an empty list; an unusable center is an
/// [`InvalidCoordinate`](crate::AggregationError::InvalidCoordinate) error.
///
/// # Example
/// ```
/// use location_aggregator::{find_near, InMemoryPointStore, LocationPoint, TimeWindow};
///
/// let store = InMemoryPointStore::from_points(vec![
///     LocationPoint::new(1, 1, 48.8584, 2.2945, 100),
///     LocationPoint::new(2, 1, 48.8585, 2.2946, 200),
///     LocationPoint::new(3, 1, 48.8585, 2.2946, 300),
/// ]);
///
/// let window = TimeWindow::new(0, 300);
/// let found = find_near(&store, 1, 2.2945, 48.8584, 50.0, Some(&window)).unwrap();
/// assert_eq!(found.len(), 2);
/// assert_eq!(found[0].point.id, 2); // most recent first
/// ```
pub fn find_near<S: PointStore + ?Sized>(
    store: &S,
    user_id: UserId,
    center_lon: f64,
    center_lat: f64,
    radius_meters: f64,
    time_window: Option<&TimeWindow>,
) -> Result<Vec<SpatialMatch>> {
    let center = GpsPoint::new(center_lat, center_lon).validated()?;

    if !radius_meters.is_finite() || radius_meters < 0.0 {
        debug!("[Lookup] Ignoring query with radius {}", radius_meters);
        return Ok(vec![]);
    }

    let envelope = bounds_around(&center, radius_meters);
    let candidates = store.points_within(user_id, &envelope, time_window)?;
    let candidate_count = candidates.len();

    let mut matches: Vec<SpatialMatch> = candidates
        .into_iter()
        .filter(|p| p.has_valid_coordinate())
        .filter(|p| time_window.map_or(true, |w| w.contains(p.timestamp)))
        .filter_map(|point| {
            let distance = geodesic_distance(&center, &point.position());
            (distance <= radius_meters).then(|| SpatialMatch {
                point,
                distance_from_center_meters: distance,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.point
            .timestamp
            .cmp(&a.point.timestamp)
            .then_with(|| a.point.id.cmp(&b.point.id))
    });

    debug!(
        "[Lookup] user {}: {} of {} candidates within {:.0}m of ({:.5}, {:.5})",
        user_id,
        matches.len(),
        candidate_count,
        radius_meters,
        center_lat,
        center_lon
    );

    Ok(matches)
}
