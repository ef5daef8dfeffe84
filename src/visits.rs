//! # Visit Clustering
//!
//! Groups points found around a place into discrete visits.
//!
//! ## Algorithm
//! 1. Sort matches by timestamp (input order is not trusted)
//! 2. Walk the sorted list; a point joins the current group when it follows
//!    the previous point by at most `time_threshold_seconds`
//! 3. Each closed group becomes a [`Visit`] with a representative coordinate
//!    (the most accurate point), a time span and quality metrics
//! 4. Visits are returned most recent first
//!
//! Processing is ascending; only the output is reversed for presentation.

use log::info;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{GpsPoint, SpatialMatch};

/// Configuration for visit clustering
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VisitConfig {
    /// Maximum gap between consecutive points of one visit.
    /// Default: 1800 seconds (30 minutes)
    pub time_threshold_seconds: i64,
    /// Duration assigned to a visit made of a single point.
    /// Default: 15 minutes
    pub single_point_duration_minutes: i64,
}

impl Default for VisitConfig {
    fn default() -> Self {
        Self {
            time_threshold_seconds: 30 * 60,
            single_point_duration_minutes: 15,
        }
    }
}

/// Descriptive attributes of the place a visit happened at.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaceAttributes {
    /// Place name from the geocoder
    pub name: Option<String>,
    /// Street address from the geocoder
    pub address: Option<String>,
    /// Approximate place type from the geocoder ("cafe", "city", ...)
    pub place_type: Option<String>,
    /// Most common city among the visit's points
    pub city: Option<String>,
    /// Most common country among the visit's points
    pub country: Option<String>,
}

impl PlaceAttributes {
    /// True when a geocoded name is attached.
    pub fn is_resolved(&self) -> bool {
        self.name.is_some()
    }
}

/// Normalized output of an external geocoder search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeocodedPlace {
    pub name: String,
    pub address: Option<String>,
    pub coordinate: GpsPoint,
    /// Opaque type hint
    pub place_type: Option<String>,
}

/// A stay at one place, built from temporally contiguous points.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Visit {
    /// Coordinate of the most accurate point in the group
    pub coordinate: GpsPoint,
    /// First point timestamp (Unix seconds)
    pub started_at: i64,
    /// Last point timestamp (Unix seconds)
    pub ended_at: i64,
    /// Estimated dwell time in minutes
    pub duration_minutes: i64,
    pub point_count: u32,
    /// Accuracy of the representative point in meters
    pub accuracy_meters: Option<f64>,
    /// Mean distance of the points from the query center (2 decimals)
    pub average_distance_meters: f64,
    /// "12m" or "12m - 40m"; absent when no point carries an altitude
    pub altitude_range: Option<String>,
    pub place: PlaceAttributes,
}

impl Visit {
    /// Observed span between first and last point in seconds.
    pub fn span_seconds(&self) -> i64 {
        self.ended_at - self.started_at
    }
}

/// Cluster spatial matches into visits, most recent first.
///
/// # Example
/// ```
/// use location_aggregator::{cluster_visits, LocationPoint, SpatialMatch, VisitConfig};
///
/// let matches: Vec<SpatialMatch> = [0, 300, 400, 3000]
///     .iter()
///     .enumerate()
///     .map(|(i, &ts)| SpatialMatch {
///         point: LocationPoint::new(i as i64, 1, 52.0, 13.0, ts),
///         distance_from_center_meters: 10.0,
///     })
///     .collect();
///
/// let visits = cluster_visits(&matches, &VisitConfig::default());
/// assert_eq!(visits.len(), 2);
/// assert_eq!(visits[0].started_at, 3000); // most recent first
/// assert_eq!(visits[1].point_count, 3);
/// ```
pub fn cluster_visits(points: &[SpatialMatch], config: &VisitConfig) -> Vec<Visit> {
    if points.is_empty() {
        return vec![];
    }

    let mut sorted: Vec<&SpatialMatch> = points.iter().collect();
    sorted.sort_by_key(|m| m.point.timestamp);

    let mut visits = Vec::new();
    let mut group: Vec<&SpatialMatch> = Vec::new();

    for m in sorted {
        if let Some(prev) = group.last() {
            let gap = (m.point.timestamp - prev.point.timestamp).abs();
            if gap > config.time_threshold_seconds {
                visits.push(build_visit(&group, config));
                group.clear();
            }
        }
        group.push(m);
    }
    if !group.is_empty() {
        visits.push(build_visit(&group, config));
    }

    visits.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    info!(
        "[Visits] Clustered {} points into {} visits",
        points.len(),
        visits.len()
    );

    visits
}

/// Cluster matches found around a geocoded place and attach the place's
/// name, address and type to every visit.
pub fn cluster_visits_at_place(
    points: &[SpatialMatch],
    place: &GeocodedPlace,
    config: &VisitConfig,
) -> Vec<Visit> {
    let mut visits = cluster_visits(points, config);
    for visit in &mut visits {
        visit.place.name = Some(place.name.clone());
        visit.place.address = place.address.clone();
        visit.place.place_type = place.place_type.clone();
    }
    visits
}

/// Build a visit from a non-empty group sorted ascending by timestamp.
fn build_visit(group: &[&SpatialMatch], config: &VisitConfig) -> Visit {
    let first = group[0];
    let last = group[group.len() - 1];
    let started_at = first.point.timestamp;
    let ended_at = last.point.timestamp;

    let duration_minutes = if group.len() == 1 {
        config.single_point_duration_minutes
    } else {
        ((ended_at - started_at) as f64 / 60.0).round() as i64
    };

    // Lowest accuracy value wins; missing accuracy ranks last
    let mut best = first;
    for m in &group[1..] {
        let current = m.point.accuracy.unwrap_or(f64::INFINITY);
        let best_so_far = best.point.accuracy.unwrap_or(f64::INFINITY);
        if current < best_so_far {
            best = m;
        }
    }

    let total_distance: f64 = group.iter().map(|m| m.distance_from_center_meters).sum();
    let average_distance_meters = round_to(total_distance / group.len() as f64, 2);

    Visit {
        coordinate: best.point.position(),
        started_at,
        ended_at,
        duration_minutes,
        point_count: group.len() as u32,
        accuracy_meters: best.point.accuracy,
        average_distance_meters,
        altitude_range: altitude_range(group),
        place: PlaceAttributes {
            city: most_frequent(group.iter().filter_map(|m| m.point.city.as_deref())),
            country: most_frequent(group.iter().filter_map(|m| m.point.country.as_deref())),
            ..PlaceAttributes::default()
        },
    }
}

fn altitude_range(group: &[&SpatialMatch]) -> Option<String> {
    let mut altitudes = group.iter().filter_map(|m| m.point.altitude);
    let first = altitudes.next()?;
    let (min, max) = altitudes.fold((first, first), |(lo, hi), a| (lo.min(a), hi.max(a)));

    if min == max {
        Some(format!("{}m", min))
    } else {
        Some(format!("{}m - {}m", min, max))
    }
}

/// Most frequent non-empty value; ties go to the value seen first.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values.filter(|v| !v.is_empty()) {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, n) in counts {
        if best.map_or(true, |(_, best_n)| n > best_n) {
            best = Some((value, n));
        }
    }
    best.map(|(v, _)| v.to_string())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
