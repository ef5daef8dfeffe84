//! # Geographic Utilities
//!
//! Geographic computations shared by the lookup, visit and timeline modules.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`geodesic_distance`] | Distance on the WGS84 ellipsoid |
//! | [`haversine_distance`] | Great-circle distance on a sphere |
//! | [`meters_to_degrees`] | Convert meters to approximate longitude degrees at a latitude |
//! | [`bounds_around`] | Degree envelope enclosing a radius around a point |
//! | [`compute_bounds`] | Bounding box of a set of points |
//!
//! ## Example
//!
//! ```rust
//! use location_aggregator::{GpsPoint, geo_utils};
//!
//! let london = GpsPoint::new(51.5074, -0.1278);
//! let paris = GpsPoint::new(48.8566, 2.3522);
//!
//! let d = geo_utils::geodesic_distance(&london, &paris);
//! assert!((d - 344_000.0).abs() < 5_000.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Radius queries use the geodesic metric (Karney's algorithm via
//! `geo::Geodesic`) because query radii range from tens of meters to several
//! kilometers at every latitude, where the spherical approximation drifts by up
//! to 0.5%. Haversine remains available for cheap comparisons.
//!
//! All functions expect WGS84 coordinates in degrees.

use geo::{Distance, Geodesic, Haversine, Point};
use crate::{Bounds, GpsPoint};

/// Meters per degree of latitude at the equator, where it is smallest.
const MIN_METERS_PER_LAT_DEGREE: f64 = 110_574.0;

/// Meters per degree of longitude at the equator.
const METERS_PER_LNG_DEGREE: f64 = 111_320.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Distance in meters between two points on the WGS84 ellipsoid.
///
/// Symmetric: `geodesic_distance(a, b) == geodesic_distance(b, a)` within
/// floating-point tolerance.
#[inline]
pub fn geodesic_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Geodesic::distance(point1, point2)
}

/// Great-circle distance in meters, assuming a spherical Earth of radius 6,371 km.
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Convert meters to approximate longitude degrees at a given latitude.
///
/// The cosine is clamped at 0.1 so the result stays finite near the poles.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = METERS_PER_LNG_DEGREE * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Degree envelope that fully contains every point within `radius_meters` of
/// `center`.
///
/// The envelope is conservative (slightly larger than the circle) and is
/// meant as a pre-filter before an exact distance check. When the circle
/// would wrap across the antimeridian or reaches a pole, the envelope widens
/// to the full longitude range.
///
/// ```rust
/// use location_aggregator::{GpsPoint, geo_utils};
///
/// let center = GpsPoint::new(52.52, 13.405);
/// let env = geo_utils::bounds_around(&center, 500.0);
/// assert!(env.min_lat < 52.52 && env.max_lat > 52.52);
/// assert!(env.min_lng < 13.405 && env.max_lng > 13.405);
/// ```
pub fn bounds_around(center: &GpsPoint, radius_meters: f64) -> Bounds {
    let radius = radius_meters.max(0.0) * 1.01;
    let lat_delta = radius / MIN_METERS_PER_LAT_DEGREE;
    let min_lat = (center.latitude - lat_delta).max(-90.0);
    let max_lat = (center.latitude + lat_delta).min(90.0);

    // Widest longitude span occurs at the envelope edge closest to a pole.
    // No cosine clamp here: the envelope must not shrink near the poles.
    let extreme_lat = min_lat.abs().max(max_lat.abs());
    let cos_lat = extreme_lat.to_radians().cos();
    let lng_delta = if cos_lat > 1e-9 {
        radius / (METERS_PER_LNG_DEGREE * cos_lat)
    } else {
        f64::INFINITY
    };

    let (min_lng, max_lng) = if lng_delta >= 180.0
        || center.longitude - lng_delta < -180.0
        || center.longitude + lng_delta > 180.0
    {
        (-180.0, 180.0)
    } else {
        (center.longitude - lng_delta, center.longitude + lng_delta)
    };

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

/// Compute the bounding box of a set of points.
///
/// Returns `None` for empty input.
///
/// ```rust
/// use location_aggregator::{GpsPoint, geo_utils};
///
/// let pts = vec![GpsPoint::new(51.50, -0.13), GpsPoint::new(51.51, -0.12)];
/// let b = geo_utils::compute_bounds(&pts).unwrap();
/// assert_eq!(b.min_lat, 51.50);
/// assert_eq!(b.max_lng, -0.12);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    let first = points.first()?;
    let mut bounds = Bounds::from_point(first);
    for p in &points[1..] {
        bounds.extend(p);
    }
    Some(bounds)
}

// =============================================================================
// Unit Tests
// =============================================================================
