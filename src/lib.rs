//! # Location Aggregator
//!
//! Aggregation layer for personal location history.
//!
//! This library turns raw GPS pings into three derived views:
//! - A density map of visited space as H3 hexagonal bins ([`hexbin`])
//! - Discrete visits clustered from bursts of nearby points ([`lookup`] + [`visits`])
//! - A chronological per-day timeline of visits and journeys ([`timeline`])
//!
//! ## Features
//!
//! - **`parallel`** - Bin independent batches on a rayon pool
//! - **`serde`** - Serialize/deserialize all result types
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use location_aggregator::{
//!     cluster_visits, find_near, InMemoryPointStore, LocationPoint, VisitConfig,
//! };
//!
//! let store = InMemoryPointStore::from_points(vec![
//!     LocationPoint::new(1, 7, 52.5200, 13.4050, 1_700_000_000),
//!     LocationPoint::new(2, 7, 52.5201, 13.4051, 1_700_000_600),
//!     LocationPoint::new(3, 7, 52.5300, 13.4200, 1_700_000_900),
//! ]);
//!
//! // Everything within 100m of the cafe
//! let matches = find_near(&store, 7, 13.4050, 52.5200, 100.0, None).unwrap();
//! assert_eq!(matches.len(), 2);
//!
//! let visits = cluster_visits(&matches, &VisitConfig::default());
//! assert_eq!(visits.len(), 1);
//! assert_eq!(visits[0].duration_minutes, 10);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{AggregationError, Result};

pub mod geo_utils;

// Hexagonal density binning
pub mod hexbin;
pub use hexbin::{bin_batches, bin_points, HexBinConfig, HexBinResult, HexCell};

#[cfg(feature = "parallel")]
pub use hexbin::bin_batches_parallel;

// Point store collaborator and in-memory R-tree implementation
pub mod store;
pub use store::{InMemoryPointStore, PointStore};

// Radius lookup feeding the visit clusterer
pub mod lookup;
pub use lookup::{find_near, SpatialMatch};

// Visit clustering
pub mod visits;
pub use visits::{
    cluster_visits, cluster_visits_at_place, GeocodedPlace, PlaceAttributes, Visit, VisitConfig,
};

// Daily timeline assembly
pub mod timeline;
pub use timeline::{
    assemble_days, assemble_timeline, DaySummary, DayTimeline, Journey, TimelineConfig,
    TimelineEntry, TimelineSource,
};

/// Identifier of the user owning a set of points.
pub type UserId = i64;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use location_aggregator::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Return the point itself when valid, otherwise an
    /// [`AggregationError::InvalidCoordinate`].
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(AggregationError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Degenerate bounds covering a single point.
    pub fn from_point(point: &GpsPoint) -> Self {
        Self {
            min_lat: point.latitude,
            max_lat: point.latitude,
            min_lng: point.longitude,
            max_lng: point.longitude,
        }
    }

    /// Grow the bounds to include `point`.
    pub fn extend(&mut self, point: &GpsPoint) {
        self.min_lat = self.min_lat.min(point.latitude);
        self.max_lat = self.max_lat.max(point.latitude);
        self.min_lng = self.min_lng.min(point.longitude);
        self.max_lng = self.max_lng.max(point.longitude);
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// A raw location sample owned by a user.
///
/// Points arrive already normalized to a single lon/lat shape. A NaN or
/// out-of-range coordinate marks the point as unusable; such points are
/// skipped by every component.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationPoint {
    pub id: i64,
    pub user_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    /// Horizontal accuracy in meters (lower = more precise)
    pub accuracy: Option<f64>,
    /// Altitude in meters
    pub altitude: Option<i32>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl LocationPoint {
    /// Create a point with only the required fields set.
    pub fn new(id: i64, user_id: UserId, latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            id,
            user_id,
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            altitude: None,
            city: None,
            country: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_altitude(mut self, altitude: i32) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_place(mut self, city: Option<&str>, country: Option<&str>) -> Self {
        self.city = city.map(str::to_string);
        self.country = country.map(str::to_string);
        self
    }

    /// The point's coordinate.
    #[inline]
    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    #[inline]
    pub fn has_valid_coordinate(&self) -> bool {
        self.position().is_valid()
    }
}

/// Half-open time interval `[from, to)` in Unix seconds.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use location_aggregator::TimeWindow;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let window = TimeWindow::from_dates(day, day, 0).unwrap();
/// assert_eq!(window.to - window.from, 86_400);
/// assert!(window.contains(window.from));
/// assert!(!window.contains(window.to));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeWindow {
    pub from: i64,
    pub to: i64,
}

impl TimeWindow {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Window covering whole calendar days `start..=end` in a timezone given
    /// as seconds east of UTC. The exclusive end is `end + 1 day` at local
    /// midnight so the final day is fully included.
    pub fn from_dates(
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        utc_offset_seconds: i32,
    ) -> Result<Self> {
        let offset = timeline::viewing_offset(utc_offset_seconds)?;
        let day_after = end
            .succ_opt()
            .ok_or_else(|| AggregationError::InvalidDateRange(format!("no day after {}", end)))?;
        Ok(Self {
            from: timeline::local_midnight(start, &offset),
            to: timeline::local_midnight(day_after, &offset),
        })
    }

    /// True when `timestamp` lies in `[from, to)`.
    #[inline]
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.from && timestamp < self.to
    }

    /// True for zero-width or inverted windows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    /// True when a record spanning `[start, end]` overlaps the window.
    /// Instantaneous records (`start == end`) overlap when contained.
    #[inline]
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        start < self.to && (end > self.from || start >= self.from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_validated_reports_coordinate() {
        let err = GpsPoint::new(95.0, 10.0).validated().unwrap_err();
        assert_eq!(
            err,
            AggregationError::InvalidCoordinate { latitude: 95.0, longitude: 10.0 }
        );
    }

    #[test]
    fn test_bounds_extend() {
        let mut b = Bounds::from_point(&GpsPoint::new(10.0, 20.0));
        b.extend(&GpsPoint::new(12.0, 18.0));
        assert_eq!(b.min_lat, 10.0);
        assert_eq!(b.max_lat, 12.0);
        assert_eq!(b.min_lng, 18.0);
        assert_eq!(b.max_lng, 20.0);
        assert_eq!(b.center(), GpsPoint::new(11.0, 19.0));
    }

    #[test]
    fn test_time_window_from_dates_includes_final_day() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let window = TimeWindow::from_dates(start, end, 0).unwrap();

        assert_eq!(window.from, 1_704_067_200); // 2024-01-01T00:00:00Z
        assert_eq!(window.to, 1_704_326_400); // 2024-01-04T00:00:00Z
        assert!(window.contains(1_704_326_399));
    }

    #[test]
    fn test_time_window_from_dates_with_offset() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        // UTC+2: local midnight is 22:00 UTC the previous day
        let window = TimeWindow::from_dates(day, day, 7200).unwrap();
        assert_eq!(window.from, 1_704_067_200 - 7200);
        assert_eq!(window.to - window.from, 86_400);
    }

    #[test]
    fn test_time_window_overlap() {
        let window = TimeWindow::new(100, 200);
        assert!(window.overlaps(50, 150));
        assert!(window.overlaps(150, 250));
        assert!(window.overlaps(120, 120));
        assert!(!window.overlaps(200, 300));
        assert!(!window.overlaps(50, 100));
        assert!(window.overlaps(100, 100));
        assert!(TimeWindow::new(5, 5).is_empty());
    }
}
