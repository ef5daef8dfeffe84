//! Error taxonomy shared by the aggregation components.

use thiserror::Error;

/// Errors surfaced by the aggregation layer.
///
/// Recoverable conditions (a point without a usable coordinate, a missing
/// altitude, an unresolved place) degrade the output instead of producing an
/// error. Only structural failures abort a call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// A coordinate is non-finite or outside the WGS84 range.
    #[error("invalid coordinate: lat {latitude}, lng {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// The hex-grid primitive rejected a resolution or coordinate.
    #[error("spatial index error: {0}")]
    SpatialIndex(String),

    /// Cell ceiling exceeded. Only used inside the binner to drive the
    /// resolution step-down.
    #[error("{cells} cells exceed the ceiling of {max_cells}")]
    TooManyCells { cells: usize, max_cells: usize },

    /// A point store or timeline source failed.
    #[error("data source error: {0}")]
    Source(String),

    /// A calendar date range cannot be represented.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// The viewing timezone offset is not a valid UTC offset.
    #[error("invalid utc offset: {0} seconds")]
    InvalidTimezone(i32),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AggregationError>;
