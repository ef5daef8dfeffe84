//! Hexagonal density binning.
//!
//! Buckets location points into H3 cells, tracking per cell:
//! - Point count (for density visualization)
//! - Earliest and latest timestamp seen in the cell
//!
//! When the number of occupied cells exceeds `max_cells`, the whole input is
//! re-binned on the ladder `r, r-2, r-4, ..., 0`. Resolution 0 is returned
//! regardless of cell count.

use std::collections::HashMap;

use h3o::{CellIndex, LatLng, Resolution};
use log::{debug, info, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AggregationError, GpsPoint, LocationPoint, Result, TimeWindow};

/// Resolutions dropped per step when the cell ceiling is exceeded.
const RESOLUTION_STEP: u8 = 2;

/// Configuration for hex binning
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HexBinConfig {
    /// H3 resolution to start at, 0..=15 (default: 8, ~0.74 km² cells)
    pub resolution: u8,
    /// Maximum number of occupied cells before stepping down (default: 10,000)
    pub max_cells: usize,
    /// Only bin points inside this window
    pub time_window: Option<TimeWindow>,
}

impl Default for HexBinConfig {
    fn default() -> Self {
        Self {
            resolution: 8,
            max_cells: 10_000,
            time_window: None,
        }
    }
}

/// A single occupied hexagon
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HexCell {
    /// Resolution the cell was computed at
    pub resolution: u8,
    /// Raw 64-bit H3 index
    pub cell_index: u64,
    /// Number of points falling in the cell
    pub point_count: u64,
    /// Earliest point timestamp (Unix seconds)
    pub earliest_timestamp: i64,
    /// Latest point timestamp (Unix seconds)
    pub latest_timestamp: i64,
}

impl HexCell {
    /// Canonical hexadecimal H3 index, e.g. `881f1d4881fffff`.
    pub fn h3_index(&self) -> String {
        format!("{:x}", self.cell_index)
    }

    /// Center of the hexagon.
    pub fn center(&self) -> Result<GpsPoint> {
        let cell = self.cell()?;
        let ll = LatLng::from(cell);
        Ok(GpsPoint::new(ll.lat(), ll.lng()))
    }

    /// Boundary vertices of the hexagon (5 for pentagons, more when the cell
    /// crosses an icosahedron edge).
    pub fn boundary(&self) -> Result<Vec<GpsPoint>> {
        let cell = self.cell()?;
        Ok(cell
            .boundary()
            .iter()
            .map(|ll| GpsPoint::new(ll.lat(), ll.lng()))
            .collect())
    }

    fn cell(&self) -> Result<CellIndex> {
        CellIndex::try_from(self.cell_index)
            .map_err(|e| AggregationError::SpatialIndex(e.to_string()))
    }
}

/// Complete binning result
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HexBinResult {
    /// Resolution actually used, after any step-down
    pub resolution: u8,
    /// Resolution the caller asked for
    pub requested_resolution: u8,
    /// Occupied cells keyed by raw H3 index
    pub cells: HashMap<u64, HexCell>,
    /// Points skipped for unusable coordinates
    pub rejected_points: usize,
}

impl HexBinResult {
    /// Sum of point counts over all cells.
    pub fn total_points(&self) -> u64 {
        self.cells.values().map(|c| c.point_count).sum()
    }

    /// True when the ceiling forced a coarser grid.
    pub fn was_coarsened(&self) -> bool {
        self.resolution < self.requested_resolution
    }
}

// Internal cell data during construction
#[derive(Debug)]
struct CellBuilder {
    point_count: u64,
    earliest: i64,
    latest: i64,
}

impl CellBuilder {
    fn new(timestamp: i64) -> Self {
        Self {
            point_count: 0,
            earliest: timestamp,
            latest: timestamp,
        }
    }
}

/// Hex grid builder for a single resolution
struct HexGrid {
    resolution: Resolution,
    cells: HashMap<CellIndex, CellBuilder>,
    rejected: usize,
}

impl HexGrid {
    fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            cells: HashMap::new(),
            rejected: 0,
        }
    }

    /// Add a point to the grid
    fn add_point(&mut self, point: &LocationPoint) {
        let latlng = match to_latlng(point) {
            Ok(ll) => ll,
            Err(e) => {
                debug!("[HexBin] Skipping point {}: {}", point.id, e);
                self.rejected += 1;
                return;
            }
        };

        let cell = latlng.to_cell(self.resolution);
        let builder = self
            .cells
            .entry(cell)
            .or_insert_with(|| CellBuilder::new(point.timestamp));

        builder.point_count += 1;
        builder.earliest = builder.earliest.min(point.timestamp);
        builder.latest = builder.latest.max(point.timestamp);
    }

    fn check_ceiling(&self, max_cells: usize) -> Result<()> {
        if self.cells.len() > max_cells {
            return Err(AggregationError::TooManyCells {
                cells: self.cells.len(),
                max_cells,
            });
        }
        Ok(())
    }

    /// Build the final result
    fn build(self, requested_resolution: u8) -> HexBinResult {
        let resolution = u8::from(self.resolution);
        let cells = self
            .cells
            .into_iter()
            .map(|(cell, builder)| {
                let cell_index = u64::from(cell);
                (
                    cell_index,
                    HexCell {
                        resolution,
                        cell_index,
                        point_count: builder.point_count,
                        earliest_timestamp: builder.earliest,
                        latest_timestamp: builder.latest,
                    },
                )
            })
            .collect();

        HexBinResult {
            resolution,
            requested_resolution,
            cells,
            rejected_points: self.rejected,
        }
    }
}

fn to_latlng(point: &LocationPoint) -> Result<LatLng> {
    let invalid = || AggregationError::InvalidCoordinate {
        latitude: point.latitude,
        longitude: point.longitude,
    };
    if !point.has_valid_coordinate() {
        return Err(invalid());
    }
    LatLng::new(point.latitude, point.longitude).map_err(|_| invalid())
}

fn parse_resolution(resolution: u8) -> Result<Resolution> {
    Resolution::try_from(resolution).map_err(|e| AggregationError::SpatialIndex(e.to_string()))
}

fn bin_at(points: &[LocationPoint], resolution: Resolution, window: Option<&TimeWindow>) -> HexGrid {
    let mut grid = HexGrid::new(resolution);
    for point in points {
        if let Some(window) = window {
            if !window.contains(point.timestamp) {
                continue;
            }
        }
        grid.add_point(point);
    }
    grid
}

/// Bin points into H3 cells.
///
/// Returns [`AggregationError::SpatialIndex`] for a resolution outside
/// 0..=15. Points with unusable coordinates are skipped and counted in
/// [`HexBinResult::rejected_points`].
///
/// # Example
/// ```
/// use location_aggregator::{bin_points, HexBinConfig, LocationPoint};
///
/// let points = vec![
///     LocationPoint::new(1, 1, 40.7128, -74.0060, 1_000),
///     LocationPoint::new(2, 1, 40.7128, -74.0060, 2_000),
///     LocationPoint::new(3, 1, f64::NAN, -74.0060, 3_000),
/// ];
///
/// let result = bin_points(&points, &HexBinConfig::default()).unwrap();
/// assert_eq!(result.cells.len(), 1);
/// assert_eq!(result.total_points(), 2);
/// assert_eq!(result.rejected_points, 1);
/// ```
pub fn bin_points(points: &[LocationPoint], config: &HexBinConfig) -> Result<HexBinResult> {
    let requested = config.resolution;
    let mut resolution = parse_resolution(requested)?;

    loop {
        let grid = bin_at(points, resolution, config.time_window.as_ref());

        match grid.check_ceiling(config.max_cells) {
            Err(AggregationError::TooManyCells { cells, max_cells })
                if resolution != Resolution::Zero =>
            {
                let next = u8::from(resolution).saturating_sub(RESOLUTION_STEP);
                warn!(
                    "[HexBin] {} cells at resolution {} exceed ceiling {}, retrying at {}",
                    cells,
                    u8::from(resolution),
                    max_cells,
                    next
                );
                resolution = parse_resolution(next)?;
            }
            _ => {
                let result = grid.build(requested);
                info!(
                    "[HexBin] Binned {} points into {} cells at resolution {} ({} rejected)",
                    points.len(),
                    result.cells.len(),
                    result.resolution,
                    result.rejected_points
                );
                return Ok(result);
            }
        }
    }
}

/// Bin independent batches (e.g. one per user-month) with the same config.
///
/// Each batch succeeds or fails on its own.
pub fn bin_batches(batches: &[Vec<LocationPoint>], config: &HexBinConfig) -> Vec<Result<HexBinResult>> {
    batches.iter().map(|batch| bin_points(batch, config)).collect()
}

/// Same as [`bin_batches`] but runs batches on the rayon pool.
#[cfg(feature = "parallel")]
pub fn bin_batches_parallel(
    batches: &[Vec<LocationPoint>],
    config: &HexBinConfig,
) -> Vec<Result<HexBinResult>> {
    use rayon::prelude::*;

    batches.par_iter().map(|batch| bin_points(batch, config)).collect()
}
