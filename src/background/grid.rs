//! Polar occupancy grid separating static background from foreground.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::acceptance::AcceptanceMetrics;
use super::cell::{BackgroundCell, CellOutcome};
use super::params::{BackgroundParams, BackgroundParamsPatch, GridGeometry};
use crate::Result;

/// One LiDAR return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LidarPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Laser ring (row of the grid).
    pub ring: u16,
    /// Azimuth in degrees; any value wraps into [0, 360).
    pub azimuth_deg: f64,
    /// Range from the sensor (m).
    pub range_m: f64,
    #[serde(default)]
    pub intensity: f64,
    pub timestamp_ns: i64,
}

impl LidarPoint {
    /// Build a point from polar coordinates, deriving Cartesian x/y/z.
    pub fn polar(
        ring: u16,
        azimuth_deg: f64,
        elevation_deg: f64,
        range_m: f64,
        timestamp_ns: i64,
    ) -> Self {
        let az = azimuth_deg.to_radians();
        let el = elevation_deg.to_radians();
        let horizontal = range_m * el.cos();
        Self {
            x: horizontal * az.cos(),
            y: horizontal * az.sin(),
            z: range_m * el.sin(),
            ring,
            azimuth_deg,
            range_m,
            intensity: 0.0,
            timestamp_ns,
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }
}

/// Result of classifying one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub background: Vec<LidarPoint>,
    pub foreground: Vec<LidarPoint>,
    /// Malformed points left out of both lists.
    pub skipped: usize,
}

/// Snapshot of grid convergence counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridStatus {
    /// Cells with an established floor.
    pub occupied_cell_count: usize,
    pub total_cell_count: usize,
    pub frames_processed: u64,
    pub points_processed: u64,
    pub skipped_points: u64,
}

/// Background model for one sensor.
#[derive(Debug, Clone)]
pub struct BackgroundGrid {
    sensor_id: String,
    geometry: GridGeometry,
    params: BackgroundParams,
    /// Lazily created cells, row-major by ring.
    cells: Vec<Option<BackgroundCell>>,
    occupied: usize,
    frames_processed: u64,
    points_processed: u64,
    skipped_points: u64,
    acceptance: AcceptanceMetrics,
}

impl BackgroundGrid {
    pub fn new(
        sensor_id: impl Into<String>,
        geometry: GridGeometry,
        params: BackgroundParams,
    ) -> Result<Self> {
        geometry.validate()?;
        params.validate()?;
        Ok(Self::build(sensor_id.into(), geometry, params))
    }

    /// Grid with default geometry and parameters.
    pub fn with_defaults(sensor_id: impl Into<String>) -> Self {
        Self::build(
            sensor_id.into(),
            GridGeometry::default(),
            BackgroundParams::default(),
        )
    }

    fn build(sensor_id: String, geometry: GridGeometry, params: BackgroundParams) -> Self {
        Self {
            sensor_id,
            geometry,
            params,
            cells: vec![None; geometry.cell_count()],
            occupied: 0,
            frames_processed: 0,
            points_processed: 0,
            skipped_points: 0,
            acceptance: AcceptanceMetrics::default(),
        }
    }

    /// Split one frame into background and foreground points, updating the
    /// per-cell statistics.
    ///
    /// Points are processed in input order. Malformed points (non-finite
    /// values, non-positive range, ring outside the grid) are skipped.
    pub fn classify(&mut self, points: &[LidarPoint]) -> Classification {
        // seeding belongs to the first frame that carries a valid point
        let seed = self.params.seed_from_first_frame && self.points_processed == 0;
        let mut result = Classification::default();

        for point in points {
            let Some(idx) = self.valid_index(point) else {
                result.skipped += 1;
                continue;
            };

            let cell = self.cells[idx].get_or_insert_with(BackgroundCell::default);
            let had_floor = cell.has_floor();
            let outcome = cell.observe(
                point.range_m,
                point.intensity,
                point.timestamp_ns,
                &self.params,
                seed,
            );
            if !had_floor && cell.has_floor() {
                self.occupied += 1;
            }

            let background = outcome.is_background();
            if outcome == CellOutcome::Flipped && had_floor {
                debug!(sensor_id = %self.sensor_id, cell = idx, "cell floor replaced");
            }
            self.acceptance.record(point.range_m, !background);
            if background {
                result.background.push(*point);
            } else {
                result.foreground.push(*point);
            }
        }

        if result.skipped > 0 {
            warn!(
                sensor_id = %self.sensor_id,
                skipped = result.skipped,
                "skipped malformed points"
            );
        }

        self.frames_processed += 1;
        self.points_processed += (points.len() - result.skipped) as u64;
        self.skipped_points += result.skipped as u64;

        debug!(
            sensor_id = %self.sensor_id,
            frame = self.frames_processed,
            background = result.background.len(),
            foreground = result.foreground.len(),
            occupied = self.occupied,
            "classified frame"
        );
        result
    }

    fn valid_index(&self, point: &LidarPoint) -> Option<usize> {
        let finite = point.range_m.is_finite()
            && point.x.is_finite()
            && point.y.is_finite()
            && point.z.is_finite();
        if !finite || point.range_m <= 0.0 {
            return None;
        }
        self.geometry.cell_index(point.ring, point.azimuth_deg)
    }

    /// Clear every cell; the next frame seeds again if seeding is enabled.
    ///
    /// Acceptance counters are kept; see [`Self::reset_acceptance_metrics`].
    pub fn reset(&mut self) {
        info!(
            sensor_id = %self.sensor_id,
            occupied = self.occupied,
            frames = self.frames_processed,
            "resetting background grid"
        );
        self.cells.iter_mut().for_each(|c| *c = None);
        self.occupied = 0;
        self.frames_processed = 0;
        self.points_processed = 0;
        self.skipped_points = 0;
    }

    /// Apply a parameter patch atomically; affects later classifications.
    pub fn set_params(&mut self, patch: &BackgroundParamsPatch) -> Result<()> {
        let params = patch.apply(&self.params);
        params.validate()?;
        info!(sensor_id = %self.sensor_id, ?patch, "background parameters updated");
        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> &BackgroundParams {
        &self.params
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn status(&self) -> GridStatus {
        GridStatus {
            occupied_cell_count: self.occupied,
            total_cell_count: self.cells.len(),
            frames_processed: self.frames_processed,
            points_processed: self.points_processed,
            skipped_points: self.skipped_points,
        }
    }

    /// Statistics for one cell, if it has been touched.
    pub fn cell(&self, ring: u16, azimuth_deg: f64) -> Option<&BackgroundCell> {
        let idx = self.geometry.cell_index(ring, azimuth_deg)?;
        self.cells[idx].as_ref()
    }

    pub fn acceptance_metrics(&self) -> AcceptanceMetrics {
        self.acceptance.clone()
    }

    pub fn reset_acceptance_metrics(&mut self) {
        self.acceptance.clear();
    }

    /// Replace the bucket boundaries; counters restart from zero.
    pub fn set_acceptance_buckets(&mut self, bucket_meters: Vec<f64>) -> Result<()> {
        self.acceptance = AcceptanceMetrics::new(bucket_meters)?;
        Ok(())
    }
}

impl Default for BackgroundGrid {
    fn default() -> Self {
        Self::with_defaults("default")
    }
}
