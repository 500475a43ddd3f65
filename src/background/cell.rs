//! Per-cell background statistics.

use serde::{Deserialize, Serialize};

use super::params::BackgroundParams;

/// Statistics for one (ring, azimuth) cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundCell {
    /// Background range estimate (noise floor), once established.
    pub floor_m: Option<f64>,

    /// Observations classified as background.
    pub hit_count: u64,

    /// Timestamp of the latest observation.
    pub last_update_ns: i64,

    /// Length of the current corroborating streak.
    pub candidate_count: u32,

    /// Mean range of the current streak.
    pub candidate_range_m: f64,

    /// Running mean intensity of background hits.
    pub mean_intensity: f64,
}

/// How an observation was absorbed by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    /// Matched the existing floor.
    Background,
    /// Seeded an empty cell.
    Seeded,
    /// Completed a streak and replaced the floor.
    Flipped,
    /// Deviates from the floor; streak not complete.
    Foreground,
}

impl CellOutcome {
    pub fn is_background(&self) -> bool {
        !matches!(self, CellOutcome::Foreground)
    }
}

impl BackgroundCell {
    pub fn has_floor(&self) -> bool {
        self.floor_m.is_some()
    }

    /// Absorb one range observation.
    ///
    /// `seed` allows an empty cell to adopt the observation as its floor
    /// immediately.
    pub fn observe(
        &mut self,
        range_m: f64,
        intensity: f64,
        timestamp_ns: i64,
        params: &BackgroundParams,
        seed: bool,
    ) -> CellOutcome {
        self.last_update_ns = timestamp_ns;

        match self.floor_m {
            Some(floor) if (range_m - floor).abs() <= params.threshold(floor) => {
                self.floor_m = Some(floor + params.update_fraction * (range_m - floor));
                self.record_hit(intensity);
                self.clear_candidate();
                CellOutcome::Background
            }
            None if seed => {
                self.floor_m = Some(range_m);
                self.record_hit(intensity);
                self.clear_candidate();
                CellOutcome::Seeded
            }
            _ => self.observe_candidate(range_m, intensity, params),
        }
    }

    fn observe_candidate(
        &mut self,
        range_m: f64,
        intensity: f64,
        params: &BackgroundParams,
    ) -> CellOutcome {
        let extends = self.candidate_count > 0
            && (range_m - self.candidate_range_m).abs()
                <= params.threshold(self.candidate_range_m);

        if extends {
            self.candidate_count += 1;
            self.candidate_range_m +=
                (range_m - self.candidate_range_m) / self.candidate_count as f64;
        } else {
            self.candidate_count = 1;
            self.candidate_range_m = range_m;
        }

        if self.candidate_count >= params.neighbour_confirmation_count {
            self.floor_m = Some(self.candidate_range_m);
            self.record_hit(intensity);
            self.clear_candidate();
            return CellOutcome::Flipped;
        }
        CellOutcome::Foreground
    }

    fn record_hit(&mut self, intensity: f64) {
        self.hit_count += 1;
        if intensity.is_finite() {
            self.mean_intensity += (intensity - self.mean_intensity) / self.hit_count as f64;
        }
    }

    fn clear_candidate(&mut self) {
        self.candidate_count = 0;
        self.candidate_range_m = 0.0;
    }
}
