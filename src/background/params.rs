//! Tuning parameters for background classification.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default laser ring count.
pub const DEFAULT_RINGS: usize = 64;

/// Default azimuth sectors (0.2° each).
pub const DEFAULT_AZIMUTH_BINS: usize = 1800;

/// Consecutive corroborating observations before a cell's floor flips.
pub const DEFAULT_NEIGHBOUR_CONFIRMATION_COUNT: u32 = 3;

/// Fixed shape of the polar grid.
///
/// Not part of [`BackgroundParams`]: changing it would invalidate every cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    pub rings: usize,
    pub azimuth_bins: usize,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            rings: DEFAULT_RINGS,
            azimuth_bins: DEFAULT_AZIMUTH_BINS,
        }
    }
}

impl GridGeometry {
    pub fn cell_count(&self) -> usize {
        self.rings * self.azimuth_bins
    }

    pub fn validate(&self) -> Result<()> {
        if self.rings == 0 || self.azimuth_bins == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "grid geometry must be non-empty, got {}x{}",
                self.rings, self.azimuth_bins
            )));
        }
        Ok(())
    }

    /// Flat cell index for a ring and azimuth, or `None` if the ring is out
    /// of range. Azimuth wraps into [0, 360).
    pub fn cell_index(&self, ring: u16, azimuth_deg: f64) -> Option<usize> {
        let ring = ring as usize;
        if ring >= self.rings || !azimuth_deg.is_finite() {
            return None;
        }
        let azimuth = azimuth_deg.rem_euclid(360.0);
        let bin = ((azimuth / 360.0) * self.azimuth_bins as f64) as usize;
        Some(ring * self.azimuth_bins + bin.min(self.azimuth_bins - 1))
    }
}

/// Background classification parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundParams {
    /// Allowed deviation from the floor, relative to the floor range.
    pub noise_relative: f64,

    /// Scales the relative noise band.
    pub closeness_multiplier: f64,

    /// Corroborating observations needed to replace a cell's floor.
    pub neighbour_confirmation_count: u32,

    /// Seed empty cells from the first frame after construction or reset
    /// that contains a valid point.
    #[serde(alias = "seed_from_first")]
    pub seed_from_first_frame: bool,

    /// EMA weight applied when a background hit refines the floor.
    pub update_fraction: f64,

    /// Absolute slack added to the closeness threshold (m).
    pub safety_margin_m: f64,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            noise_relative: 0.04,
            closeness_multiplier: 3.0,
            neighbour_confirmation_count: DEFAULT_NEIGHBOUR_CONFIRMATION_COUNT,
            seed_from_first_frame: true,
            update_fraction: 0.02,
            safety_margin_m: 0.1,
        }
    }
}

impl BackgroundParams {
    /// Closeness threshold around a reference range.
    #[inline]
    pub fn threshold(&self, reference_m: f64) -> f64 {
        self.noise_relative * reference_m.abs() * self.closeness_multiplier + self.safety_margin_m
    }

    pub fn validate(&self) -> Result<()> {
        if !self.noise_relative.is_finite() || self.noise_relative < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "noise_relative must be non-negative, got {}",
                self.noise_relative
            )));
        }
        if !self.closeness_multiplier.is_finite() || self.closeness_multiplier <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "closeness_multiplier must be positive, got {}",
                self.closeness_multiplier
            )));
        }
        if self.neighbour_confirmation_count == 0 {
            return Err(Error::InvalidConfiguration(
                "neighbour_confirmation_count must be at least 1".to_string(),
            ));
        }
        if !(self.update_fraction > 0.0 && self.update_fraction <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "update_fraction must be within (0, 1], got {}",
                self.update_fraction
            )));
        }
        if !self.safety_margin_m.is_finite() || self.safety_margin_m < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "safety_margin_m must be non-negative, got {}",
                self.safety_margin_m
            )));
        }
        Ok(())
    }
}

/// Partial parameter update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundParamsPatch {
    pub noise_relative: Option<f64>,
    pub closeness_multiplier: Option<f64>,
    pub neighbour_confirmation_count: Option<u32>,
    #[serde(alias = "seed_from_first")]
    pub seed_from_first_frame: Option<bool>,
    pub update_fraction: Option<f64>,
    pub safety_margin_m: Option<f64>,
}

impl BackgroundParamsPatch {
    pub fn apply(&self, base: &BackgroundParams) -> BackgroundParams {
        BackgroundParams {
            noise_relative: self.noise_relative.unwrap_or(base.noise_relative),
            closeness_multiplier: self.closeness_multiplier.unwrap_or(base.closeness_multiplier),
            neighbour_confirmation_count: self
                .neighbour_confirmation_count
                .unwrap_or(base.neighbour_confirmation_count),
            seed_from_first_frame: self
                .seed_from_first_frame
                .unwrap_or(base.seed_from_first_frame),
            update_fraction: self.update_fraction.unwrap_or(base.update_fraction),
            safety_margin_m: self.safety_margin_m.unwrap_or(base.safety_margin_m),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
