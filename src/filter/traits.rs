//! Filter traits for the tracking system.

use nalgebra::{Matrix2, Vector2, Vector4};

/// Process noise intensities for a constant-velocity motion model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessNoise {
    /// Position noise spectral density (m²/s).
    pub pos: f64,
    /// Velocity noise spectral density (m²/s³).
    pub vel: f64,
}

/// Trait for ground-plane motion filters.
///
/// All filter implementations must support predict and update operations,
/// as well as state access methods. Noise parameters are passed per call so
/// a runtime configuration change applies on the next frame.
pub trait Filter: Send + Sync {
    /// Advance the state by `dt_secs` seconds without a measurement.
    fn predict(&mut self, dt_secs: f64, noise: ProcessNoise);

    /// Update the state with a position measurement.
    ///
    /// Returns false if the innovation covariance was singular and the
    /// measurement was ignored.
    fn update(&mut self, measurement: &Vector2<f64>, measurement_noise: f64) -> bool;

    /// Current position estimate (x, y).
    fn position(&self) -> Vector2<f64>;

    /// Current velocity estimate (vx, vy).
    fn velocity(&self) -> Vector2<f64>;

    /// Full state vector `[x, y, vx, vy]`.
    fn state_vector(&self) -> &Vector4<f64>;

    /// Innovation covariance `H·P·Hᵀ + R` for the given measurement noise.
    fn innovation_covariance(&self, measurement_noise: f64) -> Matrix2<f64>;
}
