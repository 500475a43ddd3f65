//! Constant-velocity Kalman filter on the ground plane.
//!
//! State: `[x, y, vx, vy]` (metres, m/s). Observation: `[x, y]`.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};

use super::traits::{Filter, ProcessNoise};

/// Initial velocity variance for a freshly spawned track (m²/s²).
///
/// Large, since a new track is seeded with zero velocity.
pub const INITIAL_VELOCITY_VARIANCE: f64 = 10.0;

/// 2-D constant-velocity Kalman filter.
///
/// Prediction uses `F = [[I, dt·I], [0, I]]` and a diagonal process noise
/// `Q = diag(q_pos, q_pos, q_vel, q_vel) · dt`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantVelocityKalman {
    /// State vector `[x, y, vx, vy]`.
    x: Vector4<f64>,
    /// State covariance.
    p: Matrix4<f64>,
}

impl ConstantVelocityKalman {
    /// Create a filter at `position` with zero velocity.
    ///
    /// # Arguments
    /// * `position` - Initial (x, y)
    /// * `measurement_noise` - Initial position variance
    pub fn new(position: [f64; 2], measurement_noise: f64) -> Self {
        let x = Vector4::new(position[0], position[1], 0.0, 0.0);
        let p = Matrix4::from_diagonal(&Vector4::new(
            measurement_noise,
            measurement_noise,
            INITIAL_VELOCITY_VARIANCE,
            INITIAL_VELOCITY_VARIANCE,
        ));
        Self { x, p }
    }

    /// State covariance.
    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }

    fn observation_matrix() -> Matrix2x4<f64> {
        Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0,
        )
    }
}

impl Filter for ConstantVelocityKalman {
    fn predict(&mut self, dt_secs: f64, noise: ProcessNoise) {
        if !(dt_secs > 0.0) || !dt_secs.is_finite() {
            return;
        }

        let mut f = Matrix4::identity();
        f[(0, 2)] = dt_secs;
        f[(1, 3)] = dt_secs;

        let q = Matrix4::from_diagonal(&Vector4::new(noise.pos, noise.pos, noise.vel, noise.vel))
            * dt_secs;

        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + q;
    }

    fn update(&mut self, measurement: &Vector2<f64>, measurement_noise: f64) -> bool {
        let h = Self::observation_matrix();

        // y = z - H @ x (innovation)
        let y = measurement - h * self.x;

        // S = H @ P @ H.T + R
        let s = self.innovation_covariance(measurement_noise);
        let Some(s_inv) = s.try_inverse() else {
            return false;
        };

        // K = P @ H.T @ S^-1
        let k = self.p * h.transpose() * s_inv;

        self.x += k * y;

        // P = (I - K @ H) @ P, kept symmetric against round-off
        let p = (Matrix4::identity() - k * h) * self.p;
        self.p = (p + p.transpose()) * 0.5;
        true
    }

    fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x[0], self.x[1])
    }

    fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.x[2], self.x[3])
    }

    fn state_vector(&self) -> &Vector4<f64> {
        &self.x
    }

    fn innovation_covariance(&self, measurement_noise: f64) -> Matrix2<f64> {
        let h = Self::observation_matrix();
        h * self.p * h.transpose() + Matrix2::identity() * measurement_noise
    }
}
