//! Distance functions for gating detections against tracked objects.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// Distance used to gate and rank detection-to-track pairs.
///
/// Both variants return a squared distance so they compare directly against
/// `gating_distance_squared`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingMetric {
    /// Squared Euclidean distance between centroid and predicted position.
    #[default]
    Euclidean,
    /// Squared Mahalanobis distance under the track's innovation covariance.
    Mahalanobis,
}

impl GatingMetric {
    /// Squared distance from a filter's predicted position to `point`.
    ///
    /// Falls back to Euclidean when the innovation covariance is singular.
    pub fn distance_squared<F: Filter>(
        &self,
        filter: &F,
        point: &Vector2<f64>,
        measurement_noise: f64,
    ) -> f64 {
        let residual = point - filter.position();
        match self {
            GatingMetric::Euclidean => residual.norm_squared(),
            GatingMetric::Mahalanobis => {
                match filter.innovation_covariance(measurement_noise).try_inverse() {
                    Some(s_inv) => (residual.transpose() * s_inv * residual)[(0, 0)],
                    None => residual.norm_squared(),
                }
            }
        }
    }
}

/// Squared Euclidean distance between two ground-plane points.
#[inline]
pub fn euclidean_squared(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}
