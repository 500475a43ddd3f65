//! Evaluation tolerances and composite score weights.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Weight of each component in the composite score.
///
/// Penalty metrics (fragmentation, false positives, truncation, velocity
/// noise) enter the composite as `1 - value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub detection_rate: f64,
    pub fragmentation: f64,
    pub false_positive_rate: f64,
    pub velocity_coverage: f64,
    pub quality_premium: f64,
    pub truncation_rate: f64,
    pub velocity_noise_rate: f64,
    pub stopped_recovery_rate: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            detection_rate: 0.30,
            fragmentation: 0.10,
            false_positive_rate: 0.15,
            velocity_coverage: 0.10,
            quality_premium: 0.05,
            truncation_rate: 0.10,
            velocity_noise_rate: 0.10,
            stopped_recovery_rate: 0.10,
        }
    }
}

impl ScoreWeights {
    fn values(&self) -> [(&'static str, f64); 8] {
        [
            ("detection_rate", self.detection_rate),
            ("fragmentation", self.fragmentation),
            ("false_positive_rate", self.false_positive_rate),
            ("velocity_coverage", self.velocity_coverage),
            ("quality_premium", self.quality_premium),
            ("truncation_rate", self.truncation_rate),
            ("velocity_noise_rate", self.velocity_noise_rate),
            ("stopped_recovery_rate", self.stopped_recovery_rate),
        ]
    }

    pub fn total(&self) -> f64 {
        self.values().iter().map(|(_, w)| w).sum()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, weight) in self.values() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "weight {} must be non-negative, got {}",
                    name, weight
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(Error::InvalidConfiguration(
                "at least one score weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial weight update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeightsPatch {
    pub detection_rate: Option<f64>,
    pub fragmentation: Option<f64>,
    pub false_positive_rate: Option<f64>,
    pub velocity_coverage: Option<f64>,
    pub quality_premium: Option<f64>,
    pub truncation_rate: Option<f64>,
    pub velocity_noise_rate: Option<f64>,
    pub stopped_recovery_rate: Option<f64>,
}

impl ScoreWeightsPatch {
    pub fn apply(&self, base: &ScoreWeights) -> ScoreWeights {
        ScoreWeights {
            detection_rate: self.detection_rate.unwrap_or(base.detection_rate),
            fragmentation: self.fragmentation.unwrap_or(base.fragmentation),
            false_positive_rate: self.false_positive_rate.unwrap_or(base.false_positive_rate),
            velocity_coverage: self.velocity_coverage.unwrap_or(base.velocity_coverage),
            quality_premium: self.quality_premium.unwrap_or(base.quality_premium),
            truncation_rate: self.truncation_rate.unwrap_or(base.truncation_rate),
            velocity_noise_rate: self.velocity_noise_rate.unwrap_or(base.velocity_noise_rate),
            stopped_recovery_rate: self
                .stopped_recovery_rate
                .unwrap_or(base.stopped_recovery_rate),
        }
    }
}

/// Matching tolerances for comparing a candidate run against a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// A sample counts as co-located within this distance (m).
    pub proximity_tolerance_m: f64,

    /// Fraction of co-located samples needed for a pair to overlap.
    pub min_overlap_fraction: f64,

    /// Speed difference still counted as velocity agreement (m/s).
    pub velocity_tolerance_mps: f64,

    /// Speed difference counted as velocity noise (m/s).
    pub velocity_noise_mps: f64,

    /// Allowed start/end slack before a match counts as truncated.
    pub truncation_tolerance_ns: i64,

    /// Below this speed a reference track is stopped (m/s).
    pub stopped_speed_mps: f64,

    /// Shortest stop that counts (ns).
    pub min_stopped_duration_ns: i64,

    /// Relative box dimension error still counted as agreement.
    pub box_tolerance_fraction: f64,

    pub weights: ScoreWeights,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            proximity_tolerance_m: 2.0,
            min_overlap_fraction: 0.5,
            velocity_tolerance_mps: 1.0,
            velocity_noise_mps: 3.0,
            truncation_tolerance_ns: 1_000_000_000,
            stopped_speed_mps: 0.5,
            min_stopped_duration_ns: 2_000_000_000,
            box_tolerance_fraction: 0.25,
            weights: ScoreWeights::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("proximity_tolerance_m", self.proximity_tolerance_m),
            ("velocity_tolerance_mps", self.velocity_tolerance_mps),
            ("velocity_noise_mps", self.velocity_noise_mps),
            ("stopped_speed_mps", self.stopped_speed_mps),
            ("box_tolerance_fraction", self.box_tolerance_fraction),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.min_overlap_fraction > 0.0 && self.min_overlap_fraction <= 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "min_overlap_fraction must be within (0, 1], got {}",
                self.min_overlap_fraction
            )));
        }
        if self.truncation_tolerance_ns < 0 || self.min_stopped_duration_ns < 0 {
            return Err(Error::InvalidConfiguration(
                "durations must be non-negative".to_string(),
            ));
        }
        self.weights.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_weights_sum_to_one() {
        assert_relative_eq!(ScoreWeights::default().total(), 1.0, epsilon = 1e-12);
        assert!(EvaluationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weights_patch() {
        let patch: ScoreWeightsPatch =
            serde_json::from_str(r#"{"detection_rate": 0.5}"#).unwrap();
        let weights = patch.apply(&ScoreWeights::default());
        assert_eq!(weights.detection_rate, 0.5);
        assert_eq!(weights.fragmentation, 0.10);
    }

    #[test]
    fn test_invalid_weights() {
        let weights = ScoreWeights {
            fragmentation: -0.1,
            ..Default::default()
        };
        assert!(matches!(weights.validate(), Err(Error::InvalidConfiguration(_))));

        let zero: ScoreWeights = serde_json::from_str(
            r#"{"detection_rate":0,"fragmentation":0,"false_positive_rate":0,
                "velocity_coverage":0,"quality_premium":0,"truncation_rate":0,
                "velocity_noise_rate":0,"stopped_recovery_rate":0}"#,
        )
        .unwrap();
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_invalid_config() {
        let config = EvaluationConfig {
            min_overlap_fraction: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = EvaluationConfig {
            proximity_tolerance_m: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
