//! Process-level settings loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::background::GridGeometry;
use crate::evaluation::EvaluationConfig;
use crate::{
    BackgroundParams, BackgroundParamsPatch, Result, ScoreWeightsPatch, TrackerConfig,
    TrackerConfigPatch,
};

/// Full configuration for trackers, grids and the evaluator.
///
/// Every section and field is optional in JSON; missing values take their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tracker: TrackerConfig,
    pub background: BackgroundParams,
    pub geometry: GridGeometry,
    pub evaluation: EvaluationConfig,
}

impl Settings {
    /// Parse and validate settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&contents)?;
        info!(path = %path.as_ref().display(), "loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        self.background.validate()?;
        self.geometry.validate()?;
        self.evaluation.validate()
    }

    /// Apply a patch to every section; nothing changes unless the patched
    /// settings validate as a whole.
    pub fn apply(&mut self, patch: &SettingsPatch) -> Result<()> {
        let mut next = self.clone();
        next.tracker = patch.tracker.apply(&self.tracker);
        next.background = patch.background.apply(&self.background);
        next.evaluation.weights = patch.weights.apply(&self.evaluation.weights);
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Partial update for [`Settings`]; unset fields keep their prior value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub tracker: TrackerConfigPatch,
    pub background: BackgroundParamsPatch,
    pub weights: ScoreWeightsPatch,
}

impl SettingsPatch {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distances::GatingMetric;
    use crate::{Error, ErrorKind};
    use std::io::Write;

    #[test]
    fn test_empty_json_gives_defaults() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_json_str(
            r#"{
                "tracker": {"gating_distance_squared": 16.0, "gating_metric": "mahalanobis"},
                "background": {"seed_from_first": false},
                "evaluation": {"weights": {"detection_rate": 0.5}}
            }"#,
        )
        .unwrap();
        assert_eq!(settings.tracker.gating_distance_squared, 16.0);
        assert_eq!(settings.tracker.gating_metric, GatingMetric::Mahalanobis);
        assert_eq!(settings.tracker.measurement_noise, 0.2);
        assert!(!settings.background.seed_from_first_frame);
        assert_eq!(settings.evaluation.weights.detection_rate, 0.5);
        assert_eq!(settings.evaluation.weights.fragmentation, 0.10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Settings::from_json_str(r#"{"tracker": {"measurement_noise": 0.0}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let err = Settings::from_json_str("{ nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"geometry": {{"rings": 32}}}}"#).unwrap();
        let settings = Settings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.geometry.rings, 32);
        assert_eq!(settings.geometry.azimuth_bins, 1800);

        let err = Settings::from_json_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }

    #[test]
    fn test_apply_patch_atomic() {
        let mut settings = Settings::default();
        let patch = SettingsPatch::from_json_str(
            r#"{"tracker": {"process_noise_pos": 0.3}, "background": {"noise_relative": -1.0}}"#,
        )
        .unwrap();
        assert!(settings.apply(&patch).is_err());
        assert_eq!(settings, Settings::default());

        let patch = SettingsPatch::from_json_str(
            r#"{"tracker": {"process_noise_pos": 0.3}, "weights": {"quality_premium": 0.0}}"#,
        )
        .unwrap();
        settings.apply(&patch).unwrap();
        assert_eq!(settings.tracker.process_noise_pos, 0.3);
        assert_eq!(settings.evaluation.weights.quality_premium, 0.0);
    }
}
