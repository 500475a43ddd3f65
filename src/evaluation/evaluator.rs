//! Ground-truth evaluation of one run against another.

use tracing::{debug, info};

use super::config::{EvaluationConfig, ScoreWeightsPatch};
use super::run::AnalysisRun;
use super::score::{score_tracks, EvaluationScore};
use super::store::RunStore;
use crate::{Error, Result};

/// Compares a candidate run with a trusted reference run.
///
/// Stateless apart from its configuration; reads runs from `S` only.
#[derive(Debug, Clone)]
pub struct GroundTruthEvaluator<S> {
    store: S,
    config: EvaluationConfig,
}

impl<S: RunStore> GroundTruthEvaluator<S> {
    pub fn new(store: S, config: EvaluationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Score `candidate_run_id` against `reference_run_id`.
    ///
    /// # Errors
    /// - `NotFound` if either run does not exist
    /// - `UpstreamUnavailable` if the store cannot be read
    /// - `PreconditionFailed` if either run is not finalized or has no tracks
    pub fn evaluate(&self, reference_run_id: &str, candidate_run_id: &str) -> Result<EvaluationScore> {
        let reference = self.load_ready(reference_run_id, "reference")?;
        let candidate = self.load_ready(candidate_run_id, "candidate")?;

        let score = score_tracks(&reference.tracks, &candidate.tracks, &self.config);
        info!(
            reference = reference_run_id,
            candidate = candidate_run_id,
            composite = score.composite_score,
            detection_rate = score.detection_rate,
            matched = score.matched_count,
            "evaluated run"
        );
        Ok(score)
    }

    fn load_ready(&self, run_id: &str, role: &str) -> Result<AnalysisRun> {
        let run = self.store.load_run(run_id)?;
        if !run.finalized {
            return Err(Error::PreconditionFailed(format!(
                "{} run '{}' is not finalized",
                role, run_id
            )));
        }
        if run.tracks.is_empty() {
            return Err(Error::PreconditionFailed(format!(
                "{} run '{}' has no tracks",
                role, run_id
            )));
        }
        debug!(run_id, role, tracks = run.tracks.len(), "loaded run");
        Ok(run)
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Replace the tolerances and weights; validated as a whole.
    pub fn set_config(&mut self, config: EvaluationConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Patch the composite weights; unset fields keep their value.
    pub fn update_weights(&mut self, patch: &ScoreWeightsPatch) -> Result<()> {
        let weights = patch.apply(&self.config.weights);
        weights.validate()?;
        self.config.weights = weights;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
