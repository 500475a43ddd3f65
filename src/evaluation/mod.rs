//! Ground-truth evaluation of tracking runs.
//!
//! Compares a candidate run's tracks against a trusted reference run of the
//! same scene and produces component metrics plus a weighted composite:
//!
//! - `AnalysisRun` / `RunTrack` - finalized run records
//! - `RunStore` - read access to runs (in memory or a JSON directory)
//! - `GroundTruthEvaluator` - loads two runs and scores them
//! - `score_tracks` - the pure scoring function

mod config;
mod evaluator;
mod overlap;
mod run;
mod score;
mod store;

pub use config::{EvaluationConfig, ScoreWeights, ScoreWeightsPatch};
pub use evaluator::GroundTruthEvaluator;
pub use overlap::TrackOverlap;
pub use run::{AnalysisRun, RunPoint, RunTrack};
pub use score::{score_tracks, EvaluationScore};
pub use store::{InMemoryRunStore, JsonDirRunStore, RunStore};

#[cfg(test)]
pub(crate) mod test_support {
    use super::{RunPoint, RunTrack};
    use crate::tracked_object::{TrackId, TrackState};

    /// Track moving along +x at `speed` m/s, one point per second.
    pub fn straight_track(id: u64, t0: i64, n: usize, speed: f64) -> RunTrack {
        let history: Vec<RunPoint> = (0..n)
            .map(|i| RunPoint {
                x: speed * i as f64,
                y: 0.0,
                timestamp_ns: t0 + i as i64 * 1_000_000_000,
                speed: None,
            })
            .collect();
        RunTrack {
            track_id: TrackId(id),
            state: TrackState::Confirmed,
            start_ns: t0,
            end_ns: t0 + (n as i64 - 1) * 1_000_000_000,
            observation_count: n as u32,
            avg_speed: speed,
            peak_speed: speed,
            length: 4.0,
            width: 1.8,
            height: 1.5,
            object_class: None,
            confidence: None,
            history,
        }
    }
}
