//! # lidartrack - LiDAR foreground tracking core
//!
//! Turns per-frame LiDAR cluster detections from a fixed sensor into a stable
//! set of tracked moving objects.
//!
//! ## Features
//!
//! - Polar background grid with hysteresis and range-bucketed acceptance metrics
//! - Multi-object tracker: gated nearest-neighbour association and a
//!   constant-velocity Kalman filter with a tentative/confirmed/deleted lifecycle
//! - Ground-truth evaluation of a candidate run against a labeled reference run
//! - Per-sensor registry pairing one tracker with one background grid
//!
//! ## Example
//!
//! ```rust,ignore
//! use lidartrack::{Detection, Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::new("lidar-0", TrackerConfig::default()).unwrap();
//!
//! let detections = vec![Detection::at(1.0, 2.0, 0.0, 1_000_000_000)];
//! let tracks = tracker.step(&detections, 1_000_000_000).unwrap();
//! ```

// Internal modules (assignment solver)
pub(crate) mod internal;

// Public modules
pub mod background;
pub mod config;
pub mod detection;
pub mod distances;
pub mod evaluation;
pub mod filter;
pub mod matching;
pub mod registry;
pub mod tracked_object;
pub mod tracker;
pub mod utils;

// Re-exports for convenience
pub use background::{
    default_buckets, wait_for_settle, wait_for_settle_ms, AcceptanceMetrics, BackgroundGrid,
    BackgroundParams, BackgroundParamsPatch, Classification, GridGeometry, GridStatus, LidarPoint,
    SettleOutcome,
};
pub use config::{Settings, SettingsPatch};
pub use detection::Detection;
pub use evaluation::{
    score_tracks, AnalysisRun, EvaluationConfig, EvaluationScore, GroundTruthEvaluator,
    InMemoryRunStore, JsonDirRunStore, RunPoint, RunStore, RunTrack, ScoreWeights,
    ScoreWeightsPatch,
};
pub use registry::{SensorPipeline, SensorRegistry};
pub use tracked_object::{ClassificationUpdate, TrackId, TrackPoint, TrackState, TrackedObject};
pub use tracker::{AssociationStrategy, FrameStats, Tracker, TrackerConfig, TrackerConfigPatch};

// Error types
pub use crate::error::{Error, ErrorKind, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the tracking core.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Not found: {0}")]
        NotFound(String),

        #[error("Invalid configuration: {0}")]
        InvalidConfiguration(String),

        #[error("Precondition failed: {0}")]
        PreconditionFailed(String),

        #[error("Upstream unavailable: {0}")]
        UpstreamUnavailable(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
    }

    /// Coarse error category, for callers that map errors onto status codes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ErrorKind {
        NotFound,
        InvalidConfiguration,
        PreconditionFailed,
        UpstreamUnavailable,
        InvalidInput,
    }

    impl Error {
        /// The structured kind of this error.
        pub fn kind(&self) -> ErrorKind {
            match self {
                Error::NotFound(_) => ErrorKind::NotFound,
                Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
                Error::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
                Error::UpstreamUnavailable(_) | Error::Io(_) => ErrorKind::UpstreamUnavailable,
                Error::InvalidInput(_) | Error::Json(_) => ErrorKind::InvalidInput,
            }
        }
    }

    /// Result type for tracking core operations
    pub type Result<T> = std::result::Result<T, Error>;

}
