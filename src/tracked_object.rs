//! TrackedObject struct for tracked objects maintained by the tracker.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::{ConstantVelocityKalman, Filter};
use crate::Detection;

/// Stable identifier of a track within one tracker.
///
/// Ids count up from 1 after construction or [`crate::Tracker::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// Lifecycle state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Newly spawned; not yet enough observations to trust.
    Tentative,
    /// Matched often enough to report; may coast across brief misses.
    Confirmed,
    /// Missed too many frames. Terminal.
    Deleted,
}

impl TrackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackState::Tentative => "tentative",
            TrackState::Confirmed => "confirmed",
            TrackState::Deleted => "deleted",
        }
    }

    /// True for tentative and confirmed tracks.
    pub fn is_active(&self) -> bool {
        match self {
            TrackState::Tentative | TrackState::Confirmed => true,
            TrackState::Deleted => false,
        }
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trajectory sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp_ns: i64,
    pub vx: f64,
    pub vy: f64,
}

impl TrackPoint {
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Classification fields an external classifier may set on a track.
///
/// `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationUpdate {
    #[serde(default)]
    pub object_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// A tracked object maintained by the tracker.
///
/// Owned by exactly one [`crate::Tracker`]; queries hand out clones.
#[derive(Clone, PartialEq)]
pub struct TrackedObject {
    /// Stable track identifier.
    pub track_id: TrackId,

    /// Sensor that produced the detections.
    pub sensor_id: String,

    /// Lifecycle state.
    pub state: TrackState,

    /// Matched observations, including the spawning detection.
    pub observation_count: u32,

    /// Current run of consecutive frames without a match.
    pub misses: u32,

    /// Object height from the latest matched detection.
    pub height: f64,

    /// Running mean of filtered speed over updates (m/s).
    pub avg_speed: f64,

    /// Highest filtered speed seen (m/s).
    pub peak_speed: f64,

    /// Cumulative mean bounding-box length.
    pub avg_length: f64,
    /// Cumulative mean bounding-box width.
    pub avg_width: f64,
    /// Cumulative mean bounding-box height.
    pub avg_height: f64,

    /// Timestamp of the spawning detection.
    pub first_seen_ns: i64,
    /// Timestamp of the latest matched detection.
    pub last_seen_ns: i64,

    pub object_class: Option<String>,
    pub confidence: Option<f32>,
    pub model_id: Option<String>,

    /// Trajectory, oldest first.
    pub history: VecDeque<TrackPoint>,

    /// Kinematic filter.
    pub(crate) filter: ConstantVelocityKalman,

    /// Timestamp the filter state refers to.
    pub(crate) predicted_ns: i64,

    /// Frame counter value when the track was deleted.
    pub(crate) deleted_at_frame: Option<u64>,
}

impl fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedObject")
            .field("track_id", &self.track_id)
            .field("sensor_id", &self.sensor_id)
            .field("state", &self.state)
            .field("position", &self.position())
            .field("velocity", &self.velocity())
            .field("observation_count", &self.observation_count)
            .field("misses", &self.misses)
            .field("first_seen_ns", &self.first_seen_ns)
            .field("last_seen_ns", &self.last_seen_ns)
            .field("object_class", &self.object_class)
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl TrackedObject {
    /// Spawn a tentative track from an unmatched detection.
    pub(crate) fn spawn(
        track_id: TrackId,
        sensor_id: &str,
        detection: &Detection,
        frame_ts_ns: i64,
        measurement_noise: f64,
    ) -> Self {
        let filter = ConstantVelocityKalman::new(detection.position(), measurement_noise);
        let mut history = VecDeque::new();
        history.push_back(TrackPoint {
            x: detection.x,
            y: detection.y,
            timestamp_ns: frame_ts_ns,
            vx: 0.0,
            vy: 0.0,
        });

        Self {
            track_id,
            sensor_id: sensor_id.to_string(),
            state: TrackState::Tentative,
            observation_count: 1,
            misses: 0,
            height: detection.object_height(),
            avg_speed: 0.0,
            peak_speed: 0.0,
            avg_length: detection.length,
            avg_width: detection.width,
            avg_height: detection.height,
            first_seen_ns: frame_ts_ns,
            last_seen_ns: frame_ts_ns,
            object_class: None,
            confidence: None,
            model_id: None,
            history,
            filter,
            predicted_ns: frame_ts_ns,
            deleted_at_frame: None,
        }
    }

    /// Filtered ground-plane position (x, y).
    pub fn position(&self) -> [f64; 2] {
        let p = self.filter.position();
        [p[0], p[1]]
    }

    /// Filtered ground-plane velocity (vx, vy).
    pub fn velocity(&self) -> [f64; 2] {
        let v = self.filter.velocity();
        [v[0], v[1]]
    }

    /// Filtered speed (m/s).
    pub fn speed(&self) -> f64 {
        self.filter.velocity().norm()
    }

    /// Heading in radians, counter-clockwise from +x.
    pub fn heading(&self) -> f64 {
        let v = self.filter.velocity();
        v[1].atan2(v[0])
    }

    /// Duration between first and last sighting in seconds.
    pub fn duration_secs(&self) -> f64 {
        (i128::from(self.last_seen_ns) - i128::from(self.first_seen_ns)) as f64 / 1e9
    }

    /// Fold a matched detection into the running statistics.
    ///
    /// Must be called after the filter update for this frame.
    pub(crate) fn record_observation(
        &mut self,
        detection: &Detection,
        frame_ts_ns: i64,
        max_history: Option<usize>,
    ) {
        self.observation_count += 1;
        self.misses = 0;
        self.last_seen_ns = self.last_seen_ns.max(frame_ts_ns);
        self.height = detection.object_height();

        let n = self.observation_count as f64;
        self.avg_length += (detection.length - self.avg_length) / n;
        self.avg_width += (detection.width - self.avg_width) / n;
        self.avg_height += (detection.height - self.avg_height) / n;

        // Speed aggregates cover updates only; the spawn has no velocity.
        let speed = self.speed();
        let updates = (self.observation_count - 1) as f64;
        self.avg_speed += (speed - self.avg_speed) / updates;
        self.peak_speed = self.peak_speed.max(speed);

        let [x, y] = self.position();
        let [vx, vy] = self.velocity();
        self.history.push_back(TrackPoint {
            x,
            y,
            timestamp_ns: frame_ts_ns,
            vx,
            vy,
        });
        if let Some(limit) = max_history {
            while self.history.len() > limit.max(1) {
                self.history.pop_front();
            }
        }
    }

    /// Apply externally supplied classification fields.
    pub(crate) fn apply_classification(&mut self, update: ClassificationUpdate) {
        if let Some(class) = update.object_class {
            self.object_class = Some(class);
        }
        if let Some(confidence) = update.confidence {
            self.confidence = Some(confidence);
        }
        if let Some(model_id) = update.model_id {
            self.model_id = Some(model_id);
        }
    }
}
