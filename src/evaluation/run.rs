//! Finalized run records consumed by the evaluator.

use serde::{Deserialize, Serialize};

use crate::tracked_object::{TrackId, TrackState};
use crate::utils::lerp;
use crate::TrackedObject;

/// One trajectory sample of a finalized track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp_ns: i64,
    /// Recorded speed; derived by finite differences when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// One finalized track of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrack {
    pub track_id: TrackId,
    pub state: TrackState,
    pub start_ns: i64,
    pub end_ns: i64,
    #[serde(default)]
    pub observation_count: u32,
    #[serde(default)]
    pub avg_speed: f64,
    #[serde(default)]
    pub peak_speed: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub object_class: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Trajectory, ordered by timestamp.
    #[serde(default)]
    pub history: Vec<RunPoint>,
}

impl RunTrack {
    /// Freeze a live track.
    pub fn from_tracked(obj: &TrackedObject) -> Self {
        Self {
            track_id: obj.track_id,
            state: obj.state,
            start_ns: obj.first_seen_ns,
            end_ns: obj.last_seen_ns,
            observation_count: obj.observation_count,
            avg_speed: obj.avg_speed,
            peak_speed: obj.peak_speed,
            length: obj.avg_length,
            width: obj.avg_width,
            height: obj.avg_height,
            object_class: obj.object_class.clone(),
            confidence: obj.confidence,
            history: obj
                .history
                .iter()
                .map(|p| RunPoint {
                    x: p.x,
                    y: p.y,
                    timestamp_ns: p.timestamp_ns,
                    speed: Some(p.speed()),
                })
                .collect(),
        }
    }

    /// Start of the track's time span (first history point if any).
    pub fn span_start(&self) -> i64 {
        self.history.first().map_or(self.start_ns, |p| p.timestamp_ns)
    }

    /// End of the track's time span (last history point if any).
    pub fn span_end(&self) -> i64 {
        self.history.last().map_or(self.end_ns, |p| p.timestamp_ns)
    }

    /// Speed at every history point.
    ///
    /// Recorded speeds win; missing ones use the backward difference, or the
    /// forward difference for the first point.
    pub fn speeds(&self) -> Vec<f64> {
        let h = &self.history;
        (0..h.len())
            .map(|i| {
                if let Some(speed) = h[i].speed {
                    return speed;
                }
                let (a, b) = match (i.checked_sub(1), h.get(i + 1)) {
                    (Some(prev), _) => (&h[prev], &h[i]),
                    (None, Some(next)) => (&h[i], next),
                    (None, None) => return 0.0,
                };
                let dt = (i128::from(b.timestamp_ns) - i128::from(a.timestamp_ns)) as f64 / 1e9;
                if dt <= 0.0 {
                    0.0
                } else {
                    (b.x - a.x).hypot(b.y - a.y) / dt
                }
            })
            .collect()
    }

    /// Index of the last history point at or before `ts`, if `ts` lies in
    /// the span.
    fn segment(&self, ts: i64) -> Option<usize> {
        let h = &self.history;
        if h.is_empty() || ts < h[0].timestamp_ns || ts > h[h.len() - 1].timestamp_ns {
            return None;
        }
        Some(h.partition_point(|p| p.timestamp_ns <= ts) - 1)
    }

    /// Linearly interpolated position at `ts`; `None` outside the span.
    pub fn position_at(&self, ts: i64) -> Option<[f64; 2]> {
        let i = self.segment(ts)?;
        let a = &self.history[i];
        let Some(b) = self.history.get(i + 1) else {
            return Some([a.x, a.y]);
        };
        let t = fraction(a.timestamp_ns, b.timestamp_ns, ts);
        Some([lerp(a.x, b.x, t), lerp(a.y, b.y, t)])
    }

    /// Linearly interpolated speed at `ts`, given precomputed `speeds`.
    pub fn speed_at(&self, speeds: &[f64], ts: i64) -> Option<f64> {
        let i = self.segment(ts)?;
        let a = &self.history[i];
        let Some(b) = self.history.get(i + 1) else {
            return speeds.get(i).copied();
        };
        let t = fraction(a.timestamp_ns, b.timestamp_ns, ts);
        Some(lerp(*speeds.get(i)?, *speeds.get(i + 1)?, t))
    }
}

fn fraction(t0: i64, t1: i64, ts: i64) -> f64 {
    if t1 <= t0 {
        0.0
    } else {
        (i128::from(ts) - i128::from(t0)) as f64 / (i128::from(t1) - i128::from(t0)) as f64
    }
}

/// A finalized tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub run_id: String,
    pub sensor_id: String,
    /// Runs still being recorded cannot be evaluated.
    #[serde(default)]
    pub finalized: bool,
    #[serde(default)]
    pub tracks: Vec<RunTrack>,
}

impl AnalysisRun {
    /// Finalized run from live tracks, in the given order.
    pub fn from_tracks(
        run_id: impl Into<String>,
        sensor_id: impl Into<String>,
        tracks: &[TrackedObject],
    ) -> Self {
        Self {
            run_id: run_id.into(),
            sensor_id: sensor_id.into(),
            finalized: true,
            tracks: tracks.iter().map(RunTrack::from_tracked).collect(),
        }
    }

    pub fn track(&self, track_id: TrackId) -> Option<&RunTrack> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }
}
