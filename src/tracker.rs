//! Main tracker implementation.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::distances::GatingMetric;
use crate::filter::{Filter, ProcessNoise};
use crate::matching::{
    get_unmatched, match_detections_and_objects, match_detections_and_objects_optimal,
};
use crate::tracked_object::{ClassificationUpdate, TrackId, TrackState};
use crate::{Detection, Error, Result, TrackedObject};

/// Observations (including the spawning one) needed to confirm a track.
pub const DEFAULT_MIN_HITS_TO_CONFIRM: u32 = 3;

/// Consecutive misses a confirmed track survives; one more deletes it.
pub const DEFAULT_MAX_MISSES: u32 = 5;

/// Consecutive misses a tentative track survives; one more deletes it.
pub const DEFAULT_MAX_TENTATIVE_MISSES: u32 = 3;

/// Deleted tracks kept around for summaries before the oldest are purged.
pub const DEFAULT_MAX_DELETED_RETAINED: usize = 256;

/// How gated detection-to-track pairs are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrategy {
    /// Lowest distance first; ties by track id, then detection order.
    #[default]
    Greedy,
    /// Minimum total distance (Hungarian algorithm).
    Hungarian,
}

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detection-to-track pairs must have squared distance below this.
    pub gating_distance_squared: f64,

    /// Process noise added to position variance per second.
    pub process_noise_pos: f64,

    /// Process noise added to velocity variance per second.
    pub process_noise_vel: f64,

    /// Measurement noise variance for centroid observations (m²).
    pub measurement_noise: f64,

    /// Distance used for gating.
    pub gating_metric: GatingMetric,

    /// Assignment strategy.
    pub association: AssociationStrategy,

    /// Observations needed for Tentative -> Confirmed.
    pub min_hits_to_confirm: u32,

    /// Miss streak a confirmed track may reach before deletion.
    pub max_misses: u32,

    /// Miss streak a tentative track may reach before deletion.
    pub max_tentative_misses: u32,

    /// Maximum trajectory points kept per track (`None` = unbounded).
    pub max_history: Option<usize>,

    /// Deleted tracks retained before the oldest are purged.
    pub max_deleted_retained: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gating_distance_squared: 25.0,
            process_noise_pos: 0.1,
            process_noise_vel: 0.5,
            measurement_noise: 0.2,
            gating_metric: GatingMetric::Euclidean,
            association: AssociationStrategy::Greedy,
            min_hits_to_confirm: DEFAULT_MIN_HITS_TO_CONFIRM,
            max_misses: DEFAULT_MAX_MISSES,
            max_tentative_misses: DEFAULT_MAX_TENTATIVE_MISSES,
            max_history: None,
            max_deleted_retained: DEFAULT_MAX_DELETED_RETAINED,
        }
    }
}

impl TrackerConfig {
    /// Check every field; the first violation is reported.
    pub fn validate(&self) -> Result<()> {
        if !self.gating_distance_squared.is_finite() || self.gating_distance_squared <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "gating_distance_squared must be positive, got {}",
                self.gating_distance_squared
            )));
        }
        for (name, value) in [
            ("process_noise_pos", self.process_noise_pos),
            ("process_noise_vel", self.process_noise_vel),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if !self.measurement_noise.is_finite() || self.measurement_noise <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "measurement_noise must be positive, got {}",
                self.measurement_noise
            )));
        }
        if self.min_hits_to_confirm == 0 {
            return Err(Error::InvalidConfiguration(
                "min_hits_to_confirm must be at least 1".to_string(),
            ));
        }
        if self.max_history == Some(0) {
            return Err(Error::InvalidConfiguration(
                "max_history must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    fn process_noise(&self) -> ProcessNoise {
        ProcessNoise {
            pos: self.process_noise_pos,
            vel: self.process_noise_vel,
        }
    }
}

/// Partial tracker configuration; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfigPatch {
    pub gating_distance_squared: Option<f64>,
    pub process_noise_pos: Option<f64>,
    pub process_noise_vel: Option<f64>,
    pub measurement_noise: Option<f64>,
    pub gating_metric: Option<GatingMetric>,
    pub association: Option<AssociationStrategy>,
    pub min_hits_to_confirm: Option<u32>,
    pub max_misses: Option<u32>,
    pub max_tentative_misses: Option<u32>,
    /// `Some(None)` (JSON `null`) lifts the history bound.
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_history: Option<Option<usize>>,
    pub max_deleted_retained: Option<usize>,
}

/// Keep an explicit JSON `null` distinct from an absent field.
fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TrackerConfigPatch {
    /// Overlay this patch on `base`.
    pub fn apply(&self, base: &TrackerConfig) -> TrackerConfig {
        TrackerConfig {
            gating_distance_squared: self
                .gating_distance_squared
                .unwrap_or(base.gating_distance_squared),
            process_noise_pos: self.process_noise_pos.unwrap_or(base.process_noise_pos),
            process_noise_vel: self.process_noise_vel.unwrap_or(base.process_noise_vel),
            measurement_noise: self.measurement_noise.unwrap_or(base.measurement_noise),
            gating_metric: self.gating_metric.unwrap_or(base.gating_metric),
            association: self.association.unwrap_or(base.association),
            min_hits_to_confirm: self.min_hits_to_confirm.unwrap_or(base.min_hits_to_confirm),
            max_misses: self.max_misses.unwrap_or(base.max_misses),
            max_tentative_misses: self
                .max_tentative_misses
                .unwrap_or(base.max_tentative_misses),
            max_history: self.max_history.unwrap_or(base.max_history),
            max_deleted_retained: self
                .max_deleted_retained
                .unwrap_or(base.max_deleted_retained),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Counters describing the most recent `step`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame_ts_ns: i64,
    pub detections: usize,
    /// Malformed detections dropped before association.
    pub skipped: usize,
    pub matched: usize,
    pub spawned: usize,
    pub deleted: usize,
    pub promoted: usize,
    pub active: usize,
    pub confirmed: usize,
}

/// Multi-object tracker for one sensor.
///
/// Maintains a set of tracked objects across frames, matching new detections
/// to existing tracks and managing track lifecycles. Frames must arrive in
/// strictly increasing timestamp order.
#[derive(Debug, Clone)]
pub struct Tracker {
    sensor_id: String,

    config: TrackerConfig,

    /// All tracks, including retained deleted ones, in id order.
    tracks: BTreeMap<TrackId, TrackedObject>,

    /// Next id to hand out.
    next_id: u64,

    /// Timestamp of the last accepted frame.
    last_frame_ns: Option<i64>,

    /// Frames accepted since construction or reset.
    frame_count: u64,

    last_stats: FrameStats,
}

impl Tracker {
    /// Create a new tracker with the given configuration.
    pub fn new(sensor_id: impl Into<String>, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sensor_id: sensor_id.into(),
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
            last_frame_ns: None,
            frame_count: 0,
            last_stats: FrameStats::default(),
        })
    }

    /// Process one frame of detections.
    ///
    /// Predicts every live track forward to `frame_ts_ns`, associates gated
    /// detections, updates matched tracks, ages unmatched ones and spawns
    /// tentative tracks for leftover detections. Malformed detections are
    /// skipped.
    ///
    /// # Returns
    /// Every track currently held (all states), in id order.
    ///
    /// # Errors
    /// `PreconditionFailed` if `frame_ts_ns` does not advance past the
    /// previous frame; the tracker is left untouched.
    pub fn step(&mut self, detections: &[Detection], frame_ts_ns: i64) -> Result<Vec<TrackedObject>> {
        if let Some(last) = self.last_frame_ns {
            if frame_ts_ns <= last {
                warn!(
                    sensor_id = %self.sensor_id,
                    frame_ts_ns,
                    last_frame_ns = last,
                    "rejecting out-of-order frame"
                );
                return Err(Error::PreconditionFailed(format!(
                    "frame timestamp {} does not advance past {}",
                    frame_ts_ns, last
                )));
            }
        }
        self.last_frame_ns = Some(frame_ts_ns);
        self.frame_count += 1;

        let mut stats = FrameStats {
            frame_ts_ns,
            detections: detections.len(),
            ..FrameStats::default()
        };

        // STAGE 1: Predict live tracks up to this frame
        let noise = self.config.process_noise();
        for obj in self.tracks.values_mut().filter(|o| o.state.is_active()) {
            let dt = (i128::from(frame_ts_ns) - i128::from(obj.predicted_ns)) as f64 / 1e9;
            obj.filter.predict(dt, noise);
            obj.predicted_ns = frame_ts_ns;
        }

        // STAGE 2: Drop malformed detections
        let mut valid: Vec<&Detection> = Vec::with_capacity(detections.len());
        for (idx, det) in detections.iter().enumerate() {
            match det.validate() {
                Ok(()) => valid.push(det),
                Err(e) => {
                    debug!(sensor_id = %self.sensor_id, idx, error = %e, "skipping detection");
                    stats.skipped += 1;
                }
            }
        }

        // STAGE 3: Gate and associate against live tracks (ascending id)
        let live_ids: Vec<TrackId> = self
            .tracks
            .iter()
            .filter(|(_, obj)| obj.state.is_active())
            .map(|(id, _)| *id)
            .collect();

        let distance_matrix = self.distance_matrix(&valid, &live_ids);
        let gate = self.config.gating_distance_squared;
        let (matched_dets, matched_tracks) = match self.config.association {
            AssociationStrategy::Greedy => match_detections_and_objects(&distance_matrix, gate),
            AssociationStrategy::Hungarian => {
                match_detections_and_objects_optimal(&distance_matrix, gate)
            }
        };

        // STAGE 4: Update matched tracks
        for (&det_idx, &track_idx) in matched_dets.iter().zip(matched_tracks.iter()) {
            if self.hit_track(live_ids[track_idx], valid[det_idx], frame_ts_ns) {
                stats.promoted += 1;
            }
            stats.matched += 1;
        }

        // STAGE 5: Age live tracks that found no detection
        for track_idx in get_unmatched(live_ids.len(), &matched_tracks) {
            if self.miss_track(live_ids[track_idx]) {
                stats.deleted += 1;
            }
        }

        // STAGE 6: Spawn tentative tracks, in detection order
        for det_idx in get_unmatched(valid.len(), &matched_dets) {
            self.spawn_track(valid[det_idx], frame_ts_ns);
            stats.spawned += 1;
        }

        self.purge_deleted();

        stats.active = self.tracks.values().filter(|o| o.state.is_active()).count();
        stats.confirmed = self
            .tracks
            .values()
            .filter(|o| o.state == TrackState::Confirmed)
            .count();
        self.last_stats = stats;

        debug!(
            sensor_id = %self.sensor_id,
            frame_ts_ns,
            matched = stats.matched,
            spawned = stats.spawned,
            deleted = stats.deleted,
            skipped = stats.skipped,
            active = stats.active,
            "tracker step"
        );

        Ok(self.tracks.values().cloned().collect())
    }

    /// All tentative and confirmed tracks, in id order.
    pub fn active_tracks(&self) -> Vec<TrackedObject> {
        self.tracks
            .values()
            .filter(|obj| obj.state.is_active())
            .cloned()
            .collect()
    }

    /// Confirmed tracks only, in id order.
    pub fn confirmed_tracks(&self) -> Vec<TrackedObject> {
        self.tracks
            .values()
            .filter(|obj| obj.state == TrackState::Confirmed)
            .cloned()
            .collect()
    }

    /// Every track held, including retained deleted ones.
    pub fn all_tracks(&self) -> Vec<TrackedObject> {
        self.tracks.values().cloned().collect()
    }

    /// Look up one track.
    pub fn track(&self, track_id: TrackId) -> Result<TrackedObject> {
        self.tracks
            .get(&track_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{} on sensor {}", track_id, self.sensor_id)))
    }

    /// Set classification fields on a track.
    pub fn update_track(&mut self, track_id: TrackId, update: ClassificationUpdate) -> Result<()> {
        if let Some(confidence) = update.confidence {
            if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
                return Err(Error::InvalidInput(format!(
                    "confidence must be within [0, 1], got {}",
                    confidence
                )));
            }
        }
        let sensor_id = &self.sensor_id;
        let obj = self
            .tracks
            .get_mut(&track_id)
            .ok_or_else(|| Error::NotFound(format!("{} on sensor {}", track_id, sensor_id)))?;
        obj.apply_classification(update);
        Ok(())
    }

    /// Drop every track and restart ids at 1.
    pub fn reset(&mut self) {
        info!(
            sensor_id = %self.sensor_id,
            dropped = self.tracks.len(),
            "resetting tracker"
        );
        self.tracks.clear();
        self.next_id = 1;
        self.last_frame_ns = None;
        self.frame_count = 0;
        self.last_stats = FrameStats::default();
    }

    /// Apply a configuration patch; takes effect on the next step.
    ///
    /// The patched configuration is validated as a whole and either fully
    /// applied or rejected.
    pub fn update_config(&mut self, patch: &TrackerConfigPatch) -> Result<()> {
        let config = patch.apply(&self.config);
        config.validate()?;
        info!(sensor_id = %self.sensor_id, ?patch, "tracker configuration updated");
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Counters from the most recent step.
    pub fn frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Number of tracks held, in any state.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Frames accepted since construction or reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // Internal: squared distances (n_detections x n_live_tracks)
    fn distance_matrix(&self, detections: &[&Detection], live_ids: &[TrackId]) -> DMatrix<f64> {
        let mut matrix = DMatrix::from_element(detections.len(), live_ids.len(), f64::INFINITY);
        for (j, id) in live_ids.iter().enumerate() {
            let obj = &self.tracks[id];
            for (i, det) in detections.iter().enumerate() {
                matrix[(i, j)] = self.config.gating_metric.distance_squared(
                    &obj.filter,
                    &Vector2::new(det.x, det.y),
                    self.config.measurement_noise,
                );
            }
        }
        matrix
    }

    // Internal: update a matched track; returns true on promotion
    fn hit_track(&mut self, track_id: TrackId, detection: &Detection, frame_ts_ns: i64) -> bool {
        let Some(obj) = self.tracks.get_mut(&track_id) else {
            return false;
        };

        let measurement = Vector2::new(detection.x, detection.y);
        if !obj.filter.update(&measurement, self.config.measurement_noise) {
            warn!(track_id = %track_id, "singular innovation covariance, measurement ignored");
        }
        obj.record_observation(detection, frame_ts_ns, self.config.max_history);

        if obj.state == TrackState::Tentative
            && obj.observation_count >= self.config.min_hits_to_confirm
        {
            obj.state = TrackState::Confirmed;
            debug!(track_id = %track_id, "track confirmed");
            return true;
        }
        false
    }

    // Internal: register a miss; returns true if the track was deleted
    fn miss_track(&mut self, track_id: TrackId) -> bool {
        let frame_count = self.frame_count;
        let Some(obj) = self.tracks.get_mut(&track_id) else {
            return false;
        };

        obj.misses += 1;
        let limit = match obj.state {
            TrackState::Tentative => self.config.max_tentative_misses,
            TrackState::Confirmed => self.config.max_misses,
            TrackState::Deleted => return false,
        };
        if obj.misses > limit {
            obj.state = TrackState::Deleted;
            obj.deleted_at_frame = Some(frame_count);
            debug!(track_id = %track_id, misses = obj.misses, "track deleted");
            return true;
        }
        false
    }

    // Internal: create a tentative track
    fn spawn_track(&mut self, detection: &Detection, frame_ts_ns: i64) {
        let track_id = TrackId(self.next_id);
        self.next_id += 1;

        let mut obj = TrackedObject::spawn(
            track_id,
            &self.sensor_id,
            detection,
            frame_ts_ns,
            self.config.measurement_noise,
        );
        if self.config.min_hits_to_confirm <= 1 {
            obj.state = TrackState::Confirmed;
        }
        self.tracks.insert(track_id, obj);
    }

    // Internal: keep at most `max_deleted_retained` deleted tracks
    fn purge_deleted(&mut self) {
        let mut deleted: Vec<(u64, TrackId)> = self
            .tracks
            .values()
            .filter_map(|obj| obj.deleted_at_frame.map(|frame| (frame, obj.track_id)))
            .collect();

        let excess = deleted.len().saturating_sub(self.config.max_deleted_retained);
        if excess == 0 {
            return;
        }
        deleted.sort_unstable();
        for (_, track_id) in deleted.into_iter().take(excess) {
            self.tracks.remove(&track_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SECOND: i64 = 1_000_000_000;

    fn tracker() -> Tracker {
        Tracker::new("lidar-0", TrackerConfig::default()).unwrap()
    }

    fn det(x: f64, y: f64, ts: i64) -> Detection {
        Detection::at(x, y, 0.0, ts).with_box(4.0, 1.8, 1.5)
    }

    // ===== Basic Tracker Tests =====

    #[test]
    fn test_tracker_new() {
        let tracker = tracker();
        assert_eq!(tracker.track_count(), 0);
        assert!(tracker.active_tracks().is_empty());
        assert_eq!(tracker.sensor_id(), "lidar-0");
    }

    #[test]
    fn test_tracker_invalid_config() {
        let config = TrackerConfig {
            measurement_noise: -1.0,
            ..TrackerConfig::default()
        };
        let err = Tracker::new("lidar-0", config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        let config = TrackerConfig {
            min_hits_to_confirm: 0,
            ..TrackerConfig::default()
        };
        assert!(Tracker::new("lidar-0", config).is_err());
    }

    #[test]
    fn test_tracker_update_empty_detections() {
        let mut tracker = tracker();
        let tracks = tracker.step(&[], 0).unwrap();
        assert!(tracks.is_empty());
        let tracks = tracker.step(&[], SECOND).unwrap();
        assert!(tracks.is_empty());
    }

    // ===== Lifecycle Tests =====

    #[test]
    fn test_three_detections_spawn_in_order_then_match() {
        let mut tracker = tracker();
        let frame = |ts| vec![det(0.0, 0.0, ts), det(10.0, 0.0, ts), det(20.0, 0.0, ts)];

        let tracks = tracker.step(&frame(0), 0).unwrap();
        assert_eq!(tracks.len(), 3);
        let ids: Vec<u64> = tracks.iter().map(|t| t.track_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(tracks[1].position(), [10.0, 0.0]);
        assert!(tracks.iter().all(|t| t.state == TrackState::Tentative));

        let tracks = tracker.step(&frame(1), 1).unwrap();
        assert_eq!(tracks.len(), 3);
        for (obj, x) in tracks.iter().zip([0.0, 10.0, 20.0]) {
            assert_eq!(obj.observation_count, 2);
            assert_eq!(obj.state, TrackState::Tentative);
            assert_relative_eq!(obj.position()[0], x, epsilon = 1e-6);
        }
        assert_eq!(tracker.frame_stats().matched, 3);
        assert_eq!(tracker.frame_stats().spawned, 0);
    }

    #[test]
    fn test_promotion_on_third_observation() {
        let mut tracker = tracker();
        for frame in 0..2 {
            tracker.step(&[det(5.0, 5.0, frame * SECOND / 10)], frame * SECOND / 10).unwrap();
        }
        assert!(tracker.confirmed_tracks().is_empty());

        tracker.step(&[det(5.0, 5.0, 2 * SECOND / 10)], 2 * SECOND / 10).unwrap();
        let confirmed = tracker.confirmed_tracks();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].observation_count, 3);
        assert_eq!(tracker.frame_stats().promoted, 1);
    }

    #[test]
    fn test_confirmed_track_coasts_then_deleted() {
        let mut tracker = tracker();
        let mut ts = 0;
        for _ in 0..3 {
            tracker.step(&[det(1.0, 1.0, ts)], ts).unwrap();
            ts += SECOND / 10;
        }
        let id = tracker.confirmed_tracks()[0].track_id;

        // max_misses = 5: five misses coast, the sixth deletes
        for miss in 1..=DEFAULT_MAX_MISSES {
            tracker.step(&[], ts).unwrap();
            ts += SECOND / 10;
            let obj = tracker.track(id).unwrap();
            assert_eq!(obj.state, TrackState::Confirmed);
            assert_eq!(obj.misses, miss);
        }
        tracker.step(&[], ts).unwrap();
        assert_eq!(tracker.track(id).unwrap().state, TrackState::Deleted);
        assert!(tracker.active_tracks().is_empty());
        assert_eq!(tracker.frame_stats().deleted, 1);
    }

    #[test]
    fn test_tentative_track_deleted_after_tentative_limit() {
        let mut tracker = tracker();
        tracker.step(&[det(1.0, 1.0, 0)], 0).unwrap();
        for frame in 1..=DEFAULT_MAX_TENTATIVE_MISSES as i64 {
            tracker.step(&[], frame).unwrap();
            assert_eq!(tracker.active_tracks().len(), 1);
        }
        tracker.step(&[], 100).unwrap();
        assert!(tracker.active_tracks().is_empty());
        assert_eq!(tracker.all_tracks()[0].state, TrackState::Deleted);
    }

    #[test]
    fn test_miss_streak_resets_on_match() {
        let mut tracker = tracker();
        tracker.step(&[det(1.0, 1.0, 0)], 0).unwrap();
        tracker.step(&[], 1).unwrap();
        tracker.step(&[], 2).unwrap();
        tracker.step(&[det(1.0, 1.0, 3)], 3).unwrap();
        let obj = tracker.track(TrackId(1)).unwrap();
        assert_eq!(obj.misses, 0);
        assert_eq!(obj.observation_count, 2);
    }

    // ===== Gating Tests =====

    #[test]
    fn test_detection_outside_gate_spawns_new_track() {
        let mut tracker = tracker();
        tracker.step(&[det(0.0, 0.0, 0)], 0).unwrap();

        // gate radius is 5 m; 5.5 m away must not match
        let tracks = tracker.step(&[det(5.5, 0.0, 1)], 1).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].observation_count, 1);
        assert_eq!(tracks[0].misses, 1);
        assert_eq!(tracks[1].track_id, TrackId(2));
    }

    #[test]
    fn test_closest_detection_wins() {
        let mut tracker = tracker();
        tracker.step(&[det(0.0, 0.0, 0)], 0).unwrap();
        let tracks = tracker.step(&[det(2.0, 0.0, 1), det(0.5, 0.0, 1)], 1).unwrap();
        assert_eq!(tracks.len(), 2);
        // track 1 took the nearer detection; the other spawned track 2
        assert_eq!(tracks[0].observation_count, 2);
        assert_relative_eq!(tracks[1].position()[0], 2.0);
    }

    #[test]
    fn test_hungarian_association() {
        let config = TrackerConfig {
            association: AssociationStrategy::Hungarian,
            ..TrackerConfig::default()
        };
        let mut tracker = Tracker::new("lidar-0", config).unwrap();
        tracker.step(&[det(0.0, 0.0, 0), det(10.0, 0.0, 0)], 0).unwrap();
        let tracks = tracker.step(&[det(10.2, 0.0, 1), det(0.1, 0.0, 1)], 1).unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.observation_count == 2));
        let x = tracks[0].position()[0];
        assert!(x > 0.0 && x < 0.1, "track 1 should move towards 0.1, got {}", x);
        assert!(tracks[1].position()[0] > 10.0);
    }

    #[test]
    fn test_hungarian_tie_goes_to_lower_track_id() {
        let config = TrackerConfig {
            association: AssociationStrategy::Hungarian,
            ..TrackerConfig::default()
        };
        let mut tracker = Tracker::new("lidar-0", config).unwrap();
        tracker.step(&[det(-1.0, 0.0, 0), det(1.0, 0.0, 0)], 0).unwrap();
        let tracks = tracker.step(&[det(0.0, 0.0, 1)], 1).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].track_id, TrackId(1));
        assert_eq!(tracks[0].observation_count, 2);
        assert_eq!(tracks[0].misses, 0);
        assert_eq!(tracks[1].observation_count, 1);
        assert_eq!(tracks[1].misses, 1);
    }

    #[test]
    fn test_greedy_and_hungarian_agree_on_ties() {
        for association in [AssociationStrategy::Greedy, AssociationStrategy::Hungarian] {
            let config = TrackerConfig {
                association,
                ..TrackerConfig::default()
            };
            let mut tracker = Tracker::new("lidar-0", config).unwrap();
            tracker
                .step(&[det(0.0, -1.0, 0), det(0.0, 1.0, 0), det(20.0, 0.0, 0)], 0)
                .unwrap();
            let tracks = tracker.step(&[det(0.0, 0.0, 1), det(20.0, 0.0, 1)], 1).unwrap();
            let hits: Vec<u32> = tracks.iter().map(|t| t.observation_count).collect();
            assert_eq!(hits, vec![2, 1, 2], "{:?}", association);
        }
    }

    #[test]
    fn test_malformed_detection_skipped() {
        let mut tracker = tracker();
        let bad = Detection::at(f64::NAN, 0.0, 0.0, 0);
        let tracks = tracker.step(&[bad, det(1.0, 1.0, 0)], 0).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracker.frame_stats().skipped, 1);
        assert_eq!(tracker.frame_stats().spawned, 1);
    }

    // ===== Frame Ordering Tests =====

    #[test]
    fn test_extreme_frame_gap_does_not_overflow() {
        let mut tracker = tracker();
        tracker.step(&[det(1.0, 1.0, i64::MIN)], i64::MIN).unwrap();
        let tracks = tracker.step(&[det(1.0, 1.0, i64::MAX)], i64::MAX).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].observation_count, 2);
        assert!(tracks[0].position().iter().all(|v| v.is_finite()));
        assert_relative_eq!(tracks[0].duration_secs(), u64::MAX as f64 / 1e9);
    }

    #[test]
    fn test_out_of_order_frame_rejected() {
        let mut tracker = tracker();
        tracker.step(&[det(1.0, 1.0, 10)], 10).unwrap();
        let err = tracker.step(&[det(1.0, 1.0, 5)], 5).unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed(_)));
        assert!(tracker.step(&[], 10).is_err());
        assert_eq!(tracker.track(TrackId(1)).unwrap().observation_count, 1);
    }

    #[test]
    fn test_moving_object_velocity() {
        let mut tracker = tracker();
        for frame in 0..30i64 {
            let ts = frame * SECOND / 10;
            tracker.step(&[det(frame as f64 * 0.3, 0.0, ts)], ts).unwrap();
        }
        let obj = tracker.track(TrackId(1)).unwrap();
        assert_eq!(tracker.track_count(), 1);
        assert_eq!(obj.state, TrackState::Confirmed);
        assert_relative_eq!(obj.velocity()[0], 3.0, epsilon = 0.3);
        assert!(obj.peak_speed >= obj.avg_speed);
        assert!(obj.last_seen_ns >= obj.first_seen_ns);
        assert!(obj
            .history
            .iter()
            .zip(obj.history.iter().skip(1))
            .all(|(a, b)| a.timestamp_ns < b.timestamp_ns));
    }

    // ===== Reset / Query Tests =====

    #[test]
    fn test_reset_restarts_ids() {
        let mut tracker = tracker();
        tracker.step(&[det(0.0, 0.0, 0), det(10.0, 0.0, 0)], 0).unwrap();
        tracker.reset();
        assert_eq!(tracker.track_count(), 0);
        assert_eq!(tracker.frame_count(), 0);

        // timestamps may restart after a reset
        let tracks = tracker.step(&[det(3.0, 3.0, 0)], 0).unwrap();
        assert_eq!(tracks[0].track_id, TrackId(1));
    }

    #[test]
    fn test_get_unknown_track() {
        let tracker = tracker();
        let err = tracker.track(TrackId(99)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_update_track_classification() {
        let mut tracker = tracker();
        tracker.step(&[det(0.0, 0.0, 0)], 0).unwrap();
        tracker
            .update_track(
                TrackId(1),
                ClassificationUpdate {
                    object_class: Some("pedestrian".into()),
                    confidence: Some(0.8),
                    model_id: None,
                },
            )
            .unwrap();
        let obj = tracker.track(TrackId(1)).unwrap();
        assert_eq!(obj.object_class.as_deref(), Some("pedestrian"));

        assert!(matches!(
            tracker.update_track(TrackId(2), ClassificationUpdate::default()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            tracker.update_track(
                TrackId(1),
                ClassificationUpdate {
                    confidence: Some(1.5),
                    ..Default::default()
                }
            ),
            Err(Error::InvalidInput(_))
        ));
    }

    // ===== Configuration Tests =====

    #[test]
    fn test_update_config_patch() {
        let mut tracker = tracker();
        tracker
            .update_config(&TrackerConfigPatch {
                gating_distance_squared: Some(100.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tracker.config().gating_distance_squared, 100.0);
        assert_eq!(tracker.config().measurement_noise, 0.2);
    }

    #[test]
    fn test_patch_can_lift_history_bound() {
        let mut tracker = tracker();
        tracker
            .update_config(&TrackerConfigPatch {
                max_history: Some(Some(4)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tracker.config().max_history, Some(4));

        let untouched: TrackerConfigPatch = serde_json::from_str(r#"{"max_misses": 7}"#).unwrap();
        assert_eq!(untouched.max_history, None);
        tracker.update_config(&untouched).unwrap();
        assert_eq!(tracker.config().max_history, Some(4));

        let lift: TrackerConfigPatch = serde_json::from_str(r#"{"max_history": null}"#).unwrap();
        assert_eq!(lift.max_history, Some(None));
        tracker.update_config(&lift).unwrap();
        assert_eq!(tracker.config().max_history, None);
        assert_eq!(tracker.config().max_misses, 7);
    }

    #[test]
    fn test_update_config_is_atomic() {
        let mut tracker = tracker();
        let before = tracker.config().clone();
        let result = tracker.update_config(&TrackerConfigPatch {
            gating_distance_squared: Some(9.0),
            process_noise_vel: Some(-0.5),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        assert_eq!(tracker.config(), &before);
    }

    #[test]
    fn test_config_change_applies_next_step() {
        let mut tracker = tracker();
        tracker.step(&[det(0.0, 0.0, 0)], 0).unwrap();
        tracker
            .update_config(&TrackerConfigPatch {
                gating_distance_squared: Some(1.0),
                ..Default::default()
            })
            .unwrap();
        // 2 m away: inside the old gate, outside the new one
        let tracks = tracker.step(&[det(2.0, 0.0, 1)], 1).unwrap();
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_deleted_retention_limit() {
        let config = TrackerConfig {
            max_deleted_retained: 1,
            max_tentative_misses: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = Tracker::new("lidar-0", config).unwrap();
        tracker.step(&[det(0.0, 0.0, 0)], 0).unwrap();
        tracker.step(&[det(50.0, 0.0, 1)], 1).unwrap();
        tracker.step(&[], 2).unwrap();
        // track 1 deleted at frame 2, track 2 at frame 3; only the newest stays
        let tracks = tracker.all_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, TrackId(2));
        assert_eq!(tracks[0].state, TrackState::Deleted);
    }
}
