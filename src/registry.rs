//! Per-sensor pairing of a background grid with a tracker.
//!
//! A [`SensorRegistry`] is owned by the application and handed to whoever
//! needs to look up a sensor; there is no process-global instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::background::{wait_for_settle, SettleOutcome, DEFAULT_SETTLE_POLL_INTERVAL};
use crate::config::Settings;
use crate::tracked_object::TrackId;
use crate::{
    AcceptanceMetrics, AnalysisRun, BackgroundGrid, BackgroundParamsPatch, Classification,
    Detection, GridStatus, LidarPoint, Result, TrackedObject, Tracker, TrackerConfigPatch,
};

/// Background grid and tracker for one sensor.
///
/// `classify` and `step` hold the corresponding write lock for the whole
/// frame; queries take the read lock and return clones, so readers never
/// observe a half-processed frame.
#[derive(Debug)]
pub struct SensorPipeline {
    sensor_id: String,
    grid: RwLock<BackgroundGrid>,
    tracker: RwLock<Tracker>,
}

impl SensorPipeline {
    pub fn new(sensor_id: impl Into<String>, settings: &Settings) -> Result<Self> {
        let sensor_id = sensor_id.into();
        let grid = BackgroundGrid::new(
            sensor_id.clone(),
            settings.geometry,
            settings.background.clone(),
        )?;
        let tracker = Tracker::new(sensor_id.clone(), settings.tracker.clone())?;
        Ok(Self {
            sensor_id,
            grid: RwLock::new(grid),
            tracker: RwLock::new(tracker),
        })
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Split a frame of raw points into background and foreground.
    pub fn classify(&self, points: &[LidarPoint]) -> Classification {
        self.grid.write().classify(points)
    }

    /// Advance the tracker by one frame of foreground detections.
    pub fn step(&self, detections: &[Detection], frame_ts_ns: i64) -> Result<Vec<TrackedObject>> {
        self.tracker.write().step(detections, frame_ts_ns)
    }

    pub fn active_tracks(&self) -> Vec<TrackedObject> {
        self.tracker.read().active_tracks()
    }

    pub fn confirmed_tracks(&self) -> Vec<TrackedObject> {
        self.tracker.read().confirmed_tracks()
    }

    pub fn track(&self, track_id: TrackId) -> Result<TrackedObject> {
        self.tracker.read().track(track_id)
    }

    pub fn grid_status(&self) -> GridStatus {
        self.grid.read().status()
    }

    pub fn acceptance_metrics(&self) -> AcceptanceMetrics {
        self.grid.read().acceptance_metrics()
    }

    pub fn update_tracker_config(&self, patch: &TrackerConfigPatch) -> Result<()> {
        self.tracker.write().update_config(patch)
    }

    pub fn set_background_params(&self, patch: &BackgroundParamsPatch) -> Result<()> {
        self.grid.write().set_params(patch)
    }

    /// Clear grid and tracker together, e.g. before replaying a scene.
    ///
    /// Both write locks are held across the reset (grid first, then tracker).
    pub fn reset(&self) {
        let mut grid = self.grid.write();
        let mut tracker = self.tracker.write();
        grid.reset();
        tracker.reset();
        info!(sensor_id = %self.sensor_id, "sensor pipeline reset");
    }

    /// Wait for the grid to settle, polling at the default interval.
    pub fn wait_for_settle(&self, timeout: Duration) -> SettleOutcome {
        wait_for_settle(&self.grid, timeout, DEFAULT_SETTLE_POLL_INTERVAL)
    }

    /// Freeze every track that reached confirmation into a finalized run.
    pub fn snapshot_run(&self, run_id: impl Into<String>) -> AnalysisRun {
        let tracker = self.tracker.read();
        let min_hits = tracker.config().min_hits_to_confirm;
        let tracks: Vec<TrackedObject> = tracker
            .all_tracks()
            .into_iter()
            .filter(|t| t.observation_count >= min_hits)
            .collect();
        AnalysisRun::from_tracks(run_id, self.sensor_id.clone(), &tracks)
    }

    pub fn grid(&self) -> &RwLock<BackgroundGrid> {
        &self.grid
    }

    pub fn tracker(&self) -> &RwLock<Tracker> {
        &self.tracker
    }
}

/// Sensor pipelines keyed by sensor id.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    settings: Settings,
    pipelines: RwLock<HashMap<String, Arc<SensorPipeline>>>,
}

impl SensorRegistry {
    /// Registry whose new pipelines are built from `settings`.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            pipelines: RwLock::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn get(&self, sensor_id: &str) -> Option<Arc<SensorPipeline>> {
        self.pipelines.read().get(sensor_id).cloned()
    }

    /// Existing pipeline for `sensor_id`, or a new one.
    ///
    /// Concurrent callers for the same id all receive the same pipeline.
    pub fn get_or_create(&self, sensor_id: &str) -> Result<Arc<SensorPipeline>> {
        if let Some(pipeline) = self.get(sensor_id) {
            return Ok(pipeline);
        }

        let mut pipelines = self.pipelines.write();
        if let Some(pipeline) = pipelines.get(sensor_id) {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(SensorPipeline::new(sensor_id, &self.settings)?);
        pipelines.insert(sensor_id.to_string(), Arc::clone(&pipeline));
        info!(sensor_id, "registered sensor pipeline");
        Ok(pipeline)
    }

    pub fn remove(&self, sensor_id: &str) -> Option<Arc<SensorPipeline>> {
        self.pipelines.write().remove(sensor_id)
    }

    /// Registered sensor ids, sorted.
    pub fn sensor_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pipelines.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }
}
