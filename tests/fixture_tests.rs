//! End-to-end fixture tests for lidartrack.
//!
//! Each fixture under `testdata/fixtures/` scripts a sequence of frames and
//! the expected per-frame outcome.
//!
//! Run with: cargo test fixture

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use lidartrack::{
    BackgroundGrid, BackgroundParams, Detection, GridGeometry, LidarPoint, TrackState, Tracker,
    TrackerConfig,
};

// ============================================================================
// Fixture JSON Schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct LifecycleFixture {
    tracker_config: TrackerConfig,
    steps: Vec<LifecycleStep>,
}

#[derive(Debug, Deserialize)]
struct LifecycleStep {
    frame_ts_ns: i64,
    detections: Vec<[f64; 2]>,
    tracks: Vec<ExpectedTrack>,
}

#[derive(Debug, Deserialize)]
struct ExpectedTrack {
    track_id: u64,
    state: TrackState,
    observation_count: u32,
    misses: u32,
}

#[derive(Debug, Deserialize)]
struct BackgroundFixture {
    geometry: GridGeometry,
    params: BackgroundParams,
    frames: Vec<BackgroundFrame>,
}

#[derive(Debug, Deserialize)]
struct BackgroundFrame {
    /// (ring, azimuth_deg, range_m)
    points: Vec<(u16, f64, f64)>,
    background: usize,
    foreground: usize,
    occupied_cell_count: usize,
}

// ============================================================================
// Test Helpers
// ============================================================================

fn find_testdata_dir() -> PathBuf {
    let candidates = [
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/fixtures"),
        PathBuf::from("testdata/fixtures"),
        PathBuf::from("../testdata/fixtures"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return candidate.clone();
        }
    }
    panic!("Could not find testdata/fixtures directory");
}

fn load_fixture<T: for<'de> Deserialize<'de>>(scenario: &str) -> T {
    let path = find_testdata_dir().join(format!("fixture_{}.json", scenario));

    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture file {:?}: {}", path, e));

    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture file {:?}: {}", path, e))
}

fn compare_tracks(
    step_idx: usize,
    expected: &[ExpectedTrack],
    actual: &[lidartrack::TrackedObject],
) -> Result<(), String> {
    if expected.len() != actual.len() {
        let mut msg = format!(
            "FIRST DIVERGENCE at step {}: expected {} tracks, got {}\n",
            step_idx,
            expected.len(),
            actual.len()
        );
        for obj in actual {
            msg.push_str(&format!(
                "  actual id={} state={} observations={} misses={}\n",
                obj.track_id, obj.state, obj.observation_count, obj.misses
            ));
        }
        return Err(msg);
    }

    for (exp, act) in expected.iter().zip(actual) {
        let got = (act.track_id.0, act.state, act.observation_count, act.misses);
        let want = (exp.track_id, exp.state, exp.observation_count, exp.misses);
        if got != want {
            return Err(format!(
                "Step {}: track mismatch: expected {:?}, got {:?}",
                step_idx, want, got
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Fixture Tests
// ============================================================================

#[test]
fn fixture_lifecycle() {
    let fixture: LifecycleFixture = load_fixture("lifecycle");
    let mut tracker =
        Tracker::new("fixture", fixture.tracker_config).expect("Failed to create tracker");

    for (idx, step) in fixture.steps.iter().enumerate() {
        let detections: Vec<Detection> = step
            .detections
            .iter()
            .map(|[x, y]| Detection::at(*x, *y, 0.0, step.frame_ts_ns).with_box(1.0, 1.0, 1.5))
            .collect();
        let tracks = tracker
            .step(&detections, step.frame_ts_ns)
            .unwrap_or_else(|e| panic!("step {} failed: {}", idx, e));

        if let Err(msg) = compare_tracks(idx, &step.tracks, &tracks) {
            panic!("{}", msg);
        }
    }
}

#[test]
fn fixture_lifecycle_replay_is_deterministic() {
    let fixture: LifecycleFixture = load_fixture("lifecycle");
    let mut tracker =
        Tracker::new("fixture", fixture.tracker_config).expect("Failed to create tracker");

    let run = |tracker: &mut Tracker| {
        let mut outputs = Vec::new();
        for step in &fixture.steps {
            let detections: Vec<Detection> = step
                .detections
                .iter()
                .map(|[x, y]| Detection::at(*x, *y, 0.0, step.frame_ts_ns))
                .collect();
            outputs.push(tracker.step(&detections, step.frame_ts_ns).unwrap());
        }
        outputs
    };

    let first = run(&mut tracker);
    tracker.reset();
    let second = run(&mut tracker);
    assert_eq!(first, second);
}

#[test]
fn fixture_background_hysteresis() {
    let fixture: BackgroundFixture = load_fixture("background");
    let mut grid = BackgroundGrid::new("fixture", fixture.geometry, fixture.params)
        .expect("Failed to create grid");

    for (idx, frame) in fixture.frames.iter().enumerate() {
        let points: Vec<LidarPoint> = frame
            .points
            .iter()
            .map(|&(ring, az, range)| LidarPoint::polar(ring, az, 0.0, range, idx as i64))
            .collect();
        let result = grid.classify(&points);

        assert_eq!(result.background.len(), frame.background, "frame {} background", idx);
        assert_eq!(result.foreground.len(), frame.foreground, "frame {} foreground", idx);
        assert_eq!(
            grid.status().occupied_cell_count,
            frame.occupied_cell_count,
            "frame {} occupied cells",
            idx
        );
    }
}
