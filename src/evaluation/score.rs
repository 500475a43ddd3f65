//! Component metrics and the weighted composite score.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tracked_object::TrackId;
use crate::utils::{clamp_unit, mean, ratio};

use super::config::{EvaluationConfig, ScoreWeights};
use super::overlap::{assign_one_to_one, find_overlaps, mean_over, Prepared, TrackOverlap};
use super::run::RunTrack;

/// Result of comparing a candidate run against a reference run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    /// Matched reference tracks / reference tracks.
    pub detection_rate: f64,
    /// Mean extra overlapping candidates per reference track.
    pub fragmentation: f64,
    /// Unmatched candidate tracks / candidate tracks.
    pub false_positive_rate: f64,
    pub velocity_coverage: f64,
    /// Class and box agreement mapped to [-1, 1].
    pub quality_premium: f64,
    pub truncation_rate: f64,
    pub velocity_noise_rate: f64,
    pub stopped_recovery_rate: f64,
    pub matched_count: usize,
    pub reference_count: usize,
    pub candidate_count: usize,
    /// Set when the reference side is empty; every rate is then degenerate.
    pub no_reference_tracks: bool,
    /// Weighted combination of the components, in [0, 1].
    pub composite_score: f64,
}

impl EvaluationScore {
    /// Recompute the composite from the component metrics.
    pub fn composite(&self, weights: &ScoreWeights) -> f64 {
        let terms = [
            (weights.detection_rate, self.detection_rate),
            (weights.fragmentation, 1.0 - self.fragmentation.min(1.0)),
            (weights.false_positive_rate, 1.0 - self.false_positive_rate),
            (weights.velocity_coverage, self.velocity_coverage),
            (weights.quality_premium, self.quality_premium),
            (weights.truncation_rate, 1.0 - self.truncation_rate),
            (weights.velocity_noise_rate, 1.0 - self.velocity_noise_rate),
            (weights.stopped_recovery_rate, self.stopped_recovery_rate),
        ];
        clamp_unit(terms.iter().map(|(w, v)| w * v).sum())
    }
}

/// Score candidate tracks against reference tracks.
///
/// Never fails. With no reference tracks the detection rate is 0 and
/// `no_reference_tracks` is set.
pub fn score_tracks(
    reference: &[RunTrack],
    candidate: &[RunTrack],
    config: &EvaluationConfig,
) -> EvaluationScore {
    let reference = prepare_sorted(reference);
    let candidate = prepare_sorted(candidate);

    let overlaps = find_overlaps(&reference, &candidate, config);
    let matched = assign_one_to_one(&overlaps, reference.len(), candidate.len());

    let mut overlaps_per_ref = vec![0usize; reference.len()];
    for (r, _, _) in &overlaps {
        overlaps_per_ref[*r] += 1;
    }
    let fragmentation = mean(
        overlaps_per_ref
            .iter()
            .map(|&n| n.saturating_sub(1) as f64),
    )
    .unwrap_or(0.0);

    let ref_by_id: HashMap<TrackId, &Prepared<'_>> =
        reference.iter().map(|p| (p.track.track_id, p)).collect();
    let cand_by_id: HashMap<TrackId, &Prepared<'_>> =
        candidate.iter().map(|p| (p.track.track_id, p)).collect();

    let truncated = matched
        .iter()
        .filter(|m| {
            let r = ref_by_id[&m.reference_id].track;
            let c = cand_by_id[&m.candidate_id].track;
            is_truncated(r, c, config.truncation_tolerance_ns)
        })
        .count();

    let mut score = EvaluationScore {
        detection_rate: ratio(matched.len(), reference.len()),
        fragmentation,
        false_positive_rate: ratio(candidate.len() - matched.len(), candidate.len()),
        velocity_coverage: mean_over(&matched, |m| m.velocity_coverage),
        quality_premium: quality_premium(&matched, &ref_by_id, &cand_by_id, config),
        truncation_rate: ratio(truncated, matched.len()),
        velocity_noise_rate: mean_over(&matched, |m| m.velocity_noise),
        stopped_recovery_rate: stopped_recovery_rate(&reference, &matched, &cand_by_id, config),
        matched_count: matched.len(),
        reference_count: reference.len(),
        candidate_count: candidate.len(),
        no_reference_tracks: reference.is_empty(),
        composite_score: 0.0,
    };
    score.composite_score = score.composite(&config.weights);
    score
}

fn prepare_sorted(tracks: &[RunTrack]) -> Vec<Prepared<'_>> {
    let mut prepared: Vec<Prepared<'_>> = tracks.iter().map(Prepared::new).collect();
    prepared.sort_by_key(|p| p.track.track_id);
    prepared
}

fn is_truncated(reference: &RunTrack, candidate: &RunTrack, tolerance_ns: i64) -> bool {
    candidate.span_start() > reference.span_start().saturating_add(tolerance_ns)
        || candidate.span_end() < reference.span_end().saturating_sub(tolerance_ns)
}

/// Intervals during which the track stays below the stopped speed for at
/// least the minimum duration.
pub(crate) fn stopped_intervals(track: &Prepared<'_>, config: &EvaluationConfig) -> Vec<(i64, i64)> {
    let mut intervals = Vec::new();
    let mut open: Option<(i64, i64)> = None;

    for (point, &speed) in track.track.history.iter().zip(&track.speeds) {
        if speed < config.stopped_speed_mps {
            open = Some(match open {
                Some((start, _)) => (start, point.timestamp_ns),
                None => (point.timestamp_ns, point.timestamp_ns),
            });
        } else if let Some(interval) = open.take() {
            intervals.push(interval);
        }
    }
    intervals.extend(open);
    intervals.retain(|(start, end)| end.saturating_sub(*start) >= config.min_stopped_duration_ns);
    intervals
}

fn stopped_recovery_rate(
    reference: &[Prepared<'_>],
    matched: &[TrackOverlap],
    cand_by_id: &HashMap<TrackId, &Prepared<'_>>,
    config: &EvaluationConfig,
) -> f64 {
    let mut stopping = 0usize;
    let mut recovered = 0usize;

    for track in reference {
        let intervals = stopped_intervals(track, config);
        if intervals.is_empty() {
            continue;
        }
        stopping += 1;

        let Some(candidate) = matched
            .iter()
            .find(|m| m.reference_id == track.track.track_id)
            .and_then(|m| cand_by_id.get(&m.candidate_id))
        else {
            continue;
        };
        let tol = config.truncation_tolerance_ns;
        let covers = intervals.iter().all(|&(start, end)| {
            candidate.track.span_start() <= start.saturating_add(tol)
                && candidate.track.span_end() >= end.saturating_sub(tol)
        });
        if covers {
            recovered += 1;
        }
    }

    if stopping == 0 {
        1.0
    } else {
        ratio(recovered, stopping)
    }
}

/// Agreement in [0, 1] per comparable attribute, averaged per pair and
/// mapped to [-1, 1]. 0 when no pair has anything comparable.
fn quality_premium(
    matched: &[TrackOverlap],
    ref_by_id: &HashMap<TrackId, &Prepared<'_>>,
    cand_by_id: &HashMap<TrackId, &Prepared<'_>>,
    config: &EvaluationConfig,
) -> f64 {
    let per_pair = matched.iter().filter_map(|m| {
        let r = ref_by_id.get(&m.reference_id)?.track;
        let c = cand_by_id.get(&m.candidate_id)?.track;

        let mut checks = Vec::with_capacity(2);
        if let (Some(rc), Some(cc)) = (&r.object_class, &c.object_class) {
            checks.push(if rc.eq_ignore_ascii_case(cc) { 1.0 } else { 0.0 });
        }
        if r.length > 0.0 && r.width > 0.0 && c.length > 0.0 && c.width > 0.0 {
            let rel_len = (c.length - r.length).abs() / r.length;
            let rel_wid = (c.width - r.width).abs() / r.width;
            let within = rel_len <= config.box_tolerance_fraction
                && rel_wid <= config.box_tolerance_fraction;
            checks.push(if within { 1.0 } else { 0.0 });
        }
        mean(checks)
    });

    match mean(per_pair) {
        Some(q) => 2.0 * q - 1.0,
        None => 0.0,
    }
}
