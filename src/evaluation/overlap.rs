//! Spatiotemporal overlap between reference and candidate tracks.

use crate::distances::euclidean_squared;
use crate::matching::greedy_assign;
use crate::tracked_object::TrackId;
use crate::utils::{mean, ratio};

use super::config::EvaluationConfig;
use super::run::RunTrack;

/// Agreement between one reference and one candidate track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOverlap {
    pub reference_id: TrackId,
    pub candidate_id: TrackId,
    /// Reference samples inside the shared time window.
    pub samples: usize,
    /// Fraction of samples within the proximity tolerance.
    pub proximity_fraction: f64,
    pub mean_distance_m: f64,
    /// Fraction of samples whose speeds agree within tolerance.
    pub velocity_coverage: f64,
    /// Fraction of samples whose speeds differ by more than the noise bound.
    pub velocity_noise: f64,
}

/// A track with its per-point speeds precomputed.
pub(crate) struct Prepared<'a> {
    pub track: &'a RunTrack,
    pub speeds: Vec<f64>,
}

impl<'a> Prepared<'a> {
    pub fn new(track: &'a RunTrack) -> Self {
        Self {
            speeds: track.speeds(),
            track,
        }
    }
}

/// Compare a reference track against a candidate over their shared time
/// window. Returns `None` when the spans are disjoint or no reference sample
/// falls inside the window.
pub(crate) fn compare_tracks(
    reference: &Prepared<'_>,
    candidate: &Prepared<'_>,
    config: &EvaluationConfig,
) -> Option<TrackOverlap> {
    let lo = reference.track.span_start().max(candidate.track.span_start());
    let hi = reference.track.span_end().min(candidate.track.span_end());
    if lo > hi {
        return None;
    }

    let tolerance_sq = config.proximity_tolerance_m * config.proximity_tolerance_m;
    let mut samples = 0usize;
    let mut close = 0usize;
    let mut distance_sum = 0.0;
    let mut speed_ok = 0usize;
    let mut speed_noisy = 0usize;

    for (point, &ref_speed) in reference.track.history.iter().zip(&reference.speeds) {
        if point.timestamp_ns < lo || point.timestamp_ns > hi {
            continue;
        }
        let Some(position) = candidate.track.position_at(point.timestamp_ns) else {
            continue;
        };
        samples += 1;

        let d2 = euclidean_squared([point.x, point.y], position);
        distance_sum += d2.sqrt();
        if d2 <= tolerance_sq {
            close += 1;
        }

        if let Some(cand_speed) = candidate.track.speed_at(&candidate.speeds, point.timestamp_ns) {
            let diff = (cand_speed - ref_speed).abs();
            if diff <= config.velocity_tolerance_mps {
                speed_ok += 1;
            }
            if diff > config.velocity_noise_mps {
                speed_noisy += 1;
            }
        }
    }

    if samples == 0 {
        return None;
    }

    Some(TrackOverlap {
        reference_id: reference.track.track_id,
        candidate_id: candidate.track.track_id,
        samples,
        proximity_fraction: ratio(close, samples),
        mean_distance_m: distance_sum / samples as f64,
        velocity_coverage: ratio(speed_ok, samples),
        velocity_noise: ratio(speed_noisy, samples),
    })
}

/// Every (reference, candidate) pair that overlaps closely enough.
///
/// Both slices must be ordered by track id; the output is ordered by
/// reference then candidate.
pub(crate) fn find_overlaps(
    reference: &[Prepared<'_>],
    candidate: &[Prepared<'_>],
    config: &EvaluationConfig,
) -> Vec<(usize, usize, TrackOverlap)> {
    let mut overlaps = Vec::new();
    for (r, ref_track) in reference.iter().enumerate() {
        for (c, cand_track) in candidate.iter().enumerate() {
            if let Some(overlap) = compare_tracks(ref_track, cand_track, config) {
                if overlap.proximity_fraction >= config.min_overlap_fraction {
                    overlaps.push((r, c, overlap));
                }
            }
        }
    }
    overlaps
}

/// One-to-one matching, lowest mean distance first.
///
/// Ties go to the lower reference id, then the lower candidate id (index
/// order, given id-ordered inputs).
pub(crate) fn assign_one_to_one(
    overlaps: &[(usize, usize, TrackOverlap)],
    n_reference: usize,
    n_candidate: usize,
) -> Vec<TrackOverlap> {
    // (distance, candidate, reference): ties resolve on reference, then candidate
    let pairs: Vec<(f64, usize, usize)> = overlaps
        .iter()
        .map(|(r, c, o)| (o.mean_distance_m, *c, *r))
        .collect();

    let (cands, refs) = greedy_assign(pairs, n_candidate, n_reference);
    let mut matched: Vec<TrackOverlap> = cands
        .iter()
        .zip(&refs)
        .filter_map(|(&c, &r)| {
            overlaps
                .iter()
                .find(|(or, oc, _)| *or == r && *oc == c)
                .map(|(_, _, o)| o.clone())
        })
        .collect();
    matched.sort_by_key(|o| o.reference_id);
    matched
}

/// Mean of `f` over the matched pairs (0 when there are none).
pub(crate) fn mean_over<F>(matched: &[TrackOverlap], f: F) -> f64
where
    F: Fn(&TrackOverlap) -> f64,
{
    mean(matched.iter().map(f)).unwrap_or(0.0)
}
