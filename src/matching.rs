//! Detection-to-track matching algorithms.
//!
//! Distance matrices are laid out `n_detections x n_tracks`, with tracks in
//! ascending id order so that column order doubles as the id tie-break.

use nalgebra::DMatrix;

use crate::internal::hungarian::linear_sum_assignment;

/// Collect every `(distance, det_idx, track_idx)` strictly below the gate.
/// Non-finite distances (including NaN) never qualify.
pub fn gated_pairs(distance_matrix: &DMatrix<f64>, gate: f64) -> Vec<(f64, usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..distance_matrix.nrows() {
        for j in 0..distance_matrix.ncols() {
            let dist = distance_matrix[(i, j)];
            if dist.is_finite() && dist < gate {
                pairs.push((dist, i, j));
            }
        }
    }
    pairs
}

/// Resolve candidate pairs greedily, lowest distance first.
///
/// Equal distances are ordered by the second index (track), then the first
/// (detection). Each index on either side is consumed at most once.
///
/// # Returns
/// Tuple of (first_indices, second_indices) in acceptance order.
pub fn greedy_assign(
    mut pairs: Vec<(f64, usize, usize)>,
    n_first: usize,
    n_second: usize,
) -> (Vec<usize>, Vec<usize>) {
    pairs.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut used_first = vec![false; n_first];
    let mut used_second = vec![false; n_second];

    let mut matched_first = Vec::new();
    let mut matched_second = Vec::new();

    for (_dist, i, j) in pairs {
        if used_first[i] || used_second[j] {
            continue;
        }
        matched_first.push(i);
        matched_second.push(j);
        used_first[i] = true;
        used_second[j] = true;
    }

    (matched_first, matched_second)
}

/// Match detections to tracks using greedy minimum-distance matching.
///
/// # Arguments
/// * `distance_matrix` - Squared distances (n_detections x n_tracks)
/// * `gate` - Pairs must be strictly below this value
///
/// # Returns
/// Tuple of (matched_det_indices, matched_track_indices) where entry i
/// indicates the matched pair.
pub fn match_detections_and_objects(
    distance_matrix: &DMatrix<f64>,
    gate: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n_detections = distance_matrix.nrows();
    let n_tracks = distance_matrix.ncols();

    if n_detections == 0 || n_tracks == 0 {
        return (Vec::new(), Vec::new());
    }

    greedy_assign(gated_pairs(distance_matrix, gate), n_detections, n_tracks)
}

/// Match detections to tracks with a globally optimal assignment.
///
/// Minimises total gated distance; pairs at or above the gate are never
/// returned. Output is ordered by track index.
pub fn match_detections_and_objects_optimal(
    distance_matrix: &DMatrix<f64>,
    gate: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n_detections = distance_matrix.nrows();
    let n_tracks = distance_matrix.ncols();

    if n_detections == 0 || n_tracks == 0 {
        return (Vec::new(), Vec::new());
    }

    // Rows are tracks so ties resolve towards lower track ids.
    let cost: Vec<Vec<Option<f64>>> = (0..n_tracks)
        .map(|j| {
            (0..n_detections)
                .map(|i| {
                    let d = distance_matrix[(i, j)];
                    (d.is_finite() && d < gate).then_some(d)
                })
                .collect()
        })
        .collect();

    let mut matched_dets = Vec::new();
    let mut matched_tracks = Vec::new();
    for assignment in linear_sum_assignment(&cost).assignments {
        matched_tracks.push(assignment.row_idx);
        matched_dets.push(assignment.col_idx);
    }
    (matched_dets, matched_tracks)
}

/// Get unmatched indices from a match result.
pub fn get_unmatched(total: usize, matched: &[usize]) -> Vec<usize> {
    let mut is_matched = vec![false; total];
    for &idx in matched {
        is_matched[idx] = true;
    }
    (0..total).filter(|&i| !is_matched[i]).collect()
}
