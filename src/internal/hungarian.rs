//! Optimal assignment via the Hungarian (Kuhn-Munkres) algorithm.
//!
//! Works on rectangular matrices with forbidden cells. The matrix is padded
//! to square with zero-cost dummy cells, and forbidden cells receive a cost
//! larger than any feasible total, so the solver first maximises the number
//! of allowed pairs and then minimises their summed cost. Ties between
//! optimal assignments are settled in favour of lower row indices.
#![allow(clippy::needless_range_loop)]

/// Represents a match between a row index and column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub row_idx: usize,
    pub col_idx: usize,
}

/// Result of linear sum assignment.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    /// Allowed (row, col) pairs, ordered by row.
    pub assignments: Vec<Assignment>,
    /// Indices of rows that were not matched
    pub unmatched_rows: Vec<usize>,
    /// Indices of columns that were not matched
    pub unmatched_cols: Vec<usize>,
}

/// Solve the linear sum assignment problem.
///
/// Among all optimal assignments (most allowed pairs, then lowest summed
/// cost) the one preferred by lower rows wins: each row in turn keeps its
/// cheapest column (lowest index on equal cost) if some optimal assignment
/// allows it, else stays unmatched if that is optimal.
///
/// # Arguments
/// * `cost_matrix` - `cost[i][j]` is the cost of pairing row i with column
///   j, or `None` if the pair is forbidden. All rows must have equal length.
pub fn linear_sum_assignment(cost_matrix: &[Vec<Option<f64>>]) -> AssignmentResult {
    let n_rows = cost_matrix.len();
    let n_cols = cost_matrix.first().map_or(0, |row| row.len());

    if n_rows == 0 || n_cols == 0 {
        return AssignmentResult {
            assignments: Vec::new(),
            unmatched_rows: (0..n_rows).collect(),
            unmatched_cols: (0..n_cols).collect(),
        };
    }

    let rows = prefer_lower_rows(cost_matrix, solve(cost_matrix));

    let mut assignments = Vec::new();
    let mut matched_cols = vec![false; n_cols];
    for (row_idx, col) in rows.iter().enumerate() {
        if let Some(col_idx) = *col {
            assignments.push(Assignment { row_idx, col_idx });
            matched_cols[col_idx] = true;
        }
    }

    AssignmentResult {
        assignments,
        unmatched_rows: (0..n_rows).filter(|&i| rows[i].is_none()).collect(),
        unmatched_cols: (0..n_cols).filter(|&j| !matched_cols[j]).collect(),
    }
}

/// One optimal assignment as `row -> Some(col)` over allowed cells only.
fn solve(cost_matrix: &[Vec<Option<f64>>]) -> Vec<Option<usize>> {
    let n_rows = cost_matrix.len();
    let n_cols = cost_matrix.first().map_or(0, |row| row.len());

    let finite_total: f64 = cost_matrix
        .iter()
        .flatten()
        .filter_map(|c| *c)
        .map(f64::abs)
        .sum();
    let forbidden = (finite_total + 1.0) * (n_rows.max(n_cols) as f64 + 1.0);

    let n = n_rows.max(n_cols);
    let mut cost = vec![vec![0.0; n]; n];
    for i in 0..n_rows {
        for j in 0..n_cols {
            cost[i][j] = cost_matrix[i][j].unwrap_or(forbidden);
        }
    }

    solve_square(&cost)
        .into_iter()
        .take(n_rows)
        .enumerate()
        .map(|(i, j)| (j < n_cols && cost_matrix[i][j].is_some()).then_some(j))
        .collect()
}

/// Number of pairs and their summed cost.
fn objective(cost_matrix: &[Vec<Option<f64>>], rows: &[Option<usize>]) -> (usize, f64) {
    rows.iter()
        .enumerate()
        .filter_map(|(i, &col)| col.and_then(|j| cost_matrix[i][j]))
        .fold((0, 0.0), |(n, total), c| (n + 1, total + c))
}

fn same_objective(a: (usize, f64), b: (usize, f64)) -> bool {
    a.0 == b.0 && (a.1 - b.1).abs() <= 1e-9 * a.1.abs().max(1.0)
}

/// Restrict row `row` to `choice` (or to nothing) and reserve its column.
fn pin_row(cost_matrix: &mut [Vec<Option<f64>>], row: usize, choice: Option<usize>) {
    for (j, cell) in cost_matrix[row].iter_mut().enumerate() {
        if Some(j) != choice {
            *cell = None;
        }
    }
    if let Some(col) = choice {
        for (i, other) in cost_matrix.iter_mut().enumerate() {
            if i != row {
                other[col] = None;
            }
        }
    }
}

/// Walk rows in order and move each to its preferred choice whenever an
/// assignment with the same objective exists under the earlier rows' pins.
fn prefer_lower_rows(
    cost_matrix: &[Vec<Option<f64>>],
    mut rows: Vec<Option<usize>>,
) -> Vec<Option<usize>> {
    let optimum = objective(cost_matrix, &rows);
    let mut pinned = cost_matrix.to_vec();

    for r in 0..rows.len() {
        let mut choices: Vec<(f64, usize)> = pinned[r]
            .iter()
            .enumerate()
            .filter_map(|(j, c)| c.map(|c| (c, j)))
            .collect();
        choices.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let preferences = choices
            .into_iter()
            .map(|(_, j)| Some(j))
            .chain(std::iter::once(None));

        for choice in preferences {
            if choice == rows[r] {
                break;
            }
            let mut trial = pinned.clone();
            pin_row(&mut trial, r, choice);
            let candidate = solve(&trial);
            if candidate[r] == choice
                && same_objective(objective(cost_matrix, &candidate), optimum)
            {
                rows = candidate;
                break;
            }
        }
        pin_row(&mut pinned, r, rows[r]);
    }
    rows
}

/// Shortest-augmenting-path Hungarian algorithm on a square matrix.
///
/// Returns `result[row] = col`.
fn solve_square(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    // 1-indexed potentials; index 0 is the virtual source.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the alternating path
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut result = vec![0usize; n];
    for j in 1..=n {
        if p[j] > 0 {
            result[p[j] - 1] = j - 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(rows: &[&[f64]]) -> Vec<Vec<Option<f64>>> {
        rows.iter().map(|r| r.iter().map(|&c| Some(c)).collect()).collect()
    }

    #[test]
    fn test_square_optimal() {
        let cost = allowed(&[&[4.0, 1.0, 3.0], &[2.0, 0.0, 5.0], &[3.0, 2.0, 2.0]]);
        let result = linear_sum_assignment(&cost);
        let pairs: Vec<(usize, usize)> = result
            .assignments
            .iter()
            .map(|a| (a.row_idx, a.col_idx))
            .collect();
        // Optimal total = 1 + 2 + 2 = 5
        assert_eq!(pairs, vec![(0, 1), (1, 0), (2, 2)]);
        assert!(result.unmatched_rows.is_empty());
        assert!(result.unmatched_cols.is_empty());
    }

    #[test]
    fn test_rectangular_more_cols() {
        let cost = allowed(&[&[5.0, 1.0, 9.0]]);
        let result = linear_sum_assignment(&cost);
        assert_eq!(result.assignments, vec![Assignment { row_idx: 0, col_idx: 1 }]);
        assert_eq!(result.unmatched_cols, vec![0, 2]);
    }

    #[test]
    fn test_rectangular_more_rows() {
        let cost = allowed(&[&[5.0], &[1.0], &[3.0]]);
        let result = linear_sum_assignment(&cost);
        assert_eq!(result.assignments, vec![Assignment { row_idx: 1, col_idx: 0 }]);
        assert_eq!(result.unmatched_rows, vec![0, 2]);
    }

    #[test]
    fn test_forbidden_cells_never_assigned() {
        let cost = vec![vec![None, Some(1.0)], vec![None, Some(2.0)]];
        let result = linear_sum_assignment(&cost);
        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.assignments[0], Assignment { row_idx: 0, col_idx: 1 });
        assert_eq!(result.unmatched_rows, vec![1]);
        assert_eq!(result.unmatched_cols, vec![0]);
    }

    #[test]
    fn test_equal_cost_goes_to_lower_row() {
        // Row 0 and row 1 are equally far from the only column
        let cost = allowed(&[&[1.0], &[1.0]]);
        let result = linear_sum_assignment(&cost);
        assert_eq!(result.assignments, vec![Assignment { row_idx: 0, col_idx: 0 }]);
        assert_eq!(result.unmatched_rows, vec![1]);
    }

    #[test]
    fn test_equal_totals_prefer_lower_row_cheapest() {
        // Both diagonals total 2.0; row 0 prefers column 0 (cost 0.5)
        let cost = allowed(&[&[0.5, 1.0], &[1.0, 1.5]]);
        let result = linear_sum_assignment(&cost);
        let pairs: Vec<(usize, usize)> = result
            .assignments
            .iter()
            .map(|a| (a.row_idx, a.col_idx))
            .collect();
        assert_eq!(pairs, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_tie_break_keeps_optimum() {
        // Row 0 alone would prefer column 0, but that forces a worse total
        let cost = allowed(&[&[1.0, 2.0], &[1.0, 9.0]]);
        let result = linear_sum_assignment(&cost);
        let pairs: Vec<(usize, usize)> = result
            .assignments
            .iter()
            .map(|a| (a.row_idx, a.col_idx))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_empty() {
        let result = linear_sum_assignment(&[]);
        assert!(result.assignments.is_empty());
    }
}
