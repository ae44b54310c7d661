//! One-to-one matching over IoU matrices.

use ndarray::Array2;

/// Cost given to padding cells so the solver never prefers them.
const PADDING_COST: f64 = 1e6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// Matched (row, column) pairs, ordered by row
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

impl Assignment {
    fn unmatched(num_rows: usize, num_cols: usize) -> Self {
        Self {
            matches: vec![],
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: (0..num_cols).collect(),
        }
    }

    fn from_row_matches(row_to_col: &[Option<usize>], num_cols: usize) -> Self {
        let mut col_used = vec![false; num_cols];
        let mut matches = vec![];
        let mut unmatched_rows = vec![];
        for (row, col) in row_to_col.iter().enumerate() {
            match col {
                Some(col) => {
                    col_used[*col] = true;
                    matches.push((row, *col));
                }
                None => unmatched_rows.push(row),
            }
        }
        let unmatched_cols = col_used
            .iter()
            .enumerate()
            .filter_map(|(i, &used)| if used { None } else { Some(i) })
            .collect();
        Self {
            matches,
            unmatched_rows,
            unmatched_cols,
        }
    }
}

/// Minimum-cost one-to-one assignment (Jonker-Volgenant).
///
/// The cost matrix is padded to a square before solving. A solved pair is
/// kept only if `accept(row, col)` holds; rejected pairs leave both sides
/// unmatched.
pub fn linear_assignment(
    cost_matrix: &Array2<f32>,
    accept: impl Fn(usize, usize) -> bool,
) -> Assignment {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return Assignment::unmatched(num_rows, num_cols);
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PADDING_COST);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        padded[[i, j]] = cost as f64;
    }

    let row_to_col = match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => row_to_col,
        Err(_) => return Assignment::unmatched(num_rows, num_cols),
    };

    let rows: Vec<Option<usize>> = row_to_col
        .iter()
        .take(num_rows)
        .enumerate()
        .map(|(row, &col)| (col < num_cols && accept(row, col)).then_some(col))
        .collect();

    Assignment::from_row_matches(&rows, num_cols)
}

/// Greedy one-to-one assignment by descending IoU.
///
/// Pairs with IoU below `min_iou` are never matched. Equal IoUs resolve in
/// row-major order.
pub fn greedy_assignment(ious: &Array2<f32>, min_iou: f32) -> Assignment {
    let (num_rows, num_cols) = ious.dim();

    let mut candidates: Vec<(usize, usize, f32)> = ious
        .indexed_iter()
        .filter(|&(_, &iou)| iou >= min_iou)
        .map(|((i, j), &iou)| (i, j, iou))
        .collect();
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut rows: Vec<Option<usize>> = vec![None; num_rows];
    let mut col_used = vec![false; num_cols];
    for (i, j, _) in candidates {
        if rows[i].is_none() && !col_used[j] {
            rows[i] = Some(j);
            col_used[j] = true;
        }
    }

    Assignment::from_row_matches(&rows, num_cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_assignment_prefers_global_minimum() {
        // Greedy on row 0 would take column 0 and force row 1 onto a bad pair.
        let cost = array![[0.1, 0.2], [0.15, 0.9]];
        let result = linear_assignment(&cost, |_, _| true);
        assert_eq!(result.matches, vec![(0, 1), (1, 0)]);
        assert!(result.unmatched_rows.is_empty());
        assert!(result.unmatched_cols.is_empty());
    }

    #[test]
    fn test_linear_assignment_rectangular() {
        let cost = array![[0.5, 0.0, 0.7]];
        let result = linear_assignment(&cost, |_, _| true);
        assert_eq!(result.matches, vec![(0, 1)]);
        assert_eq!(result.unmatched_cols, vec![0, 2]);
    }

    #[test]
    fn test_linear_assignment_rejects_pairs() {
        let cost = array![[0.9]];
        let result = linear_assignment(&cost, |i, j| cost[[i, j]] < 0.5);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_rows, vec![0]);
        assert_eq!(result.unmatched_cols, vec![0]);
    }

    #[test]
    fn test_linear_assignment_empty() {
        let cost = Array2::<f32>::zeros((0, 3));
        let result = linear_assignment(&cost, |_, _| true);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_cols, vec![0, 1, 2]);
    }

    #[test]
    fn test_greedy_assignment_takes_best_first() {
        let ious = array![[0.6, 0.9], [0.0, 0.8]];
        let result = greedy_assignment(&ious, 0.3);
        assert_eq!(result.matches, vec![(0, 1)]);
        assert_eq!(result.unmatched_rows, vec![1]);
        assert_eq!(result.unmatched_cols, vec![0]);
    }

    #[test]
    fn test_greedy_assignment_respects_minimum() {
        let ious = array![[0.2]];
        let result = greedy_assignment(&ious, 0.3);
        assert!(result.matches.is_empty());
    }
}
