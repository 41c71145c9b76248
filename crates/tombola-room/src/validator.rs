//! Win detection.

/// Returns `true` if some full row, some full column, the main diagonal,
/// or the anti-diagonal of `marked` is entirely `true`.
///
/// Grids that are empty, not square, or ragged are never a win.
pub fn is_bingo(marked: &[Vec<bool>]) -> bool {
    let n = marked.len();
    if n == 0 || marked.iter().any(|row| row.len() != n) {
        return false;
    }

    marked.iter().any(|row| row.iter().all(|&cell| cell))
        || (0..n).any(|col| (0..n).all(|row| marked[row][col]))
        || (0..n).all(|i| marked[i][i])
        || (0..n).all(|i| marked[i][n - 1 - i])
}

/// Checks that `marked` is exactly `size × size`.
pub fn check_shape(marked: &[Vec<bool>], size: usize) -> Result<(), String> {
    if marked.len() != size {
        return Err(format!("expected {size} rows, got {}", marked.len()));
    }
    if let Some((row, cells)) = marked.iter().enumerate().find(|(_, r)| r.len() != size) {
        return Err(format!(
            "row {row} has {} cells, expected {size}",
            cells.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(size: usize, on: &[(usize, usize)]) -> Vec<Vec<bool>> {
        let mut g = vec![vec![false; size]; size];
        for &(r, c) in on {
            g[r][c] = true;
        }
        g
    }

    #[test]
    fn test_is_bingo_all_false_is_not_a_win() {
        assert!(!is_bingo(&grid(5, &[])));
    }

    #[test]
    fn test_is_bingo_all_true_is_a_win() {
        assert!(is_bingo(&vec![vec![true; 4]; 4]));
    }

    #[test]
    fn test_is_bingo_every_row_and_column() {
        let n = 5;
        for i in 0..n {
            let row: Vec<_> = (0..n).map(|c| (i, c)).collect();
            let col: Vec<_> = (0..n).map(|r| (r, i)).collect();
            assert!(is_bingo(&grid(n, &row)), "row {i}");
            assert!(is_bingo(&grid(n, &col)), "col {i}");
        }
    }

    #[test]
    fn test_is_bingo_both_diagonals() {
        assert!(is_bingo(&grid(3, &[(0, 0), (1, 1), (2, 2)])));
        assert!(is_bingo(&grid(3, &[(0, 2), (1, 1), (2, 0)])));
    }

    #[test]
    fn test_is_bingo_single_corner_is_not_a_win() {
        assert!(!is_bingo(&grid(3, &[(0, 2)])));
    }

    #[test]
    fn test_is_bingo_broken_lines_are_not_a_win() {
        // Every row, column, and diagonal is missing exactly one cell.
        let g = grid(3, &[(0, 0), (0, 1), (1, 0), (1, 2), (2, 1), (2, 2)]);
        assert!(!is_bingo(&g));
    }

    #[test]
    fn test_is_bingo_empty_and_malformed_grids_are_never_a_win() {
        assert!(!is_bingo(&[]));
        // Ragged: the short row would otherwise look complete.
        assert!(!is_bingo(&[vec![true], vec![true, true]]));
        // Not square.
        assert!(!is_bingo(&[vec![true, true, true], vec![true, true, true]]));
    }

    #[test]
    fn test_check_shape_reports_mismatch() {
        assert!(check_shape(&grid(3, &[]), 3).is_ok());
        assert_eq!(
            check_shape(&grid(3, &[]), 4).unwrap_err(),
            "expected 4 rows, got 3"
        );
        let ragged = vec![vec![false; 3], vec![false; 2], vec![false; 3]];
        assert_eq!(
            check_shape(&ragged, 3).unwrap_err(),
            "row 1 has 2 cells, expected 3"
        );
    }
}
