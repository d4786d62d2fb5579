//! The simplex-tableau oracle consumed by the tightener.
//!
//! The pivoting engine itself lives outside this crate; the core only needs
//! the read-side operations collected in [`TableauView`]: dimensions, the
//! basic/non-basic partition, row and column extraction, and the forward
//! transformation `B·z = v`. [`DenseTableau`] is a small in-memory
//! implementation of the contract, used by the test suites and as the
//! reference for new implementations.

use crate::sparse::{SparseRow, TableauRow};

/// Read access to a simplex tableau in its current basis.
///
/// Implementations are queried, never mutated, by the tightener. The basis
/// is assumed non-singular; the forward transformation and the explicit
/// inverse are both defined with respect to it.
pub trait TableauView {
    /// Total number of variables (columns of `A`).
    fn n(&self) -> usize;

    /// Number of constraints (rows of `A`), equal to the basis size.
    fn m(&self) -> usize;

    /// The variable occupying basis slot `index`.
    fn basic_index_to_variable(&self, index: usize) -> usize;

    /// The variable occupying non-basic slot `index`.
    fn non_basic_index_to_variable(&self, index: usize) -> usize;

    /// True when `variable` is currently basic.
    fn is_basic(&self, variable: usize) -> bool;

    /// The right-hand side `b` of `A·x = b`.
    fn right_hand_side(&self) -> &[f64];

    /// Row `index` of the original constraint matrix, sparse form.
    fn sparse_row(&self, index: usize) -> &SparseRow;

    /// Column of `A` for `variable`, sparse form.
    fn sparse_column(&self, variable: usize) -> SparseRow;

    /// Column of `A` for `variable`, dense form of length `m`.
    fn column(&self, variable: usize) -> Vec<f64>;

    /// Solve `B·z = rhs` for `z` in the current basis. `result` has length
    /// `m`.
    fn forward_transformation(&self, rhs: &[f64], result: &mut [f64]);

    /// The explicit basis inverse, row-major `m × m`.
    ///
    /// This is a fresh allocation owned by the caller; implementations must
    /// not retain it.
    fn inverse_basis_matrix(&self) -> Vec<f64>;

    /// The row produced by the most recent pivot, if one is available.
    fn pivot_row(&self) -> Option<&TableauRow>;
}

/// An in-memory tableau over a dense constraint matrix.
///
/// Backs the unit and property tests; real verification runs use the
/// pivoting engine's tableau instead. The basis never changes after
/// construction, which is all the tightener tests need.
pub struct DenseTableau {
    m: usize,
    n: usize,
    /// `A`, row-major `m × n`.
    a: Vec<f64>,
    b: Vec<f64>,
    basic_variables: Vec<usize>,
    non_basic_variables: Vec<usize>,
    sparse_rows: Vec<SparseRow>,
    pivot_row: Option<TableauRow>,
}

impl DenseTableau {
    /// Build a tableau for `A·x = b` with the given basis.
    ///
    /// `a` is row-major `m × n`; `basic_variables` lists the `m` basic
    /// variables in basis order and must select a non-singular submatrix.
    pub fn new(m: usize, n: usize, a: Vec<f64>, b: Vec<f64>, basic_variables: Vec<usize>) -> Self {
        assert_eq!(a.len(), m * n);
        assert_eq!(b.len(), m);
        assert_eq!(basic_variables.len(), m);

        let non_basic_variables: Vec<usize> =
            (0..n).filter(|v| !basic_variables.contains(v)).collect();
        let sparse_rows = (0..m)
            .map(|i| SparseRow::from_dense(&a[i * n..(i + 1) * n]))
            .collect();

        Self { m, n, a, b, basic_variables, non_basic_variables, sparse_rows, pivot_row: None }
    }

    /// Install the row reported by [`TableauView::pivot_row`].
    pub fn set_pivot_row(&mut self, row: TableauRow) {
        self.pivot_row = Some(row);
    }

    /// The basis matrix `B`, row-major `m × m`.
    fn basis_matrix(&self) -> Vec<f64> {
        let mut basis = vec![0.0; self.m * self.m];
        for (slot, &variable) in self.basic_variables.iter().enumerate() {
            for row in 0..self.m {
                basis[row * self.m + slot] = self.a[row * self.n + variable];
            }
        }
        basis
    }
}

impl TableauView for DenseTableau {
    fn n(&self) -> usize {
        self.n
    }

    fn m(&self) -> usize {
        self.m
    }

    fn basic_index_to_variable(&self, index: usize) -> usize {
        self.basic_variables[index]
    }

    fn non_basic_index_to_variable(&self, index: usize) -> usize {
        self.non_basic_variables[index]
    }

    fn is_basic(&self, variable: usize) -> bool {
        self.basic_variables.contains(&variable)
    }

    fn right_hand_side(&self) -> &[f64] {
        &self.b
    }

    fn sparse_row(&self, index: usize) -> &SparseRow {
        &self.sparse_rows[index]
    }

    fn sparse_column(&self, variable: usize) -> SparseRow {
        let mut column = SparseRow::new();
        for row in 0..self.m {
            column.append(row, self.a[row * self.n + variable]);
        }
        column
    }

    fn column(&self, variable: usize) -> Vec<f64> {
        (0..self.m).map(|row| self.a[row * self.n + variable]).collect()
    }

    fn forward_transformation(&self, rhs: &[f64], result: &mut [f64]) {
        debug_assert_eq!(rhs.len(), self.m);
        debug_assert_eq!(result.len(), self.m);

        // Gaussian elimination with partial pivoting on an augmented copy.
        let m = self.m;
        let mut basis = self.basis_matrix();
        let mut aug: Vec<f64> = rhs.to_vec();

        for col in 0..m {
            let pivot_row = (col..m)
                .max_by(|&r, &s| {
                    basis[r * m + col]
                        .abs()
                        .partial_cmp(&basis[s * m + col].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(col);
            if basis[pivot_row * m + col] == 0.0 {
                continue;
            }
            if pivot_row != col {
                for k in 0..m {
                    basis.swap(col * m + k, pivot_row * m + k);
                }
                aug.swap(col, pivot_row);
            }
            for row in (col + 1)..m {
                let factor = basis[row * m + col] / basis[col * m + col];
                if factor == 0.0 {
                    continue;
                }
                for k in col..m {
                    basis[row * m + k] -= factor * basis[col * m + k];
                }
                aug[row] -= factor * aug[col];
            }
        }

        for col in (0..m).rev() {
            let mut value = aug[col];
            for k in (col + 1)..m {
                value -= basis[col * m + k] * result[k];
            }
            let pivot = basis[col * m + col];
            result[col] = if pivot == 0.0 { 0.0 } else { value / pivot };
        }
    }

    fn inverse_basis_matrix(&self) -> Vec<f64> {
        // Solve B·z = eᵢ for every unit vector; z is column i of the inverse.
        let m = self.m;
        let mut inverse = vec![0.0; m * m];
        let mut unit = vec![0.0; m];
        let mut solution = vec![0.0; m];
        for i in 0..m {
            unit.iter_mut().for_each(|v| *v = 0.0);
            unit[i] = 1.0;
            self.forward_transformation(&unit, &mut solution);
            for row in 0..m {
                inverse[row * m + i] = solution[row];
            }
        }
        inverse
    }

    fn pivot_row(&self) -> Option<&TableauRow> {
        self.pivot_row.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(x: f64, y: f64) {
        assert!((x - y).abs() < 1e-9, "{x} vs {y}");
    }

    /// A = [[1, 1, 1, 0], [1, -1, 0, 1]], b = [2, 0], basis = {x2, x3}.
    fn slack_tableau() -> DenseTableau {
        DenseTableau::new(
            2,
            4,
            vec![1.0, 1.0, 1.0, 0.0, 1.0, -1.0, 0.0, 1.0],
            vec![2.0, 0.0],
            vec![2, 3],
        )
    }

    #[test]
    fn test_partition() {
        let tableau = slack_tableau();
        assert_eq!(tableau.basic_index_to_variable(0), 2);
        assert_eq!(tableau.basic_index_to_variable(1), 3);
        assert_eq!(tableau.non_basic_index_to_variable(0), 0);
        assert_eq!(tableau.non_basic_index_to_variable(1), 1);
        assert!(tableau.is_basic(2));
        assert!(!tableau.is_basic(1));
    }

    #[test]
    fn test_forward_transformation_identity_basis() {
        let tableau = slack_tableau();
        let mut z = vec![0.0; 2];
        tableau.forward_transformation(&[2.0, 0.0], &mut z);
        assert_close(z[0], 2.0);
        assert_close(z[1], 0.0);
    }

    #[test]
    fn test_forward_transformation_general_basis() {
        // Basis = {x0, x1}: B = [[1, 1], [1, -1]].
        let tableau = DenseTableau::new(
            2,
            4,
            vec![1.0, 1.0, 1.0, 0.0, 1.0, -1.0, 0.0, 1.0],
            vec![2.0, 0.0],
            vec![0, 1],
        );
        let mut z = vec![0.0; 2];
        tableau.forward_transformation(&[2.0, 0.0], &mut z);
        // B·z = [2, 0] has solution z = [1, 1].
        assert_close(z[0], 1.0);
        assert_close(z[1], 1.0);
    }

    #[test]
    fn test_inverse_times_basis_is_identity() {
        let tableau = DenseTableau::new(
            2,
            4,
            vec![2.0, 1.0, 1.0, 0.0, 1.0, 3.0, 0.0, 1.0],
            vec![5.0, 6.0],
            vec![0, 1],
        );
        let inverse = tableau.inverse_basis_matrix();
        // B = [[2, 1], [1, 3]]; check B⁻¹·B = I.
        let basis = [2.0, 1.0, 1.0, 3.0];
        for i in 0..2 {
            for j in 0..2 {
                let mut sum = 0.0;
                for k in 0..2 {
                    sum += inverse[i * 2 + k] * basis[k * 2 + j];
                }
                assert_close(sum, if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn test_sparse_column_and_row() {
        let tableau = slack_tableau();
        let column = tableau.sparse_column(3);
        assert_eq!(column.get(0), 0.0);
        assert_eq!(column.get(1), 1.0);
        assert_eq!(tableau.sparse_row(0).get(2), 1.0);
    }
}
