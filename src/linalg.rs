//! Dense linear algebra for least-squares fitting.
//!
//! Model matrices in experimental design are small (tens of columns), so the
//! normal equations are solved directly with a Cholesky factorization that is
//! built one column at a time. Building it incrementally makes the
//! factorization rank-revealing: a column whose pivot collapses is linearly
//! dependent on the columns already admitted.

use ndarray::{Array1, Array2, ArrayView1};

/// Relative pivot size below which a column counts as dependent.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-9;

/// Incrementally built Cholesky factor of a principal submatrix of a Gram matrix.
#[derive(Debug, Clone)]
pub struct IncrementalCholesky<'a> {
    gram: &'a Array2<f64>,
    tolerance: f64,
    /// Admitted column indices, in admission order.
    columns: Vec<usize>,
    /// Rows of the lower-triangular factor; row i has i+1 entries.
    rows: Vec<Vec<f64>>,
}

impl<'a> IncrementalCholesky<'a> {
    /// Start an empty factorization over `gram`.
    #[must_use]
    pub fn new(gram: &'a Array2<f64>, tolerance: f64) -> Self {
        Self {
            gram,
            tolerance,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Admit column `j` if it is linearly independent of the admitted set.
    ///
    /// Returns `false` (leaving the factor unchanged) for a dependent column.
    pub fn try_push(&mut self, j: usize) -> bool {
        let diag = self.gram[[j, j]];
        if !diag.is_finite() || diag <= 0.0 {
            return false;
        }

        let mut row = Vec::with_capacity(self.columns.len() + 1);
        for (i, &ci) in self.columns.iter().enumerate() {
            let dot: f64 = (0..i).map(|k| row[k] * self.rows[i][k]).sum();
            row.push((self.gram[[j, ci]] - dot) / self.rows[i][i]);
        }

        let pivot = diag - row.iter().map(|v| v * v).sum::<f64>();
        if pivot <= self.tolerance * diag {
            return false;
        }

        row.push(pivot.sqrt());
        self.columns.push(j);
        self.rows.push(row);
        true
    }

    /// Drop every column admitted after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.columns.truncate(len);
        self.rows.truncate(len);
    }

    /// Number of admitted columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether no column has been admitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Admitted column indices, in admission order.
    #[must_use]
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Dense lower-triangular factor L with `G_S = L Lᵀ`.
    #[must_use]
    pub fn factor(&self) -> Array2<f64> {
        let n = self.columns.len();
        let mut l = Array2::zeros((n, n));
        for (i, row) in self.rows.iter().enumerate() {
            for (k, &v) in row.iter().enumerate() {
                l[[i, k]] = v;
            }
        }
        l
    }

    /// Inverse of the admitted principal submatrix, `(L Lᵀ)⁻¹`.
    #[must_use]
    pub fn inverse(&self) -> Array2<f64> {
        let l = self.factor();
        let n = l.nrows();

        // Invert L by forward substitution, column by column.
        let mut l_inv = Array2::zeros((n, n));
        for col in 0..n {
            for i in col..n {
                let rhs = if i == col { 1.0 } else { 0.0 };
                let dot: f64 = (col..i).map(|k| l[[i, k]] * l_inv[[k, col]]).sum();
                l_inv[[i, col]] = (rhs - dot) / l[[i, i]];
            }
        }

        l_inv.t().dot(&l_inv)
    }
}

/// Gram matrix `XᵀX`.
#[must_use]
pub fn gram(x: &Array2<f64>) -> Array2<f64> {
    x.t().dot(x)
}

/// Quadratic form `vᵀ A v`.
#[must_use]
pub fn quadratic_form(a: &Array2<f64>, v: ArrayView1<'_, f64>) -> f64 {
    v.dot(&a.dot(&v))
}

/// Select the listed columns of `x`, in order.
#[must_use]
pub fn select_columns(x: &Array2<f64>, columns: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((x.nrows(), columns.len()));
    for (dst, &src) in columns.iter().enumerate() {
        out.column_mut(dst).assign(&x.column(src));
    }
    out
}

/// Least-squares coefficients `C Xᵀ y` given `C = (XᵀX)⁻¹`.
#[must_use]
pub fn least_squares(x: &Array2<f64>, covariance: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    covariance.dot(&x.t().dot(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_inverse_matches_identity() {
        let x = array![[1.0, -1.0, 0.5], [1.0, 1.0, 2.0], [1.0, 0.0, -1.0], [1.0, 2.0, 0.0]];
        let g = gram(&x);
        let mut chol = IncrementalCholesky::new(&g, DEFAULT_PIVOT_TOLERANCE);
        assert!(chol.try_push(0));
        assert!(chol.try_push(1));
        assert!(chol.try_push(2));

        let product = g.dot(&chol.inverse());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[[i, j]] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_dependent_column_rejected() {
        // Column 2 = column 0 + column 1
        let x = array![[1.0, -1.0, 0.0], [1.0, 1.0, 2.0], [1.0, 0.0, 1.0], [1.0, 2.0, 3.0]];
        let g = gram(&x);
        let mut chol = IncrementalCholesky::new(&g, DEFAULT_PIVOT_TOLERANCE);
        assert!(chol.try_push(0));
        assert!(chol.try_push(1));
        assert!(!chol.try_push(2));
        assert_eq!(chol.columns(), &[0, 1]);
    }

    #[test]
    fn test_truncate_rolls_back() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let g = gram(&x);
        let mut chol = IncrementalCholesky::new(&g, DEFAULT_PIVOT_TOLERANCE);
        assert!(chol.try_push(0));
        assert!(chol.try_push(1));
        chol.truncate(1);
        assert_eq!(chol.len(), 1);
        assert!(chol.try_push(1));
    }

    #[test]
    fn test_least_squares_exact_fit() {
        let x = array![[1.0, -1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![1.0, 3.0, 5.0];
        let g = gram(&x);
        let mut chol = IncrementalCholesky::new(&g, DEFAULT_PIVOT_TOLERANCE);
        chol.try_push(0);
        chol.try_push(1);
        let beta = least_squares(&x, &chol.inverse(), &y);
        assert!((beta[0] - 3.0).abs() < 1e-12);
        assert!((beta[1] - 2.0).abs() < 1e-12);
    }
}
