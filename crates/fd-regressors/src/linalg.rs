//! Small dense linear algebra for the closed-form estimators.
//!
//! Feature counts after selection are in the tens, so a plain Cholesky
//! factorization is all the linear models need.

use crate::{RegressorError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix.
#[derive(Debug, Clone)]
pub(crate) struct Cholesky {
    lower: Array2<f64>,
}

impl Cholesky {
    /// Factorize `a = L Lᵀ`.
    pub(crate) fn factorize(a: ArrayView2<'_, f64>) -> Result<Self> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(RegressorError::Singular(format!(
                "matrix is {}x{}, expected square",
                a.nrows(),
                a.ncols()
            )));
        }
        let mut lower = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let mut diag = a[[j, j]];
            for k in 0..j {
                diag -= lower[[j, k]] * lower[[j, k]];
            }
            if diag <= 0.0 || !diag.is_finite() {
                return Err(RegressorError::Singular(format!(
                    "non-positive pivot {diag:e} at column {j}"
                )));
            }
            let pivot = diag.sqrt();
            lower[[j, j]] = pivot;
            for i in (j + 1)..n {
                let mut sum = a[[i, j]];
                for k in 0..j {
                    sum -= lower[[i, k]] * lower[[j, k]];
                }
                lower[[i, j]] = sum / pivot;
            }
        }
        Ok(Self { lower })
    }

    /// Solve `a x = b` using the stored factor.
    pub(crate) fn solve(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.lower.nrows();
        // Forward substitution: L z = b
        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = b[i];
            for k in 0..i {
                sum -= self.lower[[i, k]] * z[k];
            }
            z[i] = sum / self.lower[[i, i]];
        }
        // Back substitution: Lᵀ x = z
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut sum = z[i];
            for k in (i + 1)..n {
                sum -= self.lower[[k, i]] * x[k];
            }
            x[i] = sum / self.lower[[i, i]];
        }
        x
    }

    /// Diagonal of `a⁻¹`, used for the trace terms of evidence maximization.
    pub(crate) fn inverse_diagonal(&self) -> Array1<f64> {
        let n = self.lower.nrows();
        let mut diag = Array1::<f64>::zeros(n);
        let mut unit = Array1::<f64>::zeros(n);
        for i in 0..n {
            unit[i] = 1.0;
            diag[i] = self.solve(unit.view())[i];
            unit[i] = 0.0;
        }
        diag
    }
}

/// Column means of `x`.
pub(crate) fn column_means(x: ArrayView2<'_, f64>) -> Array1<f64> {
    let n = x.nrows() as f64;
    x.sum_axis(ndarray::Axis(0)) / n
}

/// Population standard deviation.
pub(crate) fn std_dev(values: ArrayView1<'_, f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mean = values.sum() / n as f64;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64).sqrt()
}

/// Median of a slice; returns 0.0 for an empty slice.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
