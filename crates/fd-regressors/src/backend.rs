//! Bridging `ndarray` views to smartcore's dense matrices.

use crate::{RegressorError, Result};
use ndarray::ArrayView2;
use smartcore::{error::Failed, linalg::basic::matrix::DenseMatrix};

/// Row-major copy of `x` as a smartcore matrix.
pub(crate) fn dense_matrix(x: ArrayView2<'_, f64>) -> Result<DenseMatrix<f64>> {
    let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|row| row.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows).map_err(backend_error)
}

pub(crate) fn backend_error(err: Failed) -> RegressorError {
    RegressorError::Backend(err.to_string())
}
