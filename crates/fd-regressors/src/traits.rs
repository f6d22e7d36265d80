//! Core trait definitions for estimators.
//!
//! Every estimator implements [`Regressor`], which turns a feature matrix and
//! a target vector into a [`FittedModel`]. Fitted models implement
//! [`Predict`]. Unfitted estimators are cheap, immutable values that can be
//! fit any number of times (full-sample fits, cross-validation folds,
//! ensemble members) without sharing state between fits.

use crate::{FittedModel, RegressorError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// An untrained regression estimator.
pub trait Regressor: Send + Sync + std::fmt::Debug {
    /// Short identifier for the estimator family, e.g. `random_forest`.
    fn kind(&self) -> &'static str;

    /// Fit the estimator on `x` (rows are samples) and `y`.
    ///
    /// Fitting is deterministic: estimators that need randomness carry an
    /// explicit seed in their configuration.
    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel>;
}

/// A fitted model that maps feature rows to predictions.
pub trait Predict {
    /// Number of features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Predict one value per row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;
}

/// An estimator with an explicit configuration value.
///
/// This mirrors the way factors expose their lookback windows: the
/// configuration is plain serializable data and the estimator is rebuilt
/// from it.
pub trait ConfigurableRegressor: Regressor {
    /// Configuration type for this estimator.
    type Config: Default + Clone + Send + Sync + std::fmt::Debug;

    /// Create a new estimator with the given configuration.
    fn with_config(config: Self::Config) -> Self;

    /// Returns the current configuration.
    fn config(&self) -> &Self::Config;
}

/// Validate a training pair before fitting.
pub(crate) fn check_training_data(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(RegressorError::InvalidInput(format!(
            "empty training matrix ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(RegressorError::InvalidInput(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(RegressorError::InvalidInput(
            "training data contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Validate a prediction matrix against the fitted width.
pub(crate) const fn check_width(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RegressorError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
