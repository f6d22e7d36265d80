//! Penalised linear regressors: ridge, lasso and elastic net.
//!
//! All linear estimators fit an unpenalised intercept by centring the
//! features and the target first, then hand the centred pair to smartcore
//! without its own normalisation. The fitted coefficients are copied out
//! into a plain [`LinearModel`].
//!
//! Ridge minimises `‖y − Xw‖² + α‖w‖²` through a Cholesky solve.
//!
//! Elastic net (and lasso, its `l1_ratio = 1` case) minimises
//! `1/(2n)‖y − Xw‖² + α·l1_ratio‖w‖₁ + α(1 − l1_ratio)/2 ‖w‖²`
//! with smartcore's interior-point solver.

use crate::{
    FittedModel, Result,
    backend::{backend_error, dense_matrix},
    linalg::{Cholesky, column_means},
    traits::{ConfigurableRegressor, Predict, Regressor, check_training_data, check_width},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::{
    linalg::basic::{arrays::Array as _, matrix::DenseMatrix},
    linear::{
        elastic_net::{ElasticNet as ElasticNetModel, ElasticNetParameters},
        lasso::{Lasso, LassoParameters},
        ridge_regression::{
            RidgeRegression, RidgeRegressionParameters, RidgeRegressionSolverName,
        },
    },
};

type RidgeModel = RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;
type LassoModel = Lasso<f64, f64, DenseMatrix<f64>, Vec<f64>>;
type MixedModel = ElasticNetModel<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A fitted linear model `ŷ = Xw + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearModel {
    /// Build a model from explicit parameters.
    pub const fn new(coefficients: Array1<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// Fitted coefficients, one per feature.
    pub const fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Fitted intercept.
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Predict for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.coefficients.len(), x.ncols())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

/// Centred copy of a training pair plus the means needed for the intercept.
pub(crate) struct Centered {
    pub(crate) x: Array2<f64>,
    pub(crate) y: Array1<f64>,
    pub(crate) x_mean: Array1<f64>,
    pub(crate) y_mean: f64,
}

impl Centered {
    pub(crate) fn new(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Self {
        let x_mean = column_means(x);
        let y_mean = y.mean().unwrap_or(0.0);
        Self {
            x: &x - &x_mean.view().insert_axis(Axis(0)),
            y: &y - y_mean,
            x_mean,
            y_mean,
        }
    }

    pub(crate) fn into_model(self, coefficients: Array1<f64>) -> LinearModel {
        let intercept = self.y_mean - self.x_mean.dot(&coefficients);
        LinearModel::new(coefficients, intercept)
    }

    fn backend_inputs(&self) -> Result<(DenseMatrix<f64>, Vec<f64>)> {
        Ok((dense_matrix(self.x.view())?, self.y.to_vec()))
    }
}

/// Coefficient column of a fitted smartcore model.
fn coefficient_vector(coefficients: &DenseMatrix<f64>) -> Array1<f64> {
    coefficients.iterator(0).copied().collect()
}

/// Solve `(XᵀX + penalty·I) w = Xᵀy` on centred data. Used by the IRLS loop.
pub(crate) fn ridge_solve(centered: &Centered, penalty: f64) -> Result<Array1<f64>> {
    let mut gram = centered.x.t().dot(&centered.x);
    for i in 0..gram.nrows() {
        gram[[i, i]] += penalty;
    }
    let rhs = centered.x.t().dot(&centered.y);
    Ok(Cholesky::factorize(gram.view())?.solve(rhs.view()))
}

/// Configuration for the Ridge regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeConfig {
    /// L2 penalty strength
    pub alpha: f64,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

/// Ridge regression.
#[derive(Debug, Clone, Default)]
pub struct Ridge {
    config: RidgeConfig,
}

impl Ridge {
    /// Create a ridge regressor with penalty `alpha`.
    pub const fn new(alpha: f64) -> Self {
        Self {
            config: RidgeConfig { alpha },
        }
    }
}

impl ConfigurableRegressor for Ridge {
    type Config = RidgeConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

impl Regressor for Ridge {
    fn kind(&self) -> &'static str {
        "ridge"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let centered = Centered::new(x, y);
        let (xm, ym) = centered.backend_inputs()?;
        // A tiny floor keeps α = 0 solvable on full-rank data
        let params = RidgeRegressionParameters::default()
            .with_alpha(self.config.alpha.max(1e-12))
            .with_solver(RidgeRegressionSolverName::Cholesky)
            .with_normalize(false);
        let model = RidgeModel::fit(&xm, &ym, params).map_err(backend_error)?;
        let coefficients = coefficient_vector(model.coefficients());
        Ok(FittedModel::Linear(centered.into_model(coefficients)))
    }
}

/// Configuration for the ElasticNet regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetConfig {
    /// Overall penalty strength
    pub alpha: f64,
    /// Share of the penalty applied as L1 (1.0 = lasso)
    pub l1_ratio: f64,
    /// Maximum solver iterations
    pub max_iter: usize,
    /// Solver convergence tolerance
    pub tol: f64,
}

impl Default for ElasticNetConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl ElasticNetConfig {
    /// Lasso penalty of strength `alpha`.
    pub fn lasso(alpha: f64) -> Self {
        Self {
            alpha,
            l1_ratio: 1.0,
            ..Default::default()
        }
    }
}

/// Elastic-net regression.
#[derive(Debug, Clone, Default)]
pub struct ElasticNet {
    config: ElasticNetConfig,
}

impl ElasticNet {
    /// Create an elastic net with the given penalty mix.
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            config: ElasticNetConfig {
                alpha,
                l1_ratio,
                ..Default::default()
            },
        }
    }
}

impl ConfigurableRegressor for ElasticNet {
    type Config = ElasticNetConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

impl Regressor for ElasticNet {
    fn kind(&self) -> &'static str {
        if self.config.l1_ratio >= 1.0 {
            "lasso"
        } else {
            "elastic_net"
        }
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let cfg = &self.config;
        let centered = Centered::new(x, y);
        let (xm, ym) = centered.backend_inputs()?;
        let l1_ratio = cfg.l1_ratio.clamp(0.0, 1.0);

        let coefficients = if l1_ratio >= 1.0 {
            let params = LassoParameters::default()
                .with_alpha(cfg.alpha)
                .with_normalize(false)
                .with_tol(cfg.tol)
                .with_max_iter(cfg.max_iter);
            let model = LassoModel::fit(&xm, &ym, params).map_err(backend_error)?;
            coefficient_vector(model.coefficients())
        } else {
            let params = ElasticNetParameters::default()
                .with_alpha(cfg.alpha)
                .with_l1_ratio(l1_ratio)
                .with_normalize(false)
                .with_tol(cfg.tol)
                .with_max_iter(cfg.max_iter);
            let model = MixedModel::fit(&xm, &ym, params).map_err(backend_error)?;
            coefficient_vector(model.coefficients())
        };

        Ok(FittedModel::Linear(centered.into_model(coefficients)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((50, 3), |(i, j)| ((i * (j + 3)) % 17) as f64 / 17.0 - 0.5);
        let y = x.dot(&array![2.0, -1.0, 0.5]) + 0.3;
        (x, y)
    }

    #[test]
    fn test_ridge_recovers_coefficients_with_small_penalty() {
        let (x, y) = linear_data();
        let fitted = Ridge::new(1e-8).fit(x.view(), y.view()).unwrap();
        let FittedModel::Linear(model) = &fitted else {
            panic!("expected linear model");
        };
        assert_relative_eq!(model.coefficients()[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(model.coefficients()[1], -1.0, epsilon = 1e-5);
        assert_relative_eq!(model.intercept(), 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_ridge_shrinks_with_large_penalty() {
        let (x, y) = linear_data();
        let FittedModel::Linear(small) = Ridge::new(0.1).fit(x.view(), y.view()).unwrap() else {
            panic!("expected linear model");
        };
        let FittedModel::Linear(large) = Ridge::new(1e4).fit(x.view(), y.view()).unwrap() else {
            panic!("expected linear model");
        };
        assert!(large.coefficients()[0].abs() < small.coefficients()[0].abs());
    }

    #[test]
    fn test_lasso_zeroes_coefficients_for_large_alpha() {
        let (x, y) = linear_data();
        let model = ElasticNet::with_config(ElasticNetConfig::lasso(100.0));
        assert_eq!(model.kind(), "lasso");
        let FittedModel::Linear(fitted) = model.fit(x.view(), y.view()).unwrap() else {
            panic!("expected linear model");
        };
        assert!(fitted.coefficients().iter().all(|c| c.abs() < 1e-3));
        assert_relative_eq!(fitted.intercept(), y.mean().unwrap(), epsilon = 1e-3);
    }

    #[test]
    fn test_elastic_net_fits_signal() {
        let (x, y) = linear_data();
        let model = ElasticNet::new(0.001, 0.5);
        assert_eq!(model.kind(), "elastic_net");
        let fitted = model.fit(x.view(), y.view()).unwrap();
        let pred = fitted.predict(x.view()).unwrap();
        let err = (&pred - &y).mapv(f64::abs).mean().unwrap();
        assert!(err < 0.05);
    }

    #[test]
    fn test_intercept_is_fitted_on_uncentred_data() {
        let (x, y) = linear_data();
        let shifted = &y + 10.0;
        let fitted = Ridge::new(1e-6).fit(x.view(), shifted.view()).unwrap();
        let pred = fitted.predict(x.view()).unwrap();
        assert_relative_eq!(pred.mean().unwrap(), shifted.mean().unwrap(), epsilon = 1e-6);
    }
}
