//! Huber regression via iteratively reweighted least squares.
//!
//! Rows whose residual exceeds `epsilon` robust standard deviations are
//! down-weighted by `epsilon·σ/|r|`; σ is re-estimated each iteration from
//! the median absolute deviation of the residuals.

use crate::{
    FittedModel, Result,
    linalg::median,
    linear::{Centered, ridge_solve},
    traits::{ConfigurableRegressor, Regressor, check_training_data},
};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for the Huber regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuberConfig {
    /// Residual threshold, in robust standard deviations
    pub epsilon: f64,
    /// L2 penalty on the coefficients
    pub alpha: f64,
    /// Maximum reweighting iterations
    pub max_iter: usize,
    /// Stop when coefficients move less than this (max norm)
    pub tol: f64,
}

impl Default for HuberConfig {
    fn default() -> Self {
        Self {
            epsilon: 1.35,
            alpha: 1e-4,
            max_iter: 100,
            tol: 1e-5,
        }
    }
}

/// Huber regressor.
#[derive(Debug, Clone, Default)]
pub struct Huber {
    config: HuberConfig,
}

impl ConfigurableRegressor for Huber {
    type Config = HuberConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

impl Regressor for Huber {
    fn kind(&self) -> &'static str {
        "huber"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let cfg = &self.config;
        let penalty = cfg.alpha.max(1e-10);

        let mut model = {
            let centered = Centered::new(x, y);
            let coef = ridge_solve(&centered, penalty)?;
            centered.into_model(coef)
        };

        for _ in 0..cfg.max_iter {
            let residual = &y - &(x.dot(model.coefficients()) + model.intercept());
            let center = median(&residual.to_vec());
            let deviations: Vec<f64> = residual.iter().map(|r| (r - center).abs()).collect();
            let sigma = median(&deviations) / 0.6745;
            if sigma <= f64::EPSILON {
                break;
            }

            let cutoff = cfg.epsilon * sigma;
            let weights: Array1<f64> = residual.mapv(|r| {
                if r.abs() <= cutoff {
                    1.0
                } else {
                    cutoff / r.abs()
                }
            });

            // Scaling rows by √w turns the weighted problem into ordinary ridge
            let root = weights.mapv(f64::sqrt);
            let total = weights.sum();
            let x_mean = (&x * &weights.view().insert_axis(Axis(1))).sum_axis(Axis(0)) / total;
            let y_mean = weights.dot(&y) / total;
            let xc = (&x - &x_mean.view().insert_axis(Axis(0))) * &root.view().insert_axis(Axis(1));
            let yc = (&y - y_mean) * &root;
            let weighted = Centered {
                x: xc,
                y: yc,
                x_mean,
                y_mean,
            };
            let coef = ridge_solve(&weighted, penalty)?;
            let shift = (&coef - model.coefficients())
                .mapv(f64::abs)
                .fold(0.0_f64, |a, b| a.max(*b));
            model = weighted.into_model(coef);
            if shift < cfg.tol {
                break;
            }
        }

        Ok(FittedModel::Linear(model))
    }
}
