//! Epsilon-insensitive support vector regression with an RBF kernel.
//!
//! The bias is folded into the kernel (`k(a, b) = exp(−γ‖a − b‖²) + 1`),
//! which removes the equality constraint from the dual. The dual
//! `min ½βᵀKβ − yᵀβ + ε‖β‖₁  s.t. |βᵢ| ≤ C` is then solved exactly one
//! coordinate at a time.

use crate::{
    FittedModel, RegressorError, Result,
    traits::{ConfigurableRegressor, Predict, Regressor, check_training_data, check_width},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for the SVR regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrConfig {
    /// Box constraint on the dual coefficients
    pub c: f64,
    /// Width of the insensitive tube
    pub epsilon: f64,
    /// RBF width (`None` = `1 / (n_features · var(X))`)
    pub gamma: Option<f64>,
    /// Maximum dual sweeps
    pub max_iter: usize,
    /// Stop when the largest dual update falls below this
    pub tol: f64,
}

impl Default for SvrConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            gamma: None,
            max_iter: 1000,
            tol: 1e-3,
        }
    }
}

/// Support vector regressor.
#[derive(Debug, Clone, Default)]
pub struct Svr {
    config: SvrConfig,
}

impl ConfigurableRegressor for Svr {
    type Config = SvrConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

fn rbf(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
    (-gamma * dist).exp() + 1.0
}

fn scale_gamma(x: ArrayView2<'_, f64>) -> f64 {
    let var = x.var(0.0);
    if var > 0.0 {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl Regressor for Svr {
    fn kind(&self) -> &'static str {
        "svr"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let cfg = &self.config;
        let n = x.nrows();
        let gamma = cfg.gamma.unwrap_or_else(|| scale_gamma(x));
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(RegressorError::InvalidInput(format!("invalid RBF gamma {gamma}")));
        }

        let kernel = Array2::from_shape_fn((n, n), |(i, j)| rbf(x.row(i), x.row(j), gamma));
        let mut beta = Array1::<f64>::zeros(n);
        // fitted[i] = Σ_j K[i, j] β[j]
        let mut fitted = Array1::<f64>::zeros(n);

        for _ in 0..cfg.max_iter {
            let mut max_delta: f64 = 0.0;
            for i in 0..n {
                let k_ii = kernel[[i, i]];
                let others = fitted[i] - k_ii * beta[i];
                let target = y[i] - others;
                let shrunk = target.signum() * (target.abs() - cfg.epsilon).max(0.0);
                let next = (shrunk / k_ii).clamp(-cfg.c, cfg.c);
                let delta = next - beta[i];
                if delta != 0.0 {
                    fitted.scaled_add(delta, &kernel.column(i));
                    beta[i] = next;
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if max_delta < cfg.tol {
                break;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i] != 0.0).collect();
        Ok(FittedModel::Svr(FittedSvr {
            gamma,
            support_vectors: x.select(Axis(0), &support),
            dual_coef: beta.select(Axis(0), &support),
        }))
    }
}

/// A fitted support vector regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSvr {
    gamma: f64,
    support_vectors: Array2<f64>,
    dual_coef: Array1<f64>,
}

impl FittedSvr {
    /// Number of support vectors.
    pub fn n_support(&self) -> usize {
        self.dual_coef.len()
    }
}

impl Predict for FittedSvr {
    fn n_features(&self) -> usize {
        self.support_vectors.ncols()
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.support_vectors.ncols(), x.ncols())?;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.support_vectors
                    .rows()
                    .into_iter()
                    .zip(self.dual_coef.iter())
                    .map(|(sv, b)| b * rbf(row, sv, self.gamma))
                    .sum::<f64>()
            })
            .collect())
    }
}
