//! Bayesian ridge regression with evidence maximisation.
//!
//! The noise precision `α` and weight precision `λ` are re-estimated each
//! iteration from the effective number of parameters
//! `γ = p − λ·tr((λI + αXᵀX)⁻¹)`, with weak Gamma priors on both.

use crate::{
    FittedModel, Result,
    linalg::Cholesky,
    linear::Centered,
    traits::{ConfigurableRegressor, Regressor, check_training_data},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Configuration for the BayesianRidge regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianRidgeConfig {
    /// Maximum evidence iterations
    pub max_iter: usize,
    /// Stop when coefficients move less than this (L1 norm)
    pub tol: f64,
    /// Gamma prior shape/rate for the noise precision
    pub alpha_prior: (f64, f64),
    /// Gamma prior shape/rate for the weight precision
    pub lambda_prior: (f64, f64),
}

impl Default for BayesianRidgeConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_prior: (1e-6, 1e-6),
            lambda_prior: (1e-6, 1e-6),
        }
    }
}

/// Bayesian ridge regressor.
#[derive(Debug, Clone, Default)]
pub struct BayesianRidge {
    config: BayesianRidgeConfig,
}

impl ConfigurableRegressor for BayesianRidge {
    type Config = BayesianRidgeConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

impl Regressor for BayesianRidge {
    fn kind(&self) -> &'static str {
        "bayesian_ridge"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let cfg = &self.config;
        let centered = Centered::new(x, y);
        let (n, p) = centered.x.dim();
        let gram = centered.x.t().dot(&centered.x);
        let xty = centered.x.t().dot(&centered.y);
        // Jitter keeps duplicated engineered columns factorizable
        let jitter = (1e-8 * gram.diag().mean().unwrap_or(0.0)).max(1e-12);

        let var_y = centered.y.mapv(|v| v * v).mean().unwrap_or(0.0);
        let mut alpha = 1.0 / (var_y + f64::EPSILON);
        let mut lambda = 1.0;
        let mut coef = Array1::<f64>::zeros(p);

        for _ in 0..cfg.max_iter {
            // Posterior mean: (λ/α I + XᵀX)⁻¹ Xᵀy
            let mut system = gram.clone();
            for i in 0..p {
                system[[i, i]] += (lambda / alpha).max(jitter);
            }
            let chol = Cholesky::factorize(system.view())?;
            let next = chol.solve(xty.view());

            // tr((λI + αXᵀX)⁻¹) = tr((λ/α I + XᵀX)⁻¹) / α
            let trace = chol.inverse_diagonal().sum() / alpha;
            let gamma = (p as f64 - lambda * trace).clamp(0.0, p as f64);

            let residual = &centered.y - &centered.x.dot(&next);
            let rss = residual.dot(&residual);
            let weight_norm = next.dot(&next);

            lambda = (gamma + 2.0 * cfg.lambda_prior.0) / (weight_norm + 2.0 * cfg.lambda_prior.1);
            alpha = (n as f64 - gamma + 2.0 * cfg.alpha_prior.0) / (rss + 2.0 * cfg.alpha_prior.1);

            let shift: f64 = (&next - &coef).mapv(f64::abs).sum();
            coef = next;
            if shift < cfg.tol || !lambda.is_finite() || !alpha.is_finite() {
                break;
            }
        }

        Ok(FittedModel::Linear(centered.into_model(coef)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Predict;
    use ndarray::{Array2, array};

    #[test]
    fn test_bayesian_ridge_fits_linear_signal() {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| ((i * (j + 2)) % 13) as f64 / 13.0);
        let noise = Array1::from_shape_fn(80, |i| if i % 2 == 0 { 0.01 } else { -0.01 });
        let y = x.dot(&array![1.5, -0.7]) + noise;

        let fitted = BayesianRidge::default().fit(x.view(), y.view()).unwrap();
        let pred = fitted.predict(x.view()).unwrap();
        let err = (&pred - &y).mapv(f64::abs).mean().unwrap();
        assert!(err < 0.05);
    }

    #[test]
    fn test_constant_target_gives_flat_model() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| ((i * (j + 2)) % 7) as f64);
        let y = Array1::from_elem(20, 0.25);
        let fitted = BayesianRidge::default().fit(x.view(), y.view()).unwrap();
        let pred = fitted.predict(x.view()).unwrap();
        assert!(pred.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }
}
