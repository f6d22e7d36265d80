//! Statistical and financial scores for fitted candidates.

use fd_regressors::{FittedModel, Predict, Regressor, RegressorError};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::metrics;

/// Annual risk-free rate used by the Sharpe proxy.
pub const RISK_FREE_RATE: f64 = 0.02;

/// Periods per year the predictions are treated as.
pub const PERIODS_PER_YEAR: f64 = 12.0;

/// Scores of one fitted model on its training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    /// In-sample coefficient of determination
    pub r2: f64,
    /// In-sample mean squared error
    pub mse: f64,
    /// In-sample mean absolute error
    pub mae: f64,
    /// In-sample explained variance
    pub explained_variance: f64,
    /// Mean cross-validated R²
    pub cv_mean: f64,
    /// Population std of the cross-validated R²
    pub cv_std: f64,
    /// Annualised mean excess prediction over its dispersion
    pub sharpe_proxy: f64,
    /// Share of rows where predicted and realised signs agree
    pub directional_accuracy: f64,
    /// `1 / (1 + std(ŷ))`
    pub confidence: f64,
    /// `1 − std(ŷ)`
    pub stability: f64,
}

fn population_std(values: ArrayView1<'_, f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.std(0.0)
    }
}

fn is_constant(y: ArrayView1<'_, f64>) -> bool {
    y.iter().all(|v| *v == y[0])
}

/// Coefficient of determination. A constant target scores 0.
pub fn r2_score(y: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    if y.is_empty() || is_constant(y) {
        return 0.0;
    }
    metrics::r2(&y.to_vec(), &pred.to_vec())
}

/// Mean squared error.
pub fn mean_squared_error(y: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    metrics::mean_squared_error(&y.to_vec(), &pred.to_vec())
}

/// Mean absolute error.
pub fn mean_absolute_error(y: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    metrics::mean_absolute_error(&y.to_vec(), &pred.to_vec())
}

/// `1 − var(y − ŷ) / var(y)`. A constant target scores 0.
pub fn explained_variance(y: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    if y.is_empty() || is_constant(y) {
        return 0.0;
    }
    let var_y = y.var(0.0);
    if var_y == 0.0 {
        return 0.0;
    }
    1.0 - (&y - &pred).var(0.0) / var_y
}

/// Annualised ratio of mean excess prediction to its dispersion.
pub fn sharpe_proxy(pred: ArrayView1<'_, f64>) -> f64 {
    let excess = pred.mapv(|p| p - RISK_FREE_RATE / PERIODS_PER_YEAR);
    let mean = excess.mean().unwrap_or(0.0);
    mean / (population_std(excess.view()) + 1e-6) * PERIODS_PER_YEAR.sqrt()
}

/// Share of rows where `y > 0` and `ŷ > 0` agree.
pub fn directional_accuracy(y: ArrayView1<'_, f64>, pred: ArrayView1<'_, f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let hits = y
        .iter()
        .zip(pred)
        .filter(|&(t, p)| (*t > 0.0) == (*p > 0.0))
        .count();
    hits as f64 / y.len() as f64
}

/// Unshuffled k-fold split as `(train, test)` row indices.
///
/// `k` is clamped to `[2, n]`. The first `n % k` folds hold one extra row.
pub fn kfold_indices(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    if n < 2 {
        return Vec::new();
    }
    let k = k.clamp(2, n);
    let base = n / k;
    let extra = n % k;

    let mut start = 0;
    (0..k)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let test: Vec<usize> = (start..start + size).collect();
            let train: Vec<usize> = (0..start).chain(start + size..n).collect();
            start += size;
            (train, test)
        })
        .collect()
}

/// R² of `estimator` on each held-out fold.
pub fn cross_val_r2(
    estimator: &dyn Regressor,
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    folds: usize,
) -> fd_regressors::Result<Vec<f64>> {
    kfold_indices(y.len(), folds)
        .into_iter()
        .map(|(train, test)| {
            let fitted = estimator.fit(
                x.select(Axis(0), &train).view(),
                y.select(Axis(0), &train).view(),
            )?;
            let pred = fitted.predict(x.select(Axis(0), &test).view())?;
            Ok(r2_score(y.select(Axis(0), &test).view(), pred.view()))
        })
        .collect()
}

impl ModelPerformance {
    /// Score in-sample predictions together with cross-validation results.
    pub fn from_predictions(
        y: ArrayView1<'_, f64>,
        pred: ArrayView1<'_, f64>,
        cv_scores: &[f64],
    ) -> Self {
        let cv = Array1::from(cv_scores.to_vec());
        let spread = population_std(pred);
        Self {
            r2: r2_score(y, pred),
            mse: mean_squared_error(y, pred),
            mae: mean_absolute_error(y, pred),
            explained_variance: explained_variance(y, pred),
            cv_mean: cv.mean().unwrap_or(0.0),
            cv_std: population_std(cv.view()),
            sharpe_proxy: sharpe_proxy(pred),
            directional_accuracy: directional_accuracy(y, pred),
            confidence: 1.0 / (1.0 + spread),
            stability: 1.0 - spread,
        }
    }

    /// Cross-validate `estimator` and score its full-sample fit.
    ///
    /// Non-finite predictions are reported as invalid input.
    pub fn evaluate(
        estimator: &dyn Regressor,
        fitted: &FittedModel,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        folds: usize,
    ) -> fd_regressors::Result<Self> {
        let pred = fitted.predict(x)?;
        if pred.iter().any(|p| !p.is_finite()) {
            return Err(RegressorError::InvalidInput(
                "model produced non-finite predictions".to_string(),
            ));
        }
        let cv_scores = cross_val_r2(estimator, x, y, folds)?;
        Ok(Self::from_predictions(y, pred.view(), &cv_scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(r2_score(y.view(), y.view()), 1.0);
        let mean = Array1::from_elem(4, 2.5);
        assert_relative_eq!(r2_score(y.view(), mean.view()), 0.0);
    }

    #[test]
    fn test_constant_target_scores_zero() {
        let y = array![0.5, 0.5, 0.5];
        let pred = array![0.1, 0.9, 0.4];
        assert_eq!(r2_score(y.view(), pred.view()), 0.0);
        assert_eq!(explained_variance(y.view(), pred.view()), 0.0);
    }

    #[test]
    fn test_explained_variance_ignores_bias() {
        let y = array![1.0, 2.0, 3.0];
        let pred = array![2.0, 3.0, 4.0];
        assert_relative_eq!(explained_variance(y.view(), pred.view()), 1.0);
        assert!(r2_score(y.view(), pred.view()) < 1.0);
    }

    #[test]
    fn test_errors() {
        let y = array![1.0, -1.0];
        let pred = array![0.0, 1.0];
        assert_relative_eq!(mean_squared_error(y.view(), pred.view()), 2.5);
        assert_relative_eq!(mean_absolute_error(y.view(), pred.view()), 1.5);
    }

    #[test]
    fn test_directional_accuracy_treats_zero_as_down() {
        let y = array![0.1, -0.2, 0.0, 0.3];
        let pred = array![0.2, 0.1, -0.1, 0.0];
        assert_relative_eq!(directional_accuracy(y.view(), pred.view()), 0.5);
    }

    #[test]
    fn test_sharpe_proxy() {
        let pred = array![0.01, 0.03];
        let excess_mean = 0.02 - 0.02 / 12.0;
        let expected = excess_mean / (0.01 + 1e-6) * 12.0_f64.sqrt();
        assert_relative_eq!(sharpe_proxy(pred.view()), expected, epsilon = 1e-9);
    }

    #[rstest]
    #[case(10, 4, vec![3, 3, 2, 2])]
    #[case(9, 3, vec![3, 3, 3])]
    #[case(5, 10, vec![1, 1, 1, 1, 1])]
    fn test_kfold_layout(#[case] n: usize, #[case] k: usize, #[case] sizes: Vec<usize>) {
        let folds = kfold_indices(n, k);
        let got: Vec<usize> = folds.iter().map(|(_, test)| test.len()).collect();
        assert_eq!(got, sizes);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), n);
            assert!(test.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }

    #[test]
    fn test_performance_from_predictions() {
        let y = array![0.02, -0.01, 0.03, 0.01];
        let perf = ModelPerformance::from_predictions(y.view(), y.view(), &[0.5, 0.7]);
        assert_relative_eq!(perf.r2, 1.0);
        assert_relative_eq!(perf.mse, 0.0);
        assert_relative_eq!(perf.cv_mean, 0.6);
        assert_relative_eq!(perf.cv_std, 0.1, epsilon = 1e-12);
        assert_relative_eq!(perf.directional_accuracy, 1.0);
        let spread = y.std(0.0);
        assert_relative_eq!(perf.confidence, 1.0 / (1.0 + spread));
        assert_relative_eq!(perf.stability, 1.0 - spread);
    }
}
