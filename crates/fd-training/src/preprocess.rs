//! Univariate feature selection and standard scaling.

use crate::{Result, TrainingError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fewest candidate columns selection accepts.
pub const MIN_CANDIDATE_COLUMNS: usize = 3;

/// Univariate F-statistic of each column of `x` against `y`.
///
/// `None` marks a score that is undefined because the column or the
/// target is constant.
pub fn f_regression(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Vec<Option<f64>> {
    let n = y.len() as f64;
    let y_mean = y.mean().unwrap_or(0.0);
    let yc = &y - y_mean;
    let y_norm = yc.dot(&yc).sqrt();

    x.columns()
        .into_iter()
        .map(|column| {
            let xc = &column - column.mean().unwrap_or(0.0);
            let denom = xc.dot(&xc).sqrt() * y_norm;
            if denom == 0.0 || !denom.is_finite() {
                return None;
            }
            let corr = (xc.dot(&yc) / denom).clamp(-1.0, 1.0);
            let r2 = corr * corr;
            let f = r2 / (1.0 - r2) * (n - 2.0);
            (!f.is_nan()).then_some(f.min(f64::MAX))
        })
        .collect()
}

fn by_score_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keeps the `k` columns with the highest F-statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    k: usize,
    scores: Vec<Option<f64>>,
    selected: Vec<usize>,
}

impl FeatureSelector {
    /// Score the columns of `x` and keep the best `min(k, ncols)`.
    ///
    /// Undefined scores rank last and ties go to the lower column index.
    /// Kept columns stay in their original order.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, k: usize) -> Result<Self> {
        if x.ncols() < MIN_CANDIDATE_COLUMNS {
            return Err(TrainingError::InsufficientFeatures {
                available: x.ncols(),
            });
        }
        let scores = f_regression(x, y);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        // stable sort keeps index order among equal scores
        order.sort_by(|&a, &b| by_score_desc(scores[a], scores[b]));
        let mut selected: Vec<usize> = order.into_iter().take(k.min(x.ncols())).collect();
        selected.sort_unstable();

        Ok(Self {
            k,
            scores,
            selected,
        })
    }

    /// Requested number of columns.
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Indices of the kept columns.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// F-statistic of every input column.
    pub fn scores(&self) -> &[Option<f64>] {
        &self.scores
    }

    /// Names of the kept columns.
    pub fn selected_names(&self, names: &[String]) -> Vec<String> {
        self.selected
            .iter()
            .filter_map(|&i| names.get(i).cloned())
            .collect()
    }

    /// Project `x` onto the kept columns.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.select(Axis(1), &self.selected)
    }
}

/// Zero-mean, unit-variance scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn per-column means and population standard deviations.
    ///
    /// Constant columns get a scale of 1.
    pub fn fit(x: ArrayView2<'_, f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Self { mean, scale }
    }

    /// Apply the learned scaling.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean.view().insert_axis(Axis(0))) / &self.scale.view().insert_axis(Axis(0))
    }

    /// Per-column means.
    pub const fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-column scales.
    pub const fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}
