//! Gradient-boosted trees for squared loss.
//!
//! One implementation backs three zoo variants:
//! - plain gradient boosting (`l2_leaf_reg = 0`, exact thresholds)
//! - regularized boosting with an L2 leaf penalty and a minimum split gain,
//!   the second-order formulation popularised by XGBoost
//! - histogram boosting with quantile-binned thresholds and large minimum
//!   leaves, in the style of LightGBM

use crate::{
    FittedModel, Result,
    traits::{ConfigurableRegressor, Predict, Regressor, check_training_data, check_width},
    tree::{RegressionTree, TreeParams, quantile_bin_edges},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{SeedableRng, rngs::StdRng, seq::index::sample};
use serde::{Deserialize, Serialize};

/// Configuration for the GradientBoosting regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each tree
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values
    pub l2_leaf_reg: f64,
    /// Minimum gain a split must exceed
    pub min_split_gain: f64,
    /// Fraction of rows sampled (without replacement) per round
    pub subsample: f64,
    /// Quantile bins per feature (`None` = exact thresholds)
    pub max_bins: Option<usize>,
    /// Seed for row subsampling
    pub seed: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            l2_leaf_reg: 0.0,
            min_split_gain: 0.0,
            subsample: 1.0,
            max_bins: None,
            seed: 42,
        }
    }
}

impl GradientBoostingConfig {
    /// Plain least-squares boosting.
    pub fn gradient(n_estimators: usize, max_depth: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            max_depth,
            learning_rate,
            ..Default::default()
        }
    }

    /// Boosting with an L2 leaf penalty of 1.
    pub fn regularized(n_estimators: usize, max_depth: usize, learning_rate: f64) -> Self {
        Self {
            l2_leaf_reg: 1.0,
            ..Self::gradient(n_estimators, max_depth, learning_rate)
        }
    }

    /// Boosting on 255 quantile bins with leaves of at least 20 rows.
    pub fn histogram(n_estimators: usize, max_depth: usize, learning_rate: f64) -> Self {
        Self {
            max_bins: Some(255),
            min_samples_leaf: 20,
            ..Self::gradient(n_estimators, max_depth, learning_rate)
        }
    }
}

/// Gradient-boosted regression trees.
#[derive(Debug, Clone, Default)]
pub struct GradientBoosting {
    config: GradientBoostingConfig,
}

impl ConfigurableRegressor for GradientBoosting {
    type Config = GradientBoostingConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

impl Regressor for GradientBoosting {
    fn kind(&self) -> &'static str {
        if self.config.max_bins.is_some() {
            "histogram_boosting"
        } else if self.config.l2_leaf_reg > 0.0 {
            "regularized_boosting"
        } else {
            "gradient_boosting"
        }
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let cfg = &self.config;
        let n = x.nrows();
        let params = TreeParams {
            max_depth: cfg.max_depth,
            min_samples_split: 2,
            min_samples_leaf: cfg.min_samples_leaf,
            l2_leaf_reg: cfg.l2_leaf_reg,
            min_split_gain: cfg.min_split_gain,
        };
        let edges = cfg.max_bins.map(|bins| quantile_bin_edges(x, bins));
        let sample_size = ((n as f64 * cfg.subsample.clamp(0.0, 1.0)).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let init = y.mean().unwrap_or(0.0);
        let mut current = Array1::from_elem(n, init);
        let mut residual = vec![0.0; n];
        let mut trees = Vec::with_capacity(cfg.n_estimators);

        for _ in 0..cfg.n_estimators {
            for (r, (t, c)) in residual.iter_mut().zip(y.iter().zip(current.iter())) {
                *r = t - c;
            }
            let rows = if sample_size < n {
                let mut rows = sample(&mut rng, n, sample_size).into_vec();
                rows.sort_unstable();
                rows
            } else {
                (0..n).collect()
            };
            let tree = RegressionTree::fit(x, &residual, rows, &params, edges.as_deref());
            for (i, row) in x.rows().into_iter().enumerate() {
                current[i] += cfg.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        Ok(FittedModel::GradientBoosting(FittedBoosting {
            n_features: x.ncols(),
            init,
            learning_rate: cfg.learning_rate,
            trees,
        }))
    }
}

/// A fitted boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedBoosting {
    n_features: usize,
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl Predict for FittedBoosting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x.ncols())?;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.init
                    + self.learning_rate
                        * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }
}
