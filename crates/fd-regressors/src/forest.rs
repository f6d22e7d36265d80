//! Random forest regressor backed by smartcore.
//!
//! The seed is handed to smartcore's bootstrap sampler, so a given
//! configuration always produces the same forest.

use crate::{
    FittedModel, Result,
    backend::{backend_error, dense_matrix},
    traits::{ConfigurableRegressor, Predict, Regressor, check_training_data, check_width},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smartcore::{
    ensemble::random_forest_regressor::{RandomForestRegressor, RandomForestRegressorParameters},
    linalg::basic::matrix::DenseMatrix,
};
use std::sync::Arc;

type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Configuration for the RandomForest regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum node size eligible for splitting
    pub min_samples_split: usize,
    /// Minimum rows per leaf
    pub min_samples_leaf: usize,
    /// Features tried per split (`None` = all, as for regression forests)
    pub max_features: Option<usize>,
    /// Seed for bootstrap and feature sampling
    pub seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

impl RandomForestConfig {
    fn parameters(&self, n_features: usize) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters::default()
            .with_n_trees(self.n_estimators.max(1))
            .with_max_depth(u16::try_from(self.max_depth).unwrap_or(u16::MAX))
            .with_min_samples_split(self.min_samples_split.max(2))
            .with_min_samples_leaf(self.min_samples_leaf.max(1))
            .with_m(self.max_features.unwrap_or(n_features).clamp(1, n_features))
            .with_seed(self.seed)
    }
}

/// Random forest regressor.
#[derive(Debug, Clone, Default)]
pub struct RandomForest {
    config: RandomForestConfig,
}

impl RandomForest {
    /// Create a forest with `n_estimators` trees of at most `max_depth`.
    pub fn new(n_estimators: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            config: RandomForestConfig {
                n_estimators,
                max_depth,
                seed,
                ..Default::default()
            },
        }
    }
}

impl ConfigurableRegressor for RandomForest {
    type Config = RandomForestConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

impl Regressor for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let model = ForestModel::fit(
            &dense_matrix(x)?,
            &y.to_vec(),
            self.config.parameters(x.ncols()),
        )
        .map_err(backend_error)?;

        Ok(FittedModel::RandomForest(FittedForest {
            n_features: x.ncols(),
            model: Arc::new(model),
        }))
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedForest {
    n_features: usize,
    model: Arc<ForestModel>,
}

impl Predict for FittedForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x.ncols())?;
        let pred = self.model.predict(&dense_matrix(x)?).map_err(backend_error)?;
        Ok(Array1::from(pred))
    }
}
