//! Serializable fitted models and estimator specifications.
//!
//! [`FittedModel`] is a closed set of fitted parameter structs tagged by
//! kind, so a trained model round-trips through JSON without any live
//! estimator objects. [`EstimatorSpec`] is the matching description of an
//! unfitted estimator, which lets candidate sets be written as data.

use crate::{
    Result,
    bayesian::{BayesianRidge, BayesianRidgeConfig},
    boosting::{FittedBoosting, GradientBoosting, GradientBoostingConfig},
    ensemble::FittedVoting,
    forest::{FittedForest, RandomForest, RandomForestConfig},
    huber::{Huber, HuberConfig},
    linear::{ElasticNet, ElasticNetConfig, LinearModel, Ridge, RidgeConfig},
    mlp::{FittedMlp, Mlp, MlpConfig},
    svr::{FittedSvr, Svr, SvrConfig},
    traits::{ConfigurableRegressor, Predict, Regressor},
};
use derive_more::From;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters of any fitted estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    /// Bagged regression trees
    RandomForest(FittedForest),
    /// Boosted regression trees (all three boosting variants)
    GradientBoosting(FittedBoosting),
    /// Any linear-family model
    Linear(LinearModel),
    /// Multi-layer perceptron
    Mlp(FittedMlp),
    /// Support vector regressor
    Svr(FittedSvr),
    /// Voting ensemble of other fitted models
    Voting(FittedVoting),
}

impl Predict for FittedModel {
    fn n_features(&self) -> usize {
        match self {
            Self::RandomForest(m) => m.n_features(),
            Self::GradientBoosting(m) => m.n_features(),
            Self::Linear(m) => m.n_features(),
            Self::Mlp(m) => m.n_features(),
            Self::Svr(m) => m.n_features(),
            Self::Voting(m) => m.n_features(),
        }
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        match self {
            Self::RandomForest(m) => m.predict(x),
            Self::GradientBoosting(m) => m.predict(x),
            Self::Linear(m) => m.predict(x),
            Self::Mlp(m) => m.predict(x),
            Self::Svr(m) => m.predict(x),
            Self::Voting(m) => m.predict(x),
        }
    }
}

/// Description of an unfitted estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    /// [`RandomForest`]
    RandomForest(RandomForestConfig),
    /// [`GradientBoosting`]
    GradientBoosting(GradientBoostingConfig),
    /// [`Ridge`]
    Ridge(RidgeConfig),
    /// [`ElasticNet`] (lasso when `l1_ratio = 1`)
    ElasticNet(ElasticNetConfig),
    /// [`BayesianRidge`]
    BayesianRidge(BayesianRidgeConfig),
    /// [`Huber`]
    Huber(HuberConfig),
    /// [`Mlp`]
    Mlp(MlpConfig),
    /// [`Svr`]
    Svr(SvrConfig),
}

impl EstimatorSpec {
    /// Instantiate the estimator this spec describes.
    pub fn build(&self) -> Arc<dyn Regressor> {
        match self {
            Self::RandomForest(c) => Arc::new(RandomForest::with_config(c.clone())),
            Self::GradientBoosting(c) => Arc::new(GradientBoosting::with_config(c.clone())),
            Self::Ridge(c) => Arc::new(Ridge::with_config(c.clone())),
            Self::ElasticNet(c) => Arc::new(ElasticNet::with_config(c.clone())),
            Self::BayesianRidge(c) => Arc::new(BayesianRidge::with_config(c.clone())),
            Self::Huber(c) => Arc::new(Huber::with_config(c.clone())),
            Self::Mlp(c) => Arc::new(Mlp::with_config(c.clone())),
            Self::Svr(c) => Arc::new(Svr::with_config(c.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};
    use rstest::rstest;

    #[rstest]
    #[case(EstimatorSpec::RandomForest(RandomForestConfig::default()), "random_forest")]
    #[case(
        EstimatorSpec::GradientBoosting(GradientBoostingConfig::histogram(10, 3, 0.1)),
        "histogram_boosting"
    )]
    #[case(EstimatorSpec::Ridge(RidgeConfig::default()), "ridge")]
    #[case(EstimatorSpec::ElasticNet(ElasticNetConfig::lasso(0.1)), "lasso")]
    #[case(EstimatorSpec::BayesianRidge(BayesianRidgeConfig::default()), "bayesian_ridge")]
    #[case(EstimatorSpec::Huber(HuberConfig::default()), "huber")]
    #[case(EstimatorSpec::Mlp(MlpConfig::default()), "neural_network")]
    #[case(EstimatorSpec::Svr(SvrConfig::default()), "svr")]
    fn test_spec_builds_matching_kind(#[case] spec: EstimatorSpec, #[case] kind: &str) {
        assert_eq!(spec.build().kind(), kind);
    }

    #[test]
    fn test_spec_json_is_tagged() {
        let spec = EstimatorSpec::Ridge(RidgeConfig { alpha: 2.0 });
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "ridge");
        assert_eq!(json["alpha"], 2.0);
        let back: EstimatorSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_fitted_model_survives_json() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * (j + 2)) % 9) as f64);
        let y = x.dot(&array![0.5, -0.25]);
        let fitted = RandomForest::new(5, 4, 42).fit(x.view(), y.view()).unwrap();

        let json = serde_json::to_string(&fitted).unwrap();
        let back: FittedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(x.view()).unwrap(), fitted.predict(x.view()).unwrap());
    }
}
