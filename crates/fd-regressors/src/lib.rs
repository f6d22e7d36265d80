#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/horizon-training/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod backend;
pub mod bayesian;
pub mod boosting;
pub mod ensemble;
pub mod error;
pub mod forest;
pub mod huber;
mod linalg;
pub mod linear;
pub mod mlp;
pub mod model;
pub mod svr;
pub mod traits;
pub mod tree;

// Re-export core types
pub use bayesian::{BayesianRidge, BayesianRidgeConfig};
pub use boosting::{GradientBoosting, GradientBoostingConfig};
pub use ensemble::VotingRegressor;
pub use error::{RegressorError, Result};
pub use forest::{RandomForest, RandomForestConfig};
pub use huber::{Huber, HuberConfig};
pub use linear::{ElasticNet, ElasticNetConfig, LinearModel, Ridge, RidgeConfig};
pub use mlp::{Mlp, MlpConfig};
pub use model::{EstimatorSpec, FittedModel};
pub use svr::{Svr, SvrConfig};
pub use traits::{ConfigurableRegressor, Predict, Regressor};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
