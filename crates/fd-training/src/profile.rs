//! Per-horizon training profiles.
//!
//! A [`HorizonProfile`] is plain configuration: how far back to look, how
//! many samples are required, which features to derive and which models to
//! try. One pipeline serves every horizon by reading its profile.

use crate::{Horizon, Result, TrainingError, features::FeatureRecipe};
use chrono::Duration;
use fd_regressors::{
    BayesianRidgeConfig, ElasticNetConfig, EstimatorSpec, GradientBoostingConfig, HuberConfig,
    MlpConfig, RandomForestConfig, RidgeConfig, SvrConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Seed shared by every randomised estimator.
pub const MODEL_SEED: u64 = 42;

/// Labelled records a built-in profile needs before it skips the fallback.
pub const MIN_LABELLED: usize = 20;

/// A named entry in a profile's candidate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZooEntry {
    /// Candidate name
    pub name: String,
    /// Estimator to instantiate
    #[serde(flatten)]
    pub spec: EstimatorSpec,
}

impl ZooEntry {
    fn new(name: &str, spec: EstimatorSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
        }
    }
}

/// Training parameters for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonProfile {
    /// Horizon trained
    pub horizon: Horizon,
    /// Days of history fetched
    pub lookback_days: u32,
    /// Minimum fetched records
    pub min_samples: usize,
    /// Labelled records needed before the label fallback is skipped
    pub min_labelled: usize,
    /// Most-recent records used when too few records carry the horizon label
    pub fallback_rows: usize,
    /// Derived features
    pub recipe: FeatureRecipe,
    /// Candidate models, in training order
    pub zoo: Vec<ZooEntry>,
    /// Features kept by univariate selection
    pub k_features: usize,
    /// Cross-validation folds
    pub cv_folds: usize,
    /// Candidates combined into the voting ensemble
    pub ensemble_size: usize,
}

struct ZooSizes {
    forest: (usize, usize),
    boosting: (usize, usize),
    mlp: (Vec<usize>, usize),
    robust: bool,
}

fn zoo(sizes: ZooSizes) -> Vec<ZooEntry> {
    let (trees, forest_depth) = sizes.forest;
    let (rounds, boost_depth) = sizes.boosting;
    let (hidden, epochs) = sizes.mlp;

    let mut entries = vec![
        ZooEntry::new(
            "random_forest",
            EstimatorSpec::RandomForest(RandomForestConfig {
                n_estimators: trees,
                max_depth: forest_depth,
                seed: MODEL_SEED,
                ..Default::default()
            }),
        ),
        ZooEntry::new(
            "gradient_boosting",
            EstimatorSpec::GradientBoosting(GradientBoostingConfig::gradient(rounds, boost_depth, 0.1)),
        ),
        ZooEntry::new(
            "regularized_boosting",
            EstimatorSpec::GradientBoosting(GradientBoostingConfig::regularized(rounds, boost_depth, 0.1)),
        ),
        ZooEntry::new(
            "histogram_boosting",
            EstimatorSpec::GradientBoosting(GradientBoostingConfig::histogram(rounds, boost_depth, 0.1)),
        ),
        ZooEntry::new(
            "neural_network",
            EstimatorSpec::Mlp(MlpConfig::new(hidden, epochs, MODEL_SEED)),
        ),
        ZooEntry::new("ridge", EstimatorSpec::Ridge(RidgeConfig { alpha: 1.0 })),
        ZooEntry::new("lasso", EstimatorSpec::ElasticNet(ElasticNetConfig::lasso(0.1))),
        ZooEntry::new(
            "elastic_net",
            EstimatorSpec::ElasticNet(ElasticNetConfig {
                alpha: 0.1,
                l1_ratio: 0.5,
                ..Default::default()
            }),
        ),
        ZooEntry::new(
            "bayesian_ridge",
            EstimatorSpec::BayesianRidge(BayesianRidgeConfig::default()),
        ),
    ];
    if sizes.robust {
        entries.push(ZooEntry::new("huber", EstimatorSpec::Huber(HuberConfig::default())));
        entries.push(ZooEntry::new("svr", EstimatorSpec::Svr(SvrConfig::default())));
    }
    entries
}

impl HorizonProfile {
    /// Built-in profile for a horizon.
    pub fn builtin(horizon: Horizon) -> Self {
        match horizon {
            Horizon::OneWeek => Self::one_week(),
            Horizon::OneMonth => Self::one_month(),
            Horizon::SixMonths => Self::six_months(),
        }
    }

    /// Short lookback, small ensembles.
    pub fn one_week() -> Self {
        Self {
            horizon: Horizon::OneWeek,
            lookback_days: 30,
            min_samples: 30,
            min_labelled: MIN_LABELLED,
            fallback_rows: 50,
            recipe: FeatureRecipe::short_term(),
            zoo: zoo(ZooSizes {
                forest: (100, 8),
                boosting: (100, 4),
                mlp: (vec![32], 200),
                robust: false,
            }),
            k_features: 8,
            cv_folds: 3,
            ensemble_size: 3,
        }
    }

    /// Ninety-day lookback, balanced ensembles.
    pub fn one_month() -> Self {
        Self {
            horizon: Horizon::OneMonth,
            lookback_days: 90,
            min_samples: 40,
            min_labelled: MIN_LABELLED,
            fallback_rows: 75,
            recipe: FeatureRecipe::medium_term(),
            zoo: zoo(ZooSizes {
                forest: (150, 12),
                boosting: (150, 5),
                mlp: (vec![50], 300),
                robust: false,
            }),
            k_features: 10,
            cv_folds: 4,
            ensemble_size: 3,
        }
    }

    /// Long lookback, deeper ensembles and robust linear models.
    pub fn six_months() -> Self {
        Self {
            horizon: Horizon::SixMonths,
            lookback_days: 180,
            min_samples: 50,
            min_labelled: MIN_LABELLED,
            fallback_rows: 100,
            recipe: FeatureRecipe::long_term(),
            zoo: zoo(ZooSizes {
                forest: (200, 15),
                boosting: (200, 6),
                mlp: (vec![100, 50], 500),
                robust: true,
            }),
            k_features: 12,
            cv_folds: 5,
            ensemble_size: 3,
        }
    }

    /// Lookback window as a duration.
    pub fn lookback(&self) -> Duration {
        Duration::days(i64::from(self.lookback_days))
    }

    /// Apply configured overrides in place.
    pub fn apply(&mut self, overrides: &ProfileOverrides) {
        if let Some(v) = overrides.lookback_days {
            self.lookback_days = v;
        }
        if let Some(v) = overrides.min_samples {
            self.min_samples = v;
        }
        if let Some(v) = overrides.min_labelled {
            self.min_labelled = v;
        }
        if let Some(v) = overrides.fallback_rows {
            self.fallback_rows = v;
        }
        if let Some(v) = overrides.k_features {
            self.k_features = v;
        }
        if let Some(v) = overrides.cv_folds {
            self.cv_folds = v;
        }
        if let Some(v) = overrides.ensemble_size {
            self.ensemble_size = v;
        }
        if let Some(recipe) = &overrides.recipe {
            self.recipe = recipe.clone();
        }
        if let Some(zoo) = &overrides.zoo {
            self.zoo = zoo.clone();
        }
    }
}

/// Optional per-horizon overrides read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    /// Days of history fetched
    pub lookback_days: Option<u32>,
    /// Minimum fetched records
    pub min_samples: Option<usize>,
    /// Labelled records needed to skip the fallback
    pub min_labelled: Option<usize>,
    /// Fallback row count
    pub fallback_rows: Option<usize>,
    /// Features kept by selection
    pub k_features: Option<usize>,
    /// Cross-validation folds
    pub cv_folds: Option<usize>,
    /// Ensemble width
    pub ensemble_size: Option<usize>,
    /// Replacement feature recipe
    pub recipe: Option<FeatureRecipe>,
    /// Replacement candidate set
    pub zoo: Option<Vec<ZooEntry>>,
}

/// Lookup of profiles by horizon.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<Horizon, HorizonProfile>,
}

impl ProfileRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in profile of every horizon.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for horizon in Horizon::ALL {
            registry.register(HorizonProfile::builtin(horizon));
        }
        registry
    }

    /// Register or replace a profile.
    pub fn register(&mut self, profile: HorizonProfile) {
        self.profiles.insert(profile.horizon, profile);
    }

    /// Profile for `horizon`.
    pub fn get(&self, horizon: Horizon) -> Result<&HorizonProfile> {
        self.profiles
            .get(&horizon)
            .ok_or(TrainingError::UnknownProfile(horizon))
    }

    /// Mutable profile for `horizon`.
    pub fn get_mut(&mut self, horizon: Horizon) -> Result<&mut HorizonProfile> {
        self.profiles
            .get_mut(&horizon)
            .ok_or(TrainingError::UnknownProfile(horizon))
    }

    /// All profiles, shortest horizon first.
    pub fn iter(&self) -> impl Iterator<Item = &HorizonProfile> {
        self.profiles.values()
    }

    /// Number of registered profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profile is registered.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
