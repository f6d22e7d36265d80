//! TOML configuration for training runs.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [storage]
//! factor_path = "data"
//! blob_root = "artifacts/blobs"
//! document_root = "artifacts/documents"
//! bucket = "uptrendr-models"
//!
//! [collections]
//! historical_factors = "historical_factors"
//! trained_models = "trained_models"
//! training_status = "ml_training_status"
//!
//! [logging]
//! level = "info"
//!
//! [profiles.1M]
//! min_samples = 60
//! cv_folds = 5
//! ```

use crate::{
    Horizon, Result, TrainingError,
    profile::{ProfileOverrides, ProfileRegistry},
    zoo::ModelZoo,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf};

/// Default blob bucket.
pub const DEFAULT_BUCKET: &str = "uptrendr-models";

/// Where factor history is read from and artifacts are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `{collection}.json` or `.jsonl` factor files
    pub factor_path: PathBuf,
    /// Root directory of the blob store
    pub blob_root: PathBuf,
    /// Root directory of the document store
    pub document_root: PathBuf,
    /// Bucket bundles are written to
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            factor_path: PathBuf::from("data"),
            blob_root: PathBuf::from("artifacts/blobs"),
            document_root: PathBuf::from("artifacts/documents"),
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

/// Collection names used by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Factor history
    pub historical_factors: String,
    /// Model registry, keyed by horizon
    pub trained_models: String,
    /// Latest status, keyed by `{horizon}_latest`
    pub training_status: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            historical_factors: "historical_factors".to_string(),
            trained_models: "trained_models".to_string(),
            training_status: "ml_training_status".to_string(),
        }
    }
}

/// Log filter used when `RUST_LOG` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Storage locations
    pub storage: StorageConfig,
    /// Collection names
    pub collections: CollectionsConfig,
    /// Logging defaults
    pub logging: LoggingConfig,
    /// Per-horizon overrides keyed by horizon label
    pub profiles: BTreeMap<String, ProfileOverrides>,
}

impl TrainerConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            TrainingError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| TrainingError::Config(err.to_string()))
    }

    /// Built-in profiles with the configured overrides applied.
    pub fn profile_registry(&self) -> Result<ProfileRegistry> {
        let mut registry = ProfileRegistry::with_defaults();
        for (label, overrides) in &self.profiles {
            let horizon: Horizon = label
                .parse()
                .map_err(|err| TrainingError::Config(format!("[profiles.{label}]: {err}")))?;
            let profile = registry.get_mut(horizon)?;
            profile.apply(overrides);
            ModelZoo::for_profile(profile)
                .map_err(|err| TrainingError::Config(format!("[profiles.{label}]: {err}")))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureFormula;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TrainerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrainerConfig::default());
        assert_eq!(config.storage.bucket, DEFAULT_BUCKET);
        assert_eq!(config.collections.training_status, "ml_training_status");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_profile_overrides() {
        let config = TrainerConfig::from_toml_str(
            r#"
            [storage]
            bucket = "test-bucket"

            [profiles.1m]
            min_samples = 12
            cv_folds = 3

            [profiles.6M]
            k_features = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.bucket, "test-bucket");
        assert_eq!(config.storage.factor_path, PathBuf::from("data"));

        let registry = config.profile_registry().unwrap();
        let month = registry.get(Horizon::OneMonth).unwrap();
        assert_eq!(month.min_samples, 12);
        assert_eq!(month.cv_folds, 3);
        assert_eq!(month.k_features, 10);
        assert_eq!(registry.get(Horizon::SixMonths).unwrap().k_features, 6);
        assert_eq!(registry.get(Horizon::OneWeek).unwrap().min_samples, 30);
    }

    #[test]
    fn test_recipe_override() {
        let config = TrainerConfig::from_toml_str(
            r#"
            [[profiles.1W.recipe.features]]
            name = "quality_momentum"
            formula = "product"
            columns = ["fundamental", "technical"]
            "#,
        )
        .unwrap();
        let registry = config.profile_registry().unwrap();
        let recipe = &registry.get(Horizon::OneWeek).unwrap().recipe;
        assert_eq!(recipe.names(), vec!["quality_momentum"]);
        assert!(matches!(
            &recipe.features[0].formula,
            FeatureFormula::Product { columns, scale } if columns.len() == 2 && *scale == 1.0
        ));
    }

    #[test]
    fn test_unknown_horizon_is_config_error() {
        let config = TrainerConfig::from_toml_str("[profiles.2Y]\nmin_samples = 1\n").unwrap();
        assert!(matches!(
            config.profile_registry(),
            Err(TrainingError::Config(msg)) if msg.contains("2Y")
        ));
    }

    #[test]
    fn test_zoo_override_cannot_claim_ensemble_name() {
        let config = TrainerConfig::from_toml_str(
            r#"
            [[profiles.1M.zoo]]
            name = "ensemble"
            kind = "ridge"
            alpha = 1.0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.profile_registry(),
            Err(TrainingError::Config(msg)) if msg.contains("1M") && msg.contains("reserved")
        ));
    }

    #[test]
    fn test_min_labelled_override() {
        let config = TrainerConfig::from_toml_str("[profiles.6M]\nmin_labelled = 5\n").unwrap();
        let registry = config.profile_registry().unwrap();
        assert_eq!(registry.get(Horizon::SixMonths).unwrap().min_labelled, 5);
        assert_eq!(registry.get(Horizon::OneMonth).unwrap().min_labelled, 20);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            TrainerConfig::from_toml_str("[storage\nbucket = 1"),
            Err(TrainingError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();
        let config = TrainerConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(matches!(
            TrainerConfig::load("/definitely/not/here.toml"),
            Err(TrainingError::Config(_))
        ));
    }
}
