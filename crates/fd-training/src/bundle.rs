//! Persisted artifacts: the model bundle and the documents that point at it.

use crate::{
    Horizon, Result, TrainingError,
    ensemble::Selection,
    metrics::ModelPerformance,
    orchestrator::TrainingStage,
    preprocess::{FeatureSelector, StandardScaler},
    store::BlobReference,
    trainer::TrainingRun,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use fd_regressors::{FittedModel, Predict};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version of [`ModelBundle`].
pub const BUNDLE_VERSION: &str = "1.0";

/// Format version of [`ModelRegistryRecord`].
pub const REGISTRY_VERSION: &str = "2.0";

/// Everything needed to score new rows for one horizon.
///
/// Rows given to [`ModelBundle::predict`] carry the full engineered column
/// set; the bundle applies its own selection and scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Bundle format version
    pub version: String,
    /// Horizon the models were trained for
    pub horizon: Horizon,
    /// Creation time, also used in the blob key
    pub created_at: DateTime<Utc>,
    /// Retained fits by name, plus the ensemble when promoted
    pub trained_models: BTreeMap<String, FittedModel>,
    /// Scaler fitted on the selected columns
    pub scaler: StandardScaler,
    /// Column selector fitted on the engineered frame
    pub feature_selector: FeatureSelector,
    /// Names of the selected columns
    pub selected_feature_names: Vec<String>,
}

impl ModelBundle {
    /// Assemble a bundle from a training run and its selection.
    pub fn new(
        horizon: Horizon,
        created_at: DateTime<Utc>,
        run: &TrainingRun,
        selection: &Selection,
    ) -> Self {
        Self {
            version: BUNDLE_VERSION.to_string(),
            horizon,
            created_at,
            trained_models: selection.trained_models.clone(),
            scaler: run.scaler.clone(),
            feature_selector: run.selector.clone(),
            selected_feature_names: run.selected_feature_names.clone(),
        }
    }

    /// Score engineered rows with the named model.
    pub fn predict(&self, model: &str, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.trained_models.get(model).ok_or_else(|| {
            TrainingError::Schema(format!("bundle has no model named {model:?}"))
        })?;
        let selected = self.feature_selector.transform(x);
        let scaled = self.scaler.transform(selected.view());
        fitted
            .predict(scaled.view())
            .map_err(|err| TrainingError::Schema(err.to_string()))
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Outcome recorded in a status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    /// The run persisted a bundle
    #[display("completed")]
    Completed,
    /// The run failed
    #[display("failed")]
    Failed,
}

/// Latest-run status for one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStatusRecord {
    /// Horizon trained
    pub horizon: Horizon,
    /// When the status was written
    pub timestamp: DateTime<Utc>,
    /// Records the run worked with, when it got that far
    pub sample_count: Option<usize>,
    /// Run outcome
    pub status: TrainingStatus,
    /// Best model of a completed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_model_name: Option<String>,
    /// Scores of the best model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<ModelPerformance>,
    /// Where the bundle was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_reference: Option<BlobReference>,
    /// Stage a failed run stopped in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<TrainingStage>,
    /// Failure message of a failed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registry entry pointing at the current bundle of a horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistryRecord {
    /// Horizon trained
    pub horizon: Horizon,
    /// Where the bundle was stored
    pub blob_reference: BlobReference,
    /// Best model name
    pub best_model_name: String,
    /// Scores of the best model
    pub performance: ModelPerformance,
    /// Rows the bundle was trained on
    pub training_samples: usize,
    /// Names of every stored model
    pub models_trained: Vec<String>,
    /// When the entry was written
    pub last_updated: DateTime<Utc>,
    /// Registry format version
    pub version: String,
}
