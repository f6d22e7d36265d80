//! Bundle upload and registry/status bookkeeping.

use crate::{
    Horizon, Result,
    bundle::{
        ModelBundle, ModelRegistryRecord, REGISTRY_VERSION, TrainingStatus, TrainingStatusRecord,
    },
    config::CollectionsConfig,
    metrics::ModelPerformance,
    orchestrator::TrainingStage,
    store::{BlobReference, BlobStore, DocumentStore},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Blob key of a bundle created at `created_at`.
pub fn blob_key(horizon: Horizon, created_at: DateTime<Utc>) -> String {
    format!(
        "models/{horizon}_{}.json",
        created_at.format("%Y%m%d_%H%M%S_%6f")
    )
}

/// Key of the latest status document for `horizon`.
pub fn status_key(horizon: Horizon) -> String {
    format!("{horizon}_latest")
}

/// Summary of a run written alongside its bundle.
#[derive(Debug, Clone)]
pub struct PersistReport {
    /// Authoritative model name
    pub best_model_name: String,
    /// Scores of the authoritative model
    pub performance: ModelPerformance,
    /// Rows trained on
    pub sample_count: usize,
    /// Names of every stored model
    pub models_trained: Vec<String>,
}

/// Writes bundles to the blob store and pointers to the document store.
#[derive(Debug, Clone)]
pub struct ModelBundlePersister {
    blobs: Arc<dyn BlobStore>,
    documents: Arc<dyn DocumentStore>,
    collections: CollectionsConfig,
}

impl ModelBundlePersister {
    /// Create a persister over the given stores.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        documents: Arc<dyn DocumentStore>,
        collections: CollectionsConfig,
    ) -> Self {
        Self {
            blobs,
            documents,
            collections,
        }
    }

    /// Upload `bundle`, then point the registry and status documents at it.
    ///
    /// A document failure after the upload leaves the blob in place and is
    /// returned as a storage error.
    pub fn persist(&self, bundle: &ModelBundle, report: &PersistReport) -> Result<BlobReference> {
        let horizon = bundle.horizon;
        let key = blob_key(horizon, bundle.created_at);
        let bytes = bundle.to_json()?;
        let reference = self.blobs.put(&key, &bytes)?;
        info!(horizon = %horizon, blob = %reference, bytes = bytes.len(), "Uploaded model bundle");

        let registry = ModelRegistryRecord {
            horizon,
            blob_reference: reference.clone(),
            best_model_name: report.best_model_name.clone(),
            performance: report.performance.clone(),
            training_samples: report.sample_count,
            models_trained: report.models_trained.clone(),
            last_updated: bundle.created_at,
            version: REGISTRY_VERSION.to_string(),
        };
        let status = TrainingStatusRecord {
            horizon,
            timestamp: bundle.created_at,
            sample_count: Some(report.sample_count),
            status: TrainingStatus::Completed,
            best_model_name: Some(report.best_model_name.clone()),
            performance: Some(report.performance.clone()),
            blob_reference: Some(reference.clone()),
            stage: None,
            error: None,
        };

        self.write(&self.collections.trained_models, &horizon.to_string(), &registry)
            .and_then(|()| {
                self.write(&self.collections.training_status, &status_key(horizon), &status)
            })
            .inspect_err(|err| {
                warn!(
                    horizon = %horizon,
                    blob = %reference,
                    error = %err,
                    "Bundle uploaded but documents not updated, blob is orphaned"
                );
            })?;

        info!(
            horizon = %horizon,
            blob = %reference,
            best_model = %report.best_model_name,
            "Updated model registry"
        );
        Ok(reference)
    }

    /// Write a failed status document.
    pub fn record_failure(
        &self,
        horizon: Horizon,
        stage: TrainingStage,
        error: &str,
        sample_count: Option<usize>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let status = TrainingStatusRecord {
            horizon,
            timestamp: at,
            sample_count,
            status: TrainingStatus::Failed,
            best_model_name: None,
            performance: None,
            blob_reference: None,
            stage: Some(stage),
            error: Some(error.to_string()),
        };
        self.write(&self.collections.training_status, &status_key(horizon), &status)
    }

    /// Latest status document of `horizon`.
    pub fn latest_status(&self, horizon: Horizon) -> Result<Option<TrainingStatusRecord>> {
        self.documents
            .get(&self.collections.training_status, &status_key(horizon))?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Registry entry of `horizon`.
    pub fn registry_entry(&self, horizon: Horizon) -> Result<Option<ModelRegistryRecord>> {
        self.documents
            .get(&self.collections.trained_models, &horizon.to_string())?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Download the bundle a registry entry points at.
    pub fn load_bundle(&self, reference: &BlobReference) -> Result<ModelBundle> {
        ModelBundle::from_json(&self.blobs.get(reference)?)
    }

    fn write<T: Serialize>(&self, collection: &str, key: &str, document: &T) -> Result<()> {
        let value = serde_json::to_value(document)?;
        self.documents.set(collection, key, &value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_blob_key_format() {
        let at = Utc
            .with_ymd_and_hms(2024, 7, 4, 13, 5, 9)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(
            blob_key(Horizon::SixMonths, at),
            "models/6M_20240704_130509_123456.json"
        );
        assert_eq!(status_key(Horizon::OneWeek), "1W_latest");
    }
}
