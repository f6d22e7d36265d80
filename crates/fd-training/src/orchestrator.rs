//! One training run for one horizon, from fetch to persisted bundle.

use crate::{
    Horizon, Result, TrainingError,
    bundle::ModelBundle,
    config::CollectionsConfig,
    ensemble::EnsembleBuilder,
    features::FeatureEngineer,
    metrics::ModelPerformance,
    persist::{ModelBundlePersister, PersistReport},
    profile::HorizonProfile,
    record::{TrainingDataset, select_for_horizon},
    store::{BlobReference, BlobStore, DocumentStore, FactorStore},
    trainer::TrainerEvaluator,
    zoo::ModelZoo,
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Stage of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    /// Reading factor history
    #[display("fetching")]
    Fetching,
    /// Building the dataset
    #[display("preparing")]
    Preparing,
    /// Engineering features and fitting candidates
    #[display("training")]
    Training,
    /// Choosing between the best single model and the ensemble
    #[display("selecting")]
    Selecting,
    /// Writing the bundle and its documents
    #[display("persisting")]
    Persisting,
    /// Finished successfully
    #[display("completed")]
    Completed,
    /// Finished with an error
    #[display("failed")]
    Failed,
}

/// Payload of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    /// Always `true`
    pub success: bool,
    /// Horizon trained
    pub horizon: Horizon,
    /// Rows trained on
    pub sample_count: usize,
    /// Authoritative model
    pub best_model_name: String,
    /// Scores of the authoritative model
    pub performance: ModelPerformance,
    /// Where the bundle was stored
    pub blob_reference: BlobReference,
    /// Names of every stored model
    pub models_trained: Vec<String>,
    /// Names of the selected feature columns
    pub selected_features: Vec<String>,
    /// Whether the horizon-label fallback was used
    pub used_fallback: bool,
    /// Run start time
    pub timestamp: DateTime<Utc>,
}

/// Payload of a failed run.
#[derive(Debug, Serialize)]
pub struct TrainingFailure {
    /// Always `false`
    pub success: bool,
    /// Horizon trained
    pub horizon: Horizon,
    /// Stage the run stopped in
    pub stage: TrainingStage,
    /// Rendered error
    pub error: String,
    /// Run start time
    pub timestamp: DateTime<Utc>,
    /// Underlying error
    #[serde(skip)]
    pub cause: TrainingError,
}

/// Result of [`TrainingOrchestrator::run`].
pub type TrainingOutcome = std::result::Result<TrainingSummary, TrainingFailure>;

/// Runs the training pipeline for one horizon profile.
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    profile: HorizonProfile,
    factors: Arc<dyn FactorStore>,
    persister: ModelBundlePersister,
    collections: CollectionsConfig,
}

/// Mutable progress of a single run.
struct RunState {
    stage: TrainingStage,
    sample_count: Option<usize>,
}

impl RunState {
    fn enter(&mut self, horizon: Horizon, stage: TrainingStage) {
        info!(horizon = %horizon, from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }
}

impl TrainingOrchestrator {
    /// Create an orchestrator over injected stores.
    pub fn new(
        profile: HorizonProfile,
        factors: Arc<dyn FactorStore>,
        blobs: Arc<dyn BlobStore>,
        documents: Arc<dyn DocumentStore>,
        collections: CollectionsConfig,
    ) -> Self {
        Self {
            profile,
            factors,
            persister: ModelBundlePersister::new(blobs, documents, collections.clone()),
            collections,
        }
    }

    /// Profile the orchestrator trains.
    pub const fn profile(&self) -> &HorizonProfile {
        &self.profile
    }

    /// Persister used for bundles and status documents.
    pub const fn persister(&self) -> &ModelBundlePersister {
        &self.persister
    }

    /// Run the pipeline as of the current time.
    pub fn run(&self) -> TrainingOutcome {
        self.run_at(Utc::now())
    }

    /// Run the pipeline as of `now`.
    ///
    /// Any failure writes a failed status document before it is returned.
    pub fn run_at(&self, now: DateTime<Utc>) -> TrainingOutcome {
        let horizon = self.profile.horizon;
        let mut state = RunState {
            stage: TrainingStage::Fetching,
            sample_count: None,
        };
        info!(horizon = %horizon, stage = %state.stage, "Starting training run");

        match self.execute(now, &mut state) {
            Ok(summary) => {
                state.enter(horizon, TrainingStage::Completed);
                info!(
                    horizon = %horizon,
                    best_model = %summary.best_model_name,
                    r2 = summary.performance.r2,
                    samples = summary.sample_count,
                    blob = %summary.blob_reference,
                    "Training run completed"
                );
                Ok(summary)
            }
            Err(cause) => {
                let stage = state.stage;
                let message = cause.to_string();
                error!(horizon = %horizon, stage = %stage, error = %message, "Training run failed");
                if let Err(status_err) = self.persister.record_failure(
                    horizon,
                    stage,
                    &message,
                    state.sample_count,
                    now,
                ) {
                    error!(horizon = %horizon, error = %status_err, "Failed to write failed status");
                }
                Err(TrainingFailure {
                    success: false,
                    horizon,
                    stage,
                    error: message,
                    timestamp: now,
                    cause,
                })
            }
        }
    }

    fn execute(&self, now: DateTime<Utc>, state: &mut RunState) -> Result<TrainingSummary> {
        let profile = &self.profile;
        let horizon = profile.horizon;

        let since = now - profile.lookback();
        let records = self
            .factors
            .records_since(&self.collections.historical_factors, since)?;
        state.sample_count = Some(records.len());
        info!(horizon = %horizon, records = records.len(), since = %since, "Fetched factor history");
        if records.len() < profile.min_samples {
            return Err(TrainingError::InsufficientData {
                horizon,
                available: records.len(),
                required: profile.min_samples,
            });
        }

        state.enter(horizon, TrainingStage::Preparing);
        let (selected, used_fallback) = select_for_horizon(
            &records,
            horizon,
            profile.min_labelled,
            profile.fallback_rows,
        );
        if used_fallback {
            warn!(
                horizon = %horizon,
                rows = selected.len(),
                min_labelled = profile.min_labelled,
                "Too few records labelled for horizon, using most recent records"
            );
        }
        let dataset = TrainingDataset::from_records(horizon, &selected)?;
        state.sample_count = Some(dataset.len());

        state.enter(horizon, TrainingStage::Training);
        let frame = FeatureEngineer::engineer(dataset.features(), &profile.recipe)?;
        let zoo = ModelZoo::for_profile(profile)?;
        let run = TrainerEvaluator::train_and_evaluate(&frame, dataset.target().view(), profile, &zoo)?;

        state.enter(horizon, TrainingStage::Selecting);
        let selection = EnsembleBuilder::maybe_build_ensemble(
            &run,
            run.x_scaled.view(),
            dataset.target().view(),
            profile.ensemble_size,
            profile.cv_folds,
        );
        info!(
            horizon = %horizon,
            best_model = %selection.best_model_name,
            r2 = selection.performance.r2,
            "Selected model"
        );

        state.enter(horizon, TrainingStage::Persisting);
        let bundle = ModelBundle::new(horizon, now, &run, &selection);
        let report = PersistReport {
            best_model_name: selection.best_model_name.clone(),
            performance: selection.performance.clone(),
            sample_count: dataset.len(),
            models_trained: selection.model_names(),
        };
        let blob_reference = self.persister.persist(&bundle, &report)?;

        Ok(TrainingSummary {
            success: true,
            horizon,
            sample_count: dataset.len(),
            best_model_name: selection.best_model_name,
            performance: selection.performance,
            blob_reference,
            models_trained: report.models_trained,
            selected_features: run.selected_feature_names,
            used_fallback,
            timestamp: now,
        })
    }
}
