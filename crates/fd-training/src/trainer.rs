//! Feature selection, scaling and per-candidate training.

use crate::{
    Result, TrainingError,
    features::EngineeredFeatureFrame,
    metrics::ModelPerformance,
    preprocess::{FeatureSelector, StandardScaler},
    profile::HorizonProfile,
    zoo::ModelZoo,
};
use fd_regressors::{FittedModel, Regressor};
use ndarray::{Array2, ArrayView1};
use std::{cmp::Ordering, sync::Arc};
use tracing::{info, warn};

/// In-sample R² a candidate must exceed to be retained.
pub const QUALITY_FLOOR: f64 = 0.1;

/// Order candidates by R² descending, then by name ascending.
pub fn rank_by_r2(a: (&str, f64), b: (&str, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// A candidate that trained successfully.
#[derive(Debug, Clone)]
pub struct TrainedCandidate {
    /// Candidate name
    pub name: String,
    /// Unfitted estimator, kept for ensembling
    pub estimator: Arc<dyn Regressor>,
    /// Full-sample fit
    pub fitted: FittedModel,
    /// Scores of the full-sample fit
    pub performance: ModelPerformance,
}

/// Outcome of training every candidate of a zoo.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    /// Retained candidates, best first
    pub retained: Vec<TrainedCandidate>,
    /// Names of candidates that failed to fit or score
    pub failed: Vec<String>,
    /// Names of candidates at or below the quality floor
    pub discarded: Vec<String>,
    /// Selector fitted on this dataset
    pub selector: FeatureSelector,
    /// Scaler fitted on the selected columns
    pub scaler: StandardScaler,
    /// Names of the selected columns, in frame order
    pub selected_feature_names: Vec<String>,
    /// Selected and scaled training matrix
    pub x_scaled: Array2<f64>,
}

impl TrainingRun {
    /// Best single candidate.
    pub fn best(&self) -> Option<&TrainedCandidate> {
        self.retained.first()
    }

    /// Retained candidate names, best first.
    pub fn retained_names(&self) -> Vec<&str> {
        self.retained.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Trains and scores every candidate of a zoo.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainerEvaluator;

impl TrainerEvaluator {
    /// Select features, scale them, then fit and score each candidate.
    ///
    /// Candidate failures are logged and skipped. Fails with
    /// [`TrainingError::NoViableModel`] when nothing clears the quality floor.
    pub fn train_and_evaluate(
        frame: &EngineeredFeatureFrame,
        y: ArrayView1<'_, f64>,
        profile: &HorizonProfile,
        zoo: &ModelZoo,
    ) -> Result<TrainingRun> {
        let horizon = profile.horizon;
        let x = frame.to_array()?;
        let names = frame.column_names();

        let selector = FeatureSelector::fit(x.view(), y, profile.k_features)?;
        let selected_feature_names = selector.selected_names(&names);
        info!(
            horizon = %horizon,
            selected = selected_feature_names.len(),
            features = ?selected_feature_names,
            "Selected features"
        );

        let x_selected = selector.transform(x.view());
        let scaler = StandardScaler::fit(x_selected.view());
        let x_scaled = scaler.transform(x_selected.view());

        let mut retained = Vec::new();
        let mut failed = Vec::new();
        let mut discarded = Vec::new();

        for candidate in zoo.iter() {
            let estimator = candidate.estimator.as_ref();
            let outcome = estimator.fit(x_scaled.view(), y).and_then(|fitted| {
                let performance = ModelPerformance::evaluate(
                    estimator,
                    &fitted,
                    x_scaled.view(),
                    y,
                    profile.cv_folds,
                )?;
                Ok((fitted, performance))
            });

            match outcome {
                Ok((fitted, performance)) if performance.r2 > QUALITY_FLOOR => {
                    info!(
                        horizon = %horizon,
                        model = %candidate.name,
                        r2 = performance.r2,
                        cv_mean = performance.cv_mean,
                        "Candidate retained"
                    );
                    retained.push(TrainedCandidate {
                        name: candidate.name.clone(),
                        estimator: Arc::clone(&candidate.estimator),
                        fitted,
                        performance,
                    });
                }
                Ok((_, performance)) => {
                    info!(
                        horizon = %horizon,
                        model = %candidate.name,
                        r2 = performance.r2,
                        floor = QUALITY_FLOOR,
                        "Candidate below quality floor"
                    );
                    discarded.push(candidate.name.clone());
                }
                Err(err) => {
                    warn!(horizon = %horizon, model = %candidate.name, error = %err, "Candidate failed");
                    failed.push(candidate.name.clone());
                }
            }
        }

        if retained.is_empty() {
            return Err(TrainingError::NoViableModel { horizon });
        }
        retained.sort_by(|a, b| {
            rank_by_r2(
                (a.name.as_str(), a.performance.r2),
                (b.name.as_str(), b.performance.r2),
            )
        });

        Ok(TrainingRun {
            retained,
            failed,
            discarded,
            selector,
            scaler,
            selected_feature_names,
            x_scaled,
        })
    }
}
