//! Voting-ensemble construction and promotion.

use crate::{
    metrics::ModelPerformance,
    trainer::{TrainedCandidate, TrainingRun},
};
use fd_regressors::{FittedModel, Regressor, VotingRegressor};
use ndarray::{ArrayView1, ArrayView2};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{info, warn};

/// Name the ensemble is stored under.
pub const ENSEMBLE_NAME: &str = "ensemble";

/// Whether an ensemble replaces the best single model.
///
/// Only a strict improvement promotes; a tie keeps the single model.
pub fn should_promote(ensemble_r2: f64, best_r2: f64) -> bool {
    ensemble_r2 > best_r2
}

/// The final choice of a training run.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Name of the authoritative model
    pub best_model_name: String,
    /// Scores of the authoritative model
    pub performance: ModelPerformance,
    /// Every retained fit, plus the ensemble when promoted
    pub trained_models: BTreeMap<String, FittedModel>,
    /// Scores of the ensemble, when one was built
    pub ensemble_performance: Option<ModelPerformance>,
}

impl Selection {
    /// Names of the stored models.
    pub fn model_names(&self) -> Vec<String> {
        self.trained_models.keys().cloned().collect()
    }

    /// Whether the ensemble was promoted.
    pub fn ensemble_promoted(&self) -> bool {
        self.best_model_name == ENSEMBLE_NAME
    }
}

/// Builds the voting ensemble from the top retained candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsembleBuilder;

impl EnsembleBuilder {
    /// Try an unweighted ensemble of the `ensemble_size` best candidates.
    ///
    /// Needs at least two retained candidates. Failure to fit or score the
    /// ensemble is logged and leaves the best single model in place.
    pub fn maybe_build_ensemble(
        run: &TrainingRun,
        x_scaled: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        ensemble_size: usize,
        cv_folds: usize,
    ) -> Selection {
        let trained_models: BTreeMap<String, FittedModel> = run
            .retained
            .iter()
            .map(|c| (c.name.clone(), c.fitted.clone()))
            .collect();
        let (best_model_name, performance) = run.best().map_or_else(
            || (String::new(), ModelPerformance::from_predictions(y, y, &[])),
            |c| (c.name.clone(), c.performance.clone()),
        );
        let mut selection = Selection {
            best_model_name,
            performance,
            trained_models,
            ensemble_performance: None,
        };

        if run.retained.len() < 2 {
            return selection;
        }

        let members: Vec<&TrainedCandidate> =
            run.retained.iter().take(ensemble_size.max(2)).collect();
        let voting = VotingRegressor::new(
            members
                .iter()
                .map(|c| (c.name.clone(), Arc::clone(&c.estimator)))
                .collect(),
        );

        let outcome = voting.fit(x_scaled, y).and_then(|fitted| {
            let performance = ModelPerformance::evaluate(&voting, &fitted, x_scaled, y, cv_folds)?;
            Ok((fitted, performance))
        });

        match outcome {
            Ok((fitted, ensemble)) => {
                let promote = should_promote(ensemble.r2, selection.performance.r2);
                info!(
                    members = ?voting.member_names(),
                    ensemble_r2 = ensemble.r2,
                    best_r2 = selection.performance.r2,
                    promoted = promote,
                    "Evaluated ensemble"
                );
                if promote {
                    selection.trained_models.insert(ENSEMBLE_NAME.to_string(), fitted);
                    selection.best_model_name = ENSEMBLE_NAME.to_string();
                    selection.performance = ensemble.clone();
                }
                selection.ensemble_performance = Some(ensemble);
            }
            Err(err) => warn!(error = %err, "Ensemble training failed, keeping best single model"),
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{FeatureSelector, StandardScaler};
    use fd_regressors::{LinearModel, Predict, Ridge};
    use ndarray::{Array1, Array2, array};

    fn candidate(name: &str, alpha: f64, x: &Array2<f64>, y: &Array1<f64>) -> TrainedCandidate {
        let estimator: Arc<dyn Regressor> = Arc::new(Ridge::new(alpha));
        let fitted = estimator.fit(x.view(), y.view()).unwrap();
        let pred = fitted.predict(x.view()).unwrap();
        TrainedCandidate {
            name: name.to_string(),
            estimator,
            fitted,
            performance: ModelPerformance::from_predictions(y.view(), pred.view(), &[]),
        }
    }

    fn run(retained: Vec<TrainedCandidate>, x: &Array2<f64>, y: &Array1<f64>) -> TrainingRun {
        TrainingRun {
            retained,
            failed: Vec::new(),
            discarded: Vec::new(),
            selector: FeatureSelector::fit(x.view(), y.view(), 3).unwrap(),
            scaler: StandardScaler::fit(x.view()),
            selected_feature_names: vec!["a".into(), "b".into(), "c".into()],
            x_scaled: x.clone(),
        }
    }

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * (j + 2) + j) % 7) as f64 - 3.0);
        let y = x.dot(&array![1.0, -0.5, 0.25]);
        (x, y)
    }

    #[test]
    fn test_promotion_is_strict() {
        assert!(should_promote(0.51, 0.5));
        assert!(!should_promote(0.5, 0.5));
        assert!(!should_promote(0.49, 0.5));
    }

    #[test]
    fn test_single_candidate_skips_ensemble() {
        let (x, y) = data();
        let run = run(vec![candidate("ridge", 1.0, &x, &y)], &x, &y);
        let selection = EnsembleBuilder::maybe_build_ensemble(&run, x.view(), y.view(), 3, 3);
        assert_eq!(selection.best_model_name, "ridge");
        assert!(selection.ensemble_performance.is_none());
        assert_eq!(selection.model_names(), vec!["ridge"]);
    }

    #[test]
    fn test_promotion_follows_law() {
        let (x, y) = data();
        let retained = vec![
            candidate("exact", 1e-9, &x, &y),
            candidate("mild", 10.0, &x, &y),
            candidate("heavy", 1000.0, &x, &y),
        ];
        let run = run(retained, &x, &y);
        let selection = EnsembleBuilder::maybe_build_ensemble(&run, x.view(), y.view(), 3, 3);

        let ensemble = selection.ensemble_performance.clone().unwrap();
        let best_single = run.best().unwrap().performance.r2;
        assert_eq!(
            selection.ensemble_promoted(),
            should_promote(ensemble.r2, best_single)
        );
        // averaging in shrunk members cannot beat a near-exact fit
        assert_eq!(selection.best_model_name, "exact");
        assert!(!selection.trained_models.contains_key(ENSEMBLE_NAME));
    }

    #[test]
    fn test_promoted_ensemble_is_stored() {
        let (x, y) = data();
        // stored fits that over- and under-shoot, while their estimators refit cleanly
        let over = FittedModel::Linear(LinearModel::new(array![1.2, -0.6, 0.3], 0.0));
        let under = FittedModel::Linear(LinearModel::new(array![0.8, -0.4, 0.2], 0.0));
        let score = |m: &FittedModel| {
            ModelPerformance::from_predictions(y.view(), m.predict(x.view()).unwrap().view(), &[])
        };
        let retained = vec![
            TrainedCandidate {
                name: "over".into(),
                estimator: Arc::new(Ridge::new(0.01)),
                performance: score(&over),
                fitted: over,
            },
            TrainedCandidate {
                name: "under".into(),
                estimator: Arc::new(Ridge::new(0.01)),
                performance: score(&under),
                fitted: under,
            },
        ];
        let run = run(retained, &x, &y);
        let selection = EnsembleBuilder::maybe_build_ensemble(&run, x.view(), y.view(), 3, 2);
        assert!(selection.ensemble_promoted());
        assert!(selection.trained_models.contains_key(ENSEMBLE_NAME));
        assert_eq!(selection.model_names().len(), 3);
        assert_eq!(selection.performance, selection.ensemble_performance.unwrap());
    }
}
