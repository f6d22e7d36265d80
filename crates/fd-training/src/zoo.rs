//! Candidate model sets.

use crate::{
    Result, TrainingError,
    ensemble::ENSEMBLE_NAME,
    profile::{HorizonProfile, ZooEntry},
};
use fd_regressors::Regressor;
use std::sync::Arc;

/// An untrained regressor under a candidate name.
#[derive(Debug, Clone)]
pub struct CandidateModel {
    /// Candidate name, unique within a zoo
    pub name: String,
    /// Unfitted estimator
    pub estimator: Arc<dyn Regressor>,
}

/// Ordered candidate set for one training run.
#[derive(Debug, Clone, Default)]
pub struct ModelZoo {
    candidates: Vec<CandidateModel>,
}

impl ModelZoo {
    /// Instantiate the profile's candidate set.
    pub fn for_profile(profile: &HorizonProfile) -> Result<Self> {
        Self::from_entries(&profile.zoo)
    }

    /// Instantiate candidates from zoo entries, keeping the first of any
    /// duplicated name.
    ///
    /// The ensemble name is reserved for the promoted voting ensemble.
    pub fn from_entries(entries: &[ZooEntry]) -> Result<Self> {
        let mut zoo = Self::default();
        for entry in entries {
            if entry.name == ENSEMBLE_NAME {
                return Err(TrainingError::Config(format!(
                    "zoo entry name '{ENSEMBLE_NAME}' is reserved for the voting ensemble"
                )));
            }
            if zoo.get(&entry.name).is_none() {
                zoo.candidates.push(CandidateModel {
                    name: entry.name.clone(),
                    estimator: entry.spec.build(),
                });
            }
        }
        Ok(zoo)
    }

    /// Candidate names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }

    /// Candidate by name.
    pub fn get(&self, name: &str) -> Option<&CandidateModel> {
        self.candidates.iter().find(|c| c.name == name)
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the zoo is empty.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates, in order.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateModel> {
        self.candidates.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Horizon;

    #[test]
    fn test_zoo_follows_profile_order() {
        let zoo = ModelZoo::for_profile(&HorizonProfile::builtin(Horizon::OneMonth)).unwrap();
        assert_eq!(
            zoo.names(),
            vec![
                "random_forest",
                "gradient_boosting",
                "regularized_boosting",
                "histogram_boosting",
                "neural_network",
                "ridge",
                "lasso",
                "elastic_net",
                "bayesian_ridge",
            ]
        );
    }

    #[test]
    fn test_candidate_kinds() {
        let zoo = ModelZoo::for_profile(&HorizonProfile::builtin(Horizon::SixMonths)).unwrap();
        assert_eq!(zoo.len(), 11);
        for candidate in zoo.iter() {
            assert_eq!(candidate.estimator.kind(), candidate.name);
        }
        assert!(zoo.get("svr").is_some());
        assert!(zoo.get("xgboost").is_none());
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let mut entries = HorizonProfile::one_week().zoo;
        entries.push(entries[0].clone());
        assert_eq!(ModelZoo::from_entries(&entries).unwrap().len(), 9);
    }

    #[test]
    fn test_ensemble_name_is_reserved() {
        let mut entries = HorizonProfile::one_week().zoo;
        entries[0].name = ENSEMBLE_NAME.to_string();
        assert!(matches!(
            ModelZoo::from_entries(&entries),
            Err(TrainingError::Config(msg)) if msg.contains("reserved")
        ));
    }
}
