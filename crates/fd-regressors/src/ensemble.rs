//! Unweighted voting ensemble.

use crate::{
    FittedModel, RegressorError, Result,
    traits::{Predict, Regressor, check_training_data, check_width},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Averages the predictions of independently fitted members.
#[derive(Debug, Clone)]
pub struct VotingRegressor {
    members: Vec<(String, Arc<dyn Regressor>)>,
}

impl VotingRegressor {
    /// Create an ensemble from named, unfitted members.
    pub const fn new(members: Vec<(String, Arc<dyn Regressor>)>) -> Self {
        Self { members }
    }

    /// Member names, in fitting order.
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl Regressor for VotingRegressor {
    fn kind(&self) -> &'static str {
        "ensemble"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        if self.members.is_empty() {
            return Err(RegressorError::InvalidInput(
                "voting ensemble has no members".to_string(),
            ));
        }
        let members = self
            .members
            .iter()
            .map(|(name, estimator)| Ok((name.clone(), estimator.fit(x, y)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(FittedModel::Voting(FittedVoting {
            n_features: x.ncols(),
            members,
        }))
    }
}

/// A fitted voting ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedVoting {
    n_features: usize,
    members: Vec<(String, FittedModel)>,
}

impl FittedVoting {
    /// Fitted members by name.
    pub fn members(&self) -> &[(String, FittedModel)] {
        &self.members
    }
}

impl Predict for FittedVoting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x.ncols())?;
        let mut total = Array1::<f64>::zeros(x.nrows());
        for (_, member) in &self.members {
            total += &member.predict(x)?;
        }
        Ok(total / self.members.len() as f64)
    }
}
