//! Error types for estimator fitting and prediction.

use thiserror::Error;

/// Result type for regressor operations.
pub type Result<T> = std::result::Result<T, RegressorError>;

/// Errors that can occur while fitting or evaluating a regressor.
#[derive(Debug, Error)]
pub enum RegressorError {
    /// Training data is empty, misaligned, or contains non-finite values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prediction input does not match the fitted feature count
    #[error("Dimension mismatch: model expects {expected} features, got {actual}")]
    DimensionMismatch {
        /// Feature count seen at fit time
        expected: usize,
        /// Feature count supplied
        actual: usize,
    },

    /// A linear system could not be solved
    #[error("Singular system: {0}")]
    Singular(String),

    /// An iterative solver diverged
    #[error("Solver diverged: {0}")]
    NotConverged(String),

    /// The smartcore estimator rejected the data or failed to fit
    #[error("Estimator backend failed: {0}")]
    Backend(String),
}
