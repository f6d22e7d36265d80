//! Error types for the training pipeline and its stores.

use crate::Horizon;
use thiserror::Error;

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;

/// Errors that abort a training run.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Fewer records than the profile's minimum sample count
    #[error("Insufficient training data for {horizon}: {available} samples")]
    InsufficientData {
        /// Horizon being trained
        horizon: Horizon,
        /// Records fetched
        available: usize,
        /// Minimum the profile requires
        required: usize,
    },

    /// Missing or unusable columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// Too few candidate columns for feature selection
    #[error("Insufficient features for selection: {available} columns, need at least 3")]
    InsufficientFeatures {
        /// Candidate columns available
        available: usize,
    },

    /// Every candidate failed or scored below the quality floor
    #[error("No models successfully trained for {horizon}")]
    NoViableModel {
        /// Horizon being trained
        horizon: Horizon,
    },

    /// Blob or document store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Bundle or document encoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No profile registered for the horizon
    #[error("No training profile for horizon {0}")]
    UnknownProfile(Horizon),
}

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blob already exists under the key
    #[error("Blob already exists: {key}")]
    Conflict {
        /// Rejected key
        key: String,
    },

    /// Nothing stored under the key
    #[error("Not found: {0}")]
    NotFound(String),

    /// A lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}
