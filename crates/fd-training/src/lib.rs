#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/horizon-training/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bundle;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod horizon;
pub mod metrics;
pub mod orchestrator;
pub mod persist;
pub mod preprocess;
pub mod profile;
pub mod record;
pub mod store;
pub mod trainer;
pub mod zoo;

// Re-export core types
pub use bundle::{ModelBundle, ModelRegistryRecord, TrainingStatus, TrainingStatusRecord};
pub use config::{CollectionsConfig, LoggingConfig, StorageConfig, TrainerConfig};
pub use ensemble::{EnsembleBuilder, Selection, should_promote};
pub use error::{Result, StoreError, TrainingError};
pub use features::{
    DerivedFeature, EngineeredFeatureFrame, FeatureEngineer, FeatureFormula, FeatureRecipe,
};
pub use horizon::{Horizon, ParseHorizonError};
pub use metrics::ModelPerformance;
pub use orchestrator::{
    TrainingFailure, TrainingOrchestrator, TrainingOutcome, TrainingStage, TrainingSummary,
};
pub use persist::{ModelBundlePersister, PersistReport};
pub use preprocess::{FeatureSelector, StandardScaler};
pub use profile::{HorizonProfile, ProfileOverrides, ProfileRegistry, ZooEntry};
pub use record::{HistoricalFactorRecord, TrainingDataset};
pub use store::{
    BlobReference, BlobStore, DocumentStore, FactorStore, FsBlobStore, FsDocumentStore,
    JsonFactorStore, MemoryStore,
};
pub use trainer::{QUALITY_FLOOR, TrainerEvaluator, TrainingRun, rank_by_r2};
pub use zoo::{CandidateModel, ModelZoo};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
