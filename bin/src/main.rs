//! CLI for per-horizon model training.
//!
//! Runs one stateless training run per invocation and prints the JSON
//! payload of the outcome on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fd_training::{
    FsBlobStore, FsDocumentStore, Horizon, JsonFactorStore, ModelBundlePersister, TrainerConfig,
    TrainingOrchestrator,
};
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fd-train")]
#[command(about = "Per-horizon model training and selection", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train and persist models for one horizon
    Train {
        /// Horizon to train (1W, 1M or 6M)
        horizon: Horizon,
    },
    /// List the effective training profiles
    Profiles,
    /// Show the latest training status of a horizon
    Status {
        /// Horizon to inspect (1W, 1M or 6M)
        horizon: Horizon,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => TrainerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TrainerConfig::default(),
    };
    init_tracing(&config.logging.level, cli.json_logs);
    info!(
        config = ?cli.config,
        factor_path = %config.storage.factor_path.display(),
        bucket = %config.storage.bucket,
        "Loaded configuration"
    );

    match cli.command {
        Commands::Train { horizon } => train(&config, horizon),
        Commands::Profiles => list_profiles(&config).map(|()| ExitCode::SUCCESS),
        Commands::Status { horizon } => show_status(&config, horizon),
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn document_store(config: &TrainerConfig) -> Result<Arc<FsDocumentStore>> {
    let root = &config.storage.document_root;
    Ok(Arc::new(FsDocumentStore::new(root).with_context(|| {
        format!("failed to open document store at {}", root.display())
    })?))
}

fn blob_store(config: &TrainerConfig) -> Result<Arc<FsBlobStore>> {
    let root = &config.storage.blob_root;
    Ok(Arc::new(
        FsBlobStore::new(root, config.storage.bucket.clone())
            .with_context(|| format!("failed to open blob store at {}", root.display()))?,
    ))
}

/// Run one training pass and print its payload.
fn train(config: &TrainerConfig, horizon: Horizon) -> Result<ExitCode> {
    let registry = config.profile_registry()?;
    let profile = registry.get(horizon)?.clone();
    info!(
        horizon = %horizon,
        lookback_days = profile.lookback_days,
        models = profile.zoo.len(),
        "Starting fd-train"
    );

    let orchestrator = TrainingOrchestrator::new(
        profile,
        Arc::new(JsonFactorStore::new(&config.storage.factor_path)),
        blob_store(config)?,
        document_store(config)?,
        config.collections.clone(),
    );

    match orchestrator.run() {
        Ok(summary) => {
            info!(
                horizon = %horizon,
                best_model = %summary.best_model_name,
                blob = %summary.blob_reference,
                "Training finished"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            error!(
                horizon = %horizon,
                stage = %failure.stage,
                error = %failure.error,
                "Training failed"
            );
            println!("{}", serde_json::to_string_pretty(&failure)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print each profile with its overrides applied.
fn list_profiles(config: &TrainerConfig) -> Result<()> {
    let registry = config.profile_registry()?;
    println!("Training Profiles ({} total)\n", registry.len());

    for profile in registry.iter() {
        println!("{}:", profile.horizon);
        println!("  Lookback: {} days", profile.lookback_days);
        println!("  Min samples: {}", profile.min_samples);
        println!("  Min labelled: {}", profile.min_labelled);
        println!("  Fallback rows: {}", profile.fallback_rows);
        println!("  Selected features: {}", profile.k_features);
        println!("  CV folds: {}", profile.cv_folds);
        println!("  Ensemble size: {}", profile.ensemble_size);
        println!("  Derived features:");
        for name in profile.recipe.names() {
            println!("    - {name}");
        }
        println!("  Models:");
        for entry in &profile.zoo {
            println!("    - {}", entry.name);
        }
        println!();
    }
    Ok(())
}

/// Print the latest status document of a horizon.
fn show_status(config: &TrainerConfig, horizon: Horizon) -> Result<ExitCode> {
    let persister = ModelBundlePersister::new(
        blob_store(config)?,
        document_store(config)?,
        config.collections.clone(),
    );
    match persister.latest_status(horizon)? {
        Some(status) => {
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!(horizon = %horizon, "No training status recorded");
            Ok(ExitCode::FAILURE)
        }
    }
}
