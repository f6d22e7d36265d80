//! Training runs against the filesystem stores.

mod common;

use common::{BUCKET, light_profile, now, records};
use fd_training::{
    CollectionsConfig, DocumentStore, FsBlobStore, FsDocumentStore, JsonFactorStore,
    TrainingOrchestrator, TrainerConfig,
};
use std::{fs, sync::Arc};
use tempfile::TempDir;

#[test]
fn jsonl_history_trains_into_files() {
    let dir = TempDir::new().unwrap();
    let factors = dir.path().join("factors");
    fs::create_dir_all(&factors).unwrap();
    let lines: Vec<String> = records(60, Some("1M"), 21)
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect();
    fs::write(factors.join("historical_factors.jsonl"), lines.join("\n")).unwrap();

    let documents = Arc::new(FsDocumentStore::new(dir.path().join("docs")).unwrap());
    let orchestrator = TrainingOrchestrator::new(
        light_profile(),
        Arc::new(JsonFactorStore::new(&factors)),
        Arc::new(FsBlobStore::new(dir.path().join("blobs"), BUCKET).unwrap()),
        documents.clone(),
        CollectionsConfig::default(),
    );

    let summary = orchestrator.run_at(now()).unwrap();
    let blob = dir
        .path()
        .join("blobs")
        .join(BUCKET)
        .join(&summary.blob_reference.key);
    assert!(blob.is_file());

    let bundle = orchestrator
        .persister()
        .load_bundle(&summary.blob_reference)
        .unwrap();
    assert_eq!(bundle.selected_feature_names, summary.selected_features);

    assert!(dir.path().join("docs/ml_training_status/1M_latest.json").is_file());
    assert_eq!(documents.keys("trained_models").unwrap(), vec!["1M"]);
}

#[test]
fn missing_history_file_fails_in_fetching() {
    let dir = TempDir::new().unwrap();
    let documents = Arc::new(FsDocumentStore::new(dir.path().join("docs")).unwrap());
    let orchestrator = TrainingOrchestrator::new(
        light_profile(),
        Arc::new(JsonFactorStore::new(dir.path().join("nowhere"))),
        Arc::new(FsBlobStore::new(dir.path().join("blobs"), BUCKET).unwrap()),
        documents.clone(),
        CollectionsConfig::default(),
    );

    let failure = orchestrator.run_at(now()).unwrap_err();
    assert!(failure.error.starts_with("Storage error"));
    let status = documents.get("ml_training_status", "1M_latest").unwrap().unwrap();
    assert_eq!(status["status"], "failed");
    assert_eq!(status["stage"], "fetching");
}

#[test]
fn config_collections_drive_the_run() {
    let dir = TempDir::new().unwrap();
    let config = TrainerConfig::from_toml_str(
        r#"
        [collections]
        historical_factors = "scores"
        training_status = "status"

        [profiles.1M]
        min_samples = 20
        "#,
    )
    .unwrap();
    let profile = {
        let mut profile = light_profile();
        profile.apply(&config.profiles["1M"]);
        profile
    };
    assert_eq!(profile.min_samples, 20);

    fs::write(
        dir.path().join("scores.json"),
        serde_json::to_vec(&records(25, Some("1M"), 22)).unwrap(),
    )
    .unwrap();
    let documents = Arc::new(FsDocumentStore::new(dir.path().join("docs")).unwrap());
    let orchestrator = TrainingOrchestrator::new(
        profile,
        Arc::new(JsonFactorStore::new(dir.path())),
        Arc::new(FsBlobStore::new(dir.path().join("blobs"), BUCKET).unwrap()),
        documents.clone(),
        config.collections.clone(),
    );

    let summary = orchestrator.run_at(now()).unwrap();
    assert_eq!(summary.sample_count, 25);
    assert_eq!(documents.keys("status").unwrap(), vec!["1M_latest"]);
}
