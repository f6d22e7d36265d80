#![allow(dead_code, unreachable_pub)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use fd_regressors::{BayesianRidgeConfig, EstimatorSpec, RidgeConfig};
use fd_training::{
    CollectionsConfig, HistoricalFactorRecord, Horizon, HorizonProfile, MemoryStore,
    TrainingOrchestrator, ZooEntry,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;

pub const BUCKET: &str = "uptrendr-models";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap()
}

/// `n` daily records ending the day before [`now`], with a linear signal in
/// the fundamental and technical scores.
pub fn records(n: usize, label: Option<&str>, seed: u64) -> Vec<HistoricalFactorRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let symbols = ["AAPL", "MSFT", "NVDA", "AMZN", "JPM"];
    (0..n)
        .map(|i| {
            let fundamental: f64 = rng.gen_range(0.0..1.0);
            let technical: f64 = rng.gen_range(0.0..1.0);
            let noise: f64 = rng.gen_range(-0.005..0.005);
            HistoricalFactorRecord {
                symbol: symbols[i % symbols.len()].to_string(),
                horizon: label.map(str::to_string),
                timestamp: now() - Duration::days(1 + (n - i) as i64 / 2),
                fundamental: Some(fundamental),
                technical: Some(technical),
                sentiment: Some(rng.gen_range(0.0..1.0)),
                macro_score: Some(rng.gen_range(0.0..1.0)),
                esg: Some(rng.gen_range(0.0..1.0)),
                actual_return: Some(0.08 * fundamental + 0.04 * technical - 0.05 + noise),
                volatility: Some(rng.gen_range(10.0..40.0)),
                confidence: Some(0.8),
            }
        })
        .collect()
}

/// The one-month profile with a small linear zoo.
pub fn light_profile() -> HorizonProfile {
    HorizonProfile {
        zoo: vec![
            ZooEntry {
                name: "ridge".to_string(),
                spec: EstimatorSpec::Ridge(RidgeConfig { alpha: 1.0 }),
            },
            ZooEntry {
                name: "bayesian_ridge".to_string(),
                spec: EstimatorSpec::BayesianRidge(BayesianRidgeConfig::default()),
            },
        ],
        ..HorizonProfile::builtin(Horizon::OneMonth)
    }
}

pub fn memory_store(records: Vec<HistoricalFactorRecord>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new(BUCKET));
    store
        .insert_records(&CollectionsConfig::default().historical_factors, records)
        .unwrap();
    store
}

pub fn orchestrator(profile: HorizonProfile, store: &Arc<MemoryStore>) -> TrainingOrchestrator {
    TrainingOrchestrator::new(
        profile,
        store.clone(),
        store.clone(),
        store.clone(),
        CollectionsConfig::default(),
    )
}
