//! Historical factor records and the per-horizon training dataset.

use crate::{Horizon, Result, TrainingError};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Factor columns every recipe may read, in frame order.
pub const BASE_COLUMNS: [&str; 6] = [
    "fundamental",
    "technical",
    "sentiment",
    "macro",
    "esg",
    "volatility",
];

/// Name of the target column.
pub const TARGET_COLUMN: &str = "actual_return";

/// Minimum number of base columns a dataset needs.
pub const MIN_BASE_COLUMNS: usize = 3;

/// One scored observation written by the ingestion process.
///
/// Fields absent from the stored document deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalFactorRecord {
    /// Ticker symbol
    pub symbol: String,
    /// Horizon label, when the producer assigned one
    #[serde(default)]
    pub horizon: Option<String>,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Fundamental score in [0, 1]
    #[serde(default)]
    pub fundamental: Option<f64>,
    /// Technical score in [0, 1]
    #[serde(default)]
    pub technical: Option<f64>,
    /// Sentiment score in [0, 1]
    #[serde(default)]
    pub sentiment: Option<f64>,
    /// Macro score in [0, 1]
    #[serde(default, rename = "macro")]
    pub macro_score: Option<f64>,
    /// ESG score in [0, 1]
    #[serde(default)]
    pub esg: Option<f64>,
    /// Realised forward return
    #[serde(default)]
    pub actual_return: Option<f64>,
    /// Annualised volatility, in percent
    #[serde(default)]
    pub volatility: Option<f64>,
    /// Producer confidence
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl HistoricalFactorRecord {
    /// Value of a named base or target column.
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            "fundamental" => self.fundamental,
            "technical" => self.technical,
            "sentiment" => self.sentiment,
            "macro" => self.macro_score,
            "esg" => self.esg,
            "volatility" => self.volatility,
            "actual_return" => self.actual_return,
            "confidence" => self.confidence,
            _ => None,
        }
    }

    /// Whether the record carries `horizon` as its label.
    pub fn is_labelled(&self, horizon: Horizon) -> bool {
        self.horizon
            .as_deref()
            .and_then(|label| label.parse::<Horizon>().ok())
            == Some(horizon)
    }
}

/// Order records by timestamp, breaking ties by symbol.
pub fn sort_chronologically(records: &mut [HistoricalFactorRecord]) {
    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

/// Pick the records to train `horizon` on.
///
/// Records labelled with the horizon are used when at least `min_labelled`
/// of them exist (and always at least one). Otherwise the `fallback_rows`
/// most recent records are relabelled and used instead. The returned flag
/// reports whether the fallback was taken. Output is in chronological order.
pub fn select_for_horizon(
    records: &[HistoricalFactorRecord],
    horizon: Horizon,
    min_labelled: usize,
    fallback_rows: usize,
) -> (Vec<HistoricalFactorRecord>, bool) {
    let mut labelled: Vec<_> = records
        .iter()
        .filter(|r| r.is_labelled(horizon))
        .cloned()
        .collect();
    if labelled.len() >= min_labelled.max(1) {
        sort_chronologically(&mut labelled);
        return (labelled, false);
    }

    let mut recent = records.to_vec();
    sort_chronologically(&mut recent);
    let skip = recent.len().saturating_sub(fallback_rows);
    let mut recent = recent.split_off(skip);
    let label = horizon.to_string();
    for record in &mut recent {
        record.horizon = Some(label.clone());
    }
    (recent, true)
}

/// Base columns with at least one value across `records`.
pub fn present_columns(records: &[HistoricalFactorRecord]) -> Vec<&'static str> {
    BASE_COLUMNS
        .into_iter()
        .filter(|c| records.iter().any(|r| r.value(c).is_some()))
        .collect()
}

/// Row-aligned feature frame and target for one horizon.
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    horizon: Horizon,
    features: DataFrame,
    target: Array1<f64>,
}

impl TrainingDataset {
    /// Build a dataset from records already selected for `horizon`.
    ///
    /// Records are ordered chronologically. Rows without a finite target are
    /// dropped. The frame holds every base column as nullable Float64; a
    /// column no record carries is all null.
    pub fn from_records(horizon: Horizon, records: &[HistoricalFactorRecord]) -> Result<Self> {
        let present = present_columns(records);
        if present.len() < MIN_BASE_COLUMNS {
            return Err(TrainingError::Schema(format!(
                "Insufficient features: {present:?}"
            )));
        }

        let mut rows: Vec<&HistoricalFactorRecord> = records
            .iter()
            .filter(|r| r.actual_return.is_some_and(f64::is_finite))
            .collect();
        if rows.is_empty() {
            return Err(TrainingError::Schema(format!(
                "no {horizon} records carry {TARGET_COLUMN}"
            )));
        }
        rows.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        let columns: Vec<Column> = BASE_COLUMNS
            .iter()
            .map(|name| {
                let values: Vec<Option<f64>> = rows.iter().map(|r| r.value(name)).collect();
                Column::new((*name).into(), values)
            })
            .collect();
        let features = DataFrame::new(columns)?;
        let target = rows.iter().filter_map(|r| r.actual_return).collect();

        Ok(Self {
            horizon,
            features,
            target,
        })
    }

    /// Horizon the dataset was prepared for.
    pub const fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Raw feature frame.
    pub const fn features(&self) -> &DataFrame {
        &self.features
    }

    /// Target returns, aligned with the frame rows.
    pub const fn target(&self) -> &Array1<f64> {
        &self.target
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.target.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}
