//! Forecast horizons.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The forward-looking window a model is trained to predict.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    /// One week
    #[display("1W")]
    #[serde(rename = "1W")]
    OneWeek,
    /// One month
    #[display("1M")]
    #[serde(rename = "1M")]
    OneMonth,
    /// Six months
    #[display("6M")]
    #[serde(rename = "6M")]
    SixMonths,
}

impl Horizon {
    /// All horizons, shortest first.
    pub const ALL: [Self; 3] = [Self::OneWeek, Self::OneMonth, Self::SixMonths];
}

/// Error returned when a string names no horizon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown horizon '{0}', expected one of 1W, 1M, 6M")]
pub struct ParseHorizonError(String);

impl FromStr for Horizon {
    type Err = ParseHorizonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1W" => Ok(Self::OneWeek),
            "1M" => Ok(Self::OneMonth),
            "6M" => Ok(Self::SixMonths),
            _ => Err(ParseHorizonError(s.to_string())),
        }
    }
}
