//! Derived-feature recipes and the feature engineer.
//!
//! A recipe is an ordered list of named formulas. Each formula compiles to a
//! polars expression over the raw factor columns, so adding a horizon means
//! adding data rather than control flow.
//!
//! After the derived columns are appended, every column is filled in a
//! fixed order:
//! 1. non-finite values (zero denominators, NaN inputs) become missing
//! 2. forward fill down the column
//! 3. remaining gaps take the median of the column's observed values
//! 4. columns with no observed values become 0.0

use crate::{
    Horizon, Result, TrainingError,
    record::BASE_COLUMNS,
};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const fn one() -> f64 {
    1.0
}

/// A single derived-feature formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "formula", rename_all = "snake_case")]
pub enum FeatureFormula {
    /// `Π columns / scale`
    Product {
        /// Factors of the product
        columns: Vec<String>,
        /// Divisor applied to the product
        #[serde(default = "one")]
        scale: f64,
    },
    /// `column ^ exponent`
    Power {
        /// Base column
        column: String,
        /// Integer exponent
        exponent: u32,
    },
    /// `(numerator − center) / (denominator / denominator_scale + denominator_offset)`
    Ratio {
        /// Numerator column
        numerator: String,
        /// Value subtracted from the numerator
        #[serde(default)]
        center: f64,
        /// Denominator column
        denominator: String,
        /// Divisor applied to the denominator
        #[serde(default = "one")]
        denominator_scale: f64,
        /// Offset added to the scaled denominator
        #[serde(default)]
        denominator_offset: f64,
    },
    /// `|column − center| · multiplier / scale`
    AbsDeviation {
        /// Deviating column
        column: String,
        /// Reference level
        center: f64,
        /// Optional column the deviation is multiplied by
        #[serde(default)]
        multiplier: Option<String>,
        /// Divisor applied to the result
        #[serde(default = "one")]
        scale: f64,
    },
    /// Row mean of `columns`
    Mean {
        /// Averaged columns
        columns: Vec<String>,
    },
    /// `Σ_{c ∈ measured} |c − mean(reference)|`
    Divergence {
        /// Columns whose row mean is the reference level
        reference: Vec<String>,
        /// Columns measured against the reference
        measured: Vec<String>,
    },
}

fn row_mean(columns: &[String]) -> Expr {
    let sum = columns
        .iter()
        .map(|c| col(c.as_str()))
        .reduce(|acc, e| acc + e)
        .unwrap_or_else(|| lit(f64::NAN));
    sum / lit(columns.len().max(1) as f64)
}

impl FeatureFormula {
    /// Columns the formula reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Product { columns, .. } | Self::Mean { columns } => {
                columns.iter().map(String::as_str).collect()
            }
            Self::Power { column, .. } => vec![column.as_str()],
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => vec![numerator.as_str(), denominator.as_str()],
            Self::AbsDeviation {
                column, multiplier, ..
            } => std::iter::once(column.as_str())
                .chain(multiplier.as_deref())
                .collect(),
            Self::Divergence {
                reference,
                measured,
            } => reference
                .iter()
                .chain(measured.iter())
                .map(String::as_str)
                .collect(),
        }
    }

    /// Compile the formula to a polars expression.
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Product { columns, scale } => {
                let product = columns
                    .iter()
                    .map(|c| col(c.as_str()))
                    .reduce(|acc, e| acc * e)
                    .unwrap_or_else(|| lit(f64::NAN));
                product / lit(*scale)
            }
            Self::Power { exponent: 0, .. } => lit(1.0),
            Self::Power { column, exponent } => (1..*exponent)
                .fold(col(column.as_str()), |acc, _| acc * col(column.as_str())),
            Self::Ratio {
                numerator,
                center,
                denominator,
                denominator_scale,
                denominator_offset,
            } => {
                (col(numerator.as_str()) - lit(*center))
                    / (col(denominator.as_str()) / lit(*denominator_scale)
                        + lit(*denominator_offset))
            }
            Self::AbsDeviation {
                column,
                center,
                multiplier,
                scale,
            } => {
                let deviation = (col(column.as_str()) - lit(*center)).abs();
                let scaled = match multiplier {
                    Some(m) => deviation * col(m.as_str()),
                    None => deviation,
                };
                scaled / lit(*scale)
            }
            Self::Mean { columns } => row_mean(columns),
            Self::Divergence {
                reference,
                measured,
            } => {
                let level = row_mean(reference);
                measured
                    .iter()
                    .map(|c| (col(c.as_str()) - level.clone()).abs())
                    .reduce(|acc, e| acc + e)
                    .unwrap_or_else(|| lit(0.0))
            }
        }
    }
}

/// A named derived feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeature {
    /// Output column name
    pub name: String,
    /// Formula producing the column
    #[serde(flatten)]
    pub formula: FeatureFormula,
}

impl DerivedFeature {
    fn new(name: &str, formula: FeatureFormula) -> Self {
        Self {
            name: name.to_string(),
            formula,
        }
    }
}

/// Ordered list of derived features for one horizon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecipe {
    /// Features, in output order
    pub features: Vec<DerivedFeature>,
}

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| (*c).to_string()).collect()
}

fn product(columns: &[&str], scale: f64) -> FeatureFormula {
    FeatureFormula::Product {
        columns: names(columns),
        scale,
    }
}

fn ratio(numerator: &str, center: f64, scale: f64, offset: f64) -> FeatureFormula {
    FeatureFormula::Ratio {
        numerator: numerator.to_string(),
        center,
        denominator: "volatility".to_string(),
        denominator_scale: scale,
        denominator_offset: offset,
    }
}

fn shock(column: &str) -> FeatureFormula {
    FeatureFormula::AbsDeviation {
        column: column.to_string(),
        center: 0.5,
        multiplier: Some("volatility".to_string()),
        scale: 100.0,
    }
}

fn power(column: &str, exponent: u32) -> FeatureFormula {
    FeatureFormula::Power {
        column: column.to_string(),
        exponent,
    }
}

impl FeatureRecipe {
    /// Built-in recipe for a horizon.
    pub fn builtin(horizon: Horizon) -> Self {
        match horizon {
            Horizon::OneWeek => Self::short_term(),
            Horizon::OneMonth => Self::medium_term(),
            Horizon::SixMonths => Self::long_term(),
        }
    }

    /// Momentum and shock terms for weekly forecasts.
    pub fn short_term() -> Self {
        Self {
            features: vec![
                DerivedFeature::new("short_term_momentum", product(&["technical", "sentiment"], 1.0)),
                DerivedFeature::new("sentiment_shock", shock("sentiment")),
                DerivedFeature::new("volatility_pressure", product(&["volatility", "technical"], 100.0)),
                DerivedFeature::new("risk_adjusted_technical", ratio("technical", 0.0, 20.0, 0.1)),
                DerivedFeature::new("macro_sensitivity", product(&["macro", "volatility"], 20.0)),
            ],
        }
    }

    /// Trend, reversion and risk-adjusted terms for monthly forecasts.
    pub fn medium_term() -> Self {
        Self {
            features: vec![
                DerivedFeature::new("trend_strength", product(&["technical", "fundamental"], 1.0)),
                DerivedFeature::new("mean_reversion", shock("sentiment")),
                DerivedFeature::new("momentum_fundamental", product(&["technical", "fundamental"], 1.0)),
                DerivedFeature::new("sentiment_momentum", product(&["sentiment", "technical"], 1.0)),
                DerivedFeature::new("macro_sensitivity", product(&["macro", "volatility"], 20.0)),
                DerivedFeature::new("esg_factor", product(&["esg", "fundamental"], 1.0)),
                DerivedFeature::new("risk_adjusted_return", ratio("fundamental", 0.0, 20.0, 0.1)),
                DerivedFeature::new("volatility_trend", product(&["volatility", "technical"], 100.0)),
            ],
        }
    }

    /// Interaction, polynomial and dispersion terms for six-month forecasts.
    pub fn long_term() -> Self {
        Self {
            features: vec![
                DerivedFeature::new("fund_tech_interaction", product(&["fundamental", "technical"], 1.0)),
                DerivedFeature::new("sent_macro_interaction", product(&["sentiment", "macro"], 1.0)),
                DerivedFeature::new("esg_fund_interaction", product(&["esg", "fundamental"], 1.0)),
                DerivedFeature::new("vol_tech_interaction", product(&["volatility", "technical"], 100.0)),
                DerivedFeature::new("fundamental_squared", power("fundamental", 2)),
                DerivedFeature::new("technical_squared", power("technical", 2)),
                DerivedFeature::new("sentiment_cubed", power("sentiment", 3)),
                DerivedFeature::new("risk_adjusted_fundamental", ratio("fundamental", 0.0, 20.0, 0.0)),
                DerivedFeature::new("risk_adjusted_technical", ratio("technical", 0.0, 20.0, 0.0)),
                DerivedFeature::new("sharpe_proxy", ratio("fundamental", 0.5, 100.0, 0.01)),
                DerivedFeature::new(
                    "factor_divergence",
                    FeatureFormula::Divergence {
                        reference: names(&["fundamental", "technical", "sentiment"]),
                        measured: names(&["fundamental", "technical"]),
                    },
                ),
                DerivedFeature::new("esg_momentum", product(&["esg", "sentiment", "macro"], 1.0)),
                DerivedFeature::new(
                    "institutional_appeal",
                    FeatureFormula::Mean {
                        columns: names(&["esg", "fundamental"]),
                    },
                ),
            ],
        }
    }

    /// Output column names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Base columns plus every column a formula reads, without duplicates.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut required: Vec<&str> = BASE_COLUMNS.to_vec();
        for column in self.features.iter().flat_map(|f| f.formula.columns()) {
            if !required.contains(&column) {
                required.push(column);
            }
        }
        required
    }
}

/// A fully populated frame of raw and derived features.
#[derive(Debug, Clone)]
pub struct EngineeredFeatureFrame {
    frame: DataFrame,
}

impl EngineeredFeatureFrame {
    /// The underlying frame.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Column names, in order.
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Copy the frame into a dense row-major matrix.
    pub fn to_array(&self) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((self.frame.height(), self.frame.width()));
        for (j, column) in self.frame.get_columns().iter().enumerate() {
            let values = column.f64()?;
            for (i, value) in values.into_iter().enumerate() {
                out[[i, j]] = value.unwrap_or(0.0);
            }
        }
        Ok(out)
    }
}

/// Stateless expander from raw factor columns to engineered features.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Append the recipe's derived columns to `x` and fill every gap.
    ///
    /// Output columns are the input columns followed by the derived ones in
    /// recipe order. Row count and order are unchanged.
    pub fn engineer(x: &DataFrame, recipe: &FeatureRecipe) -> Result<EngineeredFeatureFrame> {
        let available: Vec<String> = x
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let missing: Vec<&str> = recipe
            .required_columns()
            .into_iter()
            .filter(|c| !available.iter().any(|a| a == c))
            .collect();
        if !missing.is_empty() {
            return Err(TrainingError::Schema(format!(
                "missing required columns: {missing:?}"
            )));
        }

        let casts: Vec<Expr> = available
            .iter()
            .map(|name| col(name.as_str()).cast(DataType::Float64))
            .collect();
        let derived: Vec<Expr> = recipe
            .features
            .iter()
            .map(|f| f.formula.to_expr().alias(f.name.as_str()))
            .collect();
        let expanded = x
            .clone()
            .lazy()
            .with_columns(casts)
            .with_columns(derived)
            .collect()?;

        let columns = expanded
            .get_columns()
            .iter()
            .map(|column| {
                let values: Vec<Option<f64>> = column.f64()?.into_iter().collect();
                Ok(Column::new(column.name().clone(), fill_missing(&values)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EngineeredFeatureFrame {
            frame: DataFrame::new(columns)?,
        })
    }
}

/// Forward fill, then median fill, then zero fill one column.
///
/// Non-finite values count as missing.
pub fn fill_missing(values: &[Option<f64>]) -> Vec<f64> {
    let observed: Vec<f64> = values
        .iter()
        .filter_map(|v| v.filter(|x| x.is_finite()))
        .collect();
    let fallback = median(&observed).unwrap_or(0.0);

    let mut last = None;
    values
        .iter()
        .map(|v| {
            if let Some(x) = v.filter(|x| x.is_finite()) {
                last = Some(x);
            }
            last.unwrap_or(fallback)
        })
        .collect()
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use polars::df;

    fn raw_frame() -> DataFrame {
        df! {
            "fundamental" => [Some(0.6), Some(0.2), None, Some(0.8)],
            "technical" => [Some(0.5), Some(0.4), Some(0.9), Some(0.1)],
            "sentiment" => [Some(0.7), None, Some(0.3), Some(0.5)],
            "macro" => [Some(0.4), Some(0.6), Some(0.5), Some(0.2)],
            "esg" => [Some(0.5), Some(0.5), Some(0.6), Some(0.4)],
            "volatility" => [Some(20.0), Some(0.0), Some(30.0), Some(25.0)],
        }
        .unwrap()
    }

    fn column(frame: &EngineeredFeatureFrame, name: &str) -> Vec<f64> {
        frame
            .frame()
            .column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_fill_order() {
        let filled = fill_missing(&[None, Some(1.0), None, Some(f64::INFINITY), Some(5.0), None]);
        // leading gap takes the median of {1, 5}
        assert_eq!(filled, vec![3.0, 1.0, 1.0, 1.0, 5.0, 5.0]);
    }

    #[test]
    fn test_fill_empty_column_is_zero() {
        assert_eq!(fill_missing(&[None, Some(f64::NAN)]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_engineer_appends_recipe_columns() {
        let recipe = FeatureRecipe::medium_term();
        let frame = FeatureEngineer::engineer(&raw_frame(), &recipe).unwrap();

        let mut expected = BASE_COLUMNS.map(str::to_string).to_vec();
        expected.extend(recipe.names().into_iter().map(str::to_string));
        assert_eq!(frame.column_names(), expected);
        assert_eq!(frame.height(), 4);
        assert!(frame.frame().get_columns().iter().all(|c| c.null_count() == 0));
    }

    #[test]
    fn test_formulas_match_definitions() {
        let frame = FeatureEngineer::engineer(&raw_frame(), &FeatureRecipe::long_term()).unwrap();

        assert_relative_eq!(column(&frame, "fund_tech_interaction")[0], 0.3);
        assert_relative_eq!(column(&frame, "vol_tech_interaction")[0], 0.1);
        assert_relative_eq!(column(&frame, "sentiment_cubed")[0], 0.343, epsilon = 1e-12);
        assert_relative_eq!(column(&frame, "risk_adjusted_fundamental")[0], 0.6);
        assert_relative_eq!(column(&frame, "sharpe_proxy")[0], 0.1 / 0.21, epsilon = 1e-12);
        // mean(0.6, 0.5, 0.7) = 0.6
        assert_relative_eq!(column(&frame, "factor_divergence")[0], 0.1, epsilon = 1e-12);
        assert_relative_eq!(column(&frame, "institutional_appeal")[0], 0.55, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_denominator_is_filled() {
        let frame = FeatureEngineer::engineer(&raw_frame(), &FeatureRecipe::long_term()).unwrap();
        // row 1 has zero volatility, so the ratio is forward-filled from row 0
        let values = column(&frame, "risk_adjusted_technical");
        assert_relative_eq!(values[1], values[0]);
    }

    #[test]
    fn test_raw_gaps_are_filled() {
        let frame = FeatureEngineer::engineer(&raw_frame(), &FeatureRecipe::short_term()).unwrap();
        assert_relative_eq!(column(&frame, "fundamental")[2], 0.2);
        assert_relative_eq!(column(&frame, "sentiment")[1], 0.7);
    }

    #[test]
    fn test_engineer_is_deterministic() {
        let raw = raw_frame();
        for horizon in Horizon::ALL {
            let recipe = FeatureRecipe::builtin(horizon);
            let a = FeatureEngineer::engineer(&raw, &recipe).unwrap();
            let b = FeatureEngineer::engineer(&raw, &recipe).unwrap();
            assert!(a.frame().equals_missing(b.frame()));
        }
    }

    #[test]
    fn test_missing_base_column_is_schema_error() {
        let raw = raw_frame().drop("esg").unwrap();
        let err = FeatureEngineer::engineer(&raw, &FeatureRecipe::short_term()).unwrap_err();
        assert!(matches!(err, TrainingError::Schema(msg) if msg.contains("esg")));
    }

    #[test]
    fn test_recipe_loads_from_toml() {
        let text = r#"
[[features]]
name = "shock"
formula = "abs_deviation"
column = "sentiment"
center = 0.5
multiplier = "volatility"
scale = 100.0

[[features]]
name = "tf"
formula = "product"
columns = ["technical", "fundamental"]
"#;
        let recipe: FeatureRecipe = toml::from_str(text).unwrap();
        assert_eq!(recipe.names(), vec!["shock", "tf"]);
        assert_eq!(recipe.features[0].formula, shock("sentiment"));
        assert_eq!(recipe.features[1].formula, product(&["technical", "fundamental"], 1.0));
    }
}
