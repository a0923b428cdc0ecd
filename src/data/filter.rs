//! Column filtering: sensor-name pattern, missingness, numeric type

use crate::error::{LiftError, Result};
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Why a column left the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DropReason {
    /// Name does not match the sensor pattern
    NamePattern,
    /// Too few non-missing numeric values
    Sparse { non_missing_fraction: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedColumn {
    pub name: String,
    pub reason: DropReason,
}

/// Training table restricted to the outcome plus dense numeric sensor columns
#[derive(Debug, Clone)]
pub struct FilteredTable {
    /// Outcome column (String) followed by predictors (Float64)
    pub frame: DataFrame,
    pub outcome: String,
    pub predictors: Vec<String>,
    pub dropped: Vec<DroppedColumn>,
}

impl FilteredTable {
    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }
}

/// Keeps columns matching `pattern` whose non-missing share exceeds `min_non_missing`
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    pattern: Regex,
    min_non_missing: f64,
}

impl ColumnFilter {
    pub fn new(pattern: Regex, min_non_missing: f64) -> Self {
        Self {
            pattern,
            min_non_missing,
        }
    }

    /// Share of values that are present and numeric
    pub fn non_missing_fraction(column: &Column) -> Result<f64> {
        if column.is_empty() {
            return Ok(0.0);
        }
        let numeric = column.cast(&DataType::Float64)?;
        Ok((numeric.len() - numeric.null_count()) as f64 / numeric.len() as f64)
    }

    pub fn apply(&self, df: &DataFrame, outcome: &str) -> Result<FilteredTable> {
        let outcome_col = df
            .column(outcome)
            .map_err(|_| LiftError::ColumnNotFound(outcome.to_string()))?
            .cast(&DataType::String)?;

        let mut columns: Vec<Column> = vec![outcome_col];
        let mut predictors = Vec::new();
        let mut dropped = Vec::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == outcome {
                continue;
            }
            if !self.pattern.is_match(&name) {
                dropped.push(DroppedColumn {
                    name,
                    reason: DropReason::NamePattern,
                });
                continue;
            }

            let numeric = col.cast(&DataType::Float64)?;
            let fraction = Self::non_missing_fraction(&numeric)?;

            if fraction > self.min_non_missing {
                predictors.push(name);
                columns.push(numeric);
            } else {
                debug!(column = %name, non_missing = fraction, "Dropping sparse column");
                dropped.push(DroppedColumn {
                    name,
                    reason: DropReason::Sparse {
                        non_missing_fraction: fraction,
                    },
                });
            }
        }

        if predictors.is_empty() {
            return Err(LiftError::Validation(
                "no column survived the name and missingness filters".to_string(),
            ));
        }

        info!(
            kept = predictors.len(),
            dropped = dropped.len(),
            rows = df.height(),
            "Filtered training columns"
        );

        Ok(FilteredTable {
            frame: DataFrame::new(columns)?,
            outcome: outcome.to_string(),
            predictors,
            dropped,
        })
    }
}

/// Restrict a table to exactly `columns`, cast to Float64 and in the given order.
///
/// Every requested column must exist; the missing ones are reported together.
pub fn restrict_to(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let available: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !available.contains(c))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(LiftError::ColumnMismatch { missing });
    }

    let selected = columns
        .iter()
        .map(|name| -> Result<Column> { Ok(df.column(name)?.cast(&DataType::Float64)?) })
        .collect::<Result<Vec<Column>>>()?;

    Ok(DataFrame::new(selected)?)
}
