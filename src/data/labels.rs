//! Outcome label encoding

use crate::error::{LiftError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted set of outcome labels; a label's index is its class id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    /// Collect the distinct labels of an outcome column
    pub fn fit(column: &Column) -> Result<Self> {
        let values = Self::string_values(column)?;
        let names: BTreeSet<String> = values.into_iter().collect();
        if names.len() < 2 {
            return Err(LiftError::Validation(format!(
                "outcome '{}' needs at least two classes, found {}",
                column.name(),
                names.len()
            )));
        }
        Ok(Self {
            names: names.into_iter().collect(),
        })
    }

    pub fn from_names(mut names: Vec<String>) -> Self {
        names.sort();
        names.dedup();
        Self { names }
    }

    /// Map each row's label to its class id
    pub fn encode(&self, column: &Column) -> Result<Array1<usize>> {
        Self::string_values(column)?
            .into_iter()
            .map(|label| {
                self.index_of(&label).ok_or_else(|| {
                    LiftError::Validation(format!("unknown outcome label '{}'", label))
                })
            })
            .collect()
    }

    /// Numeric outcome code used for correlation (1-based, like a factor's level number)
    pub fn codes(&self, classes: &Array1<usize>) -> Array1<f64> {
        classes.mapv(|c| (c + 1) as f64)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(label)).ok()
    }

    pub fn name(&self, class: usize) -> &str {
        self.names.get(class).map(String::as_str).unwrap_or("?")
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn string_values(column: &Column) -> Result<Vec<String>> {
        let as_str = column.cast(&DataType::String)?;
        let ca = as_str.as_materialized_series().str()?;
        ca.into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.map(str::to_string).ok_or_else(|| {
                    LiftError::Validation(format!(
                        "outcome '{}' is missing at row {}",
                        column.name(),
                        row
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> Column {
        Column::new("classe".into(), &["B", "A", "E", "A", "C"])
    }

    #[test]
    fn test_fit_sorts_labels() {
        let labels = ClassLabels::fit(&outcome()).unwrap();
        assert_eq!(labels.names(), &["A", "B", "C", "E"]);
        assert_eq!(labels.index_of("C"), Some(2));
        assert_eq!(labels.name(3), "E");
    }

    #[test]
    fn test_encode_and_codes() {
        let labels = ClassLabels::fit(&outcome()).unwrap();
        let classes = labels.encode(&outcome()).unwrap();
        assert_eq!(classes.to_vec(), vec![1, 0, 3, 0, 2]);
        assert_eq!(labels.codes(&classes).to_vec(), vec![2.0, 1.0, 4.0, 1.0, 3.0]);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let labels = ClassLabels::from_names(vec!["A".into(), "B".into()]);
        let other = Column::new("classe".into(), &["A", "Z"]);
        assert!(labels.encode(&other).is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let single = Column::new("classe".into(), &["A", "A"]);
        assert!(ClassLabels::fit(&single).is_err());
    }
}
