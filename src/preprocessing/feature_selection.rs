//! Correlation-based feature selection
//!
//! A predictor is kept when its correlation test against the outcome code is
//! both significant (p below the cutoff) and large enough (|r| above the
//! cutoff). Both comparisons are strict; an undefined correlation fails both.

use crate::config::SelectionConfig;
use crate::error::{LiftError, Result};
use crate::stats::{CorrelationMatrix, FeatureCorrelation};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Feature selector over a correlation matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationSelector {
    min_abs_correlation: f64,
    max_p_value: f64,
    correlations: Option<Vec<FeatureCorrelation>>,
    selected_features: Option<Vec<usize>>,
}

impl CorrelationSelector {
    pub fn new(min_abs_correlation: f64, max_p_value: f64) -> Self {
        Self {
            min_abs_correlation,
            max_p_value,
            correlations: None,
            selected_features: None,
        }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.min_abs_correlation, config.max_p_value)
    }

    /// Whether one correlation passes both thresholds
    pub fn passes(&self, c: &FeatureCorrelation) -> bool {
        c.p_value < self.max_p_value && c.r.abs() > self.min_abs_correlation
    }

    /// Fit against the `outcome` column of a correlation matrix
    pub fn fit(&mut self, matrix: &CorrelationMatrix, outcome: &str) -> Result<()> {
        let correlations = matrix.against(outcome)?;
        let selected: Vec<usize> = correlations
            .iter()
            .enumerate()
            .filter(|(_, c)| self.passes(c))
            .map(|(i, _)| i)
            .collect();

        for c in correlations.iter().filter(|c| !self.passes(c)) {
            debug!(feature = %c.name, r = c.r, p = c.p_value, "Feature below correlation thresholds");
        }

        if selected.is_empty() {
            return Err(LiftError::NoFeaturesSelected);
        }

        info!(
            candidates = correlations.len(),
            selected = selected.len(),
            "Selected features by outcome correlation"
        );

        self.correlations = Some(correlations);
        self.selected_features = Some(selected);
        Ok(())
    }

    /// Outcome column followed by the selected predictors
    pub fn transform_frame(&self, df: &DataFrame, outcome: &str) -> Result<DataFrame> {
        let names = self.selected_names().ok_or(LiftError::ModelNotFitted)?;
        let mut columns = Vec::with_capacity(names.len() + 1);
        columns.push(
            df.column(outcome)
                .map_err(|_| LiftError::ColumnNotFound(outcome.to_string()))?
                .clone(),
        );
        for name in &names {
            columns.push(
                df.column(name)
                    .map_err(|_| LiftError::ColumnNotFound(name.clone()))?
                    .clone(),
            );
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    pub fn selected_names(&self) -> Option<Vec<String>> {
        let selected = self.selected_features.as_ref()?;
        let correlations = self.correlations.as_ref()?;
        Some(selected.iter().map(|&i| correlations[i].name.clone()).collect())
    }

    /// Every candidate's correlation with the outcome, in candidate order
    pub fn correlations(&self) -> Option<&[FeatureCorrelation]> {
        self.correlations.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn matrix() -> CorrelationMatrix {
        // strong, anti, noise, outcome
        let outcome: Array1<f64> = (0..40).map(|i| (i % 4 + 1) as f64).collect();
        let mut data = Array2::zeros((40, 4));
        for i in 0..40 {
            let y = outcome[i];
            data[[i, 0]] = y * 2.0 + ((i * 7) % 3) as f64 * 0.1;
            data[[i, 1]] = -y + ((i * 5) % 2) as f64 * 0.2;
            data[[i, 2]] = if (i / 4) % 2 == 0 { 1.0 } else { -1.0 };
            data[[i, 3]] = y;
        }
        let names = ["strong", "anti", "noise", "classe"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        CorrelationMatrix::compute(&data, names).unwrap()
    }

    #[test]
    fn test_selected_features_pass_thresholds() {
        let m = matrix();
        let mut selector = CorrelationSelector::new(0.05, 0.05);
        selector.fit(&m, "classe").unwrap();

        assert_eq!(
            selector.selected_names().unwrap(),
            vec!["strong".to_string(), "anti".to_string()]
        );
        let correlations = selector.correlations().unwrap();
        for &i in selector.selected_indices().unwrap() {
            assert!(correlations[i].p_value < 0.05);
            assert!(correlations[i].r.abs() > 0.05);
        }
    }

    #[test]
    fn test_nothing_selected_is_an_error() {
        let m = matrix();
        let mut selector = CorrelationSelector::new(0.9999, 0.05);
        assert!(matches!(
            selector.fit(&m, "classe"),
            Err(LiftError::NoFeaturesSelected)
        ));
    }

    #[test]
    fn test_transform_frame_keeps_outcome_first() {
        let m = matrix();
        let mut selector = CorrelationSelector::new(0.05, 0.05);
        selector.fit(&m, "classe").unwrap();

        let df = df!(
            "classe" => &["A", "B"],
            "strong" => &[1.0, 2.0],
            "anti" => &[3.0, 4.0],
            "noise" => &[5.0, 6.0]
        )
        .unwrap();
        let out = selector.transform_frame(&df, "classe").unwrap();
        let names: Vec<String> = out.get_column_names().into_iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["classe", "strong", "anti"]);
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_unfitted() {
        let selector = CorrelationSelector::new(0.05, 0.05);
        let df = df!("classe" => &["A"]).unwrap();
        assert!(matches!(
            selector.transform_frame(&df, "classe"),
            Err(LiftError::ModelNotFitted)
        ));
    }
}
