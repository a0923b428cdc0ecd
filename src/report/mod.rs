//! Study outputs: console tables, SVG charts and the JSON summary

pub mod console;
pub mod plots;

pub use plots::{accuracy_density, correlation_heatmap, gaussian_kde, silverman_bandwidth, AccuracySeries};

use crate::error::Result;
use crate::stats::FeatureCorrelation;
use crate::training::{
    CVResults, ConfusionMatrix, ModelComparison, ModelParams, ModelType, TuningCandidate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Predicted label for one quiz row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPrediction {
    pub id: String,
    pub label: String,
}

/// Everything recorded about one trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub model_type: ModelType,
    pub params: ModelParams,
    pub cv: CVResults,
    pub candidates: Vec<TuningCandidate>,
    pub oob_accuracy: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub training_time_secs: f64,
}

/// Machine-readable summary of a full run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyReport {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub training_rows: usize,
    pub training_columns: usize,
    pub filtered_predictors: Vec<String>,
    pub dropped_columns: usize,
    /// Correlation of every filtered predictor with the outcome
    pub correlations: Vec<FeatureCorrelation>,
    pub selected_features: Vec<String>,
    pub class_labels: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub imputed_values: usize,
    pub models: Vec<ModelReport>,
    pub comparison: ModelComparison,
    pub best_model: ModelType,
    pub quiz_predictions: Vec<QuizPrediction>,
}

impl StudyReport {
    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }
}
