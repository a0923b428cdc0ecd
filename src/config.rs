//! Study configuration
//!
//! Every threshold of the analysis lives here with its default value. A TOML
//! file may override any subset of fields; missing fields keep the defaults.

use crate::error::{LiftError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the training table
pub const TRAINING_URL: &str =
    "https://d396qusza40orc.cloudfront.net/predmachlearn/pml-training.csv";

/// Default location of the quiz table
pub const QUIZ_URL: &str =
    "https://d396qusza40orc.cloudfront.net/predmachlearn/pml-testing.csv";

/// Column filtering applied before correlation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Regex a predictor name must match
    pub column_pattern: String,
    /// Minimum share of non-missing values (strict)
    pub min_non_missing: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            column_pattern: "belt|arm|dumbbell|forearm".to_string(),
            min_non_missing: 0.9,
        }
    }
}

/// Correlation thresholds for feature selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum absolute correlation with the outcome (strict)
    pub min_abs_correlation: f64,
    /// Maximum p-value of the correlation test (strict)
    pub max_p_value: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_abs_correlation: 0.05,
            max_p_value: 0.05,
        }
    }
}

/// Train/test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of each class assigned to the training partition
    pub train_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { train_fraction: 0.75 }
    }
}

/// Cross-validation shared by all three models
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub n_folds: usize,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self { n_folds: 10 }
    }
}

/// Random forest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestParams {
    pub n_trees: usize,
    /// Candidate `mtry` values; empty means the default three-point grid
    pub mtry_grid: Vec<usize>,
    pub min_samples_leaf: usize,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            mtry_grid: Vec::new(),
            min_samples_leaf: 1,
        }
    }
}

impl RandomForestParams {
    /// Resolve the mtry grid for `n_features` predictors
    pub fn resolve_mtry_grid(&self, n_features: usize) -> Vec<usize> {
        let n = n_features.max(1);
        let raw = if self.mtry_grid.is_empty() {
            vec![2, (2 + n) / 2, n]
        } else {
            self.mtry_grid.clone()
        };
        let mut grid: Vec<usize> = raw.into_iter().map(|m| m.clamp(1, n)).collect();
        grid.sort_unstable();
        grid.dedup();
        grid
    }
}

/// Stochastic gradient boosting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub depth_grid: Vec<usize>,
    pub n_trees_grid: Vec<usize>,
    pub learning_rate: f64,
    pub bag_fraction: f64,
    pub min_samples_leaf: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            depth_grid: vec![1, 2, 3],
            n_trees_grid: vec![50, 100, 150],
            learning_rate: 0.1,
            bag_fraction: 0.5,
            min_samples_leaf: 10,
        }
    }
}

/// Bagged CART settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaggingParams {
    pub n_bags: usize,
}

impl Default for BaggingParams {
    fn default() -> Self {
        Self { n_bags: 25 }
    }
}

/// Report output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub plots: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("report"),
            plots: true,
        }
    }
}

/// Complete study configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Training table location (URL or local path)
    pub training_source: String,
    /// Quiz table location (URL or local path)
    pub quiz_source: String,
    /// Outcome column
    pub outcome: String,
    /// Identifier column carried through to the quiz predictions
    pub quiz_id_column: String,
    /// Seed for partitioning, folds and models
    pub seed: u64,
    /// Worker threads (None = available cores minus one)
    pub n_workers: Option<usize>,
    pub filter: FilterConfig,
    pub selection: SelectionConfig,
    pub split: SplitConfig,
    pub cv: CvConfig,
    pub random_forest: RandomForestParams,
    pub boosting: BoostingParams,
    pub bagging: BaggingParams,
    pub output: OutputConfig,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            training_source: TRAINING_URL.to_string(),
            quiz_source: QUIZ_URL.to_string(),
            outcome: "classe".to_string(),
            quiz_id_column: "problem_id".to_string(),
            seed: 12345,
            n_workers: None,
            filter: FilterConfig::default(),
            selection: SelectionConfig::default(),
            split: SplitConfig::default(),
            cv: CvConfig::default(),
            random_forest: RandomForestParams::default(),
            boosting: BoostingParams::default(),
            bagging: BaggingParams::default(),
            output: OutputConfig::default(),
        }
    }
}

impl StudyConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML file on top of the defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_training_source(mut self, source: impl Into<String>) -> Self {
        self.training_source = source.into();
        self
    }

    pub fn with_quiz_source(mut self, source: impl Into<String>) -> Self {
        self.quiz_source = source.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.directory = dir.into();
        self
    }

    pub fn with_plots(mut self, plots: bool) -> Self {
        self.output.plots = plots;
        self
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.n_workers = Some(n);
        self
    }

    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.cv.n_folds = n_folds;
        self
    }

    /// Compiled column pattern
    pub fn column_regex(&self) -> Result<Regex> {
        Regex::new(&self.filter.column_pattern)
            .map_err(|e| LiftError::Config(format!("column_pattern: {}", e)))
    }

    /// Reject values the study cannot run with
    pub fn validate(&self) -> Result<()> {
        fn fraction(name: &str, v: f64) -> Result<()> {
            if v > 0.0 && v < 1.0 {
                Ok(())
            } else {
                Err(LiftError::Config(format!("{} must be in (0, 1), got {}", name, v)))
            }
        }

        fraction("filter.min_non_missing", self.filter.min_non_missing)?;
        fraction("selection.max_p_value", self.selection.max_p_value)?;
        fraction("split.train_fraction", self.split.train_fraction)?;
        fraction("boosting.bag_fraction", self.boosting.bag_fraction)?;
        if !(0.0..1.0).contains(&self.selection.min_abs_correlation) {
            return Err(LiftError::Config(format!(
                "selection.min_abs_correlation must be in [0, 1), got {}",
                self.selection.min_abs_correlation
            )));
        }
        if self.cv.n_folds < 2 {
            return Err(LiftError::Config("cv.n_folds must be at least 2".to_string()));
        }
        if self.random_forest.n_trees == 0 || self.bagging.n_bags == 0 {
            return Err(LiftError::Config("ensembles need at least one tree".to_string()));
        }
        if self.boosting.depth_grid.is_empty() || self.boosting.n_trees_grid.is_empty() {
            return Err(LiftError::Config("boosting grids must not be empty".to_string()));
        }
        if self.boosting.depth_grid.contains(&0) || self.boosting.n_trees_grid.contains(&0) {
            return Err(LiftError::Config("boosting grids must be positive".to_string()));
        }
        if self.boosting.learning_rate <= 0.0 {
            return Err(LiftError::Config("boosting.learning_rate must be positive".to_string()));
        }
        if self.n_workers == Some(0) {
            return Err(LiftError::Config("n_workers must be positive".to_string()));
        }
        self.column_regex()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_study_parameters() {
        let config = StudyConfig::default();
        assert_eq!(config.filter.min_non_missing, 0.9);
        assert_eq!(config.selection.min_abs_correlation, 0.05);
        assert_eq!(config.selection.max_p_value, 0.05);
        assert_eq!(config.split.train_fraction, 0.75);
        assert_eq!(config.cv.n_folds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StudyConfig::from_toml_str(
            r#"
            seed = 7

            [cv]
            n_folds = 5

            [random_forest]
            n_trees = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.cv.n_folds, 5);
        assert_eq!(config.random_forest.n_trees, 20);
        assert_eq!(config.bagging.n_bags, 25);
        assert_eq!(config.outcome, "classe");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = StudyConfig::default().with_folds(1);
        assert!(config.validate().is_err());

        let mut config = StudyConfig::default();
        config.split.train_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = StudyConfig::default();
        config.filter.column_pattern = "(".to_string();
        assert!(matches!(config.validate(), Err(LiftError::Config(_))));
    }

    #[test]
    fn test_mtry_grid() {
        let params = RandomForestParams::default();
        assert_eq!(params.resolve_mtry_grid(52), vec![2, 27, 52]);
        assert_eq!(params.resolve_mtry_grid(2), vec![2]);
        assert_eq!(params.resolve_mtry_grid(1), vec![1]);

        let custom = RandomForestParams {
            mtry_grid: vec![10, 3, 3],
            ..Default::default()
        };
        assert_eq!(custom.resolve_mtry_grid(5), vec![3, 5]);
    }
}
