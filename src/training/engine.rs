//! Training engine: tuning by cross-validation, final refit, held-out evaluation

use super::bagging::BaggedTrees;
use super::cross_validation::{cross_validate, fold_data, CVResults, CVSplit};
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::metrics::ConfusionMatrix;
use super::models::{accuracy, Classifier};
use super::random_forest::{MaxFeatures, RandomForest};
use crate::config::{BaggingParams, BoostingParams, RandomForestParams, StudyConfig};
use crate::error::{LiftError, Result};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// The three compared methods, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    RandomForest,
    GradientBoosting,
    BaggedTrees,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [
        ModelType::RandomForest,
        ModelType::GradientBoosting,
        ModelType::BaggedTrees,
    ];

    /// Short method code
    pub fn method(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "rf",
            ModelType::GradientBoosting => "gbm",
            ModelType::BaggedTrees => "treebag",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "Random forest",
            ModelType::GradientBoosting => "Stochastic gradient boosting",
            ModelType::BaggedTrees => "Bagged CART",
        }
    }

    fn seed_offset(&self) -> u64 {
        match self {
            ModelType::RandomForest => 0,
            ModelType::GradientBoosting => 1_000_000,
            ModelType::BaggedTrees => 2_000_000,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method())
    }
}

/// Hyperparameters of one tuning candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelParams {
    RandomForest {
        n_trees: usize,
        mtry: usize,
    },
    GradientBoosting {
        n_trees: usize,
        interaction_depth: usize,
        shrinkage: f64,
        bag_fraction: f64,
        min_samples_leaf: usize,
    },
    BaggedTrees {
        n_bags: usize,
    },
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelParams::RandomForest { n_trees, mtry } => {
                write!(f, "mtry = {}, trees = {}", mtry, n_trees)
            }
            ModelParams::GradientBoosting {
                n_trees,
                interaction_depth,
                shrinkage,
                ..
            } => write!(
                f,
                "interaction.depth = {}, n.trees = {}, shrinkage = {}",
                interaction_depth, n_trees, shrinkage
            ),
            ModelParams::BaggedTrees { n_bags } => write!(f, "bags = {}", n_bags),
        }
    }
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningCandidate {
    pub params: ModelParams,
    pub cv: CVResults,
}

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    BaggedTrees(BaggedTrees),
}

impl TrainedModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            TrainedModel::RandomForest(_) => ModelType::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelType::GradientBoosting,
            TrainedModel::BaggedTrees(_) => ModelType::BaggedTrees,
        }
    }

    fn classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::BaggedTrees(m) => m,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.classifier().predict(x)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.classifier().predict_proba(x)
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        self.classifier().feature_importances()
    }

    /// Out-of-bag accuracy for the bootstrap ensembles
    pub fn oob_accuracy(&self) -> Option<f64> {
        match self {
            TrainedModel::RandomForest(m) => m.oob_score_value(),
            TrainedModel::BaggedTrees(m) => m.oob_score_value(),
            TrainedModel::GradientBoosting(_) => None,
        }
    }
}

/// A tuned and refitted model with its cross-validation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub model: TrainedModel,
    /// Chosen candidate
    pub params: ModelParams,
    /// Fold accuracies of the chosen candidate
    pub cv: CVResults,
    pub candidates: Vec<TuningCandidate>,
    pub training_time_secs: f64,
}

impl TrainingRun {
    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }
}

/// Predictions on the held-out partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    /// Rows of the full table that were scored
    pub test_indices: Vec<usize>,
    pub predictions: Array1<usize>,
}

/// Model comparison entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model_type: ModelType,
    pub params: String,
    pub cv_mean_accuracy: f64,
    pub cv_std_accuracy: f64,
    pub test_accuracy: f64,
    pub out_of_sample_error: f64,
    pub training_time_secs: f64,
}

/// Side-by-side results of the trained models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub rows: Vec<ComparisonRow>,
    best: usize,
}

impl ModelComparison {
    pub fn new(results: &[(TrainingRun, Evaluation)]) -> Result<Self> {
        if results.is_empty() {
            return Err(LiftError::Training("no models to compare".to_string()));
        }

        let rows: Vec<ComparisonRow> = results
            .iter()
            .map(|(run, eval)| ComparisonRow {
                model_type: run.model_type(),
                params: run.params.to_string(),
                cv_mean_accuracy: run.cv.mean_score,
                cv_std_accuracy: run.cv.std_score,
                test_accuracy: eval.confusion.accuracy,
                out_of_sample_error: eval.confusion.error_rate(),
                training_time_secs: run.training_time_secs,
            })
            .collect();

        // Highest test accuracy, then highest CV mean, then the earlier model
        let mut best = 0;
        for (i, row) in rows.iter().enumerate().skip(1) {
            let current = &rows[best];
            if row.test_accuracy > current.test_accuracy
                || (row.test_accuracy == current.test_accuracy
                    && row.cv_mean_accuracy > current.cv_mean_accuracy)
            {
                best = i;
            }
        }

        Ok(Self { rows, best })
    }

    /// Index of the best row
    pub fn best_index(&self) -> usize {
        self.best
    }

    pub fn best(&self) -> &ComparisonRow {
        &self.rows[self.best]
    }
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    random_forest: RandomForestParams,
    boosting: BoostingParams,
    bagging: BaggingParams,
    seed: u64,
    n_classes: usize,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: &StudyConfig, n_classes: usize) -> Self {
        Self {
            random_forest: config.random_forest.clone(),
            boosting: config.boosting.clone(),
            bagging: config.bagging.clone(),
            seed: config.seed,
            n_classes,
        }
    }

    fn fold_seed(&self, model_type: ModelType, fold_idx: usize) -> u64 {
        self.seed
            .wrapping_add(model_type.seed_offset())
            .wrapping_add(1_000 * (fold_idx as u64 + 1))
    }

    /// Tune `model_type` on the shared folds and refit the best candidate on all of `x`
    pub fn train(
        &self,
        model_type: ModelType,
        x: &Array2<f64>,
        y: &Array1<usize>,
        splits: &[CVSplit],
    ) -> Result<TrainingRun> {
        if splits.is_empty() {
            return Err(LiftError::Training("no cross-validation folds".to_string()));
        }
        let start = Instant::now();
        info!(model = %model_type, rows = x.nrows(), features = x.ncols(), "Training model");

        let candidates = match model_type {
            ModelType::RandomForest => self.tune_random_forest(x, y, splits)?,
            ModelType::GradientBoosting => self.tune_boosting(x, y, splits)?,
            ModelType::BaggedTrees => self.tune_bagging(x, y, splits)?,
        };

        // Ties keep the earlier candidate
        let mut best = 0;
        for (i, c) in candidates.iter().enumerate() {
            debug!(model = %model_type, params = %c.params, cv_accuracy = c.cv.mean_score, "Candidate");
            if c.cv.mean_score > candidates[best].cv.mean_score {
                best = i;
            }
        }
        let chosen = candidates[best].clone();

        let model = self.fit_final(&chosen.params, x, y)?;
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            model = %model_type,
            params = %chosen.params,
            cv_accuracy = chosen.cv.mean_score,
            secs = training_time_secs,
            "Selected tuning candidate"
        );

        Ok(TrainingRun {
            model,
            params: chosen.params,
            cv: chosen.cv,
            candidates,
            training_time_secs,
        })
    }

    fn tune_random_forest(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        splits: &[CVSplit],
    ) -> Result<Vec<TuningCandidate>> {
        let params = &self.random_forest;
        params
            .resolve_mtry_grid(x.ncols())
            .into_iter()
            .map(|mtry| -> Result<TuningCandidate> {
                let cv = cross_validate(x, y, self.n_classes, splits, |fold| {
                    RandomForest::new(params.n_trees)
                        .with_max_features(MaxFeatures::Fixed(mtry))
                        .with_min_samples_leaf(params.min_samples_leaf)
                        .with_random_state(self.fold_seed(ModelType::RandomForest, fold))
                })?;
                Ok(TuningCandidate {
                    params: ModelParams::RandomForest {
                        n_trees: params.n_trees,
                        mtry,
                    },
                    cv,
                })
            })
            .collect()
    }

    fn boosting_config(&self, depth: usize, n_trees: usize, seed: u64) -> GradientBoostingConfig {
        GradientBoostingConfig {
            n_estimators: n_trees,
            learning_rate: self.boosting.learning_rate,
            max_depth: depth,
            min_samples_leaf: self.boosting.min_samples_leaf,
            subsample: self.boosting.bag_fraction,
            random_state: Some(seed),
            ..Default::default()
        }
    }

    /// One fit per depth and fold covers every tree count through staged prediction
    fn tune_boosting(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        splits: &[CVSplit],
    ) -> Result<Vec<TuningCandidate>> {
        let mut depths = self.boosting.depth_grid.clone();
        depths.sort_unstable();
        depths.dedup();
        let mut tree_counts = self.boosting.n_trees_grid.clone();
        tree_counts.sort_unstable();
        tree_counts.dedup();
        let max_trees = tree_counts.last().copied().unwrap_or(0);

        let mut candidates = Vec::with_capacity(depths.len() * tree_counts.len());
        for &depth in &depths {
            // fold -> accuracy per tree count
            let fold_scores: Vec<Vec<f64>> = splits
                .par_iter()
                .map(|split| -> Result<Vec<f64>> {
                    let (x_train, y_train, x_test, y_test) = fold_data(x, y, split);
                    let seed = self.fold_seed(ModelType::GradientBoosting, split.fold_idx);
                    let mut model =
                        GradientBoostingClassifier::new(self.boosting_config(depth, max_trees, seed));
                    model.fit(&x_train, &y_train, self.n_classes)?;
                    let staged = model.staged_predict(&x_test, &tree_counts)?;
                    Ok(staged.iter().map(|pred| accuracy(&y_test, pred)).collect())
                })
                .collect::<Result<_>>()?;

            for (t, &n_trees) in tree_counts.iter().enumerate() {
                let scores = fold_scores.iter().map(|s| s[t]).collect();
                candidates.push(TuningCandidate {
                    params: ModelParams::GradientBoosting {
                        n_trees,
                        interaction_depth: depth,
                        shrinkage: self.boosting.learning_rate,
                        bag_fraction: self.boosting.bag_fraction,
                        min_samples_leaf: self.boosting.min_samples_leaf,
                    },
                    cv: CVResults::from_scores(scores),
                });
            }
        }
        Ok(candidates)
    }

    fn tune_bagging(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        splits: &[CVSplit],
    ) -> Result<Vec<TuningCandidate>> {
        let n_bags = self.bagging.n_bags;
        let cv = cross_validate(x, y, self.n_classes, splits, |fold| {
            BaggedTrees::new(n_bags).with_random_state(self.fold_seed(ModelType::BaggedTrees, fold))
        })?;
        Ok(vec![TuningCandidate {
            params: ModelParams::BaggedTrees { n_bags },
            cv,
        }])
    }

    fn fit_final(&self, params: &ModelParams, x: &Array2<f64>, y: &Array1<usize>) -> Result<TrainedModel> {
        Ok(match params {
            ModelParams::RandomForest { n_trees, mtry } => {
                let mut model = RandomForest::new(*n_trees)
                    .with_max_features(MaxFeatures::Fixed(*mtry))
                    .with_min_samples_leaf(self.random_forest.min_samples_leaf)
                    .with_random_state(self.seed);
                model.fit(x, y, self.n_classes)?;
                TrainedModel::RandomForest(model)
            }
            ModelParams::GradientBoosting {
                n_trees,
                interaction_depth,
                ..
            } => {
                let mut model = GradientBoostingClassifier::new(self.boosting_config(
                    *interaction_depth,
                    *n_trees,
                    self.seed,
                ));
                model.fit(x, y, self.n_classes)?;
                TrainedModel::GradientBoosting(model)
            }
            ModelParams::BaggedTrees { n_bags } => {
                let mut model = BaggedTrees::new(*n_bags).with_random_state(self.seed);
                model.fit(x, y, self.n_classes)?;
                TrainedModel::BaggedTrees(model)
            }
        })
    }

    /// Score `run` on the held-out rows `test_indices` of the full table
    pub fn evaluate(
        &self,
        run: &TrainingRun,
        x: &Array2<f64>,
        y: &Array1<usize>,
        test_indices: &[usize],
        labels: &[String],
    ) -> Result<Evaluation> {
        if let Some(&bad) = test_indices.iter().find(|&&i| i >= x.nrows()) {
            return Err(LiftError::Validation(format!(
                "test row {} outside table of {} rows",
                bad,
                x.nrows()
            )));
        }
        let x_test = x.select(Axis(0), test_indices);
        let y_test = y.select(Axis(0), test_indices);
        let predictions = run.model.predict(&x_test)?;
        let confusion = ConfusionMatrix::new(&y_test, &predictions, labels)?;

        info!(
            model = %run.model_type(),
            accuracy = confusion.accuracy,
            kappa = confusion.kappa,
            rows = test_indices.len(),
            "Evaluated on test partition"
        );

        Ok(Evaluation {
            confusion,
            test_indices: test_indices.to_vec(),
            predictions,
        })
    }
}
