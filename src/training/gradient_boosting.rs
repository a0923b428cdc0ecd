//! Stochastic gradient boosting for multi-class outcomes
//!
//! Multinomial deviance: one regression tree per class and stage, fitted to
//! the residual `1{y = k} - p_k` on a random half of the rows. Leaf values
//! take a single Newton step, `(K - 1) / K * sum(r) / sum(|r| (1 - |r|))`.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binning::{FeatureBins, MAX_BINS};
use super::decision_tree::{check_labels, check_rows, DecisionTree, Target};
use super::models::{argmax_rows, Classifier};
use crate::error::{LiftError, Result};
use crate::utils::in_worker_pool;

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (one tree per class each)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth (interaction depth)
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Share of rows drawn for each round
    pub subsample: f64,
    /// Bins per feature
    pub max_bins: usize,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 1,
            min_samples_leaf: 10,
            subsample: 0.5,
            max_bins: MAX_BINS,
            random_state: Some(42),
        }
    }
}

/// Multinomial gradient boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// One tree per class for every stage
    stages: Vec<Vec<DecisionTree>>,
    n_classes: usize,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            n_classes: 0,
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Stages fitted so far
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let sample_size = ((n as f64) * self.config.subsample).floor() as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size.max(1));
        indices.sort_unstable();
        indices
    }

    /// Raw scores after every stage listed in `checkpoints` (ascending stage counts)
    fn staged_scores(&self, x: &Array2<f64>, checkpoints: &[usize]) -> Result<Vec<Array2<f64>>> {
        if self.stages.is_empty() {
            return Err(LiftError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(LiftError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut scores = Array2::zeros((x.nrows(), self.n_classes));
        let mut snapshots = Vec::with_capacity(checkpoints.len());
        let mut next = checkpoints.iter().peekable();

        for (stage_idx, trees) in self.stages.iter().enumerate() {
            let updates: Vec<Array1<f64>> = if in_worker_pool() {
                trees.par_iter().map(|tree| tree.predict_values(x)).collect::<Result<_>>()?
            } else {
                trees.iter().map(|tree| tree.predict_values(x)).collect::<Result<_>>()?
            };
            for (k, update) in updates.iter().enumerate() {
                scores
                    .column_mut(k)
                    .scaled_add(self.config.learning_rate, update);
            }
            while next.peek().map_or(false, |&&c| c == stage_idx + 1) {
                snapshots.push(scores.clone());
                next.next();
            }
        }
        Ok(snapshots)
    }

    /// Predicted classes after each of `n_stages` (each at most the fitted stage count)
    pub fn staged_predict(&self, x: &Array2<f64>, n_stages: &[usize]) -> Result<Vec<Array1<usize>>> {
        let mut checkpoints: Vec<usize> = n_stages.to_vec();
        checkpoints.sort_unstable();
        checkpoints.dedup();
        if let Some(&c) = checkpoints.iter().find(|&&c| c == 0 || c > self.stages.len()) {
            return Err(LiftError::Validation(format!(
                "stage {} outside 1..={}",
                c,
                self.stages.len()
            )));
        }

        let snapshots = self.staged_scores(x, &checkpoints)?;
        Ok(n_stages
            .iter()
            .map(|n| {
                let pos = checkpoints.partition_point(|c| c < n);
                argmax_rows(&snapshots[pos])
            })
            .collect())
    }

    fn scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut snapshots = self.staged_scores(x, &[self.stages.len()])?;
        snapshots.pop().ok_or(LiftError::ModelNotFitted)
    }
}

/// Row-wise softmax
fn softmax(scores: &Array2<f64>) -> Array2<f64> {
    let mut proba = scores.clone();
    for mut row in proba.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    proba
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        check_rows(x, y.len())?;
        check_labels(y, n_classes)?;
        if self.config.n_estimators == 0 {
            return Err(LiftError::Training("boosting needs at least one stage".to_string()));
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.n_classes = n_classes;
        self.stages.clear();
        self.feature_importances = vec![0.0; self.n_features];

        let bins = FeatureBins::fit(x, self.config.max_bins);
        let binned = bins.transform(x);

        let seed = self.config.random_state.unwrap_or(42);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut scores = Array2::<f64>::zeros((n_samples, n_classes));
        let factor = (n_classes as f64 - 1.0) / n_classes as f64;

        for stage in 0..self.config.n_estimators {
            let proba = softmax(&scores);
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let fitted: Vec<(DecisionTree, Array1<f64>)> = (0..n_classes)
                .into_par_iter()
                .map(|k| -> Result<(DecisionTree, Array1<f64>)> {
                    let residuals: Vec<f64> = (0..n_samples)
                        .map(|i| f64::from(u8::from(y[i] == k)) - proba[[i, k]])
                        .collect();

                    let mut tree = DecisionTree::new_regressor()
                        .with_max_depth(self.config.max_depth)
                        .with_min_samples_leaf(self.config.min_samples_leaf);
                    let mut tree_rng =
                        ChaCha8Rng::seed_from_u64(seed.wrapping_add((stage * n_classes + k) as u64));
                    tree.fit_rows(&binned, &bins, Target::Values(&residuals), &sample_indices, &mut tree_rng)?;

                    tree.refit_leaves(&binned, &sample_indices, |rows| {
                        let num: f64 = rows.iter().map(|&i| residuals[i]).sum();
                        let den: f64 = rows
                            .iter()
                            .map(|&i| residuals[i].abs() * (1.0 - residuals[i].abs()))
                            .sum();
                        if den < 1e-12 {
                            0.0
                        } else {
                            factor * num / den
                        }
                    })?;

                    let update: Array1<f64> = (0..n_samples)
                        .map(|i| tree.predict_binned(&binned, i))
                        .collect::<Result<_>>()?;
                    Ok((tree, update))
                })
                .collect::<Result<_>>()?;

            let mut trees = Vec::with_capacity(n_classes);
            for (k, (tree, update)) in fitted.into_iter().enumerate() {
                scores
                    .column_mut(k)
                    .scaled_add(self.config.learning_rate, &update);
                if let Some(imp) = tree.feature_importances() {
                    for (j, &v) in imp.iter().enumerate() {
                        self.feature_importances[j] += v;
                    }
                }
                trees.push(tree);
            }
            self.stages.push(trees);
        }

        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        debug!(
            stages = self.stages.len(),
            depth = self.config.max_depth,
            "Fitted gradient boosting"
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.scores(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax(&self.scores(x)?))
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.feature_importances.is_empty() {
            None
        } else {
            Some(Array1::from_vec(self.feature_importances.clone()))
        }
    }

    fn name(&self) -> &'static str {
        "gbm"
    }
}
