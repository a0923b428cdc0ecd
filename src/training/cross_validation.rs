//! Cross-validation splits and fold evaluation

use super::models::{accuracy, Classifier};
use crate::error::{LiftError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold {
            n_splits: 10,
            shuffle: true,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits over `0..n_samples`
    pub fn split(&self, n_samples: usize, y: Option<&Array1<usize>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    LiftError::Validation("StratifiedKFold requires target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(LiftError::ShapeError {
                        expected: format!("y length = {}", n_samples),
                        actual: format!("y length = {}", y.len()),
                    });
                }
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn check(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(LiftError::Validation("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(LiftError::Validation(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn stratified_k_fold_split(
        &self,
        y: &Array1<usize>,
        n_splits: usize,
        shuffle: bool,
    ) -> Result<Vec<CVSplit>> {
        Self::check(y.len(), n_splits)?;

        // Group samples by class, in class order
        let mut class_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &class) in y.iter().enumerate() {
            class_indices.entry(class).or_default().push(idx);
        }

        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in class_indices.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[(offset + i) % n_splits].push(idx);
            }
            offset += indices.len();
        }

        Ok(Self::splits_from_folds(folds))
    }

    fn splits_from_folds(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Sample standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let std_score = if n_folds > 1 {
            let variance =
                scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / (n_folds - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            scores,
            mean_score,
            std_score,
            n_folds,
        }
    }
}

/// Fit a fresh model per fold and score it on the held-out rows.
///
/// `make_model` receives the fold index so each fold can be seeded on its own.
pub fn cross_validate<M, F>(
    x: &Array2<f64>,
    y: &Array1<usize>,
    n_classes: usize,
    splits: &[CVSplit],
    make_model: F,
) -> Result<CVResults>
where
    M: Classifier,
    F: Fn(usize) -> M + Sync,
{
    let scores = splits
        .par_iter()
        .map(|split| -> Result<f64> {
            let mut model = make_model(split.fold_idx);
            let (x_train, y_train, x_test, y_test) = fold_data(x, y, split);
            model.fit(&x_train, &y_train, n_classes)?;
            let score = accuracy(&y_test, &model.predict(&x_test)?);
            debug!(model = model.name(), fold = split.fold_idx, accuracy = score, "Fold scored");
            Ok(score)
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(CVResults::from_scores(scores))
}

/// Rows of one fold: (x_train, y_train, x_test, y_test)
pub fn fold_data(
    x: &Array2<f64>,
    y: &Array1<usize>,
    split: &CVSplit,
) -> (Array2<f64>, Array1<usize>, Array2<f64>, Array1<usize>) {
    (
        x.select(Axis(0), &split.train_indices),
        y.select(Axis(0), &split.train_indices),
        x.select(Axis(0), &split.test_indices),
        y.select(Axis(0), &split.test_indices),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::DecisionTree;

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: 5,
            shuffle: false,
        });
        let splits = cv.split(10, Some(&y)).unwrap();
        assert_eq!(splits.len(), 5);

        // Each fold should have 1 sample from each class
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            let classes: Vec<usize> = split.test_indices.iter().map(|&i| y[i]).collect();
            assert!(classes.contains(&0) && classes.contains(&1));
        }
    }

    #[test]
    fn test_stratified_covers_every_row_once() {
        let y: Array1<usize> = (0..103).map(|i| i % 4).collect();
        let cv = CrossValidator::new(CVStrategy::default()).with_random_state(12345);
        let splits = cv.split(103, Some(&y)).unwrap();

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..103).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 103);
            assert!(split.test_indices.len() == 10 || split.test_indices.len() == 11);
        }
    }

    #[test]
    fn test_same_seed_same_folds() {
        let y: Array1<usize> = (0..50).map(|i| i % 3).collect();
        let a = CrossValidator::new(CVStrategy::default()).with_random_state(1).split(50, Some(&y)).unwrap();
        let b = CrossValidator::new(CVStrategy::default()).with_random_state(1).split(50, Some(&y)).unwrap();
        let c = CrossValidator::new(CVStrategy::default()).with_random_state(2).split(50, Some(&y)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_too_few_samples() {
        let y: Array1<usize> = (0..5).map(|i| i % 2).collect();
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(5, Some(&y)).is_err());
        assert!(cv.split(5, None).is_err());
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((results.mean_score - 0.9).abs() < 1e-12);
        assert!((results.std_score - 0.1).abs() < 1e-12);
        assert_eq!(results.n_folds, 3);
    }

    #[test]
    fn test_cross_validate_tree() {
        let x = Array2::from_shape_fn((40, 1), |(r, _)| r as f64);
        let y: Array1<usize> = (0..40).map(|r| usize::from(r >= 20)).collect();
        let splits = CrossValidator::new(CVStrategy::default())
            .with_random_state(0)
            .split(40, Some(&y))
            .unwrap();

        let results = cross_validate(&x, &y, 2, &splits, |_| DecisionTree::new_classifier()).unwrap();
        assert_eq!(results.n_folds, 10);
        assert!(results.mean_score > 0.9);
    }
}
