//! Random Forest implementation

use super::binning::{BinnedMatrix, FeatureBins, MAX_BINS};
use super::decision_tree::{check_labels, check_rows, majority, Criterion, DecisionTree, Target};
use super::models::{argmax_rows, Classifier};
use crate::error::{LiftError, Result};
use crate::utils::in_worker_pool;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy for max features
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Fixed number (clamped to n_features)
    Fixed(usize),
    /// All features
    All,
}

/// Random Forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features tried at each split
    pub max_features: MaxFeatures,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Bins per feature
    pub max_bins: usize,
    /// Random state
    pub random_state: Option<u64>,
    /// Computed OOB score
    oob_score_value: Option<f64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    n_classes: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            criterion: Criterion::Gini,
            max_bins: MAX_BINS,
            random_state: None,
            oob_score_value: None,
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    /// Grow the trees on pre-binned rows; returns each tree's in-bag counts
    fn grow(
        &self,
        binned: &BinnedMatrix,
        bins: &FeatureBins,
        labels: &[usize],
        n_classes: usize,
    ) -> Result<Vec<(DecisionTree, Vec<u32>)>> {
        let n_samples = binned.n_rows();
        let max_features = self.compute_max_features(binned.n_features());
        let base_seed = self.random_state.unwrap_or(42);

        (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<(DecisionTree, Vec<u32>)> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap sample
                let sample_indices: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let mut in_bag = vec![0u32; n_samples];
                for &i in &sample_indices {
                    in_bag[i] += 1;
                }

                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_criterion(self.criterion);
                tree.max_depth = self.max_depth;

                let target = Target::Classes { labels, n_classes };
                tree.fit_rows(binned, bins, target, &sample_indices, &mut rng)?;
                Ok((tree, in_bag))
            })
            .collect()
    }

    /// Accuracy of each row voted on only by trees that did not see it
    fn compute_oob_score(
        grown: &[(DecisionTree, Vec<u32>)],
        binned: &BinnedMatrix,
        labels: &[usize],
        n_classes: usize,
    ) -> Result<Option<f64>> {
        let n_samples = binned.n_rows();
        let votes: Vec<Option<usize>> = (0..n_samples)
            .into_par_iter()
            .map(|row| -> Result<Option<usize>> {
                let mut counts = vec![0.0; n_classes];
                let mut any = false;
                for (tree, in_bag) in grown {
                    if in_bag[row] == 0 {
                        counts[tree.predict_binned(binned, row)? as usize] += 1.0;
                        any = true;
                    }
                }
                Ok(any.then(|| majority(&counts)))
            })
            .collect::<Result<_>>()?;

        let scored: Vec<(usize, usize)> = votes
            .iter()
            .enumerate()
            .filter_map(|(row, v)| v.map(|p| (row, p)))
            .collect();
        if scored.is_empty() {
            return Ok(None);
        }
        let correct = scored.iter().filter(|(row, p)| labels[*row] == *p).count();
        Ok(Some(correct as f64 / scored.len() as f64))
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total_importances[i] += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Vote counts per row and class
    fn votes(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(LiftError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(LiftError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let vote = |i: usize| -> Result<Vec<f64>> {
            let row = x.row(i);
            let mut counts = vec![0.0; self.n_classes];
            for tree in &self.trees {
                counts[tree.predict_row(row)? as usize] += 1.0;
            }
            Ok(counts)
        };
        let rows: Vec<Vec<f64>> = if in_worker_pool() {
            (0..x.nrows()).into_par_iter().map(&vote).collect::<Result<_>>()?
        } else {
            (0..x.nrows()).map(vote).collect::<Result<_>>()?
        };

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), self.n_classes), flat)?)
    }

    /// Get OOB score
    pub fn oob_score_value(&self) -> Option<f64> {
        self.oob_score_value
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Features tried per split in the fitted forest
    pub fn mtry(&self) -> usize {
        self.compute_max_features(self.n_features)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        check_rows(x, y.len())?;
        check_labels(y, n_classes)?;
        if self.n_estimators == 0 {
            return Err(LiftError::Training("forest needs at least one tree".to_string()));
        }

        self.n_features = x.ncols();
        self.n_classes = n_classes;

        let bins = FeatureBins::fit(x, self.max_bins);
        let binned = bins.transform(x);
        let labels = y.to_vec();

        let grown = self.grow(&binned, &bins, &labels, n_classes)?;
        self.oob_score_value = Self::compute_oob_score(&grown, &binned, &labels, n_classes)?;
        self.trees = grown.into_iter().map(|(tree, _)| tree).collect();
        self.compute_feature_importances();

        debug!(
            trees = self.trees.len(),
            mtry = self.mtry(),
            oob = ?self.oob_score_value,
            "Fitted random forest"
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.votes(x)?))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.votes(x)?;
        Ok(votes / self.trees.len() as f64)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn name(&self) -> &'static str {
        "rf"
    }
}
