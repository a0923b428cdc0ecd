//! CART decision tree with histogram split search

use super::binning::{BinnedMatrix, FeatureBins, MAX_BINS};
use super::models::Classifier;
use crate::error::{LiftError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Node count times candidate features above which features are scanned in parallel
const PARALLEL_SCAN_WORK: usize = 1 << 16;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value (class id for classifiers)
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        bin: u8,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        gain: f64,
    },
}

impl TreeNode {
    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if row[*feature_idx] <= *threshold {
                    left.predict_row(row)
                } else {
                    right.predict_row(row)
                }
            }
        }
    }

    fn predict_binned(&self, binned: &BinnedMatrix, row: usize) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                bin,
                left,
                right,
                ..
            } => {
                if binned.get(row, *feature_idx) <= *bin {
                    left.predict_binned(binned, row)
                } else {
                    right.predict_binned(binned, row)
                }
            }
        }
    }

    fn refit<F: Fn(&[usize]) -> f64>(&mut self, binned: &BinnedMatrix, rows: &[usize], f: &F) {
        match self {
            TreeNode::Leaf { value, n_samples } => {
                *value = f(rows);
                *n_samples = rows.len();
            }
            TreeNode::Split {
                feature_idx,
                bin,
                left,
                right,
                ..
            } => {
                let (l, r): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .partition(|&&i| binned.get(i, *feature_idx) <= *bin);
                left.refit(binned, &l, f);
                right.refit(binned, &r, f);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// What a tree is fitted to
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Class ids in `0..n_classes`
    Classes { labels: &'a [usize], n_classes: usize },
    /// Real-valued response
    Values(&'a [f64]),
}

impl Target<'_> {
    fn len(&self) -> usize {
        match self {
            Target::Classes { labels, .. } => labels.len(),
            Target::Values(v) => v.len(),
        }
    }

    /// Histogram slots per bin
    fn width(&self) -> usize {
        match self {
            Target::Classes { n_classes, .. } => *n_classes,
            // count, sum, sum of squares
            Target::Values(_) => 3,
        }
    }

    #[inline]
    fn accumulate(&self, slot: &mut [f64], row: usize) {
        match self {
            Target::Classes { labels, .. } => slot[labels[row]] += 1.0,
            Target::Values(v) => {
                let y = v[row];
                slot[0] += 1.0;
                slot[1] += y;
                slot[2] += y * y;
            }
        }
    }
}

/// Per-node statistics summed over rows
#[derive(Debug, Clone)]
struct NodeStats {
    totals: Vec<f64>,
}

impl NodeStats {
    fn collect(target: &Target, rows: &[usize]) -> Self {
        let mut totals = vec![0.0; target.width()];
        for &i in rows {
            target.accumulate(&mut totals, i);
        }
        Self { totals }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth (None = grow until pure or too small)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random at each split (None = all)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Bins per feature when the tree bins its own input
    pub max_bins: usize,
    /// Seed for feature sampling in standalone fits
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            max_bins: MAX_BINS,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set features tried per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit on pre-binned data using `rows` (repeats allowed, e.g. a bootstrap sample)
    pub fn fit_rows<R: Rng>(
        &mut self,
        binned: &BinnedMatrix,
        bins: &FeatureBins,
        target: Target,
        rows: &[usize],
        rng: &mut R,
    ) -> Result<()> {
        if target.len() != binned.n_rows() {
            return Err(LiftError::ShapeError {
                expected: format!("target length = {}", binned.n_rows()),
                actual: format!("target length = {}", target.len()),
            });
        }
        if rows.is_empty() {
            return Err(LiftError::Training("cannot fit a tree on zero rows".to_string()));
        }
        match (&target, self.criterion) {
            (Target::Classes { .. }, Criterion::MSE) | (Target::Values(_), Criterion::Gini) => {
                return Err(LiftError::Training(format!(
                    "criterion {:?} does not match the target type",
                    self.criterion
                )));
            }
            _ => {}
        }

        self.n_features = binned.n_features();
        self.n_classes = match target {
            Target::Classes { n_classes, .. } => n_classes,
            Target::Values(_) => 0,
        };

        let mut importances = vec![0.0; self.n_features];
        let builder = Builder {
            tree: &*self,
            binned,
            bins,
            target,
        };
        let root = builder.build(rows, 0, &mut importances, rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        self.root = Some(root);
        Ok(())
    }

    /// Replace every leaf value by `f(rows reaching that leaf)`
    pub fn refit_leaves<F: Fn(&[usize]) -> f64>(
        &mut self,
        binned: &BinnedMatrix,
        rows: &[usize],
        f: F,
    ) -> Result<()> {
        let root = self.root.as_mut().ok_or(LiftError::ModelNotFitted)?;
        root.refit(binned, rows, &f);
        Ok(())
    }

    /// Raw prediction for every row (class ids as f64 for classifiers)
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(LiftError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(LiftError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.outer_iter().map(|row| root.predict_row(row)).collect())
    }

    /// Prediction for one raw row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(LiftError::ModelNotFitted)?;
        Ok(root.predict_row(row))
    }

    /// Prediction for one row of the binned training data
    pub fn predict_binned(&self, binned: &BinnedMatrix, row: usize) -> Result<f64> {
        let root = self.root.as_ref().ok_or(LiftError::ModelNotFitted)?;
        Ok(root.predict_binned(binned, row))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        check_rows(x, y.len())?;
        check_labels(y, n_classes)?;
        let bins = FeatureBins::fit(x, self.max_bins);
        let binned = bins.transform(x);
        let labels = y.to_vec();
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        let target = Target::Classes {
            labels: &labels,
            n_classes,
        };
        self.fit_rows(&binned, &bins, target, &rows, &mut rng)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(self.predict_values(x)?.mapv(|v| v as usize))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let classes = self.predict(x)?;
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (i, &c) in classes.iter().enumerate() {
            proba[[i, c]] = 1.0;
        }
        Ok(proba)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn name(&self) -> &'static str {
        "cart"
    }
}

pub(crate) fn check_rows(x: &Array2<f64>, n_labels: usize) -> Result<()> {
    if x.nrows() != n_labels {
        return Err(LiftError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", n_labels),
        });
    }
    if x.nrows() == 0 {
        return Err(LiftError::Training("no training rows".to_string()));
    }
    Ok(())
}

pub(crate) fn check_labels(y: &Array1<usize>, n_classes: usize) -> Result<()> {
    match y.iter().find(|&&c| c >= n_classes) {
        Some(c) => Err(LiftError::Validation(format!(
            "class id {} out of range for {} classes",
            c, n_classes
        ))),
        None => Ok(()),
    }
}

struct Builder<'a> {
    tree: &'a DecisionTree,
    binned: &'a BinnedMatrix,
    bins: &'a FeatureBins,
    target: Target<'a>,
}

/// Best split of one feature: (feature, bin, impurity decrease)
type Candidate = (usize, usize, f64);

impl Builder<'_> {
    fn build<R: Rng>(
        &self,
        rows: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut R,
    ) -> TreeNode {
        let n_samples = rows.len();
        let stats = NodeStats::collect(&self.target, rows);

        let should_stop = n_samples < self.tree.min_samples_split
            || n_samples < 2 * self.tree.min_samples_leaf
            || self.tree.max_depth.map_or(false, |d| depth >= d)
            || self.is_pure(&stats);

        if should_stop {
            return self.leaf(&stats, n_samples);
        }

        let features = self.candidate_features(rng);
        let Some((feature, bin, gain)) = self.best_split(rows, &stats, &features) else {
            return self.leaf(&stats, n_samples);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| (self.binned.get(i, feature) as usize) <= bin);

        importances[feature] += gain;

        let left = Box::new(self.build(&left_rows, depth + 1, importances, rng));
        let right = Box::new(self.build(&right_rows, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: feature,
            threshold: self.bins.threshold(feature, bin),
            bin: bin as u8,
            left,
            right,
            n_samples,
            gain,
        }
    }

    fn candidate_features<R: Rng>(&self, rng: &mut R) -> Vec<usize> {
        let n = self.binned.n_features();
        match self.tree.max_features {
            Some(m) if m < n => {
                let mut picked = rand::seq::index::sample(rng, n, m.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n).collect(),
        }
    }

    fn best_split(&self, rows: &[usize], stats: &NodeStats, features: &[usize]) -> Option<Candidate> {
        let parent = self.weighted_impurity(&stats.totals);
        let scan = |&f: &usize| self.scan_feature(f, rows, &stats.totals, parent);

        let results: Vec<Option<Candidate>> = if rows.len() * features.len() >= PARALLEL_SCAN_WORK {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // Ties keep the lower feature index
        results.into_iter().flatten().fold(None, |best, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        })
    }

    fn scan_feature(&self, f: usize, rows: &[usize], totals: &[f64], parent: f64) -> Option<Candidate> {
        let n_bins = self.bins.n_bins(f);
        if n_bins < 2 {
            return None;
        }
        let width = self.target.width();
        let column = self.binned.column(f);

        let mut hist = vec![0.0; n_bins * width];
        let mut counts = vec![0usize; n_bins];
        for &i in rows {
            let b = column[i] as usize;
            counts[b] += 1;
            self.target.accumulate(&mut hist[b * width..(b + 1) * width], i);
        }

        let min_leaf = self.tree.min_samples_leaf.max(1);
        let n = rows.len();
        let mut left = vec![0.0; width];
        let mut right = vec![0.0; width];
        let mut n_left = 0usize;
        let mut best: Option<(usize, f64)> = None;

        for b in 0..n_bins - 1 {
            if counts[b] == 0 {
                continue;
            }
            n_left += counts[b];
            for k in 0..width {
                left[k] += hist[b * width + k];
            }
            let n_right = n - n_left;
            if n_left < min_leaf {
                continue;
            }
            if n_right < min_leaf {
                break;
            }
            for k in 0..width {
                right[k] = totals[k] - left[k];
            }
            let gain = parent - self.weighted_impurity(&left) - self.weighted_impurity(&right);
            if gain > 1e-12 && best.map_or(true, |(_, g)| gain > g) {
                best = Some((b, gain));
            }
        }

        best.map(|(b, gain)| (f, b, gain))
    }

    /// Impurity times node size
    fn weighted_impurity(&self, slot: &[f64]) -> f64 {
        match self.target {
            Target::Classes { .. } => {
                let n: f64 = slot.iter().sum();
                if n <= 0.0 {
                    0.0
                } else {
                    n - slot.iter().map(|&c| c * c).sum::<f64>() / n
                }
            }
            Target::Values(_) => {
                let (n, sum, sq) = (slot[0], slot[1], slot[2]);
                if n <= 0.0 {
                    0.0
                } else {
                    (sq - sum * sum / n).max(0.0)
                }
            }
        }
    }

    fn is_pure(&self, stats: &NodeStats) -> bool {
        match self.target {
            Target::Classes { .. } => stats.totals.iter().filter(|&&c| c > 0.0).count() <= 1,
            Target::Values(_) => self.weighted_impurity(&stats.totals) < 1e-12,
        }
    }

    fn leaf(&self, stats: &NodeStats, n_samples: usize) -> TreeNode {
        let value = match self.target {
            Target::Classes { .. } => majority(&stats.totals) as f64,
            Target::Values(_) => {
                if stats.totals[0] > 0.0 {
                    stats.totals[1] / stats.totals[0]
                } else {
                    0.0
                }
            }
        };
        TreeNode::Leaf { value, n_samples }
    }
}

/// Index of the largest count; ties go to the lowest index
pub(crate) fn majority(counts: &[f64]) -> usize {
    let mut best = 0;
    for (k, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = k;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0, 0, 1, 1];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y, 2).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_three_classes() {
        let x = Array2::from_shape_fn((90, 2), |(r, c)| if c == 0 { r as f64 } else { (r % 7) as f64 });
        let y: Array1<usize> = (0..90).map(|r| r / 30).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y, 3).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_n_leaves(), 3);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let bins = FeatureBins::fit(&x, MAX_BINS);
        let binned = bins.transform(&x);
        let values = y.to_vec();
        let rows: Vec<usize> = (0..5).collect();
        let mut tree = DecisionTree::new_regressor();
        tree.fit_rows(&binned, &bins, Target::Values(&values), &rows, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        let predictions = tree.predict_values(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0, 1, 0, 1];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y, 2).unwrap();
        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = Array2::from_shape_fn((20, 1), |(r, _)| r as f64);
        let y: Array1<usize> = (0..20).map(|r| usize::from(r == 19)).collect();

        let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(5);
        tree.fit(&x, &y, 2).unwrap();
        // a lone positive row cannot be isolated
        assert_eq!(tree.predict(&x).unwrap().sum(), 0);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0, 0, 1, 1];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y, 2).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_refit_leaves() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let bins = FeatureBins::fit(&x, 256);
        let binned = bins.transform(&x);
        let values = y.to_vec();
        let rows = vec![0, 1, 2, 3];
        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit_rows(&binned, &bins, Target::Values(&values), &rows, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap();

        tree.refit_leaves(&binned, &rows, |leaf_rows| leaf_rows.len() as f64 * 10.0)
            .unwrap();
        assert_eq!(tree.predict_values(&x).unwrap().to_vec(), vec![20.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn test_mismatched_criterion() {
        let x = array![[1.0], [2.0]];
        let y = array![0, 1];
        let mut tree = DecisionTree::new_regressor();
        assert!(matches!(tree.fit(&x, &y, 2), Err(LiftError::Training(_))));
    }

    #[test]
    fn test_majority_tie_goes_low() {
        assert_eq!(majority(&[2.0, 3.0, 3.0]), 1);
        assert_eq!(majority(&[0.0, 0.0]), 0);
    }

    #[test]
    fn test_unfitted() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(LiftError::ModelNotFitted)
        ));
    }
}
