//! Stratified train/test partition

use crate::error::{LiftError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Row indices of the two partitions, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    pub fn n_rows(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// Rows of `x` in the training partition
    pub fn train_rows(&self, x: &Array2<f64>) -> Array2<f64> {
        x.select(Axis(0), &self.train)
    }

    pub fn test_rows(&self, x: &Array2<f64>) -> Array2<f64> {
        x.select(Axis(0), &self.test)
    }

    pub fn train_labels(&self, y: &Array1<usize>) -> Array1<usize> {
        self.train.iter().map(|&i| y[i]).collect()
    }

    pub fn test_labels(&self, y: &Array1<usize>) -> Array1<usize> {
        self.test.iter().map(|&i| y[i]).collect()
    }
}

/// Stratified splitter: each class contributes `ceil(fraction * n_class)` rows to training
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    train_fraction: f64,
    random_state: u64,
}

impl StratifiedSplit {
    pub fn new(train_fraction: f64, random_state: u64) -> Self {
        Self {
            train_fraction,
            random_state,
        }
    }

    pub fn split(&self, y: &Array1<usize>) -> Result<Partition> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(LiftError::Validation(format!(
                "train fraction must be in (0, 1), got {}",
                self.train_fraction
            )));
        }
        if y.len() < 2 {
            return Err(LiftError::Validation(
                "need at least two rows to partition".to_string(),
            ));
        }

        let mut class_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &class) in y.iter().enumerate() {
            class_indices.entry(class).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
            let n = indices.len();
            let mut n_train = (self.train_fraction * n as f64).ceil() as usize;
            if n > 1 {
                n_train = n_train.min(n - 1);
            }
            train.extend_from_slice(&indices[..n_train]);
            test.extend_from_slice(&indices[n_train..]);
        }

        train.sort_unstable();
        test.sort_unstable();

        info!(
            train = train.len(),
            test = test.len(),
            classes = class_indices.len(),
            "Partitioned rows"
        );

        Ok(Partition { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Array1<usize> {
        // 40 of class 0, 20 of class 1, 8 of class 2
        (0..68)
            .map(|i| if i < 40 { 0 } else if i < 60 { 1 } else { 2 })
            .collect()
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let y = labels();
        let p = StratifiedSplit::new(0.75, 12345).split(&y).unwrap();

        let mut all: Vec<usize> = p.train.iter().chain(p.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..68).collect::<Vec<_>>());
        assert!(p.train.iter().all(|i| !p.test.contains(i)));
    }

    #[test]
    fn test_partition_is_stratified() {
        let y = labels();
        let p = StratifiedSplit::new(0.75, 1).split(&y).unwrap();
        let train_y = p.train_labels(&y);

        let count = |c: usize| train_y.iter().filter(|&&v| v == c).count();
        assert_eq!(count(0), 30);
        assert_eq!(count(1), 15);
        assert_eq!(count(2), 6);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let y = labels();
        let a = StratifiedSplit::new(0.75, 99).split(&y).unwrap();
        let b = StratifiedSplit::new(0.75, 99).split(&y).unwrap();
        let c = StratifiedSplit::new(0.75, 100).split(&y).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_small_class_keeps_a_test_row() {
        let y = Array1::from_vec(vec![0, 0, 1, 1, 1, 1]);
        let p = StratifiedSplit::new(0.75, 3).split(&y).unwrap();
        let test_y = p.test_labels(&y);
        assert!(test_y.iter().any(|&c| c == 0));
        assert!(test_y.iter().any(|&c| c == 1));
    }

    #[test]
    fn test_rows() {
        let x = Array2::from_shape_fn((6, 2), |(r, c)| (r * 10 + c) as f64);
        let y = Array1::from_vec(vec![0, 1, 0, 1, 0, 1]);
        let p = StratifiedSplit::new(0.5, 0).split(&y).unwrap();
        let train = p.train_rows(&x);
        assert_eq!(train.nrows(), p.train.len());
        assert_eq!(train[[0, 0]], (p.train[0] * 10) as f64);
    }
}
