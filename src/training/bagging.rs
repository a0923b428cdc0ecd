//! Bagged CART: full-depth classification trees on bootstrap samples, every
//! feature considered at every split, combined by majority vote.

use super::models::Classifier;
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggedTrees {
    ensemble: RandomForest,
}

impl Default for BaggedTrees {
    fn default() -> Self {
        Self::new(25)
    }
}

impl BaggedTrees {
    pub fn new(n_bags: usize) -> Self {
        Self {
            ensemble: RandomForest::new(n_bags).with_max_features(MaxFeatures::All),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.ensemble = self.ensemble.with_random_state(seed);
        self
    }

    pub fn n_bags(&self) -> usize {
        self.ensemble.n_estimators
    }

    /// Out-of-bag accuracy of the fitted ensemble
    pub fn oob_score_value(&self) -> Option<f64> {
        self.ensemble.oob_score_value()
    }
}

impl Classifier for BaggedTrees {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        self.ensemble.fit(x, y, n_classes)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.ensemble.predict(x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.ensemble.predict_proba(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.ensemble.feature_importances()
    }

    fn name(&self) -> &'static str {
        "treebag"
    }
}
