//! Classifier trait shared by the study's models

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Multi-class classifier over class ids `0..n_classes`
pub trait Classifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()>;

    /// Predicted class per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    /// Class probabilities, one column per class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Short method name
    fn name(&self) -> &'static str;
}

/// Share of rows where prediction equals truth
pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Class with the most votes per row; ties go to the lowest class id
pub fn argmax_rows(scores: &Array2<f64>) -> Array1<usize> {
    scores
        .outer_iter()
        .map(|row| {
            let mut best = 0;
            for (k, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = k;
                }
            }
            best
        })
        .collect()
}
