//! Confusion matrix and the accuracy statistics reported with it

use crate::error::{LiftError, Result};
use crate::stats::{binomial_upper_tail, clopper_pearson};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-class one-vs-rest statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassStats {
    pub label: String,
    pub sensitivity: f64,
    pub specificity: f64,
    pub pos_pred_value: f64,
    pub prevalence: f64,
    pub balanced_accuracy: f64,
}

/// Counts with rows = predicted class and columns = reference class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Array2<usize>,
    pub accuracy: f64,
    /// Exact 95% interval for the accuracy
    pub accuracy_ci: (f64, f64),
    /// Largest class share in the reference
    pub no_information_rate: f64,
    /// One-sided binomial p-value of accuracy > no-information rate
    pub p_value_acc_gt_nir: f64,
    pub kappa: f64,
    pub by_class: Vec<ClassStats>,
}

impl ConfusionMatrix {
    pub fn new(reference: &Array1<usize>, predicted: &Array1<usize>, labels: &[String]) -> Result<Self> {
        if reference.len() != predicted.len() {
            return Err(LiftError::ShapeError {
                expected: format!("{} predictions", reference.len()),
                actual: format!("{} predictions", predicted.len()),
            });
        }
        if reference.is_empty() {
            return Err(LiftError::Validation(
                "confusion matrix needs at least one row".to_string(),
            ));
        }

        let k = labels.len();
        let mut counts = Array2::zeros((k, k));
        for (&r, &p) in reference.iter().zip(predicted.iter()) {
            if r >= k || p >= k {
                return Err(LiftError::Validation(format!(
                    "class id {} out of range for {} labels",
                    r.max(p),
                    k
                )));
            }
            counts[[p, r]] += 1;
        }

        let n = reference.len();
        let n_f = n as f64;
        let correct: usize = (0..k).map(|i| counts[[i, i]]).sum();
        let accuracy = correct as f64 / n_f;
        let accuracy_ci = clopper_pearson(correct, n, 0.95);

        let col_totals: Vec<usize> = (0..k).map(|j| counts.column(j).sum()).collect();
        let row_totals: Vec<usize> = (0..k).map(|i| counts.row(i).sum()).collect();

        let no_information_rate = col_totals.iter().copied().max().unwrap_or(0) as f64 / n_f;
        let p_value_acc_gt_nir = binomial_upper_tail(correct, n, no_information_rate);

        let expected: f64 = (0..k)
            .map(|i| row_totals[i] as f64 * col_totals[i] as f64)
            .sum::<f64>()
            / (n_f * n_f);
        let kappa = if (1.0 - expected).abs() < f64::EPSILON {
            0.0
        } else {
            (accuracy - expected) / (1.0 - expected)
        };

        let by_class = (0..k)
            .map(|c| {
                let tp = counts[[c, c]] as f64;
                let fn_ = col_totals[c] as f64 - tp;
                let fp = row_totals[c] as f64 - tp;
                let tn = n_f - tp - fn_ - fp;
                let sensitivity = ratio(tp, tp + fn_);
                let specificity = ratio(tn, tn + fp);
                ClassStats {
                    label: labels[c].clone(),
                    sensitivity,
                    specificity,
                    pos_pred_value: ratio(tp, tp + fp),
                    prevalence: col_totals[c] as f64 / n_f,
                    balanced_accuracy: (sensitivity + specificity) / 2.0,
                }
            })
            .collect();

        Ok(Self {
            labels: labels.to_vec(),
            counts,
            accuracy,
            accuracy_ci,
            no_information_rate,
            p_value_acc_gt_nir,
            kappa,
            by_class,
        })
    }

    /// Rows counted in the matrix
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Out-of-sample error
    pub fn error_rate(&self) -> f64 {
        1.0 - self.accuracy
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        f64::NAN
    }
}
