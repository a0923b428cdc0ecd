//! Pearson correlation matrix with significance
//!
//! Coefficients use pairwise-complete observations (NaN marks a missing
//! value). Each p-value is the two-sided t test of r = 0 with n - 2 degrees
//! of freedom, n being the pair's complete-observation count.

use super::distribution::student_t_two_sided;
use crate::error::{LiftError, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Coefficient and p-value matrices over named columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    coefficients: Array2<f64>,
    p_values: Array2<f64>,
    n_obs: Array2<usize>,
}

/// One column's association with a reference column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelation {
    pub name: String,
    pub r: f64,
    pub p_value: f64,
    pub n_obs: usize,
}

impl CorrelationMatrix {
    /// Correlate every pair of columns of `data`
    pub fn compute(data: &Array2<f64>, names: Vec<String>) -> Result<Self> {
        let p = data.ncols();
        if names.len() != p {
            return Err(LiftError::ShapeError {
                expected: format!("{} column names", p),
                actual: format!("{} column names", names.len()),
            });
        }

        let rows: Vec<Vec<(f64, f64, usize)>> = (0..p)
            .into_par_iter()
            .map(|i| {
                (i..p)
                    .map(|j| {
                        if i == j {
                            let n = data.column(i).iter().filter(|v| v.is_finite()).count();
                            (1.0, 0.0, n)
                        } else {
                            pearson_test(data.column(i), data.column(j))
                        }
                    })
                    .collect()
            })
            .collect();

        let mut coefficients = Array2::from_elem((p, p), f64::NAN);
        let mut p_values = Array2::from_elem((p, p), f64::NAN);
        let mut n_obs = Array2::zeros((p, p));
        for (i, row) in rows.into_iter().enumerate() {
            for (offset, (r, pv, n)) in row.into_iter().enumerate() {
                let j = i + offset;
                coefficients[[i, j]] = r;
                coefficients[[j, i]] = r;
                p_values[[i, j]] = pv;
                p_values[[j, i]] = pv;
                n_obs[[i, j]] = n;
                n_obs[[j, i]] = n;
            }
        }

        Ok(Self {
            names,
            coefficients,
            p_values,
            n_obs,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    pub fn p_values(&self) -> &Array2<f64> {
        &self.p_values
    }

    pub fn n_obs(&self) -> &Array2<usize> {
        &self.n_obs
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Coefficient between two named columns
    pub fn get(&self, a: &str, b: &str) -> Option<(f64, f64)> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some((self.coefficients[[i, j]], self.p_values[[i, j]]))
    }

    /// Every other column's correlation with `reference`, in column order
    pub fn against(&self, reference: &str) -> Result<Vec<FeatureCorrelation>> {
        let r_idx = self
            .index_of(reference)
            .ok_or_else(|| LiftError::ColumnNotFound(reference.to_string()))?;

        Ok(self
            .names
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != r_idx)
            .map(|(i, name)| FeatureCorrelation {
                name: name.clone(),
                r: self.coefficients[[i, r_idx]],
                p_value: self.p_values[[i, r_idx]],
                n_obs: self.n_obs[[i, r_idx]],
            })
            .collect())
    }
}

/// Pearson r, two-sided p-value and pair count over rows where both are finite
pub fn pearson_test(x: ArrayView1<f64>, y: ArrayView1<f64>) -> (f64, f64, usize) {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect();
    let n = pairs.len();
    if n < 3 {
        return (f64::NAN, f64::NAN, n);
    }

    let n_f = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n_f;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n_f;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return (f64::NAN, f64::NAN, n);
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = n_f - 2.0;
    let p = if (1.0 - r.abs()) < 1e-15 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        student_t_two_sided(t, df)
    };
    (r, p, n)
}
