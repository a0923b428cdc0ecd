//! DataFrame ↔ ndarray conversion and missing-value fill

use crate::error::{LiftError, Result};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Extract named columns into a row-major matrix; nulls become NaN
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| LiftError::ColumnNotFound(col_name.clone()))?;
            let as_f64 = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = as_f64
                .as_materialized_series()
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}

/// Per-column median fill, fitted on training rows only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Option<Array1<f64>>,
}

impl Default for MedianImputer {
    fn default() -> Self {
        Self::new()
    }
}

impl MedianImputer {
    pub fn new() -> Self {
        Self { medians: None }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> &mut Self {
        let medians: Array1<f64> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mut values: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
                if values.is_empty() {
                    return 0.0;
                }
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            })
            .collect();
        self.medians = Some(medians);
        self
    }

    /// Replace non-finite entries; returns how many were filled
    pub fn transform(&self, x: &mut Array2<f64>) -> Result<usize> {
        let medians = self.medians.as_ref().ok_or(LiftError::ModelNotFitted)?;
        if medians.len() != x.ncols() {
            return Err(LiftError::ShapeError {
                expected: format!("{} columns", medians.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let mut filled = 0;
        for (mut col, &median) in x.axis_iter_mut(Axis(1)).zip(medians.iter()) {
            for v in col.iter_mut() {
                if !v.is_finite() {
                    *v = median;
                    filled += 1;
                }
            }
        }
        Ok(filled)
    }

    pub fn medians(&self) -> Option<&Array1<f64>> {
        self.medians.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_columns_to_array2() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "b" => &[4i64, 5, 6]
        )
        .unwrap();

        let x = columns_to_array2(&df, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert_eq!(x[[0, 0]], 4.0);
        assert_eq!(x[[2, 1]], 3.0);
        assert!(x[[1, 1]].is_nan());

        assert!(matches!(
            columns_to_array2(&df, &["c".to_string()]),
            Err(LiftError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_median_imputer() {
        let train = array![[1.0, 10.0], [f64::NAN, 20.0], [3.0, 30.0], [5.0, f64::NAN]];
        let mut imputer = MedianImputer::new();
        imputer.fit(&train);
        assert_eq!(imputer.medians().unwrap().to_vec(), vec![3.0, 20.0]);

        let mut test = array![[f64::NAN, f64::NAN], [2.0, 2.0]];
        let filled = imputer.transform(&mut test).unwrap();
        assert_eq!(filled, 2);
        assert_eq!(test, array![[3.0, 20.0], [2.0, 2.0]]);
    }
}
