//! Quantile binning of predictors for histogram split search
//!
//! Each feature gets at most `max_bins - 1` cut points. A value's bin is the
//! number of cuts strictly below it, so "bin <= b" on binned data and
//! "value <= cuts[b]" on raw data route a row the same way.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound on bins per feature (bin ids fit in a byte)
pub const MAX_BINS: usize = 256;

/// Cut points per feature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBins {
    cuts: Vec<Vec<f64>>,
}

impl FeatureBins {
    /// Fit cut points on every column of `x`; non-finite values are ignored
    pub fn fit(x: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let cuts = (0..x.ncols())
            .into_par_iter()
            .map(|f| Self::column_cuts(x.column(f), max_bins))
            .collect();
        Self { cuts }
    }

    fn column_cuts(values: ArrayView1<f64>, max_bins: usize) -> Vec<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Vec::new();
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut distinct = sorted.clone();
        distinct.dedup();

        if distinct.len() <= max_bins {
            return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        }

        // Equal-frequency boundaries, each moved to the midpoint above its value
        let n = sorted.len();
        let mut cuts: Vec<f64> = (1..max_bins)
            .filter_map(|i| {
                let q = sorted[i * n / max_bins];
                let j = distinct.partition_point(|&d| d <= q);
                (j < distinct.len()).then(|| (distinct[j - 1] + distinct[j]) / 2.0)
            })
            .collect();
        cuts.dedup();
        cuts
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    /// Number of bins of feature `f`
    pub fn n_bins(&self, f: usize) -> usize {
        self.cuts[f].len() + 1
    }

    /// Raw threshold equivalent to "bin <= b"
    pub fn threshold(&self, f: usize, b: usize) -> f64 {
        self.cuts[f][b]
    }

    /// Bin of one value; NaN goes to the last bin
    pub fn bin(&self, f: usize, v: f64) -> u8 {
        let cuts = &self.cuts[f];
        if v.is_nan() {
            return cuts.len() as u8;
        }
        cuts.partition_point(|&c| c < v) as u8
    }

    pub fn transform(&self, x: &Array2<f64>) -> BinnedMatrix {
        let columns = (0..x.ncols())
            .into_par_iter()
            .map(|f| x.column(f).iter().map(|&v| self.bin(f, v)).collect())
            .collect();
        BinnedMatrix {
            columns,
            n_rows: x.nrows(),
        }
    }
}

/// Column-major bin ids
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    columns: Vec<Vec<u8>>,
    n_rows: usize,
}

impl BinnedMatrix {
    #[inline]
    pub fn get(&self, row: usize, f: usize) -> u8 {
        self.columns[f][row]
    }

    #[inline]
    pub fn column(&self, f: usize) -> &[u8] {
        &self.columns[f]
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_few_distinct_values_get_midpoints() {
        let x = array![[1.0], [2.0], [2.0], [4.0]];
        let bins = FeatureBins::fit(&x, 256);
        assert_eq!(bins.n_bins(0), 3);
        assert_eq!(bins.threshold(0, 0), 1.5);
        assert_eq!(bins.threshold(0, 1), 3.0);

        let binned = bins.transform(&x);
        assert_eq!(binned.column(0), &[0, 1, 1, 2]);
    }

    #[test]
    fn test_bin_agrees_with_threshold() {
        let x = Array2::from_shape_fn((1000, 1), |(r, _)| ((r * 37) % 1000) as f64 / 7.0);
        let bins = FeatureBins::fit(&x, 32);
        assert!(bins.n_bins(0) <= 32);

        for r in 0..1000 {
            let v = x[[r, 0]];
            let b = bins.bin(0, v) as usize;
            for split in 0..bins.n_bins(0) - 1 {
                assert_eq!(b <= split, v <= bins.threshold(0, split));
            }
        }
    }

    #[test]
    fn test_constant_column_has_one_bin() {
        let x = array![[3.0], [3.0], [3.0]];
        let bins = FeatureBins::fit(&x, 256);
        assert_eq!(bins.n_bins(0), 1);
        assert_eq!(bins.bin(0, f64::NAN), 0);
    }
}
