//! SVG charts: correlation heat map and cross-validated accuracy densities

use crate::error::{LiftError, Result};
use crate::stats::CorrelationMatrix;
use plotters::prelude::*;
use std::path::Path;

/// Points on the density curve
const DENSITY_POINTS: usize = 200;

fn plot_error<E: std::fmt::Display>(e: E) -> LiftError {
    LiftError::Report(e.to_string())
}

/// Fold accuracies of one model and its held-out accuracy
#[derive(Debug, Clone)]
pub struct AccuracySeries {
    pub label: String,
    pub fold_accuracies: Vec<f64>,
    pub test_accuracy: f64,
}

/// Rule-of-thumb bandwidth: `0.9 * min(sd, IQR / 1.34) * n^(-1/5)`.
///
/// Falls back to the standard deviation, then to `|x[0]|`, then to 1 when the
/// spread measures are zero.
pub fn silverman_bandwidth(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 1.0;
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let sd = (samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);

    let mut lo = sd.min(iqr / 1.34);
    if lo <= 0.0 {
        lo = if sd > 0.0 {
            sd
        } else if samples[0] != 0.0 {
            samples[0].abs()
        } else {
            1.0
        };
    }
    0.9 * lo * (n as f64).powf(-0.2)
}

/// Linear-interpolated quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Gaussian kernel density of `samples` evaluated at `grid`
pub fn gaussian_kde(samples: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<f64> {
    if samples.is_empty() || bandwidth <= 0.0 {
        return vec![0.0; grid.len()];
    }
    let norm = 1.0 / (samples.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|&x| {
            norm * samples
                .iter()
                .map(|&s| (-0.5 * ((x - s) / bandwidth).powi(2)).exp())
                .sum::<f64>()
        })
        .collect()
}

/// Diverging colour: blue at -1, white at 0, red at +1, grey when undefined
fn correlation_color(r: f64) -> RGBColor {
    if !r.is_finite() {
        return RGBColor(190, 190, 190);
    }
    let t = r.clamp(-1.0, 1.0);
    let fade = |full: u8| -> u8 { (255.0 - (255.0 - full as f64) * t.abs()).round() as u8 };
    if t >= 0.0 {
        RGBColor(fade(178), fade(24), fade(43))
    } else {
        RGBColor(fade(33), fade(102), fade(172))
    }
}

/// Heat map of the correlation coefficients, first column at the top left
pub fn correlation_heatmap(matrix: &CorrelationMatrix, path: &Path) -> Result<()> {
    let names = matrix.names();
    let n = names.len();
    if n == 0 {
        return Err(LiftError::Report("empty correlation matrix".to_string()));
    }
    let coefficients = matrix.coefficients();
    let side = (24 * n as u32 + 240).clamp(480, 2400);

    let root = SVGBackend::new(path, (side, side)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let label_for = |v: &f64| -> String {
        let idx = v.floor() as usize;
        if *v >= 0.0 && idx < n && (v - v.floor()) < 1e-9 {
            names[idx].clone()
        } else {
            String::new()
        }
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation matrix", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(140)
        .y_label_area_size(160)
        .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n + 1)
        .y_labels(n + 1)
        .x_label_formatter(&|v| label_for(v))
        .y_label_formatter(&|v| label_for(&(n as f64 - 1.0 - v)))
        .x_label_style(
            ("sans-serif", 10)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_label_style(("sans-serif", 10))
        .draw()
        .map_err(plot_error)?;

    chart
        .draw_series((0..n).flat_map(|i| {
            (0..n).map(move |j| {
                let top = (n - i) as f64;
                Rectangle::new(
                    [(j as f64, top - 1.0), (j as f64 + 1.0, top)],
                    correlation_color(coefficients[[i, j]]).filled(),
                )
            })
        }))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Density of per-fold accuracy for each model, with the held-out accuracy as a vertical line
pub fn accuracy_density(series: &[AccuracySeries], path: &Path) -> Result<()> {
    if series.is_empty() {
        return Err(LiftError::Report("no models to plot".to_string()));
    }

    let bandwidths: Vec<f64> = series
        .iter()
        .map(|s| silverman_bandwidth(&s.fold_accuracies))
        .collect();
    let max_bw = bandwidths.iter().copied().fold(0.0, f64::max);

    let values = series
        .iter()
        .flat_map(|s| s.fold_accuracies.iter().copied().chain(std::iter::once(s.test_accuracy)));
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let x_min = lo - 3.0 * max_bw;
    let x_max = hi + 3.0 * max_bw;
    let step = (x_max - x_min) / (DENSITY_POINTS - 1) as f64;
    let grid: Vec<f64> = (0..DENSITY_POINTS).map(|i| x_min + i as f64 * step).collect();

    let densities: Vec<Vec<f64>> = series
        .iter()
        .zip(&bandwidths)
        .map(|(s, &bw)| gaussian_kde(&s.fold_accuracies, bw, &grid))
        .collect();
    let y_max = densities
        .iter()
        .flatten()
        .copied()
        .fold(0.0, f64::max)
        .max(1e-9)
        * 1.1;

    let root = SVGBackend::new(path, (900, 560)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cross-validated accuracy by model", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Accuracy")
        .y_desc("Density")
        .draw()
        .map_err(plot_error)?;

    for (idx, (s, density)) in series.iter().zip(&densities).enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(
                grid.iter().copied().zip(density.iter().copied()),
                color.stroke_width(2),
            ))
            .map_err(plot_error)?
            .label(format!("{} (test {:.4})", s.label, s.test_accuracy))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(s.test_accuracy, 0.0), (s.test_accuracy, y_max)],
                color.stroke_width(1),
            )))
            .map_err(plot_error)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kde_integrates_to_one() {
        let samples = [0.95, 0.96, 0.97, 0.965, 0.958];
        let bw = silverman_bandwidth(&samples);
        assert!(bw > 0.0);

        let step = 0.0005;
        let grid: Vec<f64> = (0..=1000).map(|i| 0.8 + i as f64 * step).collect();
        let density = gaussian_kde(&samples, bw, &grid);
        let area: f64 = density.iter().sum::<f64>() * step;
        assert!((area - 1.0).abs() < 1e-3, "area {}", area);
    }

    #[test]
    fn test_kde_peaks_at_samples() {
        let samples = [0.5; 4];
        let bw = silverman_bandwidth(&samples);
        // zero spread falls back to |x[0]|
        assert!((bw - 0.9 * 0.5 * 4f64.powf(-0.2)).abs() < 1e-12);

        let density = gaussian_kde(&samples, bw, &[0.2, 0.5, 0.8]);
        assert!(density[1] > density[0]);
        assert!((density[0] - density[2]).abs() < 1e-12);
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(gaussian_kde(&[], 1.0, &[0.0, 1.0]), vec![0.0, 0.0]);
        assert_eq!(silverman_bandwidth(&[0.3]), 1.0);
    }

    #[test]
    fn test_correlation_colors() {
        assert_eq!(correlation_color(0.0), RGBColor(255, 255, 255));
        assert_eq!(correlation_color(1.0), RGBColor(178, 24, 43));
        assert_eq!(correlation_color(-1.0), RGBColor(33, 102, 172));
        assert_eq!(correlation_color(f64::NAN), RGBColor(190, 190, 190));
    }
}
