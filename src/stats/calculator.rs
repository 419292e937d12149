//! Statistics Calculator Module
//! Binning, quartiles, correlation, density estimates and surface gridding.

use rayon::prelude::*;
use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;

/// Points at which a kernel density curve is evaluated.
pub const KDE_POINTS: usize = 100;

/// One equal-width histogram bin.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Five-number summary with Tukey whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub count: usize,
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within 1.5 IQR below Q1
    pub whisker_low: f64,
    /// Largest value within 1.5 IQR above Q3
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

/// Regular grid of surface heights over an (x, y) domain.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGrid {
    /// Cell boundaries along x, `cells + 1` entries
    pub x_edges: Vec<f64>,
    /// Cell boundaries along y, `cells + 1` entries
    pub y_edges: Vec<f64>,
    /// `heights[i][j]` is the height of cell (x_i, y_j)
    pub heights: Vec<Vec<f64>>,
}

impl SurfaceGrid {
    pub fn z_range(&self) -> (f64, f64) {
        value_range(self.heights.iter().flatten().copied())
    }
}

/// Handles statistical calculations for chart descriptors.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Split values into `bins` equal-width bins over [min, max].
    ///
    /// The last bin is closed on the right. Constant data yields one bin.
    pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
        if values.is_empty() {
            return Vec::new();
        }

        let (min, max) = value_range(values.iter().copied());
        let bins = if max > min { bins.max(1) } else { 1 };
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

        let mut counts = vec![0usize; bins];
        for &v in values {
            let idx = (((v - min) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                let lower = min + i as f64 * width;
                HistogramBin {
                    lower,
                    upper: lower + width,
                    count,
                }
            })
            .collect()
    }

    /// Quartiles, whiskers and outliers of a sample.
    pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = Self::percentile(&sorted, 25.0);
        let median = Self::percentile(&sorted, 50.0);
        let q3 = Self::percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let low_fence = q1 - 1.5 * iqr;
        let high_fence = q3 + 1.5 * iqr;

        let whisker_low = sorted
            .iter()
            .copied()
            .find(|&v| v >= low_fence)
            .unwrap_or(q1);
        let whisker_high = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= high_fence)
            .unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|&v| v < low_fence || v > high_fence)
            .collect();

        Some(BoxStats {
            count: sorted.len(),
            mean: values.iter().mean(),
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
        })
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Pearson correlation coefficient. NaN when either side is constant.
    pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len().min(b.len());
        if n < 2 {
            return f64::NAN;
        }

        let mean_a = a[..n].iter().mean();
        let mean_b = b[..n].iter().mean();

        let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
        for (x, y) in a[..n].iter().zip(&b[..n]) {
            let dx = x - mean_a;
            let dy = y - mean_b;
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }

        if var_a == 0.0 || var_b == 0.0 {
            return f64::NAN;
        }
        (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
    }

    /// Pairwise Pearson matrix over row-aligned columns, rows in parallel.
    pub fn correlation_matrix(columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
        columns
            .par_iter()
            .map(|a| columns.iter().map(|b| Self::pearson(a, b)).collect())
            .collect()
    }

    /// Gaussian kernel density estimate with Silverman's bandwidth,
    /// evaluated at `KDE_POINTS` evenly spaced points.
    pub fn kde(values: &[f64]) -> Vec<(f64, f64)> {
        if values.is_empty() {
            return Vec::new();
        }
        let Ok(kernel) = Normal::new(0.0, 1.0) else {
            return Vec::new();
        };

        let n = values.len() as f64;
        let bandwidth = Self::silverman_bandwidth(values);
        let (min, max) = value_range(values.iter().copied());
        let (lo, hi) = (min - 3.0 * bandwidth, max + 3.0 * bandwidth);
        let step = (hi - lo) / (KDE_POINTS - 1) as f64;

        (0..KDE_POINTS)
            .map(|i| {
                let x = lo + i as f64 * step;
                let density = values
                    .iter()
                    .map(|v| kernel.pdf((x - v) / bandwidth))
                    .sum::<f64>()
                    / (n * bandwidth);
                (x, density)
            })
            .collect()
    }

    fn silverman_bandwidth(values: &[f64]) -> f64 {
        let n = values.len();
        let std = if n > 1 { values.iter().std_dev() } else { 0.0 };

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let iqr = Self::percentile(&sorted, 75.0) - Self::percentile(&sorted, 25.0);

        let spread = match (std > 0.0, iqr > 0.0) {
            (true, true) => std.min(iqr / 1.34),
            (true, false) => std,
            (false, true) => iqr / 1.34,
            (false, false) => 0.0,
        };

        let h = 0.9 * spread * (n as f64).powf(-0.2);
        if h > 0.0 {
            h
        } else {
            // Degenerate sample: scale the kernel to the magnitude of the data.
            let mean = values.iter().mean().abs();
            if mean > 0.0 {
                mean * 0.01
            } else {
                1.0
            }
        }
    }

    /// Grid scattered (x, y, z) points into `cells` x `cells` mean heights.
    ///
    /// Empty cells are filled by inverse-distance weighting from the
    /// occupied cell centres.
    pub fn surface_grid(x: &[f64], y: &[f64], z: &[f64], cells: usize) -> Option<SurfaceGrid> {
        let n = x.len().min(y.len()).min(z.len());
        if n == 0 {
            return None;
        }
        let cells = cells.max(2);

        let x_edges = edges(value_range(x[..n].iter().copied()), cells);
        let y_edges = edges(value_range(y[..n].iter().copied()), cells);

        let mut sums = vec![vec![0.0f64; cells]; cells];
        let mut counts = vec![vec![0usize; cells]; cells];
        for k in 0..n {
            let i = cell_index(&x_edges, x[k]);
            let j = cell_index(&y_edges, y[k]);
            sums[i][j] += z[k];
            counts[i][j] += 1;
        }

        let occupied: Vec<(f64, f64, f64)> = (0..cells)
            .flat_map(|i| (0..cells).map(move |j| (i, j)))
            .filter(|&(i, j)| counts[i][j] > 0)
            .map(|(i, j)| (i as f64, j as f64, sums[i][j] / counts[i][j] as f64))
            .collect();

        let heights = (0..cells)
            .map(|i| {
                (0..cells)
                    .map(|j| {
                        if counts[i][j] > 0 {
                            return sums[i][j] / counts[i][j] as f64;
                        }
                        let (mut weighted, mut total) = (0.0, 0.0);
                        for &(oi, oj, h) in &occupied {
                            let d2 = (oi - i as f64).powi(2) + (oj - j as f64).powi(2);
                            let w = 1.0 / d2;
                            weighted += w * h;
                            total += w;
                        }
                        weighted / total
                    })
                    .collect()
            })
            .collect();

        Some(SurfaceGrid {
            x_edges,
            y_edges,
            heights,
        })
    }
}

/// Min and max of the finite values; (0, 1) when there are none.
pub fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min.is_infinite() {
        (0.0, 1.0)
    } else {
        (min, max)
    }
}

/// Pad a range so plotted points do not sit on the frame.
pub fn padded_range((min, max): (f64, f64), fraction: f64) -> (f64, f64) {
    let span = max - min;
    if span > 0.0 {
        (min - span * fraction, max + span * fraction)
    } else {
        let pad = if min.abs() > 0.0 { min.abs() * 0.1 } else { 1.0 };
        (min - pad, max + pad)
    }
}

fn edges((min, max): (f64, f64), cells: usize) -> Vec<f64> {
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (max - min) / cells as f64;
    (0..=cells).map(|i| min + i as f64 * width).collect()
}

fn cell_index(edges: &[f64], v: f64) -> usize {
    let cells = edges.len() - 1;
    let width = edges[1] - edges[0];
    (((v - edges[0]) / width).floor().max(0.0) as usize).min(cells - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts_every_value() {
        let values = [1.0, 2.0, 2.5, 3.0, 9.0, 10.0];
        let bins = StatsCalculator::histogram(&values, 3);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[0].lower, 1.0);
        assert!((bins[2].upper - 10.0).abs() < 1e-9);
        // Max value lands in the last bin.
        assert_eq!(bins[2].count, 2);
    }

    #[test]
    fn histogram_of_constant_values_is_one_bin() {
        let bins = StatsCalculator::histogram(&[4.0, 4.0, 4.0], 20);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
        assert!(StatsCalculator::histogram(&[], 20).is_empty());
    }

    #[test]
    fn box_stats_match_numpy_percentiles() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 100.0];
        let stats = StatsCalculator::box_stats(&values).unwrap();
        assert_eq!(stats.count, 9);
        assert_eq!(stats.q1, 3.0);
        assert_eq!(stats.median, 5.0);
        assert_eq!(stats.q3, 7.0);
        assert_eq!(stats.whisker_low, 1.0);
        assert_eq!(stats.whisker_high, 8.0);
        assert_eq!(stats.outliers, vec![100.0]);
        assert!(StatsCalculator::box_stats(&[]).is_none());
    }

    #[test]
    fn pearson_detects_direction_and_constant_columns() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((StatsCalculator::pearson(&a, &up) - 1.0).abs() < 1e-12);
        assert!((StatsCalculator::pearson(&a, &down) + 1.0).abs() < 1e-12);
        assert!(StatsCalculator::pearson(&a, &[5.0; 4]).is_nan());
    }

    #[test]
    fn correlation_matrix_is_symmetric_with_unit_diagonal() {
        let columns = vec![
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, 1.0, 4.0, 3.0, 6.0],
            vec![5.0, 3.0, 4.0, 1.0, 2.0],
        ];
        let matrix = StatsCalculator::correlation_matrix(&columns);
        for i in 0..3 {
            assert!((matrix[i][i] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((matrix[i][j] - matrix[j][i]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn kde_integrates_to_roughly_one() {
        let values = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 4.0, 5.0];
        let curve = StatsCalculator::kde(&values);
        assert_eq!(curve.len(), KDE_POINTS);
        let step = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|(_, d)| d * step).sum();
        assert!((area - 1.0).abs() < 0.05, "area = {area}");
    }

    #[test]
    fn kde_handles_constant_sample() {
        let curve = StatsCalculator::kde(&[3.0, 3.0, 3.0]);
        assert_eq!(curve.len(), KDE_POINTS);
        assert!(curve.iter().all(|(_, d)| d.is_finite()));
    }

    #[test]
    fn surface_grid_fills_every_cell() {
        let x = [0.0, 1.0, 0.0, 1.0];
        let y = [0.0, 0.0, 1.0, 1.0];
        let z = [1.0, 2.0, 3.0, 4.0];
        let grid = StatsCalculator::surface_grid(&x, &y, &z, 4).unwrap();
        assert_eq!(grid.x_edges.len(), 5);
        assert_eq!(grid.heights.len(), 4);
        assert!(grid.heights.iter().flatten().all(|h| h.is_finite()));
        assert_eq!(grid.heights[0][0], 1.0);
        assert_eq!(grid.heights[3][3], 4.0);
        let (lo, hi) = grid.z_range();
        assert!(lo >= 1.0 && hi <= 4.0);
    }

    #[test]
    fn padded_range_handles_flat_data() {
        assert_eq!(padded_range((0.0, 10.0), 0.1), (-1.0, 11.0));
        let (lo, hi) = padded_range((5.0, 5.0), 0.1);
        assert!(lo < 5.0 && hi > 5.0);
    }
}
