//! Elevation gain/loss pipeline
//!
//! Raw GPS elevation goes through four stages, always in this order:
//!
//! 1. distance resampling onto a uniform grid (long tracks only)
//! 2. IQR outlier replacement
//! 3. Savitzky-Golay smoothing (order 2)
//! 4. threshold-filtered ascent/descent accumulation
//!
//! Each stage steps aside when the input is too small for it to mean anything,
//! so short or sparse tracks pass through untouched instead of failing.
//!
//! Usage:
//! ```rust
//! use trail_gpx_analyzer::config::AnalysisConfig;
//! use trail_gpx_analyzer::elevation::ElevationPipeline;
//!
//! let pipeline = ElevationPipeline::new(&AnalysisConfig::default());
//! let result = pipeline.run(&[0.0, 50.0, 90.0], &[100.0, 104.0, 101.0]);
//! assert_eq!(result.ascent, 4.0);
//! assert_eq!(result.descent, 3.0);
//! ```

use tracing::{debug, warn};

use crate::config::AnalysisConfig;

/// Outlier removal and smoothing need at least this many samples.
pub const MIN_SAMPLES_FOR_FILTERING: usize = 20;

/// Below this many samples the smoothing window is fixed at 3.
const SHORT_TRACK_SAMPLES: usize = 50;

const POLY_ORDER: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ElevationPipeline {
    pub resampling_interval_m: f64,
    pub min_distance_for_resampling_m: f64,
    pub smoothing_window: usize,
    pub threshold_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    pub original_points: usize,
    pub resampled_points: Option<usize>,
    pub outliers_replaced: usize,
    pub smoothing_window: Option<usize>,
}

/// Filtered profile plus the totals derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredElevation {
    pub distances: Vec<f64>,
    pub elevations: Vec<f64>,
    pub ascent: f64,
    pub descent: f64,
    pub stats: PipelineStats,
}

impl Default for ElevationPipeline {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl ElevationPipeline {
    pub fn new(config: &AnalysisConfig) -> Self {
        ElevationPipeline {
            resampling_interval_m: config.distance_resampling_m,
            min_distance_for_resampling_m: config.min_distance_for_resampling_m,
            smoothing_window: config.elevation_smoothing_window,
            threshold_m: config.elevation_threshold_m,
        }
    }

    /// Runs all four stages. `distances` must be cumulative, start-aligned and
    /// the same length as `elevations`.
    pub fn run(&self, distances: &[f64], elevations: &[f64]) -> FilteredElevation {
        let mut result = self.filter(distances, elevations);
        let (ascent, descent) = calculate_elevation_gain_loss(&result.elevations, self.threshold_m);
        result.ascent = ascent;
        result.descent = descent;
        result
    }

    /// Stages 1-3 only. Ascent and descent are left at zero.
    pub fn filter(&self, distances: &[f64], elevations: &[f64]) -> FilteredElevation {
        let total_distance = distances.last().copied().unwrap_or(0.0);

        let (distances, resampled, resampled_points) = if total_distance > self.min_distance_for_resampling_m {
            let (d, e) = resample_by_distance(distances, elevations, self.resampling_interval_m);
            let n = e.len();
            (d, e, Some(n))
        } else {
            debug!(total_distance, "track too short for resampling");
            (distances.to_vec(), elevations.to_vec(), None)
        };

        let (cleaned, outliers_replaced) = replace_outliers(&resampled);
        let (smoothed, smoothing_window) = smooth(&cleaned, self.smoothing_window);

        debug!(
            original = elevations.len(),
            resampled = ?resampled_points,
            outliers_replaced,
            window = ?smoothing_window,
            "elevation filtered"
        );

        FilteredElevation {
            distances,
            elevations: smoothed,
            ascent: 0.0,
            descent: 0.0,
            stats: PipelineStats {
                original_points: elevations.len(),
                resampled_points,
                outliers_replaced,
                smoothing_window,
            },
        }
    }
}

/// Resample elevation at regular distance intervals.
///
/// Produces `floor(total / interval) + 1` evenly spaced distances from 0 to
/// the total and linearly interpolates elevation at each one. Fewer than two
/// samples, or a non-positive interval, returns the input unchanged.
pub fn resample_by_distance(distances: &[f64], elevations: &[f64], interval_m: f64) -> (Vec<f64>, Vec<f64>) {
    if distances.len() < 2 || elevations.len() < 2 || !(interval_m > 0.0) {
        return (distances.to_vec(), elevations.to_vec());
    }

    let total_distance = distances[distances.len() - 1];
    let num_samples = (total_distance / interval_m).floor() as usize + 1;

    let uniform_distances = linspace(0.0, total_distance, num_samples);
    let uniform_elevations = uniform_distances
        .iter()
        .map(|&d| interpolate(d, distances, elevations))
        .collect();

    (uniform_distances, uniform_elevations)
}

/// Replace IQR outliers with values interpolated from the surviving samples.
pub fn remove_outliers(elevations: &[f64]) -> Vec<f64> {
    replace_outliers(elevations).0
}

fn replace_outliers(elevations: &[f64]) -> (Vec<f64>, usize) {
    if elevations.len() < MIN_SAMPLES_FOR_FILTERING {
        return (elevations.to_vec(), 0);
    }

    let mut sorted = elevations.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let lower_bound = q1 - 1.5 * iqr;
    let upper_bound = q3 + 1.5 * iqr;

    let is_outlier = |e: f64| e < lower_bound || e > upper_bound;

    let mut good_indices = Vec::with_capacity(elevations.len());
    let mut good_values = Vec::with_capacity(elevations.len());
    for (i, &e) in elevations.iter().enumerate() {
        if !is_outlier(e) {
            good_indices.push(i as f64);
            good_values.push(e);
        }
    }

    let outlier_count = elevations.len() - good_values.len();
    // nothing to fix, or nothing left to interpolate from
    if outlier_count == 0 || good_values.is_empty() {
        return (elevations.to_vec(), 0);
    }

    let cleaned = elevations
        .iter()
        .enumerate()
        .map(|(i, &e)| {
            if is_outlier(e) {
                interpolate(i as f64, &good_indices, &good_values)
            } else {
                e
            }
        })
        .collect();

    (cleaned, outlier_count)
}

/// Savitzky-Golay smoothing with an adaptive window (see [`smoothing_window`]).
/// Falls back to the unsmoothed input when the fit is degenerate.
pub fn smooth_elevation(elevations: &[f64], configured_window: usize) -> Vec<f64> {
    smooth(elevations, configured_window).0
}

fn smooth(elevations: &[f64], configured_window: usize) -> (Vec<f64>, Option<usize>) {
    let Some(window) = smoothing_window(elevations.len(), configured_window) else {
        return (elevations.to_vec(), None);
    };

    let poly_order = POLY_ORDER.min(window - 1);
    match savitzky_golay(elevations, window, poly_order) {
        Some(smoothed) => (smoothed, Some(window)),
        None => {
            warn!(window, poly_order, "Savitzky-Golay fit failed, keeping unsmoothed elevation");
            (elevations.to_vec(), None)
        }
    }
}

/// Window length used for `n` samples, or `None` when smoothing is skipped.
///
/// 3 for 20-49 samples; the configured window from 50 samples on, shrunk to
/// the largest odd length that fits. Always odd and at least 3.
pub fn smoothing_window(n: usize, configured_window: usize) -> Option<usize> {
    if n < MIN_SAMPLES_FOR_FILTERING {
        return None;
    }

    let mut window = if n < SHORT_TRACK_SAMPLES {
        3
    } else if n < configured_window {
        n
    } else {
        configured_window
    };

    if window % 2 == 0 {
        window = window.saturating_sub(1);
    }
    if window < 3 {
        return None;
    }
    Some(window)
}

/// Local polynomial least-squares filter. Edges are padded by repeating the
/// first/last sample. Returns `None` for an even or oversized window, or when
/// the normal equations are singular.
pub fn savitzky_golay(data: &[f64], window: usize, poly_order: usize) -> Option<Vec<f64>> {
    if window % 2 == 0 || poly_order >= window || data.is_empty() {
        return None;
    }

    let coefficients = savgol_coefficients(window, poly_order)?;
    let half = (window / 2) as isize;
    let last = data.len() as isize - 1;

    let smoothed = (0..data.len() as isize)
        .map(|i| {
            coefficients
                .iter()
                .zip(-half..=half)
                .map(|(c, k)| c * data[(i + k).clamp(0, last) as usize])
                .sum::<f64>()
        })
        .collect();

    Some(smoothed)
}

/// Convolution weights that evaluate the least-squares polynomial at the
/// window centre.
fn savgol_coefficients(window: usize, poly_order: usize) -> Option<Vec<f64>> {
    let half = (window / 2) as i32;
    let size = poly_order + 1;

    // normal matrix: sum over the window of k^(r + c)
    let mut normal = vec![vec![0.0; size]; size];
    for (r, row) in normal.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (-half..=half).map(|k| (k as f64).powi((r + c) as i32)).sum();
        }
    }

    let mut rhs = vec![0.0; size];
    rhs[0] = 1.0;
    let solution = solve_linear_system(normal, rhs)?;

    let coefficients = (-half..=half)
        .map(|k| {
            solution
                .iter()
                .enumerate()
                .map(|(power, a)| a * (k as f64).powi(power as i32))
                .sum::<f64>()
        })
        .collect();

    Some(coefficients)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Total ascent and descent, ignoring steps within `threshold_m` of zero.
pub fn calculate_elevation_gain_loss(elevations: &[f64], threshold_m: f64) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;

    for w in elevations.windows(2) {
        let delta = w[1] - w[0];
        if delta > threshold_m {
            gain += delta;
        } else if delta < -threshold_m {
            loss += -delta;
        }
    }

    (gain, loss)
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`. `xp` must be
/// non-decreasing; values outside its range clamp to the end samples.
fn interpolate(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let last = xp.len() - 1;
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }

    // xp[lo] <= x < xp[hi]
    let hi = xp.partition_point(|&v| v <= x);
    let lo = hi - 1;
    let t = (x - xp[lo]) / (xp[hi] - xp[lo]);
    fp[lo] + t * (fp[hi] - fp[lo])
}

fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            values[num - 1] = stop;
            values
        }
    }
}

/// Linear-interpolated percentile of an already sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}
