//! Analysis and loader settings, with environment overrides.

use std::env;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Savitzky-Golay window for tracks with at least 50 samples.
    pub elevation_smoothing_window: usize,
    /// Minimum elevation change (m) counted as ascent or descent.
    pub elevation_threshold_m: f64,
    /// Spacing of the distance resampling grid (m).
    pub distance_resampling_m: f64,
    /// Resampling only kicks in above this track length (m).
    pub min_distance_for_resampling_m: f64,
    pub max_file_size_mb: u64,
    pub url_timeout_secs: u64,
    pub start_marker_name: String,
    pub finish_marker_name: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            elevation_smoothing_window: 5,
            elevation_threshold_m: 0.5,
            distance_resampling_m: 10.0,
            min_distance_for_resampling_m: 100.0,
            max_file_size_mb: 50,
            url_timeout_secs: 30,
            start_marker_name: "Start".to_string(),
            finish_marker_name: "Finish".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Defaults overlaid with `GPX_*` environment variables.
    /// Unparseable values keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            elevation_smoothing_window: env_or("GPX_ELEVATION_SMOOTHING_WINDOW", defaults.elevation_smoothing_window),
            elevation_threshold_m: env_or("GPX_ELEVATION_THRESHOLD_M", defaults.elevation_threshold_m),
            distance_resampling_m: env_or("GPX_DISTANCE_RESAMPLING_M", defaults.distance_resampling_m),
            min_distance_for_resampling_m: env_or(
                "GPX_MIN_DISTANCE_FOR_RESAMPLING_M",
                defaults.min_distance_for_resampling_m,
            ),
            max_file_size_mb: env_or("GPX_MAX_FILE_SIZE_MB", defaults.max_file_size_mb),
            url_timeout_secs: env_or("GPX_URL_TIMEOUT_SECS", defaults.url_timeout_secs),
            start_marker_name: env::var("GPX_START_MARKER_NAME").unwrap_or(defaults.start_marker_name),
            finish_marker_name: env::var("GPX_FINISH_MARKER_NAME").unwrap_or(defaults.finish_marker_name),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
