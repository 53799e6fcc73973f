use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

/// Failure to obtain or parse a GPX document. Raised by the loader, never by
/// the analysis core.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File size ({size_mb:.1}MB) exceeds maximum allowed size ({max_mb}MB)")]
    TooLarge { size_mb: f64, max_mb: u64 },

    #[error("Error decoding GPX file: {0}")]
    Decode(#[from] Utf8Error),

    #[error("Invalid GPX file format: {0}")]
    Malformed(#[from] gpx::errors::GpxError),

    #[error("Error fetching GPX from URL: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Error loading GPX file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No track points found in GPX file")]
    EmptyTrack,

    #[error("No GPX data loaded")]
    NotLoaded,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Error writing segment summary: {0}")]
    Export(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_too_large_message() {
        let err = LoadError::TooLarge { size_mb: 51.26, max_mb: 50 };
        assert_eq!(err.to_string(), "File size (51.3MB) exceeds maximum allowed size (50MB)");
    }

    #[test]
    fn test_load_error_keeps_its_source() {
        let bytes = [0xffu8, 0xfe];
        let utf8 = std::str::from_utf8(&bytes).unwrap_err();
        let err = AnalysisError::from(LoadError::from(utf8));
        assert!(err.to_string().starts_with("Error decoding GPX file"));
        // transparent: the chain continues at the utf8 error
        assert!(err.source().is_some());
    }
}
