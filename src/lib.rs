//! GPX track analysis for trail running: distance, filtered elevation gain
//! and loss, and per-segment summaries between named markers.

pub mod analyzer;
pub mod config;
pub mod elevation;
pub mod error;
pub mod export;
pub mod geometry;
pub mod loader;
pub mod markers;
pub mod session;
pub mod track_model;

pub use analyzer::{SegmentSpan, TrackAnalyzer, TrackStats};
pub use config::AnalysisConfig;
pub use elevation::{ElevationPipeline, FilteredElevation};
pub use error::{AnalysisError, LoadError, Result};
pub use export::{segment_summary, write_segment_summary, SegmentSummaryRow};
pub use loader::{GpxSource, ParsedGpx, PathSource, ReaderSource, UrlSource};
pub use markers::{Marker, MarkerManager, Segment};
pub use session::GpxSession;
pub use track_model::{RawSample, TrackModel, TrackPoint, Waypoint};
