//! One user's loaded track: analyzer, markers and the operations the
//! presentation layer calls.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::analyzer::{TrackAnalyzer, TrackStats};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::export::{segment_summary, write_segment_summary, SegmentSummaryRow};
use crate::loader::{self, GpxSource, ParsedGpx, PathSource, ReaderSource, UrlSource};
use crate::markers::{Marker, MarkerManager, Segment};
use crate::track_model::{TrackPoint, Waypoint};

#[derive(Debug)]
struct LoadedTrack {
    track_name: Option<String>,
    markers: MarkerManager,
}

/// Loaded-track session. Every accessor except [`GpxSession::is_loaded`],
/// [`GpxSession::reset`] and [`GpxSession::waypoint_count`] fails with
/// [`AnalysisError::NotLoaded`] until a load succeeds.
#[derive(Debug, Default)]
pub struct GpxSession {
    config: AnalysisConfig,
    loaded: Option<LoadedTrack>,
}

impl GpxSession {
    pub fn new(config: AnalysisConfig) -> Self {
        GpxSession { config, loaded: None }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn load_from_reader<R: Read>(&mut self, reader: R, label: &str) -> Result<()> {
        self.load_from_source(&mut ReaderSource::new(reader, label))
    }

    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.load_from_source(&mut PathSource::new(path))
    }

    pub fn load_from_url(&mut self, url: &str) -> Result<()> {
        let timeout = Duration::from_secs(self.config.url_timeout_secs);
        self.load_from_source(&mut UrlSource::new(url, timeout))
    }

    pub fn load_from_source<S: GpxSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        // a failed load never leaves the previous track behind
        self.loaded = None;
        let parsed = loader::load(source, &self.config)?;
        self.load_parsed(parsed)
    }

    /// Builds the track and seeds the default markers: start, one per
    /// waypoint in file order, and finish when the track has more than one
    /// point.
    pub fn load_parsed(&mut self, parsed: ParsedGpx) -> Result<()> {
        self.loaded = None;
        let analyzer = TrackAnalyzer::from_samples(parsed.samples, parsed.waypoints, &self.config)?;
        let mut markers = MarkerManager::new(analyzer);
        seed_markers(&mut markers, &self.config);

        info!(
            track = parsed.track_name.as_deref().unwrap_or("unnamed"),
            points = markers.analyzer().track_points().len(),
            markers = markers.len(),
            "track ready"
        );

        self.loaded = Some(LoadedTrack {
            track_name: parsed.track_name,
            markers,
        });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn reset(&mut self) {
        self.loaded = None;
    }

    fn loaded(&self) -> Result<&LoadedTrack> {
        self.loaded.as_ref().ok_or(AnalysisError::NotLoaded)
    }

    fn markers_mut(&mut self) -> Result<&mut MarkerManager> {
        self.loaded
            .as_mut()
            .map(|l| &mut l.markers)
            .ok_or(AnalysisError::NotLoaded)
    }

    pub fn analyzer(&self) -> Result<&TrackAnalyzer> {
        Ok(self.loaded()?.markers.analyzer())
    }

    pub fn track_name(&self) -> Result<Option<&str>> {
        Ok(self.loaded()?.track_name.as_deref())
    }

    pub fn stats(&self) -> Result<&TrackStats> {
        Ok(self.analyzer()?.stats())
    }

    pub fn track_points(&self) -> Result<&[TrackPoint]> {
        Ok(self.analyzer()?.track_points())
    }

    pub fn waypoints(&self) -> Result<&[Waypoint]> {
        Ok(self.analyzer()?.waypoints())
    }

    /// Zero when nothing is loaded.
    pub fn waypoint_count(&self) -> usize {
        self.loaded
            .as_ref()
            .map_or(0, |l| l.markers.analyzer().waypoints().len())
    }

    pub fn markers(&self) -> Result<&[Marker]> {
        Ok(self.loaded()?.markers.markers())
    }

    pub fn add_marker(&mut self, name: &str, latitude: f64, longitude: f64, insert_before_last: bool) -> Result<()> {
        self.markers_mut()?.add(name, latitude, longitude, insert_before_last);
        Ok(())
    }

    pub fn remove_marker(&mut self, index: usize) -> Result<()> {
        self.markers_mut()?.remove(index);
        Ok(())
    }

    pub fn clear_markers(&mut self) -> Result<()> {
        self.markers_mut()?.clear();
        Ok(())
    }

    pub fn move_marker_up(&mut self, index: usize) -> Result<bool> {
        Ok(self.markers_mut()?.move_up(index))
    }

    pub fn move_marker_down(&mut self, index: usize) -> Result<bool> {
        Ok(self.markers_mut()?.move_down(index))
    }

    pub fn segments(&self) -> Result<Vec<Segment<'_>>> {
        Ok(self.loaded()?.markers.segments())
    }

    pub fn segment(&self, start_index: usize, end_index: usize) -> Result<Option<Segment<'_>>> {
        Ok(self.loaded()?.markers.segment(start_index, end_index))
    }

    pub fn segment_summary(&self) -> Result<Vec<SegmentSummaryRow>> {
        Ok(segment_summary(&self.segments()?))
    }

    pub fn write_segment_summary_csv<W: Write>(&self, writer: W) -> Result<()> {
        write_segment_summary(writer, &self.segment_summary()?)
    }
}

fn seed_markers(markers: &mut MarkerManager, config: &AnalysisConfig) {
    let points = markers.analyzer().track_points();
    let first = (points[0].latitude, points[0].longitude);
    let last = (points.len() > 1).then(|| {
        let p = &points[points.len() - 1];
        (p.latitude, p.longitude)
    });
    let waypoints: Vec<(String, f64, f64)> = markers
        .analyzer()
        .waypoints()
        .iter()
        .map(|w| (w.name.clone(), w.latitude, w.longitude))
        .collect();

    markers.add(&config.start_marker_name, first.0, first.1, false);
    for (name, latitude, longitude) in &waypoints {
        markers.add(name, *latitude, *longitude, false);
    }
    if let Some((latitude, longitude)) = last {
        markers.add(&config.finish_marker_name, latitude, longitude, false);
    }
}
