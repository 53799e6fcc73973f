//! Named markers snapped onto the track, and the segments between them.

use serde::Serialize;

use crate::analyzer::TrackAnalyzer;
use crate::track_model::TrackPoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub name: String,
    /// Snapped to the bound track point.
    pub latitude: f64,
    pub longitude: f64,
    /// Index of the bound point in the loaded track.
    pub track_point: usize,
    /// Position in the marker list.
    pub index: usize,
}

/// Stretch of track between two markers. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<'a> {
    pub start_marker: Marker,
    pub end_marker: Marker,
    /// Meters.
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
    /// Percent; ascent over distance.
    pub avg_gradient: f64,
    pub track_points: &'a [TrackPoint],
}

/// Ordered marker list over one analyzed track.
///
/// Every structural change goes through [`MarkerManager::renumber`], so a
/// marker's `index` always equals its position.
#[derive(Debug)]
pub struct MarkerManager {
    analyzer: TrackAnalyzer,
    markers: Vec<Marker>,
}

impl MarkerManager {
    pub fn new(analyzer: TrackAnalyzer) -> Self {
        MarkerManager {
            analyzer,
            markers: Vec::new(),
        }
    }

    pub fn analyzer(&self) -> &TrackAnalyzer {
        &self.analyzer
    }

    /// The track point a marker is bound to.
    pub fn track_point(&self, marker: &Marker) -> &TrackPoint {
        &self.analyzer.track_points()[marker.track_point]
    }

    /// Snap `(latitude, longitude)` to the track and add a marker.
    ///
    /// With `insert_before_last` (and at least one marker present) the new
    /// marker goes just ahead of the current last one, which keeps a finish
    /// marker at the end.
    pub fn add(&mut self, name: &str, latitude: f64, longitude: f64, insert_before_last: bool) -> &Marker {
        let point = self.analyzer.nearest_point(latitude, longitude);

        let position = if insert_before_last && !self.markers.is_empty() {
            self.markers.len() - 1
        } else {
            self.markers.len()
        };

        let marker = Marker {
            name: name.to_string(),
            latitude: point.latitude,
            longitude: point.longitude,
            track_point: point.index,
            index: position,
        };

        self.markers.insert(position, marker);
        self.renumber(position);
        &self.markers[position]
    }

    /// Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) {
        if index < self.markers.len() {
            self.markers.remove(index);
            self.renumber(index);
        }
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Swap with the previous marker. False (and no change) for the first
    /// marker or an out-of-range index.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.markers.len() {
            return false;
        }
        self.markers.swap(index - 1, index);
        self.renumber(index - 1);
        true
    }

    /// Swap with the next marker. False (and no change) for the last marker
    /// or an out-of-range index.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index >= self.markers.len().saturating_sub(1) {
            return false;
        }
        self.markers.swap(index, index + 1);
        self.renumber(index);
        true
    }

    pub fn get(&self, index: usize) -> Option<&Marker> {
        self.markers.get(index)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Segment between two markers by list index; `None` if either is out of
    /// range.
    pub fn segment(&self, start_index: usize, end_index: usize) -> Option<Segment<'_>> {
        let start_marker = self.markers.get(start_index)?;
        let end_marker = self.markers.get(end_index)?;

        let span = self
            .analyzer
            .segment_between(self.track_point(start_marker), self.track_point(end_marker))?;

        let avg_gradient = if span.distance > 0.0 {
            span.ascent / span.distance * 100.0
        } else {
            0.0
        };

        Some(Segment {
            start_marker: start_marker.clone(),
            end_marker: end_marker.clone(),
            distance: span.distance,
            ascent: span.ascent,
            descent: span.descent,
            avg_gradient,
            track_points: span.points,
        })
    }

    /// One segment per consecutive marker pair, in list order.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        (1..self.markers.len())
            .filter_map(|i| self.segment(i - 1, i))
            .collect()
    }

    fn renumber(&mut self, from: usize) {
        for (i, marker) in self.markers.iter_mut().enumerate().skip(from) {
            marker.index = i;
        }
    }
}
