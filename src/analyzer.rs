//! Whole-track statistics, nearest-point lookup and point-range segments.

use std::cell::OnceCell;

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::elevation::ElevationPipeline;
use crate::error::Result;
use crate::geometry::haversine_distance;
use crate::track_model::{RawSample, TrackModel, TrackPoint, Waypoint};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackStats {
    /// Meters, from the last point's cumulative distance.
    pub total_distance: f64,
    /// Filtered ascent in meters.
    pub total_ascent: f64,
    /// Filtered descent in meters.
    pub total_descent: f64,
    /// Raw (unfiltered) minimum.
    pub min_elevation: f64,
    /// Raw (unfiltered) maximum.
    pub max_elevation: f64,
    pub total_points: usize,
}

/// Contiguous stretch of the track between two points, with its own
/// independently filtered ascent and descent.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpan<'a> {
    pub points: &'a [TrackPoint],
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// Analysis of one loaded track. Owns the point sequence and memoizes the
/// whole-track statistics.
#[derive(Debug)]
pub struct TrackAnalyzer {
    model: TrackModel,
    waypoints: Vec<Waypoint>,
    pipeline: ElevationPipeline,
    stats: OnceCell<TrackStats>,
}

impl TrackAnalyzer {
    pub fn new(model: TrackModel, waypoints: Vec<Waypoint>, config: &AnalysisConfig) -> Self {
        TrackAnalyzer {
            model,
            waypoints,
            pipeline: ElevationPipeline::new(config),
            stats: OnceCell::new(),
        }
    }

    /// Builds the track model from raw samples; fails on an empty track.
    pub fn from_samples<I>(samples: I, waypoints: Vec<Waypoint>, config: &AnalysisConfig) -> Result<Self>
    where
        I: IntoIterator<Item = RawSample>,
    {
        let model = TrackModel::build(samples)?;
        Ok(Self::new(model, waypoints, config))
    }

    pub fn track_points(&self) -> &[TrackPoint] {
        self.model.points()
    }

    pub fn model(&self) -> &TrackModel {
        &self.model
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn pipeline(&self) -> &ElevationPipeline {
        &self.pipeline
    }

    /// Whole-track statistics, computed on first use.
    pub fn stats(&self) -> &TrackStats {
        self.stats.get_or_init(|| self.compute_stats())
    }

    fn compute_stats(&self) -> TrackStats {
        let elevations = self.model.elevations();
        let filtered = self.pipeline.run(&self.model.distances(), &elevations);

        let (min_elevation, max_elevation) = elevations
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &e| (lo.min(e), hi.max(e)));

        let stats = TrackStats {
            total_distance: self.model.total_distance(),
            total_ascent: filtered.ascent,
            total_descent: filtered.descent,
            min_elevation,
            max_elevation,
            total_points: self.model.len(),
        };
        debug!(?stats, "track stats computed");
        stats
    }

    /// Time between the first and last timestamped points, if the source
    /// recorded any.
    pub fn elapsed(&self) -> Option<Duration> {
        let points = self.model.points();
        let start = points.iter().find_map(|p| p.time)?;
        let end = points.iter().rev().find_map(|p| p.time)?;
        Some(end - start)
    }

    /// The track point closest to the given coordinates. Ties go to the
    /// lowest index.
    pub fn nearest_point(&self, latitude: f64, longitude: f64) -> &TrackPoint {
        let points = self.model.points();
        let mut nearest = &points[0];
        let mut min_distance = f64::INFINITY;

        for point in points {
            let distance = haversine_distance(latitude, longitude, point.latitude, point.longitude);
            if distance < min_distance {
                min_distance = distance;
                nearest = point;
            }
        }

        nearest
    }

    /// Segment between two points in track order, whichever is passed first.
    ///
    /// Ascent and descent are recomputed on the sub-range alone (distances
    /// re-based to zero), so they are not a slice of the whole-track totals.
    /// `None` if either point's index lies outside this track.
    pub fn segment_between(&self, a: &TrackPoint, b: &TrackPoint) -> Option<SegmentSpan<'_>> {
        let (start, end) = if a.index > b.index { (b, a) } else { (a, b) };

        let points = self.model.points().get(start.index..=end.index)?;
        let distance = (end.distance_from_start - start.distance_from_start).abs();

        let elevations: Vec<f64> = points.iter().map(|p| p.elevation).collect();
        let distances: Vec<f64> = points
            .iter()
            .map(|p| p.distance_from_start - start.distance_from_start)
            .collect();
        let filtered = self.pipeline.run(&distances, &elevations);

        Some(SegmentSpan {
            points,
            distance,
            ascent: filtered.ascent,
            descent: filtered.descent,
        })
    }
}
