//! Flattened, distance-annotated track built once per loaded GPX file.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::geometry::haversine_distance;

/// One sample as handed over by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub course: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl RawSample {
    pub fn new(latitude: f64, longitude: f64, elevation: Option<f64>) -> Self {
        RawSample {
            latitude,
            longitude,
            elevation,
            course: None,
            time: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    /// Cumulative distance in meters.
    pub distance_from_start: f64,
    /// Position in the flattened track.
    pub index: usize,
    /// Direction of travel in degrees (0-360), when the source recorded it.
    pub course: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub description: Option<String>,
}

/// Immutable point sequence with cumulative distances.
#[derive(Debug, Clone)]
pub struct TrackModel {
    points: Vec<TrackPoint>,
}

impl TrackModel {
    /// Walks the samples in order, accumulating haversine distance to each
    /// predecessor. Missing elevations become 0.0.
    pub fn build<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = RawSample>,
    {
        let mut points: Vec<TrackPoint> = Vec::new();
        let mut cumulative_distance = 0.0;

        for (index, sample) in samples.into_iter().enumerate() {
            if let Some(prev) = points.last() {
                cumulative_distance +=
                    haversine_distance(prev.latitude, prev.longitude, sample.latitude, sample.longitude);
            }

            points.push(TrackPoint {
                latitude: sample.latitude,
                longitude: sample.longitude,
                elevation: sample.elevation.unwrap_or(0.0),
                distance_from_start: cumulative_distance,
                index,
                course: sample.course,
                time: sample.time,
            });
        }

        if points.is_empty() {
            return Err(AnalysisError::EmptyTrack);
        }

        Ok(TrackModel { points })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a built model; kept for slice-like ergonomics.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn get(&self, index: usize) -> Option<&TrackPoint> {
        self.points.get(index)
    }

    pub fn total_distance(&self) -> f64 {
        self.last().distance_from_start
    }

    pub fn elevations(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.elevation).collect()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.distance_from_start).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(coords: &[(f64, f64, f64)]) -> Vec<RawSample> {
        coords
            .iter()
            .map(|&(lat, lon, ele)| RawSample::new(lat, lon, Some(ele)))
            .collect()
    }

    #[test]
    fn test_empty_track_is_rejected() {
        let result = TrackModel::build(Vec::new());
        assert!(matches!(result, Err(AnalysisError::EmptyTrack)));
    }

    #[test]
    fn test_single_point() {
        let model = TrackModel::build(samples(&[(35.0, 138.0, 500.0)])).unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.total_distance(), 0.0);
        assert_eq!(model.first().index, 0);
    }

    #[test]
    fn test_cumulative_distance_and_indices() {
        let model = TrackModel::build(samples(&[
            (35.3606, 138.7274, 1000.0),
            (35.3620, 138.7280, 1020.0),
            (35.3620, 138.7280, 1020.0),
            (35.3640, 138.7290, 1050.0),
        ]))
        .unwrap();

        let points = model.points();
        assert_eq!(points[0].distance_from_start, 0.0);
        for (i, w) in points.windows(2).enumerate() {
            assert!(w[0].distance_from_start <= w[1].distance_from_start);
            assert_eq!(w[0].index, i);
            assert_eq!(w[1].index, i + 1);
        }
        // duplicate coordinates add nothing
        assert_eq!(points[1].distance_from_start, points[2].distance_from_start);

        let step = haversine_distance(35.3606, 138.7274, 35.3620, 138.7280);
        assert!((points[1].distance_from_start - step).abs() < 1e-9);
    }

    #[test]
    fn test_missing_elevation_defaults_to_zero() {
        let model = TrackModel::build(vec![
            RawSample::new(35.0, 138.0, None),
            RawSample::new(35.001, 138.0, Some(12.0)),
        ])
        .unwrap();
        assert_eq!(model.elevations(), vec![0.0, 12.0]);
    }

    #[test]
    fn test_course_is_carried_through() {
        let mut sample = RawSample::new(35.0, 138.0, Some(1.0));
        sample.course = Some(270.0);
        let model = TrackModel::build(vec![sample]).unwrap();
        assert_eq!(model.first().course, Some(270.0));
    }
}
