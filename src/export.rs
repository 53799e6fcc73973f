//! Tabular segment summary and its CSV form.

use std::io::Write;

use csv::WriterBuilder;
use serde::Serialize;

use crate::error::Result;
use crate::markers::Segment;

const HEADER: [&str; 7] = [
    "segment",
    "start",
    "end",
    "distance_km",
    "ascent_m",
    "descent_m",
    "gradient_pct",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummaryRow {
    /// 1-based label.
    pub segment: String,
    pub start: String,
    pub end: String,
    pub distance_km: f64,
    pub ascent_m: f64,
    pub descent_m: f64,
    pub gradient_pct: f64,
}

pub fn segment_summary(segments: &[Segment<'_>]) -> Vec<SegmentSummaryRow> {
    segments
        .iter()
        .enumerate()
        .map(|(i, seg)| SegmentSummaryRow {
            segment: (i + 1).to_string(),
            start: seg.start_marker.name.clone(),
            end: seg.end_marker.name.clone(),
            distance_km: seg.distance / 1000.0,
            ascent_m: seg.ascent,
            descent_m: seg.descent,
            gradient_pct: seg.avg_gradient,
        })
        .collect()
}

/// Header first, then one record per row at full precision. An empty
/// summary still gets the header.
pub fn write_segment_summary<W: Write>(writer: W, rows: &[SegmentSummaryRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);

    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::Marker;

    fn marker(name: &str, index: usize) -> Marker {
        Marker {
            name: name.to_string(),
            latitude: 35.0,
            longitude: 138.0,
            track_point: index,
            index,
        }
    }

    fn segment(start: &str, end: &str, distance: f64, ascent: f64, descent: f64) -> Segment<'static> {
        Segment {
            start_marker: marker(start, 0),
            end_marker: marker(end, 1),
            distance,
            ascent,
            descent,
            avg_gradient: if distance > 0.0 { ascent / distance * 100.0 } else { 0.0 },
            track_points: &[],
        }
    }

    #[test]
    fn test_summary_rows() {
        let segments = vec![
            segment("Start", "Aid", 2500.0, 120.0, 30.0),
            segment("Aid", "Finish", 1000.0, 0.0, 80.0),
        ];
        let rows = segment_summary(&segments);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].segment, "1");
        assert_eq!(rows[1].segment, "2");
        assert_eq!(rows[0].start, "Start");
        assert_eq!(rows[1].end, "Finish");
        assert!((rows[0].distance_km - 2.5).abs() < 1e-12);
        assert!((rows[0].gradient_pct - 4.8).abs() < 1e-12);
        assert_eq!(rows[1].gradient_pct, 0.0);
    }

    #[test]
    fn test_empty_summary_writes_header_only() {
        let mut out = Vec::new();
        write_segment_summary(&mut out, &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "segment,start,end,distance_km,ascent_m,descent_m,gradient_pct\n");
    }

    #[test]
    fn test_csv_output_keeps_full_precision() {
        let rows = vec![SegmentSummaryRow {
            segment: "1".to_string(),
            start: "Start".to_string(),
            end: "Top, North".to_string(),
            distance_km: 1.23456,
            ascent_m: 12.4,
            descent_m: 0.49,
            gradient_pct: 1.0044,
        }];
        let mut out = Vec::new();
        write_segment_summary(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "segment,start,end,distance_km,ascent_m,descent_m,gradient_pct");
        assert_eq!(lines[1], "1,Start,\"Top, North\",1.23456,12.4,0.49,1.0044");
    }
}
