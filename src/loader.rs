//! GPX loading: fetch raw bytes from a source, validate, parse.
//!
//! Every source (uploaded reader, local path, URL) only has to produce bytes;
//! size limits, decoding and GPX parsing are shared. Parsing is tolerant in
//! the way GPS platforms are: if the strict parse fails, a few safe repairs
//! are applied and the document is parsed once more. Repairs never touch
//! coordinates or elevation.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gpx::Gpx;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::LoadError;
use crate::track_model::{RawSample, Waypoint};

/// Placeholder for waypoints without a `<name>`.
pub const DEFAULT_WAYPOINT_NAME: &str = "Waypoint";

/// Anything that can hand over the raw bytes of a GPX document.
pub trait GpxSource {
    fn fetch(&mut self) -> Result<Vec<u8>, LoadError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// An already-open stream, e.g. an uploaded file.
pub struct ReaderSource<R> {
    reader: R,
    label: String,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        ReaderSource {
            reader,
            label: label.into(),
        }
    }
}

impl<R: Read> GpxSource for ReaderSource<R> {
    fn fetch(&mut self) -> Result<Vec<u8>, LoadError> {
        let mut content = Vec::new();
        self.reader
            .read_to_end(&mut content)
            .map_err(|source| LoadError::Io {
                path: PathBuf::from(&self.label),
                source,
            })?;
        Ok(content)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        PathSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl GpxSource for PathSource {
    fn fetch(&mut self) -> Result<Vec<u8>, LoadError> {
        let io_error = |source: io::Error| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(self.path.clone()),
            _ => LoadError::Io {
                path: self.path.clone(),
                source,
            },
        };

        let mut file = File::open(&self.path).map_err(io_error)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(io_error)?;
        Ok(content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Blocking HTTP(S) download with a request timeout.
pub struct UrlSource {
    url: String,
    timeout: Duration,
}

impl UrlSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        UrlSource {
            url: url.into(),
            timeout,
        }
    }
}

impl GpxSource for UrlSource {
    fn fetch(&mut self) -> Result<Vec<u8>, LoadError> {
        let client = reqwest::blocking::Client::builder().timeout(self.timeout).build()?;
        let response = client.get(&self.url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Parsed document as consumed by the track model.
#[derive(Debug, Clone, Default)]
pub struct ParsedGpx {
    pub track_name: Option<String>,
    /// Every track point, all tracks and segments concatenated in file order.
    pub samples: Vec<RawSample>,
    pub waypoints: Vec<Waypoint>,
}

/// Fetch from `source`, enforce the size limit, decode and parse.
pub fn load<S: GpxSource + ?Sized>(source: &mut S, config: &AnalysisConfig) -> Result<ParsedGpx, LoadError> {
    let content = source.fetch()?;
    let parsed = parse_gpx_bytes(&content, config.max_file_size_mb)?;
    info!(
        source = %source.describe(),
        points = parsed.samples.len(),
        waypoints = parsed.waypoints.len(),
        "GPX loaded"
    );
    Ok(parsed)
}

/// Validate and parse an in-memory GPX document.
pub fn parse_gpx_bytes(content: &[u8], max_file_size_mb: u64) -> Result<ParsedGpx, LoadError> {
    let size_mb = content.len() as f64 / (1024.0 * 1024.0);
    if size_mb > max_file_size_mb as f64 {
        return Err(LoadError::TooLarge {
            size_mb,
            max_mb: max_file_size_mb,
        });
    }

    let text = std::str::from_utf8(content)?;
    let gpx = read_gpx_tolerantly(text)?;
    Ok(convert(gpx))
}

fn read_gpx_tolerantly(text: &str) -> Result<Gpx, LoadError> {
    let strict_error = match gpx::read(text.as_bytes()) {
        Ok(gpx) => return Ok(gpx),
        Err(e) => e,
    };

    let repaired = apply_minimal_safe_repairs(text);
    if repaired == text {
        return Err(strict_error.into());
    }

    match gpx::read(repaired.as_bytes()) {
        Ok(gpx) => {
            warn!(error = %strict_error, "GPX needed minimal repairs before parsing");
            Ok(gpx)
        }
        Err(_) => Err(strict_error.into()),
    }
}

/// Repairs that leave all track data as-is: XML declaration, GPX version
/// attribute, characters that are not valid XML 1.0.
fn apply_minimal_safe_repairs(content: &str) -> String {
    let mut repaired = remove_invalid_xml_chars(content.trim_start_matches('\u{feff}'));

    if !repaired.starts_with("<?xml") {
        repaired = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", repaired);
    }

    add_gpx_version(&repaired)
}

fn add_gpx_version(content: &str) -> String {
    let Some(gpx_start) = content.find("<gpx") else {
        return content.to_string();
    };
    let Some(tag_len) = content[gpx_start..].find('>') else {
        return content.to_string();
    };
    if content[gpx_start..gpx_start + tag_len].contains("version=") {
        return content.to_string();
    }

    let name_end = gpx_start + "<gpx".len();
    format!("{} version=\"1.1\"{}", &content[..name_end], &content[name_end..])
}

fn remove_invalid_xml_chars(content: &str) -> String {
    content
        .chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || ('\u{20}'..='\u{d7ff}').contains(&c)
                || ('\u{e000}'..='\u{fffd}').contains(&c)
                || ('\u{10000}'..='\u{10ffff}').contains(&c)
        })
        .collect()
}

fn convert(gpx: Gpx) -> ParsedGpx {
    let track_name = gpx.tracks.iter().find_map(|t| t.name.clone());

    let samples = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|pt| {
            let point = pt.point();
            RawSample {
                latitude: point.y(),
                longitude: point.x(),
                elevation: pt.elevation,
                course: None,
                time: pt.time.as_ref().and_then(parse_time),
            }
        })
        .collect();

    let waypoints = gpx
        .waypoints
        .iter()
        .map(|wpt| {
            let point = wpt.point();
            Waypoint {
                name: wpt.name.clone().unwrap_or_else(|| DEFAULT_WAYPOINT_NAME.to_string()),
                latitude: point.y(),
                longitude: point.x(),
                elevation: wpt.elevation,
                description: wpt.description.clone(),
            }
        })
        .collect();

    ParsedGpx {
        track_name,
        samples,
        waypoints,
    }
}

fn parse_time(time: &gpx::Time) -> Option<DateTime<Utc>> {
    time.format().ok()?.parse::<DateTime<Utc>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SEGMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="35.3680" lon="138.7330"><ele>1100</ele><name>Summit</name><desc>Top of the climb</desc></wpt>
  <wpt lat="35.3720" lon="138.7370"></wpt>
  <trk>
    <name>Morning Run</name>
    <trkseg>
      <trkpt lat="35.3606" lon="138.7274"><ele>1000</ele><time>2024-05-01T06:00:00Z</time></trkpt>
      <trkpt lat="35.3620" lon="138.7280"><ele>1020</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="35.3640" lon="138.7290"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_segments_are_flattened_in_order() {
        let parsed = parse_gpx_bytes(TWO_SEGMENTS.as_bytes(), 50).unwrap();
        assert_eq!(parsed.track_name.as_deref(), Some("Morning Run"));
        assert_eq!(parsed.samples.len(), 3);
        assert_eq!(parsed.samples[0].latitude, 35.3606);
        assert_eq!(parsed.samples[0].longitude, 138.7274);
        assert_eq!(parsed.samples[1].elevation, Some(1020.0));
        assert_eq!(parsed.samples[2].latitude, 35.3640);
        assert_eq!(parsed.samples[2].elevation, None);
        assert!(parsed.samples[0].time.is_some());
        assert!(parsed.samples[1].time.is_none());
    }

    #[test]
    fn test_waypoints() {
        let parsed = parse_gpx_bytes(TWO_SEGMENTS.as_bytes(), 50).unwrap();
        assert_eq!(parsed.waypoints.len(), 2);
        assert_eq!(parsed.waypoints[0].name, "Summit");
        assert_eq!(parsed.waypoints[0].elevation, Some(1100.0));
        assert_eq!(parsed.waypoints[0].description.as_deref(), Some("Top of the climb"));
        assert_eq!(parsed.waypoints[1].name, DEFAULT_WAYPOINT_NAME);
    }

    #[test]
    fn test_size_limit() {
        let content = vec![b' '; 1024 * 1024 + 1];
        let err = parse_gpx_bytes(&content, 1).unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { max_mb: 1, .. }));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = parse_gpx_bytes(&[0x3c, 0xff, 0xfe, 0x3e], 50).unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }

    #[test]
    fn test_malformed_document() {
        let err = parse_gpx_bytes(b"this is not xml at all", 50).unwrap_err();
        assert!(matches!(err, LoadError::Malformed(_)));
    }

    #[test]
    fn test_missing_version_is_repaired() {
        let content = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><trk><trkseg>
            <trkpt lat="1.0" lon="2.0"><ele>3</ele></trkpt>
        </trkseg></trk></gpx>"#;
        let parsed = parse_gpx_bytes(content.as_bytes(), 50).unwrap();
        assert_eq!(parsed.samples.len(), 1);
        assert_eq!(parsed.samples[0].elevation, Some(3.0));
    }

    #[test]
    fn test_add_gpx_version() {
        assert_eq!(add_gpx_version("<gpx creator=\"x\">"), "<gpx version=\"1.1\" creator=\"x\">");
        assert_eq!(add_gpx_version("<gpx version=\"1.0\">"), "<gpx version=\"1.0\">");
        assert_eq!(add_gpx_version("<trk>"), "<trk>");
    }

    #[test]
    fn test_remove_invalid_xml_chars() {
        assert_eq!(remove_invalid_xml_chars("a\u{0}b\u{1b}c\n"), "abc\n");
    }

    #[test]
    fn test_reader_source() {
        let mut source = ReaderSource::new(TWO_SEGMENTS.as_bytes(), "upload.gpx");
        let parsed = load(&mut source, &AnalysisConfig::default()).unwrap();
        assert_eq!(parsed.samples.len(), 3);
        assert_eq!(source.describe(), "upload.gpx");
    }

    #[test]
    fn test_path_source_not_found() {
        let mut source = PathSource::new("/definitely/not/here.gpx");
        let err = load(&mut source, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
        assert!(err.to_string().contains("not/here.gpx"));
    }
}
