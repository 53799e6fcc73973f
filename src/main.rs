use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use csv::Writer;
use rayon::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use trail_gpx_analyzer::{AnalysisConfig, GpxSession, TrackStats};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trail GPX analysis: distance, filtered climb and segment summaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one track and print its stats and segment summary
    Analyze {
        /// GPX file to load
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Fetch the GPX file over HTTP(S) instead
        #[arg(long)]
        url: Option<String>,

        /// Write the segment summary as CSV
        #[arg(long)]
        segments_csv: Option<PathBuf>,

        /// Extra marker inserted before the finish, as NAME:LAT:LON
        #[arg(long = "marker", value_parser = parse_marker)]
        markers: Vec<MarkerArg>,
    },
    /// Analyze every .gpx file under a directory in parallel
    Batch {
        dir: PathBuf,

        #[arg(long, default_value = "gpx_batch_summary.csv")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone)]
struct MarkerArg {
    name: String,
    latitude: f64,
    longitude: f64,
}

fn parse_marker(s: &str) -> Result<MarkerArg, String> {
    let mut parts = s.rsplitn(3, ':');
    let longitude = parts.next().ok_or("missing longitude")?;
    let latitude = parts.next().ok_or("expected NAME:LAT:LON")?;
    let name = parts.next().ok_or("expected NAME:LAT:LON")?;

    if name.is_empty() {
        return Err("marker name is empty".to_string());
    }
    let latitude: f64 = latitude.trim().parse().map_err(|e| format!("bad latitude: {}", e))?;
    let longitude: f64 = longitude.trim().parse().map_err(|e| format!("bad longitude: {}", e))?;

    Ok(MarkerArg {
        name: name.to_string(),
        latitude,
        longitude,
    })
}

struct BatchResult {
    filename: String,
    outcome: Result<TrackStats, String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::from_env();

    match cli.command {
        Command::Analyze {
            file,
            url,
            segments_csv,
            markers,
        } => run_analyze(config, file, url, segments_csv, &markers),
        Command::Batch { dir, output } => run_batch(config, &dir, &output),
    }
}

fn run_analyze(
    config: AnalysisConfig,
    file: Option<PathBuf>,
    url: Option<String>,
    segments_csv: Option<PathBuf>,
    extra_markers: &[MarkerArg],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = GpxSession::new(config);

    match (file, url) {
        (_, Some(url)) => {
            println!("🌐 Fetching {}", url);
            session.load_from_url(&url)?;
        }
        (Some(path), None) => {
            println!("📂 Loading {}", path.display());
            session.load_from_path(&path)?;
        }
        (None, None) => return Err("either a file or --url is required".into()),
    }

    for marker in extra_markers {
        session.add_marker(&marker.name, marker.latitude, marker.longitude, true)?;
    }

    let stats = session.stats()?;
    println!("\n🏔️  TRACK SUMMARY");
    println!("================");
    if let Some(name) = session.track_name()? {
        println!("Name:          {}", name);
    }
    println!("Distance:      {:.2} km", stats.total_distance / 1000.0);
    println!("Ascent:        {:.0} m", stats.total_ascent);
    println!("Descent:       {:.0} m", stats.total_descent);
    println!("Elevation:     {:.0} m .. {:.0} m", stats.min_elevation, stats.max_elevation);
    println!("Track points:  {}", stats.total_points);
    println!("Waypoints:     {}", session.waypoint_count());
    if let Some(elapsed) = session.analyzer()?.elapsed() {
        let minutes = elapsed.num_minutes();
        println!("Elapsed:       {}h {:02}m", minutes / 60, minutes % 60);
    }

    let rows = session.segment_summary()?;
    if rows.is_empty() {
        println!("\n📍 No segments (fewer than two markers)");
    } else {
        println!("\n📍 SEGMENTS");
        println!(
            "{:<4} {:<18} {:<18} {:>9} {:>8} {:>8} {:>8}",
            "#", "From", "To", "km", "Up m", "Down m", "Grade %"
        );
        for row in &rows {
            println!(
                "{:<4} {:<18} {:<18} {:>9.2} {:>8.0} {:>8.0} {:>8.1}",
                row.segment, row.start, row.end, row.distance_km, row.ascent_m, row.descent_m, row.gradient_pct
            );
        }
    }

    if let Some(path) = segments_csv {
        let writer = BufWriter::new(File::create(&path)?);
        session.write_segment_summary_csv(writer)?;
        println!("\n✅ Segment summary saved to: {}", path.display());
    }

    Ok(())
}

fn collect_gpx_files(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_gpx = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("gpx"));
        if is_gpx {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn run_batch(config: AnalysisConfig, dir: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let files = collect_gpx_files(dir)?;
    if files.is_empty() {
        println!("⚠️  No GPX files found under {}", dir.display());
        return Ok(());
    }

    println!("\n🚀 Processing {} GPX files", files.len());
    println!("⚡ Using parallel processing on {} cores", num_cpus::get());
    let start_time = Instant::now();

    let results: Vec<BatchResult> = files
        .par_iter()
        .map(|path| {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();
            let mut session = GpxSession::new(config.clone());
            let outcome = session
                .load_from_path(path)
                .and_then(|_| session.stats().cloned())
                .map_err(|e| e.to_string());
            BatchResult { filename, outcome }
        })
        .collect();

    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    write_batch_results(&results, output)?;

    println!(
        "✅ {} analyzed, {} failed in {:.1}s",
        results.len() - failed,
        failed,
        start_time.elapsed().as_secs_f64()
    );
    for result in &results {
        if let Err(e) = &result.outcome {
            println!("   ❌ {}: {}", result.filename, e);
        }
    }
    Ok(())
}

fn write_batch_results(results: &[BatchResult], output_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = Writer::from_path(output_path)?;

    wtr.write_record([
        "filename",
        "status",
        "distance_km",
        "ascent_m",
        "descent_m",
        "min_elevation_m",
        "max_elevation_m",
        "points",
        "error",
    ])?;

    for result in results {
        match &result.outcome {
            Ok(stats) => wtr.write_record(&[
                result.filename.clone(),
                "ok".to_string(),
                format!("{:.2}", stats.total_distance / 1000.0),
                format!("{:.0}", stats.total_ascent),
                format!("{:.0}", stats.total_descent),
                format!("{:.1}", stats.min_elevation),
                format!("{:.1}", stats.max_elevation),
                stats.total_points.to_string(),
                String::new(),
            ])?,
            Err(e) => wtr.write_record(&[
                result.filename.clone(),
                "error".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                e.clone(),
            ])?,
        }
    }

    wtr.flush()?;
    println!("📄 Batch summary saved to: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_marker() {
        let marker = parse_marker("Aid 1:35.36:138.72").unwrap();
        assert_eq!(marker.name, "Aid 1");
        assert_eq!(marker.latitude, 35.36);
        assert_eq!(marker.longitude, 138.72);
    }

    #[test]
    fn test_parse_marker_name_with_colon() {
        let marker = parse_marker("CP:North:35.0:-120.5").unwrap();
        assert_eq!(marker.name, "CP:North");
        assert_eq!(marker.longitude, -120.5);
    }

    #[test]
    fn test_parse_marker_rejects_bad_input() {
        assert!(parse_marker("35.0:138.0").is_err());
        assert!(parse_marker(":35.0:138.0").is_err());
        assert!(parse_marker("A:north:138.0").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
