use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use serde_json::json;

use ruck_tracker::health::StaticHealthProvider;
use ruck_tracker::location::RecordingLocationProvider;
use ruck_tracker::replay::{load_track, replay_track, ReplayReport};
use ruck_tracker::store::MemoryStore;
use ruck_tracker::{SessionController, TrackerConfig};

#[derive(Parser, Debug)]
#[command(name = "ruck-replay")]
#[command(about = "Replay recorded rucking tracks through the tracker core", long_about = None)]
struct Args {
    /// Path to a track log (.json or .json.gz)
    #[arg(long, conflicts_with = "track_dir")]
    log: Option<PathBuf>,

    /// Directory of track logs to batch replay
    #[arg(long)]
    track_dir: Option<PathBuf>,

    /// Carried load in kilograms
    #[arg(long, default_value = "0.0")]
    load_kg: f64,

    /// Body weight in kilograms (falls back to the configured default)
    #[arg(long)]
    body_kg: Option<f64>,

    /// Tracker configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write report and session export as pretty JSON
    #[arg(long, conflicts_with = "track_dir")]
    output: Option<PathBuf>,

    /// Write the recorded track as GPX
    #[arg(long, conflicts_with = "track_dir")]
    gpx: Option<PathBuf>,
}

type ReplayController =
    SessionController<MemoryStore, StaticHealthProvider, RecordingLocationProvider>;

fn is_track_log(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".json") || name.ends_with(".json.gz")
}

fn run_once(path: &Path, args: &Args, config: &TrackerConfig) -> anyhow::Result<(ReplayReport, ReplayController)> {
    let samples = load_track(path).with_context(|| format!("loading {}", path.display()))?;
    log::info!("Loaded {} samples from {}", samples.len(), path.display());

    let health = match args.body_kg {
        Some(weight) => StaticHealthProvider::with_weight(weight),
        None => StaticHealthProvider::unavailable(),
    };
    let mut controller = SessionController::new(
        config.clone(),
        MemoryStore::new(),
        health,
        RecordingLocationProvider::new(),
    );
    let report = replay_track(&mut controller, &samples, args.load_kg)?;
    Ok((report, controller))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.config.as_ref() {
        Some(path) => TrackerConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    config.validate()?;

    if let Some(dir) = args.track_dir.as_ref() {
        let mut reports = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_track_log(&path) {
                continue;
            }
            match run_once(&path, &args, &config) {
                Ok((report, _)) => {
                    report.print_summary();
                    reports.push(json!({ "log": path.display().to_string(), "report": report }));
                }
                Err(e) => log::error!("Failed {}: {:#}", path.display(), e),
            }
        }
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let Some(log_path) = args.log.as_ref() else {
        anyhow::bail!("Provide --log or --track-dir");
    };
    let (report, controller) = run_once(log_path, &args, &config)?;
    report.print_summary();

    let export = controller
        .store()
        .export(report.session_id)
        .context("replayed session missing from store")?;

    if let Some(path) = args.output.as_ref() {
        let body = json!({ "report": report, "session": export });
        fs::write(path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }
    if let Some(path) = args.gpx.as_ref() {
        fs::write(path, export.to_gpx_xml()).with_context(|| format!("writing {}", path.display()))?;
        log::info!("GPX written to {}", path.display());
    }

    Ok(())
}
