//! EEG Desktop - run an analysis configuration and browse its figures

mod app;
mod ui;

use anyhow::Context;
use app::EegApp;
use clap::Parser;
use eeg_core::{find_events, io, Event, Recording};
use eeg_processing::{AnalysisConfig, AnalysisPipeline, AnalysisReport};
use eeg_simulation::{ErpConfig, ErpSimulator};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "eeg-desktop", about = "Event-related EEG analysis and decoding")]
struct Args {
    /// Analysis configuration (JSON); the face-ERP preset when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recording file (JSON); a simulated face dataset when omitted
    #[arg(short, long)]
    recording: Option<PathBuf>,

    /// Event file, `sample code` or `sample previous code` per line
    #[arg(short, long, requires = "recording")]
    events: Option<PathBuf>,

    /// Seed of the simulated dataset
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print the report as JSON instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<AnalysisConfig> {
    match &args.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(AnalysisConfig::faces_erp()?),
    }
}

/// Recording and events from files, or a seeded simulation
fn load_data(args: &Args, config: &AnalysisConfig) -> anyhow::Result<(Recording, Vec<Event>)> {
    let Some(path) = &args.recording else {
        info!(seed = args.seed, "no recording given, simulating face dataset");
        let data = ErpSimulator::new(ErpConfig::faces(args.seed))?.generate()?;
        return Ok((data.recording, data.events));
    };

    let recording = io::load_recording(path)
        .with_context(|| format!("loading recording {}", path.display()))?;
    let events = match &args.events {
        Some(events) => io::read_events(events)
            .with_context(|| format!("reading events {}", events.display()))?,
        None => find_events(&recording, &config.stim_channel)
            .with_context(|| format!("finding events on '{}'", config.stim_channel))?,
    };
    Ok((recording, events))
}

fn run(args: &Args) -> anyhow::Result<AnalysisReport> {
    let config = load_config(args)?;
    let (recording, events) = load_data(args, &config)?;
    info!(
        channels = recording.channel_count(),
        seconds = recording.duration(),
        events = events.len(),
        "data loaded"
    );
    let pipeline = AnalysisPipeline::new(config)?;
    Ok(pipeline.run(recording, &events)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if let Some(path) = &args.write_config {
        let config = load_config(&args)?;
        config.validate()?;
        std::fs::write(path, config.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    let report = run(&args)?;

    if args.headless {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1000.0, 700.0]),
        ..Default::default()
    };

    let title = format!("EEG Desktop - {}", report.name);
    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(EegApp::new(report)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run native app: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["eeg-desktop", "--headless"]).unwrap();
        assert!(args.headless);
        assert_eq!(args.seed, 42);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_events_require_recording() {
        assert!(Args::try_parse_from(["eeg-desktop", "--events", "ev.txt"]).is_err());
        let args =
            Args::try_parse_from(["eeg-desktop", "-r", "rec.json", "-e", "ev.txt"]).unwrap();
        assert_eq!(args.events, Some(PathBuf::from("ev.txt")));
    }

    #[test]
    fn test_write_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.json");
        let args = Args::try_parse_from(["eeg-desktop"]).unwrap();
        let config = load_config(&args).unwrap();
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        let args = Args::try_parse_from(["eeg-desktop", "-c", path.to_str().unwrap()]).unwrap();
        assert_eq!(load_config(&args).unwrap(), config);
    }
}
