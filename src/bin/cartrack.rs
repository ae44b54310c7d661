//! Track cars through a video and store every matched observation in SQLite.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cartrack_rs::storage::DEFAULT_DATABASE;
use cartrack_rs::{
    AssociationStrategy, BoxAnnotator, ImageSequenceSource, IouTracker, PipelineConfig,
    PipelineError, ReplayDetector, SqliteStore, Stage, StopHandle, TrackingPipeline, TrackingRecord,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    GreedyReuse,
    GreedyExclusive,
    Optimal,
}

impl From<Strategy> for AssociationStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::GreedyReuse => AssociationStrategy::GreedyReuse,
            Strategy::GreedyExclusive => AssociationStrategy::GreedyExclusive,
            Strategy::Optimal => AssociationStrategy::Optimal,
        }
    }
}

/// Vehicle tracking over an image sequence
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of frame images, or a single image
    video_source: PathBuf,

    /// Recorded detections to replay, one JSON line per frame
    #[arg(default_value = "yolov8l.jsonl")]
    model_name: PathBuf,

    /// SQLite database receiving the tracking records
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// JSON pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write annotated frames into this directory
    #[arg(long)]
    annotate_dir: Option<PathBuf>,

    /// Export per-track confidence history (raw and smoothed) as JSON
    #[arg(long)]
    history_out: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// How tracked objects are paired with detections
    #[arg(long, value_enum)]
    strategy: Option<Strategy>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cartrack=info,cartrack_rs=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    }
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("{} stage: failed to load config", Stage::Setup))?,
        None => PipelineConfig::default(),
    };
    if let Some(max_frames) = args.max_frames {
        config.max_frames = Some(max_frames);
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    Ok(config)
}

fn unflushed_path(database: &Path) -> PathBuf {
    let mut name = database.as_os_str().to_owned();
    name.push(".unflushed.json");
    PathBuf::from(name)
}

fn dump_unflushed(database: &Path, pending: &[TrackingRecord]) -> Result<PathBuf> {
    let path = unflushed_path(database);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), pending)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn pipeline_failure(err: PipelineError, database: &Path) -> anyhow::Error {
    if let Some(pending) = err.pending_records() {
        match dump_unflushed(database, pending) {
            Ok(path) => warn!(
                records = pending.len(),
                path = %path.display(),
                "saved records that could not be stored"
            ),
            Err(dump_err) => error!(error = %dump_err, "failed to save unflushed records"),
        }
    }
    let stage = err.stage();
    anyhow::Error::new(err).context(format!("{stage} stage failed"))
}

/// First Ctrl-C stops at the next frame boundary so buffered records are
/// drained; a second one exits immediately.
fn install_interrupt_handler(stop: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        if stop.is_stop_requested() {
            warn!("interrupted again, exiting without draining");
            std::process::exit(130);
        }
        info!("interrupt received, stopping after the current frame");
        stop.request_stop();
    })
    .with_context(|| format!("{} stage: failed to install interrupt handler", Stage::Setup))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    info!(model = %args.model_name.display(), "using model");
    let detector = ReplayDetector::open(&args.model_name)
        .with_context(|| format!("{} stage: failed to load model", Stage::Detector))?;
    let store = SqliteStore::open(&args.database).with_context(|| {
        format!("{} stage: failed to open {}", Stage::Storage, args.database.display())
    })?;
    let tracker = IouTracker::new(config.tracker.clone());

    let mut pipeline = TrackingPipeline::new(detector, tracker, store, &config)
        .map_err(|err| pipeline_failure(err, &args.database))?;
    if let Some(dir) = &args.annotate_dir {
        let annotator = BoxAnnotator::new(dir).with_context(|| {
            format!("{} stage: failed to create {}", Stage::Annotation, dir.display())
        })?;
        pipeline = pipeline.with_annotator(annotator);
    }

    install_interrupt_handler(pipeline.stop_handle())?;

    let mut source = ImageSequenceSource::new(&args.video_source);
    let summary = pipeline
        .run(&mut source)
        .map_err(|err| pipeline_failure(err, &args.database))?;
    info!(
        frames = summary.frames_processed,
        records = summary.records_written,
        tracks = summary.tracks_seen,
        "finished"
    );

    let (history, store) = pipeline
        .into_parts()
        .map_err(|err| pipeline_failure(err, &args.database))?;

    if let Some(path) = &args.history_out {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        history
            .write_json(BufWriter::new(file))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(tracks = history.len(), path = %path.display(), "exported tracking history");
    }

    store
        .close()
        .with_context(|| format!("{} stage: failed to close database", Stage::Storage))?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
