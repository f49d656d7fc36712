//! Command-line entry point: count people in a video file or a camera feed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use headcount_rs::{
    ByteTrackAdapter, FfmpegBackend, Pipeline, PipelineConfig, ReplayDetections, RunResult,
};

/// Video extensions accepted for file runs.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
const OUTPUT_DIR: &str = "outputs";

#[derive(Parser, Debug)]
#[command(name = "headcount", version, about = "Count distinct people in video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a recorded video file
    Video {
        /// Input video (.mp4, .avi, .mov, .mkv)
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Record from a camera for a fixed duration
    Camera {
        /// Capture device index
        #[arg(long)]
        index: Option<u32>,

        /// Recording length in seconds (5-300)
        #[arg(long)]
        duration: Option<u32>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Annotated output video; defaults to a timestamped file under outputs/
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON-lines detections, one line per frame
    #[arg(short, long)]
    detections: PathBuf,

    /// Minimum person confidence (0.1-1.0)
    #[arg(short, long)]
    confidence: Option<f32>,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("headcount_rs=info,headcount=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

fn default_output(prefix: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    Path::new(OUTPUT_DIR).join(format!("{prefix}_{stamp}.mp4"))
}

/// Remove what a failed run wrote to `output`. A file that was there before
/// the run is left alone.
fn discard_partial_output(output: &Path, existed_before: bool) {
    if existed_before || !output.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(output) {
        warn!(path = %output.display(), error = %e, "failed to remove partial output");
    }
}

fn run(command: Command, output: &Path) -> Result<RunResult> {
    let mut config = PipelineConfig::from_env();
    let common = match &command {
        Command::Video { common, .. } | Command::Camera { common, .. } => common,
    };
    if let Some(confidence) = common.confidence {
        config.confidence_threshold = confidence;
    }
    if let Command::Camera {
        index, duration, ..
    } = &command
    {
        config.camera_index = index.unwrap_or(config.camera_index);
        config.duration_seconds = duration.unwrap_or(config.duration_seconds);
    }

    let detector = ReplayDetections::from_path(&common.detections)
        .with_context(|| format!("loading detections from {}", common.detections.display()))?;
    let backend = FfmpegBackend::new(config.encoder.clone());
    let tracker = ByteTrackAdapter::new(config.tracker_config());
    let pipeline = Pipeline::new(backend, detector, tracker, config);

    let result = match &command {
        Command::Video { input, .. } => pipeline
            .process_video(input, output)
            .with_context(|| format!("processing {}", input.display()))?,
        Command::Camera { .. } => pipeline
            .process_camera(output)
            .context("recording from camera")?,
    };
    Ok(result)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let (output, prefix) = match &cli.command {
        Command::Video { input, common } => {
            if !is_supported_video(input) {
                bail!(
                    "unsupported file type {}; expected one of {}",
                    input.display(),
                    VIDEO_EXTENSIONS.join(", ")
                );
            }
            (common.output.clone(), "output")
        }
        Command::Camera { common, .. } => (common.output.clone(), "camera_output"),
    };
    let output = output.unwrap_or_else(|| default_output(prefix));
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let existed = output.exists();
    match run(cli.command, &output) {
        Ok(result) => {
            info!(output = %output.display(), "done");
            println!("{}", serde_json::to_string_pretty(&result)?);
            println!("output: {}", output.display());
            Ok(())
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "run failed");
            discard_partial_output(&output, existed);
            Err(e)
        }
    }
}
