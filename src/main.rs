//! Body pose alignment from a live camera.

use anyhow::{Context, Result};
use body_pose_alignment::camera::OpenCvCamera;
use body_pose_alignment::config::{Config, FloorStrategy, EXAMPLE_CONFIG};
use body_pose_alignment::onnx::{OnnxDepthModel, OnnxLandmarkDetector, OnnxSegmenter};
use body_pose_alignment::runtime::{CancellationToken, FrameSink, LogSink, Pipeline, PngDumpSink};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Camera index to use (overrides the configuration)
    #[arg(long)]
    cam: Option<i32>,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Directory to write composited frames to
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Write every Nth composite when dumping
    #[arg(long, default_value = "24")]
    dump_every: u64,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Body Pose Alignment ({})", env!("BUILD_TARGET"));

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(cam) = args.cam {
        config.capture.camera_index = cam;
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(config, args))
}

async fn run(config: Config, args: Args) -> Result<()> {
    // Acquire every resource before the first tick; anything acquired so far
    // is dropped if a later step fails.
    let detector = OnnxLandmarkDetector::new(&config.models.landmarks)?;
    let segmenter = OnnxSegmenter::new(&config.models.segmenter)?;
    let depth = match config.floor.strategy {
        FloorStrategy::DepthModel => Some(OnnxDepthModel::new(&config.models.depth)?),
        FloorStrategy::Segmentation => None,
    };
    let camera = OpenCvCamera::open(config.capture.camera_index, config.capture.width, config.capture.height)?;

    let mut pipeline = Pipeline::new(&config, Box::new(camera), Box::new(detector), Box::new(segmenter))?;
    if let Some(depth) = depth {
        pipeline = pipeline.with_depth_model(Box::new(depth));
    }
    if let Some(frames) = args.frames {
        pipeline = pipeline.with_max_ticks(frames);
    }

    let mut sink: Box<dyn FrameSink> = match &args.dump_dir {
        Some(dir) => Box::new((LogSink::new(), PngDumpSink::new(dir, args.dump_every)?)),
        None => Box::new(LogSink::new()),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("Ctrl-C received, stopping");
        ctrl_c.cancel();
    });

    let summary = pipeline.run(sink.as_mut(), cancel).await?;
    info!(
        "Processed {} frames ({} with a person, {} with a pose), final state {}, floor y={:.3}",
        summary.ticks,
        summary.person_frames,
        summary.pose_frames,
        summary.final_alignment,
        summary.floor_anchor.y()
    );

    Ok(())
}
