use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use solo_track::{DetectorAssets, OutputPaths, RunConfig, TrackerKind};

/// Detect one object in the first frame of a video and follow it.
#[derive(Parser, Debug)]
#[command(name = "solo_track", version, about, long_about = None)]
struct Args {
    /// Input video path
    #[arg(default_value = "data/camera.mov")]
    video: PathBuf,

    /// MobileNet-SSD prototxt
    #[arg(long, default_value = "mobilenet_ssd/MobileNetSSD_deploy.prototxt")]
    model_config: PathBuf,

    /// MobileNet-SSD caffemodel
    #[arg(long, default_value = "mobilenet_ssd/MobileNetSSD_deploy.caffemodel")]
    model_weights: PathBuf,

    /// Detector label of the object to track
    #[arg(short, long, default_value = "person")]
    class: String,

    /// Minimum detector confidence (exclusive)
    #[arg(long, default_value_t = 0.3)]
    confidence: f32,

    /// Process every Nth frame after the first
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    skip_rate: u32,

    /// Annotated output video
    #[arg(long, default_value = "results/tracking_output.mp4")]
    output_video: PathBuf,

    /// Per-frame track log
    #[arg(long, default_value = "results/tracking_log.txt")]
    output_log: PathBuf,

    #[arg(long, value_enum, default_value_t = TrackerArg::Csrt)]
    tracker: TrackerArg,

    /// Run without the preview window
    #[arg(long)]
    headless: bool,

    /// Re-run detection after this many consecutive lost frames
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    redetect_after: Option<u32>,

    #[arg(long, default_value = "Person Tracking")]
    window_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TrackerArg {
    Csrt,
    Kcf,
    Correlation,
}

impl From<TrackerArg> for TrackerKind {
    fn from(arg: TrackerArg) -> Self {
        match arg {
            TrackerArg::Csrt => TrackerKind::Csrt,
            TrackerArg::Kcf => TrackerKind::Kcf,
            TrackerArg::Correlation => TrackerKind::Correlation,
        }
    }
}

impl Args {
    fn into_config(self) -> RunConfig {
        RunConfig {
            video_path: self.video,
            detector_assets: DetectorAssets {
                config: self.model_config,
                weights: self.model_weights,
            },
            target_class: self.class,
            confidence_threshold: self.confidence,
            skip_rate: self.skip_rate,
            output: OutputPaths {
                video: self.output_video,
                log: self.output_log,
            },
            tracker: self.tracker.into(),
            headless: self.headless,
            redetect_after: self.redetect_after,
            window_title: self.window_title,
        }
    }
}

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    config.validate().context("invalid arguments")?;

    run(config)
}

#[cfg(feature = "opencv-video")]
fn run(config: RunConfig) -> Result<()> {
    use opencv::core::Mat;
    use solo_track::cv::{
        CvTracker, MobileNetSsd, OverlayRenderer, PreviewWindow, VideoFileSink, VideoFileSource,
    };
    use solo_track::sink::create_log_file;
    use solo_track::{CorrelationTracker, FrameSource, NullDisplay, Pipeline, RenderSink, Tracker};
    use tracing::info;

    let source = VideoFileSource::open(&config.video_path)?;

    let detector = MobileNetSsd::load(
        &config.detector_assets.config,
        &config.detector_assets.weights,
    )
    .context("failed to load detector")?;

    let tracker: Box<dyn Tracker<Mat>> = match config.tracker {
        TrackerKind::Correlation => Box::new(CorrelationTracker::new()),
        kind => Box::new(CvTracker::new(kind)?),
    };

    let video = VideoFileSink::create(&config.output.video, source.properties())?;
    let log = create_log_file(&config.output.log).with_context(|| {
        format!(
            "failed to create track log: {}",
            config.output.log.display()
        )
    })?;

    let sink = if config.headless {
        RenderSink::new(OverlayRenderer, video, log, NullDisplay)
    } else {
        let window = PreviewWindow::open(&config.window_title)?;
        RenderSink::new(OverlayRenderer, video, log, window)
    };

    info!(
        video = %config.video_path.display(),
        class = %config.target_class,
        skip_rate = config.skip_rate,
        tracker = ?config.tracker,
        "starting"
    );

    let summary = Pipeline::new(config, source, detector, tracker, sink)?.run()?;
    info!(
        processed = summary.processed,
        lost = summary.lost,
        "outputs written"
    );
    Ok(())
}

#[cfg(not(feature = "opencv-video"))]
fn run(_config: RunConfig) -> Result<()> {
    anyhow::bail!("OpenCV video support not enabled. Build with: cargo build --features opencv-video")
}
