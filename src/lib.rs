pub mod config;
pub mod detector;
pub mod error;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod sampler;
pub mod sink;
pub mod source;
pub mod state;
pub mod tracker;

#[cfg(feature = "opencv-video")]
pub mod cv;

pub use config::{DetectorAssets, OutputPaths, RunConfig, TrackerKind};
pub use detector::{BoundingBox, Detection, Detector, select_target};
pub use error::TrackError;
pub use pipeline::{CancelFlag, Pipeline, RunOutcome, RunSummary};
pub use postprocess::TrackingResult;
pub use preprocess::BBox;
pub use sink::{Annotator, KeyAction, LiveDisplay, LogEntry, NullDisplay, RenderSink, VideoSink};
pub use source::{Frame, FrameSource, VecSource, VideoProperties};
pub use state::{TrackState, TrackStateMachine};
pub use tracker::{CorrelationTracker, Tracker};
