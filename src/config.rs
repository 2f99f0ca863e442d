use std::path::PathBuf;

use crate::error::TrackError;

/// Which tracking algorithm seeds on the selected target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerKind {
    /// OpenCV discriminative correlation filter with channel reliability.
    #[default]
    Csrt,
    /// OpenCV kernelized correlation filter, faster and less robust.
    Kcf,
    /// Built-in normalized cross-correlation template tracker.
    Correlation,
}

/// Detector model files, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorAssets {
    pub config: PathBuf,
    pub weights: PathBuf,
}

impl Default for DetectorAssets {
    fn default() -> Self {
        Self {
            config: PathBuf::from("mobilenet_ssd/MobileNetSSD_deploy.prototxt"),
            weights: PathBuf::from("mobilenet_ssd/MobileNetSSD_deploy.caffemodel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub video: PathBuf,
    pub log: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            video: PathBuf::from("results/tracking_output.mp4"),
            log: PathBuf::from("results/tracking_log.txt"),
        }
    }
}

/// Settings for a single tracking run. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub video_path: PathBuf,
    pub detector_assets: DetectorAssets,
    /// Detector label the target must carry.
    pub target_class: String,
    /// Detections must score strictly above this to qualify.
    pub confidence_threshold: f32,
    /// Process every `skip_rate`-th frame after the bootstrap frame.
    pub skip_rate: u32,
    pub output: OutputPaths,
    pub tracker: TrackerKind,
    pub headless: bool,
    /// Re-run the detector after this many consecutive lost frames.
    /// `None` keeps the first target for the whole run.
    pub redetect_after: Option<u32>,
    pub window_title: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::from("data/camera.mov"),
            detector_assets: DetectorAssets::default(),
            target_class: "person".to_string(),
            confidence_threshold: 0.3,
            skip_rate: 3,
            output: OutputPaths::default(),
            tracker: TrackerKind::default(),
            headless: false,
            redetect_after: None,
            window_title: "Person Tracking".to_string(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.skip_rate == 0 {
            return Err(TrackError::InvalidConfig(
                "skip_rate must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(TrackError::InvalidConfig(format!(
                "confidence_threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.target_class.trim().is_empty() {
            return Err(TrackError::InvalidConfig(
                "target_class must not be empty".to_string(),
            ));
        }
        if self.redetect_after == Some(0) {
            return Err(TrackError::InvalidConfig(
                "redetect_after must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
