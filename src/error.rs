use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("Cannot open video stream: {0}")]
    StreamOpen(String),
    #[error("Cannot read the first frame")]
    EmptyStream,
    #[error("No '{class}' detection above confidence {threshold} to track")]
    NoTargetFound { class: String, threshold: f32 },
    #[error("Detector failed: {0}")]
    Detector(String),
    #[error("Tracker failed: {0}")]
    Tracker(String),
    #[error("Failed to decode frame: {0}")]
    Decode(String),
    #[error("Output sink failed: {0}")]
    Sink(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
