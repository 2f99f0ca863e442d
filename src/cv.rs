//! OpenCV adapters: file capture, MobileNet-SSD detection, CSRT/KCF
//! tracking, overlay drawing, video encoding and the preview window.

use std::fs;
use std::path::Path;

use ndarray::ArrayView3;
use opencv::{
    core::{self, Mat, Ptr, Rect, Scalar, Size},
    dnn, highgui, imgproc,
    prelude::*,
    tracking::{TrackerCSRT, TrackerCSRT_Params, TrackerKCF, TrackerKCF_Params},
    videoio,
};
use tracing::{debug, info};

use crate::config::TrackerKind;
use crate::detector::{BoundingBox, Detection, Detector};
use crate::error::TrackError;
use crate::postprocess::TrackingResult;
use crate::preprocess::BBox;
use crate::sink::{Annotator, KeyAction, LiveDisplay, VideoSink};
use crate::source::{Frame, FrameSource, VideoProperties};
use crate::state::TrackState;
use crate::tracker::{CorrelationTracker, Tracker};

/// Pascal VOC labels in MobileNet-SSD output order.
pub const VOC_CLASSES: [&str; 21] = [
    "background", "aeroplane", "bicycle", "bird", "boat", "bottle", "bus", "car", "cat", "chair",
    "cow", "diningtable", "dog", "horse", "motorbike", "person", "pottedplant", "sheep", "sofa",
    "train", "tvmonitor",
];

const SSD_INPUT: i32 = 300;
const SSD_SCALE: f64 = 0.007843;
const SSD_MEAN: f64 = 127.5;

const GREEN: (f64, f64, f64) = (0.0, 255.0, 0.0);
const RED: (f64, f64, f64) = (0.0, 0.0, 255.0);

fn bgr(color: (f64, f64, f64)) -> Scalar {
    Scalar::new(color.0, color.1, color.2, 0.0)
}

/// Borrow a continuous 8-bit BGR `Mat` as an HWC array view.
pub fn mat_to_array3(mat: &Mat) -> Result<ArrayView3<'_, u8>, TrackError> {
    if mat.typ() != core::CV_8UC3 || !mat.is_continuous() {
        return Err(TrackError::Tracker(
            "expected a continuous 8-bit 3-channel frame".to_string(),
        ));
    }
    let bytes = mat
        .data_bytes()
        .map_err(|e| TrackError::Tracker(e.to_string()))?;
    let rows = mat.rows() as usize;
    let cols = mat.cols() as usize;
    let channels = mat.channels() as usize;

    ArrayView3::from_shape((rows, cols, channels), bytes)
        .map_err(|e| TrackError::Tracker(e.to_string()))
}

// Frame source

/// Sequential reader over a video file.
pub struct VideoFileSource {
    capture: videoio::VideoCapture,
    properties: VideoProperties,
    next_index: u64,
}

impl VideoFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let path = path.as_ref();
        let open_err = |detail: String| TrackError::StreamOpen(format!("{}: {detail}", path.display()));

        let capture = videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            .map_err(|e| open_err(e.to_string()))?;
        if !capture.is_opened().map_err(|e| open_err(e.to_string()))? {
            return Err(open_err("not a readable video".to_string()));
        }

        let properties = VideoProperties::new(
            capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0),
            capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32,
        );
        info!(
            path = %path.display(),
            fps = properties.fps,
            width = properties.width,
            height = properties.height,
            "opened input video"
        );

        Ok(Self {
            capture,
            properties,
            next_index: 0,
        })
    }
}

impl FrameSource for VideoFileSource {
    type Image = Mat;

    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn next_frame(&mut self) -> Result<Option<Frame<Mat>>, TrackError> {
        let mut image = Mat::default();
        let read = self
            .capture
            .read(&mut image)
            .map_err(|e| TrackError::Decode(e.to_string()))?;
        if !read || image.empty() {
            return Ok(None);
        }

        let frame = Frame {
            index: self.next_index,
            image,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        let _ = self.capture.release();
        debug!(frames = self.next_index, "input video released");
    }
}

// Detector

/// MobileNet-SSD Caffe model run through OpenCV's DNN module.
pub struct MobileNetSsd {
    net: dnn::Net,
}

impl MobileNetSsd {
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(config: P, weights: Q) -> Result<Self, TrackError> {
        let config = config.as_ref();
        let weights = weights.as_ref();
        let net = dnn::read_net_from_caffe(&config.to_string_lossy(), &weights.to_string_lossy())
            .map_err(|e| {
                TrackError::Detector(format!(
                    "failed to load {} / {}: {e}",
                    config.display(),
                    weights.display()
                ))
            })?;
        info!(config = %config.display(), weights = %weights.display(), "detector loaded");
        Ok(Self { net })
    }
}

impl Detector<Mat> for MobileNetSsd {
    fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>, TrackError> {
        let det_err = |e: opencv::Error| TrackError::Detector(e.to_string());

        let width = image.cols() as f32;
        let height = image.rows() as f32;

        let blob = dnn::blob_from_image(
            image,
            SSD_SCALE,
            Size::new(SSD_INPUT, SSD_INPUT),
            Scalar::all(SSD_MEAN),
            false,
            false,
            core::CV_32F,
        )
        .map_err(det_err)?;
        self.net
            .set_input(&blob, "", 1.0, Scalar::default())
            .map_err(det_err)?;
        let output = self.net.forward_single("").map_err(det_err)?;

        // Output rows: [image_id, class_id, confidence, x1, y1, x2, y2],
        // box corners normalized to [0, 1]
        let values = output.data_typed::<f32>().map_err(det_err)?;
        let detections: Vec<Detection> = values
            .chunks_exact(7)
            .map(|row| {
                let label = VOC_CLASSES
                    .get(row[1] as usize)
                    .copied()
                    .unwrap_or("unknown");
                let bbox = BoundingBox::from_corners(
                    row[3] * width,
                    row[4] * height,
                    row[5] * width,
                    row[6] * height,
                );
                Detection::new(label, row[2], bbox)
            })
            .collect();

        debug!(count = detections.len(), "detections");
        Ok(detections)
    }
}

// Trackers

enum Engine {
    Csrt(Ptr<TrackerCSRT>),
    Kcf(Ptr<TrackerKCF>),
}

/// OpenCV contrib tracker. A fresh instance is created on every `init`
/// since re-initializing an existing one is not reliable.
pub struct CvTracker {
    kind: TrackerKind,
    engine: Option<Engine>,
}

impl CvTracker {
    pub fn new(kind: TrackerKind) -> Result<Self, TrackError> {
        if kind == TrackerKind::Correlation {
            return Err(TrackError::Tracker(
                "the correlation tracker is not an OpenCV tracker".to_string(),
            ));
        }
        Ok(Self { kind, engine: None })
    }

    fn create_engine(&self) -> opencv::Result<Engine> {
        match self.kind {
            TrackerKind::Kcf => Ok(Engine::Kcf(TrackerKCF::create(TrackerKCF_Params::default()?)?)),
            _ => Ok(Engine::Csrt(TrackerCSRT::create(&TrackerCSRT_Params::default()?)?)),
        }
    }
}

impl Tracker<Mat> for CvTracker {
    fn init(&mut self, image: &Mat, bbox: BBox) -> Result<(), TrackError> {
        let track_err = |e: opencv::Error| TrackError::Tracker(e.to_string());
        let rect = Rect::new(bbox.x, bbox.y, bbox.width, bbox.height);

        let mut engine = self.create_engine().map_err(track_err)?;
        match &mut engine {
            Engine::Csrt(t) => t.init(image, rect),
            Engine::Kcf(t) => t.init(image, rect),
        }
        .map_err(track_err)?;

        self.engine = Some(engine);
        Ok(())
    }

    fn update(&mut self, image: &Mat) -> Result<TrackingResult, TrackError> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(TrackingResult::default());
        };

        let mut rect = Rect::default();
        let success = match engine {
            Engine::Csrt(t) => t.update(image, &mut rect),
            Engine::Kcf(t) => t.update(image, &mut rect),
        }
        .map_err(|e| TrackError::Tracker(e.to_string()))?;

        Ok(TrackingResult {
            success,
            bbox: BBox::new(rect.x, rect.y, rect.width, rect.height),
            score: if success { 1.0 } else { 0.0 },
        })
    }
}

impl Tracker<Mat> for CorrelationTracker {
    fn init(&mut self, image: &Mat, bbox: BBox) -> Result<(), TrackError> {
        let view = mat_to_array3(image)?;
        self.init_view(&view, bbox)
    }

    fn update(&mut self, image: &Mat) -> Result<TrackingResult, TrackError> {
        let view = mat_to_array3(image)?;
        Ok(self.update_view(&view))
    }
}

// Outputs

/// Draws the tracked box with a "Tracking" tag, or a fixed "Lost" banner.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverlayRenderer;

impl Annotator<Mat> for OverlayRenderer {
    fn annotate(&mut self, image: &mut Mat, state: &TrackState) -> Result<(), TrackError> {
        let draw_err = |e: opencv::Error| TrackError::Sink(e.to_string());

        match state {
            TrackState::Active(b) => {
                imgproc::rectangle(
                    image,
                    Rect::new(b.x, b.y, b.width, b.height),
                    bgr(GREEN),
                    3,
                    imgproc::LINE_8,
                    0,
                )
                .map_err(draw_err)?;
                imgproc::put_text(
                    image,
                    "Tracking",
                    core::Point::new(b.x, b.y - 10),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    0.7,
                    bgr(GREEN),
                    2,
                    imgproc::LINE_8,
                    false,
                )
                .map_err(draw_err)?;
            }
            TrackState::Lost => {
                imgproc::put_text(
                    image,
                    "Lost",
                    core::Point::new(20, 60),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    1.0,
                    bgr(RED),
                    2,
                    imgproc::LINE_8,
                    false,
                )
                .map_err(draw_err)?;
            }
        }
        Ok(())
    }
}

/// MPEG-4 writer matching the input's frame rate and size.
pub struct VideoFileSink {
    writer: videoio::VideoWriter,
    frames: u64,
}

impl VideoFileSink {
    pub fn create<P: AsRef<Path>>(path: P, properties: VideoProperties) -> Result<Self, TrackError> {
        let path = path.as_ref();
        let sink_err = |e: opencv::Error| TrackError::Sink(format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v').map_err(sink_err)?;
        let writer = videoio::VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            properties.fps,
            Size::new(properties.width, properties.height),
            true,
        )
        .map_err(sink_err)?;
        if !writer.is_opened().map_err(sink_err)? {
            return Err(TrackError::Sink(format!(
                "cannot open {} for writing",
                path.display()
            )));
        }

        debug!(path = %path.display(), "output video opened");
        Ok(Self { writer, frames: 0 })
    }
}

impl VideoSink<Mat> for VideoFileSink {
    fn write_frame(&mut self, image: &Mat) -> Result<(), TrackError> {
        self.writer
            .write(image)
            .map_err(|e| TrackError::Sink(e.to_string()))?;
        self.frames += 1;
        Ok(())
    }
}

impl Drop for VideoFileSink {
    fn drop(&mut self) {
        let _ = self.writer.release();
        debug!(frames = self.frames, "output video released");
    }
}

/// HighGUI preview window; `q` or Esc requests cancellation.
pub struct PreviewWindow {
    title: String,
}

impl PreviewWindow {
    pub fn open(title: &str) -> Result<Self, TrackError> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .map_err(|e| TrackError::Sink(e.to_string()))?;
        Ok(Self {
            title: title.to_string(),
        })
    }
}

impl LiveDisplay<Mat> for PreviewWindow {
    fn show(&mut self, image: &Mat) -> Result<KeyAction, TrackError> {
        let show_err = |e: opencv::Error| TrackError::Sink(e.to_string());
        highgui::imshow(&self.title, image).map_err(show_err)?;

        let key = highgui::wait_key(1).map_err(show_err)?;
        if key & 0xFF == 'q' as i32 || key == 27 {
            return Ok(KeyAction::Quit);
        }
        Ok(KeyAction::Continue)
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.title);
    }
}
