//! Detector capability and the first-match target selection policy.

use tracing::debug;

use crate::error::TrackError;
use crate::preprocess::BBox;

/// Axis-aligned box in floating point pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Build from corner coordinates (x1, y1, x2, y2).
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Integer pixel box. Corners are truncated first and the size is taken
    /// between the truncated corners.
    pub fn to_pixels(&self) -> BBox {
        let x1 = self.x as i32;
        let y1 = self.y as i32;
        let x2 = (self.x + self.width) as i32;
        let y2 = (self.y + self.height) as i32;
        BBox::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// One labelled detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    /// Score in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// Object detector over images of type `I`.
///
/// Implementations must return detections in a stable order for a given
/// image; target selection depends on that order.
pub trait Detector<I> {
    fn detect(&mut self, image: &I) -> Result<Vec<Detection>, TrackError>;
}

impl<I, D: Detector<I> + ?Sized> Detector<I> for Box<D> {
    fn detect(&mut self, image: &I) -> Result<Vec<Detection>, TrackError> {
        (**self).detect(image)
    }
}

/// Pick the first detection, in the detector's order, labelled `target_class`
/// with confidence strictly above `threshold`.
///
/// Later candidates are never considered once a match is found, even if they
/// score higher.
pub fn select_target(
    detections: &[Detection],
    target_class: &str,
    threshold: f32,
) -> Result<BBox, TrackError> {
    let chosen = detections
        .iter()
        .find(|d| d.confidence > threshold && d.label == target_class)
        .ok_or_else(|| TrackError::NoTargetFound {
            class: target_class.to_string(),
            threshold,
        })?;

    let target = chosen.bbox.to_pixels();
    debug!(
        label = %chosen.label,
        confidence = chosen.confidence,
        candidates = detections.len(),
        ?target,
        "target selected"
    );
    Ok(target)
}
