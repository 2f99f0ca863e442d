use ndarray::{Array2, Array3, ArrayView3};
use tracing::trace;

use crate::error::TrackError;
use crate::postprocess::{TrackingResult, apply_window, find_peak, hann2d, ncc_score_map, shift_rect};
use crate::preprocess::{BBox, normalize_patch, sample_gray_patch};

/// Single-object tracker over images of type `I`.
///
/// `init` seeds the model once; `update` estimates the target's box in each
/// later frame. A result with `success == false` means the target was lost
/// in that frame; its box must not be used.
pub trait Tracker<I> {
    fn init(&mut self, image: &I, bbox: BBox) -> Result<(), TrackError>;

    fn update(&mut self, image: &I) -> Result<TrackingResult, TrackError>;
}

impl<I, T: Tracker<I> + ?Sized> Tracker<I> for Box<T> {
    fn init(&mut self, image: &I, bbox: BBox) -> Result<(), TrackError> {
        (**self).init(image, bbox)
    }

    fn update(&mut self, image: &I) -> Result<TrackingResult, TrackError> {
        (**self).update(image)
    }
}

/// Correlation tracker configuration
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Side length of the template patch in samples
    pub template_size: usize,
    /// Search window size relative to the target box
    pub search_factor: f32,
    /// Weight of the cosine window in the final score
    pub window_influence: f32,
    pub score_threshold: f32,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            template_size: 32,
            search_factor: 2.0,
            window_influence: 0.3,
            score_threshold: 0.5,
        }
    }
}

/// Template tracker using normalized cross-correlation on grayscale patches.
///
/// The template is captured once at `init` and never refreshed, so the box
/// keeps its initial size.
pub struct CorrelationTracker {
    config: CorrelationConfig,
    search_size: usize,
    hanning: Array2<f32>,
    template: Option<Array2<f32>>,
    rect_last: BBox,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::with_config(CorrelationConfig::default())
    }

    pub fn with_config(config: CorrelationConfig) -> Self {
        let template_size = config.template_size.max(1);
        let search_size =
            ((template_size as f32 * config.search_factor.max(1.0)).round() as usize).max(template_size);
        let score_size = search_size - template_size + 1;
        let hanning = hann2d(score_size, score_size);

        Self {
            config: CorrelationConfig {
                template_size,
                ..config
            },
            search_size,
            hanning,
            template: None,
            rect_last: BBox::default(),
        }
    }

    /// Seed the tracker from an HWC BGR image view.
    pub fn init_view(&mut self, image: &ArrayView3<u8>, bbox: BBox) -> Result<(), TrackError> {
        if bbox.is_empty() {
            return Err(TrackError::Tracker(format!(
                "cannot initialize on an empty box {:?}",
                bbox.to_array()
            )));
        }

        let (cx, cy) = bbox.center();
        let patch = sample_gray_patch(
            image,
            cx,
            cy,
            bbox.width as f32,
            bbox.height as f32,
            self.config.template_size,
        );
        let template = normalize_patch(&patch).ok_or_else(|| {
            TrackError::Tracker("target region has no texture to track".to_string())
        })?;

        self.template = Some(template);
        self.rect_last = bbox;
        Ok(())
    }

    /// Track the target in an HWC BGR image view.
    pub fn update_view(&mut self, image: &ArrayView3<u8>) -> TrackingResult {
        let Some(template) = &self.template else {
            return TrackingResult::default();
        };

        let search_w = self.rect_last.width as f32 * self.config.search_factor;
        let search_h = self.rect_last.height as f32 * self.config.search_factor;
        let (cx, cy) = self.rect_last.center();
        let search = sample_gray_patch(image, cx, cy, search_w, search_h, self.search_size);

        let scores = ncc_score_map(&search, template);
        let windowed = apply_window(&scores, &self.hanning, self.config.window_influence);

        let Some((peak, score)) = find_peak(&windowed) else {
            return TrackingResult {
                success: false,
                bbox: self.rect_last,
                score: 0.0,
            };
        };
        trace!(?peak, score, "correlation peak");

        if score < self.config.score_threshold {
            return TrackingResult {
                success: false,
                bbox: self.rect_last,
                score,
            };
        }

        let cell_w = search_w / self.search_size as f32;
        let cell_h = search_h / self.search_size as f32;
        shift_rect(&mut self.rect_last, peak, windowed.dim(), cell_w, cell_h);

        TrackingResult {
            success: true,
            bbox: self.rect_last,
            score,
        }
    }

    /// Get current bounding box
    pub fn bbox(&self) -> BBox {
        self.rect_last
    }

    /// Check if tracker is initialized
    pub fn is_initialized(&self) -> bool {
        self.template.is_some()
    }
}

impl Default for CorrelationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker<Array3<u8>> for CorrelationTracker {
    fn init(&mut self, image: &Array3<u8>, bbox: BBox) -> Result<(), TrackError> {
        self.init_view(&image.view(), bbox)
    }

    fn update(&mut self, image: &Array3<u8>) -> Result<TrackingResult, TrackError> {
        Ok(self.update_view(&image.view()))
    }
}
