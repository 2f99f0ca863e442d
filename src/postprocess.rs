use ndarray::{Array2, s};
use ndarray_stats::QuantileExt;

use crate::preprocess::BBox;

/// Tracking result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingResult {
    pub success: bool,
    pub bbox: BBox,
    pub score: f32,
}

impl Default for TrackingResult {
    fn default() -> Self {
        Self {
            success: false,
            bbox: BBox::default(),
            score: 0.0,
        }
    }
}

/// Create 1D Hanning window (matching OpenCV implementation)
pub fn hann1d(size: usize) -> Vec<f32> {
    let pi = std::f32::consts::PI;

    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * pi / (size + 1) as f32 * (i + 1) as f32).cos()))
        .collect()
}

/// Create 2D Hanning window
pub fn hann2d(rows: usize, cols: usize) -> Array2<f32> {
    let hann_rows = hann1d(rows);
    let hann_cols = hann1d(cols);

    Array2::from_shape_fn((rows, cols), |(r, c)| hann_rows[r] * hann_cols[c])
}

/// Normalized cross-correlation of `template` at every valid offset inside
/// `search`.
///
/// `template` must already be zero-mean and unit-norm. Windows of the search
/// patch with no variance score zero.
///
/// # Returns
/// * Score map of shape (search_h - template_h + 1, search_w - template_w + 1)
///   with values in [-1, 1]
pub fn ncc_score_map(search: &Array2<f32>, template: &Array2<f32>) -> Array2<f32> {
    let (search_h, search_w) = search.dim();
    let (tmpl_h, tmpl_w) = template.dim();
    if tmpl_h == 0 || tmpl_w == 0 || tmpl_h > search_h || tmpl_w > search_w {
        return Array2::zeros((0, 0));
    }

    let rows = search_h - tmpl_h + 1;
    let cols = search_w - tmpl_w + 1;
    let count = (tmpl_h * tmpl_w) as f32;

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let window = search.slice(s![r..r + tmpl_h, c..c + tmpl_w]);

        let mut sum = 0.0f32;
        let mut sum_sq = 0.0f32;
        let mut cross = 0.0f32;
        for (&w, &t) in window.iter().zip(template.iter()) {
            sum += w;
            sum_sq += w * w;
            cross += w * t;
        }

        // Template is zero-mean, so the window mean drops out of the numerator
        let variance = sum_sq - sum * sum / count;
        if variance <= 1e-8 {
            0.0
        } else {
            cross / variance.sqrt()
        }
    })
}

/// Blend `scores` with a cosine window to penalize large displacements.
///
/// `influence` of 0 leaves the scores untouched, 1 multiplies them by the
/// window outright.
pub fn apply_window(scores: &Array2<f32>, hanning: &Array2<f32>, influence: f32) -> Array2<f32> {
    let influence = influence.clamp(0.0, 1.0);
    let mut windowed = scores.clone();
    windowed.zip_mut_with(hanning, |score, &h| {
        *score *= (1.0 - influence) + influence * h;
    });
    windowed
}

/// Find maximum value and its (row, col) location
pub fn find_peak(scores: &Array2<f32>) -> Option<((usize, usize), f32)> {
    let loc = scores.argmax().ok()?;
    Some((loc, scores[loc]))
}

/// Shift `rect` by the displacement of `peak` from the centre of a score map
/// of `map_size`, where one score cell covers `cell_w` x `cell_h` image pixels.
pub fn shift_rect(
    rect: &mut BBox,
    peak: (usize, usize),
    map_size: (usize, usize),
    cell_w: f32,
    cell_h: f32,
) {
    let centre_row = (map_size.0 as f32 - 1.0) / 2.0;
    let centre_col = (map_size.1 as f32 - 1.0) / 2.0;

    let dy = (peak.0 as f32 - centre_row) * cell_h;
    let dx = (peak.1 as f32 - centre_col) * cell_w;

    rect.x += dx.round() as i32;
    rect.y += dy.round() as i32;
}
