use ndarray::{Array2, ArrayView3};

/// BT.601 luma weights in BGR channel order.
pub const LUMA_BGR: [f32; 3] = [0.114, 0.587, 0.299];

/// Bounding box [x, y, width, height] in integer pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// A box with no area cannot seed a tracker.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Sample a square grayscale patch of `out_size` x `out_size` pixels covering
/// the `width` x `height` region centred on (`cx`, `cy`).
///
/// Pixels outside the image read as zero.
///
/// # Arguments
/// * `image` - Input image in HWC BGR layout
/// * `cx`, `cy` - Region centre in image pixels
/// * `width`, `height` - Region size in image pixels
/// * `out_size` - Side length of the output patch
pub fn sample_gray_patch(
    image: &ArrayView3<u8>,
    cx: f32,
    cy: f32,
    width: f32,
    height: f32,
    out_size: usize,
) -> Array2<f32> {
    let mut patch = Array2::<f32>::zeros((out_size, out_size));
    if out_size == 0 {
        return patch;
    }

    let x0 = cx - width / 2.0;
    let y0 = cy - height / 2.0;
    let step_x = width / out_size as f32;
    let step_y = height / out_size as f32;

    for ((row, col), value) in patch.indexed_iter_mut() {
        // Sample at the centre of each output cell
        let src_x = x0 + (col as f32 + 0.5) * step_x - 0.5;
        let src_y = y0 + (row as f32 + 0.5) * step_y - 0.5;
        *value = bilinear_luma(image, src_x, src_y);
    }

    patch
}

/// Bilinear interpolation of luma at a sub-pixel location
fn bilinear_luma(image: &ArrayView3<u8>, x: f32, y: f32) -> f32 {
    let x_floor = x.floor();
    let y_floor = y.floor();
    let dx = x - x_floor;
    let dy = y - y_floor;
    let x0 = x_floor as i64;
    let y0 = y_floor as i64;

    let v00 = luma_at(image, x0, y0);
    let v01 = luma_at(image, x0 + 1, y0);
    let v10 = luma_at(image, x0, y0 + 1);
    let v11 = luma_at(image, x0 + 1, y0 + 1);

    v00 * (1.0 - dx) * (1.0 - dy) + v01 * dx * (1.0 - dy) + v10 * (1.0 - dx) * dy + v11 * dx * dy
}

fn luma_at(image: &ArrayView3<u8>, x: i64, y: i64) -> f32 {
    let (img_h, img_w, channels) = image.dim();
    if x < 0 || y < 0 || x >= img_w as i64 || y >= img_h as i64 {
        return 0.0;
    }
    let (x, y) = (x as usize, y as usize);

    if channels < 3 {
        return image[[y, x, 0]] as f32 / 255.0;
    }

    let mut luma = 0.0;
    for (ch, weight) in LUMA_BGR.iter().enumerate() {
        luma += image[[y, x, ch]] as f32 * weight;
    }
    luma / 255.0
}

/// Zero-mean, unit-norm copy of `patch`, or `None` when the patch is flat
/// and carries no texture to match against.
pub fn normalize_patch(patch: &Array2<f32>) -> Option<Array2<f32>> {
    let mean = patch.mean()?;
    let centered = patch.mapv(|v| v - mean);
    let norm = centered.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm < 1e-6 {
        return None;
    }
    Some(centered / norm)
}
