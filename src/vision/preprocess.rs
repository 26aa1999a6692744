//! Tensor preparation for the ONNX models
//!
//! Converts decoded rasters into the NCHW float tensors the detection and
//! recognition models expect. Resizing goes through the `image` crate;
//! only the normalization and layout conversion are done by hand.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

/// Per-channel normalization applied after the 0-1 scale.
///
/// The models expect `(pixel / 255 - mean) / std`; the 0.5/0.5 default maps
/// [0, 255] to [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

/// Detection input tensor plus the geometry needed to map boxes back onto
/// the original raster.
pub struct DetectionInput {
    /// NCHW tensor, batch size 1.
    pub tensor: Array4<f32>,
    /// Scale applied to the original image (resized / original).
    pub scale: f32,
    /// Padded width fed to the model.
    pub width: u32,
    /// Padded height fed to the model.
    pub height: u32,
}

/// Resize the image so its longest side matches `target_size`, pad both
/// dimensions up to a multiple of 32 (model stride), normalize, and lay
/// out as NCHW.
pub fn prepare_for_detection(
    img: &RgbImage,
    target_size: u32,
    norm: &Normalization,
) -> DetectionInput {
    let (w, h) = img.dimensions();
    let scale = target_size as f32 / w.max(h).max(1) as f32;
    let new_w = ((w as f32 * scale) as u32).max(1);
    let new_h = ((h as f32 * scale) as u32).max(1);

    let resized = image::imageops::resize(img, new_w, new_h, FilterType::Triangle);

    let padded_w = new_w.div_ceil(32) * 32;
    let padded_h = new_h.div_ceil(32) * 32;

    // Padding area stays zero, which the detection model reads as empty.
    let mut tensor = Array4::<f32>::zeros((1, 3, padded_h as usize, padded_w as usize));
    fill_normalized(&mut tensor, &resized, norm);

    DetectionInput {
        tensor,
        scale,
        width: padded_w,
        height: padded_h,
    }
}

/// Resize a text-region crop to the recognition model's fixed height,
/// clamping the scaled width, then normalize to NCHW.
pub fn prepare_for_recognition(
    crop: &RgbImage,
    target_height: u32,
    max_width: u32,
    norm: &Normalization,
) -> Array4<f32> {
    let (w, h) = crop.dimensions();
    let scale = target_height as f32 / h.max(1) as f32;
    let new_w = ((w as f32 * scale) as u32).clamp(1, max_width);

    let resized = image::imageops::resize(crop, new_w, target_height, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, target_height as usize, new_w as usize));
    fill_normalized(&mut tensor, &resized, norm);
    tensor
}

fn fill_normalized(tensor: &mut Array4<f32>, img: &RgbImage, norm: &Normalization) {
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - norm.mean[c]) / norm.std[c];
        }
    }
}
