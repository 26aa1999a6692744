//! Upload decoding and preparation
//!
//! Turns the raw uploaded bytes into the two things the rest of the app
//! needs: an RGBA raster for the preview texture and a bounded, PNG
//! re-encoded byte stream for the recognition backend.

use std::io::Cursor;

use image::RgbaImage;
use tracing::debug;

use crate::error::WorkflowError;

/// A decoded, size-bounded upload ready for display and recognition.
pub struct PreparedImage {
    /// RGBA raster for the preview texture.
    pub raster: RgbaImage,
    /// Lossless PNG re-encode of the (possibly downscaled) image.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode the upload, scale it down so neither side exceeds `max_size`,
/// and re-encode as PNG.
///
/// Images already within bounds are never upscaled. Undecodable bytes map
/// to [`WorkflowError::UnsupportedFormat`]; the session keeps the blob so
/// the user sees what failed.
pub fn prepare_upload(bytes: &[u8], max_size: u32) -> Result<PreparedImage, WorkflowError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| WorkflowError::unsupported_format(e.to_string()))?;

    let (orig_w, orig_h) = (decoded.width(), decoded.height());
    let bounded = if orig_w > max_size || orig_h > max_size {
        decoded.thumbnail(max_size, max_size)
    } else {
        decoded
    };

    if bounded.width() != orig_w || bounded.height() != orig_h {
        debug!(
            "upload downscaled for processing: {}x{} -> {}x{}",
            orig_w,
            orig_h,
            bounded.width(),
            bounded.height()
        );
    }

    let mut png = Vec::new();
    bounded
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| WorkflowError::recognition_failed(format!("PNG re-encode failed: {e}")))?;

    let raster = bounded.to_rgba8();
    let (width, height) = raster.dimensions();

    Ok(PreparedImage {
        raster,
        png,
        width,
        height,
    })
}
