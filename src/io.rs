//! Loading stereo pairs into the matcher's byte layout.

use std::path::Path;

use crate::error::AppError;

/// A colour image unpacked to the row-major BGR byte layout the matcher
/// consumes.
pub struct BgrImage {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl BgrImage {
    /// Wrap an RGB byte buffer, swapping each pixel to BGR order.
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        debug_assert_eq!(rgb.len(), width * height * 3);
        let mut data = Vec::with_capacity(rgb.len());
        for pixel in rgb.chunks_exact(3) {
            data.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }
        Self {
            data,
            width,
            height,
        }
    }
}

/// Load an image file and unpack it to BGR bytes.
pub fn load_bgr(path: &Path) -> Result<BgrImage, AppError> {
    let img = image::open(path)
        .map_err(|source| AppError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    Ok(BgrImage::from_rgb(img.as_raw(), width, height))
}

/// Reject pairs whose dimensions differ.
pub fn check_pair(left: &BgrImage, right: &BgrImage) -> Result<(), AppError> {
    if left.width != right.width || left.height != right.height {
        return Err(AppError::DimensionMismatch {
            left_width: left.width,
            left_height: left.height,
            right_width: right.width,
            right_height: right.height,
        });
    }
    Ok(())
}
