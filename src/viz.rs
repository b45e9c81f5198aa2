//! 8-bit visualisation of disparity maps.

use std::path::Path;

use image::GrayImage;
use patchmatch_stereo::DisparityMap;

use crate::error::AppError;

/// Render a disparity map as an 8-bit grayscale image.
///
/// Disparity magnitudes are min/max normalised over the valid pixels, so the
/// nearest surface renders white. Invalid pixels render black, as does
/// everything when no pixel is valid. A map with a single valid magnitude
/// renders its valid pixels white.
pub fn render_disparity(map: &DisparityMap) -> GrayImage {
    let width = map.width();
    let height = map.height();
    let mut out = GrayImage::new(width as u32, height as u32);

    let Some((min, max)) = map.magnitude_range() else {
        return out;
    };
    let span = max - min;

    for y in 0..height {
        for x in 0..width {
            let value = if map.is_valid(x, y) {
                let magnitude = map.get(x, y).abs();
                if span > 0.0 {
                    ((magnitude - min) / span * 255.0) as u8
                } else {
                    255
                }
            } else {
                0
            };
            out.put_pixel(x as u32, y as u32, image::Luma([value]));
        }
    }
    out
}

/// Render a disparity map and write it as a PNG file.
pub fn save_png(map: &DisparityMap, path: &Path) -> Result<(), AppError> {
    render_disparity(map)
        .save(path)
        .map_err(|source| AppError::ImageWrite {
            path: path.to_path_buf(),
            source,
        })
}
