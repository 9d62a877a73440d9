use std::path::Path;

use image::GrayImage;
use tracing::{info, instrument};

use crate::error::{OutlineError, Result};

/// Smallest accepted width and height, in pixels.
pub const MIN_IMAGE_SIZE: u32 = 100;

/// Seconds for a 1920x1080 image on reference hardware.
const BASE_SECONDS: f64 = 2.0;
const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;

pub fn check_image_size(image: &GrayImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width < MIN_IMAGE_SIZE || height < MIN_IMAGE_SIZE {
        return Err(OutlineError::ImageTooSmall {
            width,
            height,
            min: MIN_IMAGE_SIZE,
        });
    }
    Ok(())
}

/// Decode an image file to 8-bit grayscale and enforce the minimum size.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_grayscale(path: impl AsRef<Path>) -> Result<GrayImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(OutlineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let image = image::open(path)?.to_luma8();
    check_image_size(&image)?;
    info!(width = image.width(), height = image.height(), "Image loaded");
    Ok(image)
}

/// Whether `path` holds an image whose header can be decoded.
pub fn is_valid_image_file(path: impl AsRef<Path>) -> bool {
    image::image_dimensions(path).is_ok()
}

/// Rough wall-clock estimate in seconds, scaled by pixel count. `None` when
/// the image header cannot be read.
pub fn estimate_processing_time(path: impl AsRef<Path>) -> Option<f64> {
    let (width, height) = image::image_dimensions(path).ok()?;
    let scale = (width as f64 * height as f64) / REFERENCE_PIXELS;
    Some(BASE_SECONDS * (0.5 + 0.5 * scale))
}
