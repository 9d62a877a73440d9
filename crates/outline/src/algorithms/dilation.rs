use tracing::{debug, warn};

use crate::{
    traits::ContourRefiner,
    types::{CalibrationModel, Contour},
};

use super::{
    extraction::{external_contours, largest_contour, rasterize_padded},
    morphology::dilate_disk,
};

/// Canvas margin around the contour, in multiples of the dilation radius.
const MARGIN_FACTOR: u32 = 3;
/// Larger canvases are dilated at a reduced resolution.
const MAX_CANVAS_PIXELS: u64 = 1 << 26;

/// Clearance offset applied to the object outline.
#[derive(Debug, Clone)]
pub struct ContourDilator {
    pub amount_mm: f64,
}

impl ContourRefiner for ContourDilator {
    fn refine(&self, contour: &Contour, calibration: &CalibrationModel) -> Contour {
        dilate_contour(contour, self.amount_mm, calibration)
    }
}

/// Grow `contour` outward by `amount_mm`.
///
/// A non-positive amount, or one that rounds to zero pixels, returns the
/// input unchanged. If the dilated raster yields no outline the input is also
/// returned unchanged.
pub fn dilate_contour(contour: &Contour, amount_mm: f64, calibration: &CalibrationModel) -> Contour {
    if amount_mm <= 0.0 || contour.len() < 3 {
        return contour.clone();
    }
    let radius = calibration.mm_to_px(amount_mm).round() as u32;
    if radius == 0 {
        return contour.clone();
    }

    match dilate_within(contour, radius, MAX_CANVAS_PIXELS) {
        Some(result) => {
            debug!(amount_mm, radius, points = result.len(), "Dilated contour");
            result
        }
        None => {
            warn!(amount_mm, radius, "Dilation produced no contour, keeping input");
            contour.clone()
        }
    }
}

/// Dilate by `radius` pixels on a canvas of at most `max_pixels`, working on
/// a downscaled copy of the contour when the full-size canvas would be larger.
fn dilate_within(contour: &Contour, radius: u32, max_pixels: u64) -> Option<Contour> {
    let (min, max) = contour.bounding_box();
    let side = |extent: f64| extent.ceil() as u64 + 2 * (MARGIN_FACTOR * radius) as u64 + 3;
    let pixels = side(max[0] - min[0]) * side(max[1] - min[1]);
    if pixels <= max_pixels {
        return dilate_pixels(contour, radius);
    }

    let factor = (max_pixels as f64 / pixels as f64).sqrt();
    let scaled_radius = ((radius as f64 * factor).round() as u32).max(1);
    debug!(factor, scaled_radius, "Dilating on a downscaled canvas");
    dilate_pixels(&contour.scale(factor), scaled_radius).map(|result| result.scale(1.0 / factor))
}

fn dilate_pixels(contour: &Contour, radius: u32) -> Option<Contour> {
    let (mask, offset) = rasterize_padded(contour, MARGIN_FACTOR * radius + 1);
    let dilated = dilate_disk(&mask, radius);
    largest_contour(&external_contours(&dilated)).map(|result| result.translate(-offset[0], -offset[1]))
}
