use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::{debug, instrument};

use crate::{
    error::{OutlineError, Result},
    types::{distance, CalibrationModel, CornerSet},
};

/// Value given to target pixels that fall outside the source image.
const OUTSIDE_FILL: u8 = 255;
const MAX_ITERATIONS: usize = 30;
const CONVERGENCE_PX: f64 = 0.01;

/// A rectified backdrop image and the scale it was resampled to.
#[derive(Debug, Clone)]
pub struct Rectified {
    pub image: GrayImage,
    pub calibration: CalibrationModel,
    /// Source-image corners, canonically ordered, that were mapped to the
    /// target rectangle.
    pub corners: CornerSet,
}

/// Bilinear sample with coordinates clamped to the image. The result is not
/// rounded to a grey level, so gradients keep their sub-level precision.
fn sample(image: &GrayImage, x: f64, y: f64) -> f64 {
    let max_x = (image.width() - 1) as f64;
    let max_y = (image.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let (x0, y0) = (x.floor(), y.floor());
    let (x1, y1) = ((x0 + 1.0).min(max_x), (y0 + 1.0).min(max_y));
    let (fx, fy) = (x - x0, y - y0);

    let at = |px: f64, py: f64| image.get_pixel(px as u32, py as u32)[0] as f64;
    let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
    let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Move a corner to the point where the image gradients in its neighbourhood
/// are orthogonal to the vectors joining them to it.
///
/// Each iteration solves the 2x2 normal equations of the gradient structure
/// tensor over a `(2 * window + 1)` square with Gaussian weights. A corner that
/// wanders further than `window` pixels, or sits in a flat region, is returned
/// unchanged.
pub fn refine_corner(image: &GrayImage, corner: [f64; 2], window: u32) -> [f64; 2] {
    if image.width() < 3 || image.height() < 3 || window == 0 {
        return corner;
    }
    let win = window as i32;
    let sigma = (window as f64 / 2.0).max(1.0);
    let mut current = corner;

    for _ in 0..MAX_ITERATIONS {
        let (mut a11, mut a12, mut a22, mut b1, mut b2) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for dy in -win..=win {
            for dx in -win..=win {
                let px = current[0] + dx as f64;
                let py = current[1] + dy as f64;
                let gx = (sample(image, px + 1.0, py) - sample(image, px - 1.0, py)) * 0.5;
                let gy = (sample(image, px, py + 1.0) - sample(image, px, py - 1.0)) * 0.5;
                let w = (-((dx * dx + dy * dy) as f64) / (2.0 * sigma * sigma)).exp();

                let gxx = gx * gx * w;
                let gxy = gx * gy * w;
                let gyy = gy * gy * w;
                a11 += gxx;
                a12 += gxy;
                a22 += gyy;
                b1 += gxx * px + gxy * py;
                b2 += gxy * px + gyy * py;
            }
        }

        let det = a11 * a22 - a12 * a12;
        if det.abs() < 1e-6 {
            break;
        }
        let next = [(a22 * b1 - a12 * b2) / det, (a11 * b2 - a12 * b1) / det];
        let step = distance(next, current);
        current = next;
        if step < CONVERGENCE_PX {
            break;
        }
    }

    if !current[0].is_finite() || !current[1].is_finite() || distance(current, corner) > window as f64 {
        debug!(?corner, ?current, "Sub-pixel refinement rejected");
        return corner;
    }
    current
}

pub fn refine_corners(image: &GrayImage, corners: &CornerSet, window: u32) -> CornerSet {
    CornerSet {
        top_left: refine_corner(image, corners.top_left, window),
        top_right: refine_corner(image, corners.top_right, window),
        bottom_right: refine_corner(image, corners.bottom_right, window),
        bottom_left: refine_corner(image, corners.bottom_left, window),
    }
}

/// Resample the quadrilateral `corners` of `image` into an axis-aligned
/// `width_px x height_px` image.
///
/// Corners are re-ordered canonically before the projection is computed, so
/// the output never depends on detection order.
#[instrument(skip(image, corners))]
pub fn rectify(
    image: &GrayImage,
    corners: &CornerSet,
    width_px: u32,
    height_px: u32,
    width_mm: f64,
    height_mm: f64,
) -> Result<Rectified> {
    let calibration = CalibrationModel::new(width_px, height_px, width_mm, height_mm)?;
    let ordered = corners.reordered()?;
    if ordered.to_contour().area() < 1.0 {
        return Err(OutlineError::Processing(format!(
            "degenerate backdrop corners: {:?}",
            ordered.to_array()
        )));
    }

    let src = ordered.to_array().map(|[x, y]| (x as f32, y as f32));
    let (w, h) = ((width_px - 1) as f32, (height_px - 1) as f32);
    let dst = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    let projection = Projection::from_control_points(src, dst).ok_or_else(|| {
        OutlineError::Processing(format!("degenerate backdrop corners: {:?}", ordered.to_array()))
    })?;

    let mut out = GrayImage::new(width_px, height_px);
    warp_into(image, &projection, Interpolation::Bilinear, Luma([OUTSIDE_FILL]), &mut out);

    debug!(
        ppmm_x = calibration.pixels_per_mm_x(),
        ppmm_y = calibration.pixels_per_mm_y(),
        "Rectified backdrop"
    );
    Ok(Rectified {
        image: out,
        calibration,
        corners: ordered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{fill_rect, lightbox_scene, BRIGHT, DARK};

    #[test]
    fn test_refine_corner_moves_to_edge_intersection() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([DARK]));
        fill_rect(&mut img, 20, 20, 30, 30, BRIGHT);

        let refined = refine_corner(&img, [21.0, 22.0], 5);
        assert!((refined[0] - 19.5).abs() < 1.0, "{refined:?}");
        assert!((refined[1] - 19.5).abs() < 1.0, "{refined:?}");
    }

    #[test]
    fn test_refine_corner_keeps_flat_region() {
        let img = GrayImage::from_pixel(40, 40, Luma([128]));
        assert_eq!(refine_corner(&img, [20.0, 20.0], 5), [20.0, 20.0]);
    }

    #[test]
    fn test_rectify_produces_target_size() {
        let img = lightbox_scene(50, 400, 100);
        let corners = CornerSet::from_points(&[
            [449.0, 449.0],
            [50.0, 50.0],
            [449.0, 50.0],
            [50.0, 449.0],
        ])
        .expect("Should order corners");

        let rectified = rectify(&img, &corners, 200, 100, 100.0, 50.0).expect("Should rectify");
        assert_eq!(rectified.image.dimensions(), (200, 100));
        assert!((rectified.calibration.pixels_per_mm_x() - 2.0).abs() < 1e-9);
        assert!((rectified.calibration.pixels_per_mm_y() - 2.0).abs() < 1e-9);
        // Object sits in the middle, backdrop at the sides
        assert!(rectified.image.get_pixel(100, 50)[0] < 100);
        assert!(rectified.image.get_pixel(20, 50)[0] > 200);
    }

    #[test]
    fn test_rectify_rejects_invalid_target() {
        let img = GrayImage::from_pixel(50, 50, Luma([255]));
        let corners = CornerSet::from_points(&[[0.0, 0.0], [49.0, 0.0], [49.0, 49.0], [0.0, 49.0]])
            .expect("Should order corners");
        assert!(matches!(
            rectify(&img, &corners, 0, 100, 10.0, 10.0),
            Err(OutlineError::InvalidInput(_))
        ));
        assert!(matches!(
            rectify(&img, &corners, 100, 100, -1.0, 10.0),
            Err(OutlineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rectify_rejects_collapsed_corners() {
        let img = GrayImage::from_pixel(50, 50, Luma([255]));
        let corners = CornerSet {
            top_left: [10.0, 10.0],
            top_right: [10.0, 10.0],
            bottom_right: [10.0, 10.0],
            bottom_left: [10.0, 10.0],
        };
        assert!(rectify(&img, &corners, 100, 100, 10.0, 10.0).is_err());
    }
}
