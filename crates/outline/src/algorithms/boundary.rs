use image::GrayImage;
use imageproc::{contrast::threshold, edges::canny};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::{BoundaryMap, BoundaryRetry, ProcessingConfig},
    error::{OutlineError, Result},
    traits::ImagePreprocessor,
    types::{Contour, CornerSet},
};

use super::{
    extraction::{external_contours, largest_contour},
    morphology::{clean_square, pad},
    preprocessing::{bright_level, ClahePreprocessor},
    simplification::{bounding_rect_corners, convex_hull, simplify_closed},
};

/// Square kernel used to clean the bright-region mask.
const MASK_KERNEL: u32 = 5;

/// Which rung of the fallback ladder produced the corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CornerStrategy {
    Simplified { attempts: u32 },
    ConvexHull,
    BoundingRect,
}

#[derive(Debug, Clone)]
pub struct BoundaryDetection {
    pub corners: CornerSet,
    pub strategy: CornerStrategy,
    /// The traced backdrop outline the corners were derived from.
    pub contour: Contour,
}

/// Binary map of the backlit backdrop, ready for contour tracing.
pub fn boundary_map(image: &GrayImage, config: &ProcessingConfig) -> Result<GrayImage> {
    let normalized = ClahePreprocessor {
        clip_limit: config.clahe_clip_limit,
        tile_grid: config.clahe_tile_size,
    }
    .preprocess(image)?;

    let level = bright_level(&normalized, config.lightbox_brightness_bias);
    debug!(level, "Backdrop brightness threshold");
    let mask = clean_square(&threshold(&normalized, level), MASK_KERNEL);

    Ok(match config.boundary_map {
        BoundaryMap::Mask => mask,
        // Padding lets regions touching the frame produce a closed edge loop
        BoundaryMap::Edges => canny(
            &pad(&mask, 1),
            config.canny_low as f32,
            config.canny_high as f32,
        ),
    })
}

/// Locate the backdrop corners in a source image.
pub fn locate_boundary(image: &GrayImage, config: &ProcessingConfig) -> Result<BoundaryDetection> {
    let map = boundary_map(image, config)?;
    locate_in_map(&map, config)
}

/// Locate the backdrop corners in a map produced by [`boundary_map`].
pub fn locate_in_map(map: &GrayImage, config: &ProcessingConfig) -> Result<BoundaryDetection> {
    let mut contours = external_contours(map);
    if config.boundary_map == BoundaryMap::Edges {
        contours = contours.iter().map(|c| c.translate(-1.0, -1.0)).collect();
    }
    let contour = largest_contour(&contours)
        .cloned()
        .ok_or(OutlineError::NoBoundary)?;
    debug!(
        candidates = contours.len(),
        points = contour.len(),
        area = contour.area(),
        "Selected backdrop contour"
    );

    let (corners, strategy) = reduce_to_quad(&contour, &config.boundary_retry)?;
    Ok(BoundaryDetection {
        corners,
        strategy,
        contour,
    })
}

/// Reduce an outline to four ordered corners.
///
/// Tries the tolerance ladder first, then the re-simplified convex hull, then
/// the bounding rectangle, which always yields four points.
pub fn reduce_to_quad(contour: &Contour, retry: &BoundaryRetry) -> Result<(CornerSet, CornerStrategy)> {
    let perimeter = contour.perimeter();
    let mut factor = retry.epsilon_start;

    for attempt in 1..=retry.max_attempts {
        let approx = simplify_closed(contour, factor * perimeter);
        debug!(attempt, factor, vertices = approx.len(), "Boundary simplification");
        if approx.len() == 4 {
            let corners = CornerSet::from_points(&approx.points)?;
            return Ok((corners, CornerStrategy::Simplified { attempts: attempt }));
        }
        if approx.len() > 4 {
            factor += retry.epsilon_step_up;
        } else if factor - retry.epsilon_step_down > retry.epsilon_floor {
            factor -= retry.epsilon_step_down;
        } else {
            break;
        }
    }

    let hull = convex_hull(contour);
    let approx = simplify_closed(&hull, retry.fallback_epsilon * hull.perimeter());
    if approx.len() == 4 {
        warn!("Boundary corners taken from the convex hull");
        return Ok((CornerSet::from_points(&approx.points)?, CornerStrategy::ConvexHull));
    }

    let rect = bounding_rect_corners(contour).ok_or(OutlineError::NoBoundary)?;
    warn!("Boundary corners taken from the bounding rectangle");
    Ok((CornerSet::from_points(&rect)?, CornerStrategy::BoundingRect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::{densify, lightbox_scene};
    use image::Luma;

    fn close_to(a: [f64; 2], b: [f64; 2], tol: f64) -> bool {
        (a[0] - b[0]).abs() <= tol && (a[1] - b[1]).abs() <= tol
    }

    #[test]
    fn test_square_backdrop_corners() {
        let img = lightbox_scene(100, 1000, 200);
        let detection = locate_boundary(&img, &ProcessingConfig::default())
            .expect("Should find the backdrop");

        assert!(matches!(detection.strategy, CornerStrategy::Simplified { .. }));
        let c = detection.corners;
        assert!(close_to(c.top_left, [100.0, 100.0], 2.0), "{:?}", c.top_left);
        assert!(close_to(c.top_right, [1099.0, 100.0], 2.0), "{:?}", c.top_right);
        assert!(close_to(c.bottom_right, [1099.0, 1099.0], 2.0), "{:?}", c.bottom_right);
        assert!(close_to(c.bottom_left, [100.0, 1099.0], 2.0), "{:?}", c.bottom_left);
    }

    #[test]
    fn test_edges_map_finds_same_backdrop() {
        let img = lightbox_scene(40, 300, 60);
        let config = ProcessingConfig {
            boundary_map: BoundaryMap::Edges,
            ..Default::default()
        };
        let detection = locate_boundary(&img, &config).expect("Should find the backdrop");
        let c = detection.corners;
        assert!(close_to(c.top_left, [40.0, 40.0], 3.0), "{:?}", c.top_left);
        assert!(close_to(c.bottom_right, [339.0, 339.0], 3.0), "{:?}", c.bottom_right);
    }

    #[test]
    fn test_skewed_quad() {
        let quad = [[30.0, 20.0], [180.0, 35.0], [170.0, 190.0], [15.0, 175.0]];
        let contour = densify(&quad, 1.0);
        let (corners, strategy) =
            reduce_to_quad(&contour, &BoundaryRetry::default()).expect("Should reduce");
        assert_eq!(strategy, CornerStrategy::Simplified { attempts: 1 });
        assert_eq!(corners.to_array(), quad);
    }

    #[test]
    fn test_pentagon_falls_through_to_bounding_rect() {
        let pentagon: Vec<[f64; 2]> = (0..5)
            .map(|i| {
                let a = -std::f64::consts::FRAC_PI_2 + i as f64 * 2.0 * std::f64::consts::PI / 5.0;
                [200.0 + 150.0 * a.cos(), 200.0 + 150.0 * a.sin()]
            })
            .collect();
        let contour = densify(&pentagon, 1.0);
        let (corners, strategy) =
            reduce_to_quad(&contour, &BoundaryRetry::default()).expect("Should reduce");

        assert_eq!(strategy, CornerStrategy::BoundingRect);
        assert_eq!(corners.to_array().len(), 4);
        let (min, max) = contour.bounding_box();
        assert_eq!(corners.top_left, min);
        assert_eq!(corners.bottom_right, max);
    }

    #[test]
    fn test_blank_image_has_no_boundary() {
        let img = GrayImage::from_pixel(200, 200, Luma([0]));
        assert!(matches!(
            locate_boundary(&img, &ProcessingConfig::default()),
            Err(OutlineError::NoBoundary)
        ));
    }
}
