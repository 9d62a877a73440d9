use image::GrayImage;
use imageproc::contrast::otsu_level;
use tracing::{debug, info, warn};

use crate::{
    config::{ProcessingConfig, ThresholdMode},
    error::{OutlineError, Result},
    traits::ImagePreprocessor,
    types::{distance, CalibrationModel, Contour},
};

use super::{
    extraction::{external_contours, largest_contour},
    merge::merge_contours,
    morphology::clean_disk,
    preprocessing::{adaptive_threshold_dark, clear_border, offset_level, threshold_dark},
    simplification::simplify_closed,
};

/// Contours at or below this many points are never simplified.
const SIMPLIFY_MIN_POINTS: usize = 100;
/// Simplification is rejected if it keeps fewer than this share of vertices.
const SIMPLIFY_MIN_RETAINED: f64 = 0.3;
/// Scales `polygon_epsilon_factor` down for object outlines.
const OBJECT_EPSILON_SCALE: f64 = 0.25;

/// Dark-on-bright binarization of the rectified backdrop.
#[derive(Debug, Clone)]
pub struct ObjectBinarizer {
    pub mode: ThresholdMode,
    pub manual_threshold: u8,
    pub threshold_offset: f64,
    pub adaptive_block_radius: u32,
    pub adaptive_offset: i32,
}

impl ObjectBinarizer {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            mode: config.threshold_mode,
            manual_threshold: config.manual_threshold,
            threshold_offset: config.threshold_offset,
            adaptive_block_radius: config.adaptive_block_radius,
            adaptive_offset: config.adaptive_offset,
        }
    }
}

impl ImagePreprocessor for ObjectBinarizer {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(match self.mode {
            ThresholdMode::Auto => {
                let otsu = otsu_level(image);
                let level = offset_level(otsu, self.threshold_offset);
                debug!(otsu, level, "Automatic object threshold");
                threshold_dark(image, level)
            }
            ThresholdMode::Manual => {
                let level = offset_level(self.manual_threshold, self.threshold_offset);
                debug!(level, "Manual object threshold");
                threshold_dark(image, level)
            }
            ThresholdMode::Adaptive => {
                adaptive_threshold_dark(image, self.adaptive_block_radius, self.adaptive_offset)
            }
        })
    }
}

/// Foreground mask of the object: binarized, border cleared and, unless
/// disabled, cleaned with a close-then-open pass.
///
/// A binarization that marks nothing inside the border clearance fails with
/// [`OutlineError::NoContours`].
pub fn object_mask(image: &GrayImage, config: &ProcessingConfig) -> Result<GrayImage> {
    let mut mask = ObjectBinarizer::from_config(config).preprocess(image)?;
    clear_border(&mut mask, config.border_clearance_px);
    if mask.pixels().all(|p| p[0] == 0) {
        return Err(OutlineError::NoContours);
    }
    if !config.disable_morphology {
        mask = clean_disk(&mask, config.morph_kernel_size);
    }
    Ok(mask)
}

/// Segment the single foreground object of a rectified image.
pub fn segment_object(
    image: &GrayImage,
    config: &ProcessingConfig,
    calibration: &CalibrationModel,
) -> Result<Contour> {
    let mask = object_mask(image, config)?;
    segment_mask(&mask, config, calibration)
}

/// Pick, merge and simplify the object contour from a foreground mask.
pub fn segment_mask(
    mask: &GrayImage,
    config: &ProcessingConfig,
    calibration: &CalibrationModel,
) -> Result<Contour> {
    let contours = external_contours(mask);
    if contours.is_empty() {
        return Err(OutlineError::NoObject);
    }
    info!(count = contours.len(), "Object contour candidates");

    let merged = if contours.len() > 1 && config.merge_nearby_contours {
        let merge_px = calibration.mm_to_px(config.contour_merge_distance_mm);
        let merged = merge_contours(&contours, merge_px, config);
        if merged.is_none() {
            warn!("Merge not applicable, selecting a single contour");
        }
        merged
    } else {
        None
    };

    let selected = match merged {
        Some(contour) => contour,
        None => select_centered(&contours, mask.width(), mask.height(), config.center_radius_fraction)
            .ok_or(OutlineError::NoObject)?,
    };

    Ok(simplify_conservative(&selected, config.polygon_epsilon_factor))
}

/// Largest contour whose centroid lies within `radius_fraction` of the image
/// half-diagonal from the image center, else the largest overall.
pub fn select_centered(
    contours: &[Contour],
    width: u32,
    height: u32,
    radius_fraction: f64,
) -> Option<Contour> {
    let center = [width as f64 / 2.0, height as f64 / 2.0];
    let half_diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt() / 2.0;
    let radius = half_diagonal * radius_fraction;

    let centered: Vec<Contour> = contours
        .iter()
        .filter(|c| distance(c.centroid(), center) <= radius)
        .cloned()
        .collect();

    match largest_contour(&centered) {
        Some(contour) => Some(contour.clone()),
        None => {
            warn!(radius, "No centered contour, using the largest overall");
            largest_contour(contours).cloned()
        }
    }
}

/// Simplify only long outlines, and only when most of the detail survives.
pub fn simplify_conservative(contour: &Contour, epsilon_factor: f64) -> Contour {
    let n = contour.len();
    if n <= SIMPLIFY_MIN_POINTS {
        return contour.clone();
    }
    let epsilon = epsilon_factor * OBJECT_EPSILON_SCALE * contour.perimeter();
    let simplified = simplify_closed(contour, epsilon);
    if (simplified.len() as f64) < n as f64 * SIMPLIFY_MIN_RETAINED {
        debug!(before = n, after = simplified.len(), "Keeping full contour detail");
        contour.clone()
    } else {
        simplified
    }
}
