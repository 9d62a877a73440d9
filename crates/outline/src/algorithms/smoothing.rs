use std::f64::consts::PI;

use tracing::{debug, warn};

use crate::{
    config::{ProcessingConfig, SmoothingMode},
    traits::ContourRefiner,
    types::{distance, CalibrationModel, Contour},
};

use super::{
    extraction::{external_contours, largest_contour, rasterize_padded},
    morphology::{close_disk, open_disk},
    simplification::simplify_closed,
};

/// Vertices with an interior angle at or above this are left alone.
const SHARP_ANGLE: f64 = 150.0 * PI / 180.0;
/// Resampling steps per smoothing amount.
const STEPS_PER_AMOUNT: f64 = 8.0;
/// Finest resampling step in pixels.
const MIN_STEP_PX: f64 = 0.5;
/// Tolerance of the final pass, as a share of the smoothing amount.
const FINAL_EPSILON: f64 = 0.05;
/// Upper bound on the final tolerance, so rounded corners keep their shape.
const MAX_FINAL_EPSILON_PX: f64 = 0.25;

/// Smoothing step of the refinement stage.
#[derive(Debug, Clone)]
pub struct ContourSmoother {
    pub enabled: bool,
    pub amount_mm: f64,
    pub mode: SmoothingMode,
}

impl ContourSmoother {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            enabled: config.enable_smoothing,
            amount_mm: config.smoothing_amount_mm,
            mode: config.smoothing_mode,
        }
    }
}

impl ContourRefiner for ContourSmoother {
    fn refine(&self, contour: &Contour, calibration: &CalibrationModel) -> Contour {
        if !self.enabled || self.amount_mm <= 0.0 {
            return contour.clone();
        }
        let amount_px = calibration.mm_to_px(self.amount_mm);
        debug!(amount_mm = self.amount_mm, amount_px, mode = %self.mode, "Smoothing contour");
        match self.mode {
            SmoothingMode::CurvatureBased => curvature_smooth(contour, amount_px),
            SmoothingMode::Morphological => morphological_smooth(contour, amount_px),
        }
    }
}

/// Smooth `contour` by `amount_mm`. Disabled smoothing or a non-positive
/// amount returns the input unchanged.
pub fn smooth_contour(
    contour: &Contour,
    amount_mm: f64,
    calibration: &CalibrationModel,
    config: &ProcessingConfig,
) -> Contour {
    ContourSmoother {
        enabled: config.enable_smoothing,
        amount_mm,
        mode: config.smoothing_mode,
    }
    .refine(contour, calibration)
}

/// Interior angle at `p` between the edges to `prev` and `next`, in radians.
fn interior_angle(prev: [f64; 2], p: [f64; 2], next: [f64; 2]) -> Option<f64> {
    let v1 = [prev[0] - p[0], prev[1] - p[1]];
    let v2 = [next[0] - p[0], next[1] - p[1]];
    let (l1, l2) = (v1[0].hypot(v1[1]), v2[0].hypot(v2[1]));
    if l1 < f64::EPSILON || l2 < f64::EPSILON {
        return None;
    }
    let cos = ((v1[0] * v2[0] + v1[1] * v2[1]) / (l1 * l2)).clamp(-1.0, 1.0);
    Some(cos.acos())
}

/// Round sharp corners while leaving straight runs in place.
///
/// The simplified ring is resampled so that `amount_px` spans several
/// samples. The angle at each sample is measured to the samples `amount_px`
/// of arc away on either side, and samples sharper than 150 degrees are
/// blended toward the distance-weighted mean of that window. Every window
/// point lies within `amount_px` of the sample, so no point moves further
/// than the smoothing amount.
pub fn curvature_smooth(contour: &Contour, amount_px: f64) -> Contour {
    let simplified = simplify_closed(contour, amount_px * 0.5);
    if simplified.len() < 3 || amount_px <= 0.0 {
        return contour.clone();
    }

    let step = (amount_px / STEPS_PER_AMOUNT).max(MIN_STEP_PX);
    let points = resample(&simplified.points, step);
    let n = points.len();
    let window = ((amount_px / step).floor() as usize).clamp(1, (n - 1) / 2);

    let mut blended = points.clone();
    let mut rounded = 0usize;
    for i in 0..n {
        let p = points[i];
        let Some(angle) = interior_angle(points[(i + n - window) % n], p, points[(i + window) % n]) else {
            continue;
        };
        if angle >= SHARP_ANGLE {
            continue;
        }
        let strength = ((PI - angle) / PI).powi(2);

        let (mut sum, mut total) = ([0.0, 0.0], 0.0);
        for k in 1..=window {
            for q in [points[(i + k) % n], points[(i + n - k) % n]] {
                let w = 1.0 / (1.0 + distance(p, q));
                sum[0] += q[0] * w;
                sum[1] += q[1] * w;
                total += w;
            }
        }
        let average = [sum[0] / total, sum[1] / total];
        let mut shift = [(average[0] - p[0]) * strength, (average[1] - p[1]) * strength];
        let length = shift[0].hypot(shift[1]);
        if length > amount_px {
            shift = [shift[0] * amount_px / length, shift[1] * amount_px / length];
        }
        blended[i] = [p[0] + shift[0], p[1] + shift[1]];
        rounded += 1;
    }
    debug!(vertices = simplified.len(), samples = n, rounded, "Curvature smoothing");

    if rounded == 0 {
        return simplified;
    }
    let epsilon = (amount_px * FINAL_EPSILON).min(MAX_FINAL_EPSILON_PX);
    let result = simplify_closed(&Contour::new(blended), epsilon);
    if result.len() < 3 {
        return contour.clone();
    }
    result
}

/// Closed ring through `points` with no two consecutive samples further
/// apart than `step`. Every input vertex is kept.
fn resample(points: &[[f64; 2]], step: f64) -> Vec<[f64; 2]> {
    let mut out = Vec::new();
    for (i, &a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        let count = (distance(a, b) / step).ceil().max(1.0) as usize;
        for k in 0..count {
            let t = k as f64 / count as f64;
            out.push([a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]);
        }
    }
    out
}

/// Close then open the filled shape with a disk sized from `amount_px`.
pub fn morphological_smooth(contour: &Contour, amount_px: f64) -> Contour {
    let radius = ((amount_px / 2.0).round() as u32).max(1);
    let (mask, offset) = rasterize_padded(contour, 2 * radius + 2);
    let smoothed = open_disk(&close_disk(&mask, radius), radius);

    match largest_contour(&external_contours(&smoothed)) {
        Some(result) => result.translate(-offset[0], -offset[1]),
        None => {
            warn!(radius, "Morphological smoothing removed the shape, keeping input");
            contour.clone()
        }
    }
}
