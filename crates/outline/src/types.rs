use geo_types::{Coord, LineString, Polygon};
use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{OutlineError, Result};
use crate::stage::Stage;

/// Gap (in pixels) between the first and last point under which a contour is
/// considered closed.
pub const CLOSURE_TOLERANCE_PX: f64 = 5.0;

/// An ordered, implicitly closed sequence of points in pixel space.
///
/// The closing edge from the last point back to the first is never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Contour {
    pub points: Vec<[f64; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert to a geo-types polygon (the ring is closed by `Polygon::new`).
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed area in square pixels.
    pub fn area(&self) -> f64 {
        use geo::Area;
        if self.points.len() < 3 {
            return 0.0;
        }
        self.to_geo_polygon().unsigned_area()
    }

    /// Length of the closed ring, including the implicit closing edge.
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let n = self.points.len();
        (0..n)
            .map(|i| distance(self.points[i], self.points[(i + 1) % n]))
            .sum()
    }

    /// Get the bounding box as `(min, max)`.
    pub fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for &[x, y] in &self.points {
            min[0] = min[0].min(x);
            min[1] = min[1].min(y);
            max[0] = max[0].max(x);
            max[1] = max[1].max(y);
        }
        (min, max)
    }

    pub fn centroid(&self) -> [f64; 2] {
        use geo::Centroid;
        match self.to_geo_polygon().centroid() {
            Some(c) if self.area() > 0.0 => [c.x(), c.y()],
            _ => {
                // Degenerate ring: use the bounding box center
                let (min, max) = self.bounding_box();
                [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0]
            }
        }
    }

    /// Distance between the first and last stored point.
    pub fn closure_gap(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(&first), Some(&last)) => distance(first, last),
            _ => 0.0,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.points.iter().map(|&[x, y]| [x + dx, y + dy]).collect())
    }

    /// Scale about the origin.
    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.points.iter().map(|&[x, y]| [x * factor, y * factor]).collect())
    }
}

impl From<Vec<[f64; 2]>> for Contour {
    fn from(points: Vec<[f64; 2]>) -> Self {
        Self::new(points)
    }
}

pub(crate) fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// Four backdrop corners ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CornerSet {
    pub top_left: [f64; 2],
    pub top_right: [f64; 2],
    pub bottom_right: [f64; 2],
    pub bottom_left: [f64; 2],
}

impl CornerSet {
    /// Order four raw corner candidates by the sum/difference rule:
    /// top-left has the minimal `x + y`, bottom-right the maximal `x + y`,
    /// top-right the minimal `y - x` and bottom-left the maximal `y - x`.
    pub fn from_points(points: &[[f64; 2]]) -> Result<Self> {
        if points.len() != 4 {
            return Err(OutlineError::InvalidInput(format!(
                "expected exactly 4 corner points, got {}",
                points.len()
            )));
        }

        let by = |key: fn(&[f64; 2]) -> f64, pick_max: bool| {
            let mut best = points[0];
            for p in &points[1..] {
                let better = if pick_max { key(p) > key(&best) } else { key(p) < key(&best) };
                if better {
                    best = *p;
                }
            }
            best
        };

        Ok(Self {
            top_left: by(|p| p[0] + p[1], false),
            top_right: by(|p| p[1] - p[0], false),
            bottom_right: by(|p| p[0] + p[1], true),
            bottom_left: by(|p| p[1] - p[0], true),
        })
    }

    pub fn to_array(&self) -> [[f64; 2]; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Re-derive the canonical ordering from the current points.
    pub fn reordered(&self) -> Result<Self> {
        Self::from_points(&self.to_array())
    }

    pub fn to_contour(&self) -> Contour {
        Contour::new(self.to_array().to_vec())
    }
}

/// Physical-to-pixel scale of a rectified image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalibrationModel {
    pub target_width_px: u32,
    pub target_height_px: u32,
    pub real_width_mm: f64,
    pub real_height_mm: f64,
}

impl CalibrationModel {
    pub fn new(
        target_width_px: u32,
        target_height_px: u32,
        real_width_mm: f64,
        real_height_mm: f64,
    ) -> Result<Self> {
        if target_width_px == 0 || target_height_px == 0 {
            return Err(OutlineError::InvalidInput(format!(
                "target size must be positive, got {target_width_px}x{target_height_px}"
            )));
        }
        if !(real_width_mm > 0.0 && real_height_mm > 0.0) {
            return Err(OutlineError::InvalidInput(format!(
                "physical size must be positive, got {real_width_mm}x{real_height_mm} mm"
            )));
        }
        Ok(Self {
            target_width_px,
            target_height_px,
            real_width_mm,
            real_height_mm,
        })
    }

    pub fn pixels_per_mm_x(&self) -> f64 {
        self.target_width_px as f64 / self.real_width_mm
    }

    pub fn pixels_per_mm_y(&self) -> f64 {
        self.target_height_px as f64 / self.real_height_mm
    }

    /// Isotropic scale used to convert physical refinement amounts to pixels.
    pub fn mean_pixels_per_mm(&self) -> f64 {
        (self.pixels_per_mm_x() + self.pixels_per_mm_y()) / 2.0
    }

    pub fn mm_to_px(&self, mm: f64) -> f64 {
        mm * self.mean_pixels_per_mm()
    }
}

/// Per-axis pixels-per-millimetre used by the vector encoders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelScale {
    pub x: f64,
    pub y: f64,
}

impl PixelScale {
    pub fn is_valid(&self) -> bool {
        self.x > 0.0 && self.y > 0.0 && self.x.is_finite() && self.y.is_finite()
    }
}

impl From<f64> for PixelScale {
    fn from(ppmm: f64) -> Self {
        Self { x: ppmm, y: ppmm }
    }
}

impl From<&CalibrationModel> for PixelScale {
    fn from(model: &CalibrationModel) -> Self {
        Self {
            x: model.pixels_per_mm_x(),
            y: model.pixels_per_mm_y(),
        }
    }
}

impl From<CalibrationModel> for PixelScale {
    fn from(model: CalibrationModel) -> Self {
        Self::from(&model)
    }
}

/// Intermediate result at a pipeline checkpoint.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub stage: Stage,
    pub image: GrayImage,
    /// Empty before `ObjectDetected`, except at `BoundaryDetected`.
    pub contour: Contour,
    /// Available once the image has been rectified.
    pub calibration: Option<CalibrationModel>,
}

/// Final contour together with the scale it was measured in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScaledContour {
    pub contour: Contour,
    pub calibration: CalibrationModel,
}

impl ScaledContour {
    /// Contour points converted to millimetres (Y down, image orientation).
    pub fn points_mm(&self) -> Vec<[f64; 2]> {
        let sx = self.calibration.pixels_per_mm_x();
        let sy = self.calibration.pixels_per_mm_y();
        self.contour
            .points
            .iter()
            .map(|&[x, y]| [x / sx, y / sy])
            .collect()
    }
}
