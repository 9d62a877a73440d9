use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{OutlineError, Result};

/// How the object is separated from the backdrop in the rectified image.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdMode {
    /// Otsu level shifted by `threshold_offset`
    #[default]
    Auto,
    /// `manual_threshold` shifted by `threshold_offset`
    Manual,
    /// Local mean over a square block minus `adaptive_offset`
    Adaptive,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SmoothingMode {
    /// Round sharp corners only, leaving straight runs untouched
    #[default]
    CurvatureBased,
    /// Close then open the rasterized shape
    Morphological,
}

/// Which binary map the backdrop boundary is traced from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoundaryMap {
    /// The cleaned bright-region mask
    #[default]
    Mask,
    /// Canny edges of the cleaned mask
    Edges,
}

/// Tolerance ladder used while reducing the backdrop contour to four vertices.
///
/// Factors are fractions of the contour perimeter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BoundaryRetry {
    pub epsilon_start: f64,
    pub epsilon_step_up: f64,
    pub epsilon_step_down: f64,
    /// Decreasing stops once the factor would reach this value.
    pub epsilon_floor: f64,
    pub max_attempts: u32,
    /// Tolerance used to re-simplify the convex hull.
    pub fallback_epsilon: f64,
}

impl Default for BoundaryRetry {
    fn default() -> Self {
        Self {
            epsilon_start: 0.02,
            epsilon_step_up: 0.01,
            epsilon_step_down: 0.005,
            epsilon_floor: 0.005,
            max_attempts: 10,
            fallback_epsilon: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProcessingConfig {
    // Rectification target
    #[schemars(range(min = 100, max = 10000))]
    pub lightbox_width_px: u32,
    #[schemars(range(min = 100, max = 10000))]
    pub lightbox_height_px: u32,
    #[schemars(range(min = 10.0, max = 1000.0))]
    pub lightbox_width_mm: f64,
    #[schemars(range(min = 10.0, max = 1000.0))]
    pub lightbox_height_mm: f64,

    // Boundary location
    #[schemars(range(min = 0.1, max = 10.0))]
    pub clahe_clip_limit: f64,
    #[schemars(range(min = 2, max = 32))]
    pub clahe_tile_size: u32,
    /// Fraction of the range above the Otsu level that still counts as backdrop.
    #[schemars(range(min = 0.0, max = 0.9))]
    pub lightbox_brightness_bias: f64,
    pub boundary_map: BoundaryMap,
    #[schemars(range(min = 0.0, max = 500.0))]
    pub canny_low: f64,
    #[schemars(range(min = 0.0, max = 500.0))]
    pub canny_high: f64,
    pub boundary_retry: BoundaryRetry,
    pub enable_subpixel_refinement: bool,
    #[schemars(range(min = 3, max = 15))]
    pub corner_window_size: u32,

    // Object segmentation
    pub threshold_mode: ThresholdMode,
    #[schemars(range(min = 0, max = 255))]
    pub manual_threshold: u8,
    /// Positive values include more of the object.
    pub threshold_offset: f64,
    #[schemars(range(min = 1, max = 255))]
    pub adaptive_block_radius: u32,
    pub adaptive_offset: i32,
    pub disable_morphology: bool,
    #[schemars(range(min = 3, max = 15))]
    pub morph_kernel_size: u32,
    #[schemars(range(min = 0, max = 200))]
    pub border_clearance_px: u32,
    pub merge_nearby_contours: bool,
    #[schemars(range(min = 0.0, max = 20.0))]
    pub contour_merge_distance_mm: f64,
    #[schemars(range(min = 10.0, max = 1000000.0))]
    pub min_contour_area: f64,
    #[schemars(range(min = 0.0001, max = 0.1))]
    pub polygon_epsilon_factor: f64,
    /// Radius, as a fraction of the half-diagonal, inside which a contour
    /// centroid counts as centered.
    #[schemars(range(min = 0.05, max = 1.0))]
    pub center_radius_fraction: f64,

    // Validation
    pub validate_closed_contour: bool,
    #[schemars(range(min = 10.0, max = 10000.0))]
    pub min_perimeter: f64,

    // Refinement
    #[schemars(range(min = 0.0, max = 50.0))]
    pub dilation_amount_mm: f64,
    pub enable_smoothing: bool,
    #[schemars(range(min = 0.0, max = 10.0))]
    pub smoothing_amount_mm: f64,
    pub smoothing_mode: SmoothingMode,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            lightbox_width_px: 3240,
            lightbox_height_px: 3240,
            lightbox_width_mm: 162.0,
            lightbox_height_mm: 162.0,
            clahe_clip_limit: 2.0,
            clahe_tile_size: 8,
            lightbox_brightness_bias: 0.3,
            boundary_map: BoundaryMap::Mask,
            canny_low: 50.0,
            canny_high: 150.0,
            boundary_retry: BoundaryRetry::default(),
            enable_subpixel_refinement: true,
            corner_window_size: 5,
            threshold_mode: ThresholdMode::Auto,
            manual_threshold: 128,
            threshold_offset: 0.0,
            adaptive_block_radius: 15,
            adaptive_offset: 5,
            disable_morphology: false,
            morph_kernel_size: 5,
            border_clearance_px: 8,
            merge_nearby_contours: true,
            contour_merge_distance_mm: 5.0,
            min_contour_area: 500.0,
            polygon_epsilon_factor: 0.005,
            center_radius_fraction: 0.4,
            validate_closed_contour: true,
            min_perimeter: 100.0,
            dilation_amount_mm: 0.0,
            enable_smoothing: false,
            smoothing_amount_mm: 0.2,
            smoothing_mode: SmoothingMode::CurvatureBased,
        }
    }
}

impl ProcessingConfig {
    /// Get the JSON schema for the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ProcessingConfig)
    }

    /// Check every tunable against [`ParameterRanges`] plus the cross-field rules.
    ///
    /// Performs no I/O, so it can run before any image is touched.
    pub fn validate(&self) -> Result<()> {
        let r = ParameterRanges::default();

        r.lightbox_width_px.check("lightbox_width_px", self.lightbox_width_px as f64)?;
        r.lightbox_height_px.check("lightbox_height_px", self.lightbox_height_px as f64)?;
        r.lightbox_width_mm.check("lightbox_width_mm", self.lightbox_width_mm)?;
        r.lightbox_height_mm.check("lightbox_height_mm", self.lightbox_height_mm)?;
        r.clahe_clip_limit.check("clahe_clip_limit", self.clahe_clip_limit)?;
        r.clahe_tile_size.check("clahe_tile_size", self.clahe_tile_size as f64)?;
        r.lightbox_brightness_bias
            .check("lightbox_brightness_bias", self.lightbox_brightness_bias)?;
        r.canny_threshold.check("canny_low", self.canny_low)?;
        r.canny_threshold.check("canny_high", self.canny_high)?;
        if self.canny_low >= self.canny_high {
            return Err(OutlineError::invalid_parameter(
                "canny_low",
                format!("must be below canny_high ({})", self.canny_high),
            ));
        }
        self.validate_retry()?;
        r.corner_window_size.check("corner_window_size", self.corner_window_size as f64)?;
        r.threshold_offset.check("threshold_offset", self.threshold_offset)?;
        r.adaptive_block_radius
            .check("adaptive_block_radius", self.adaptive_block_radius as f64)?;
        r.adaptive_offset.check("adaptive_offset", self.adaptive_offset as f64)?;
        r.morph_kernel_size.check("morph_kernel_size", self.morph_kernel_size as f64)?;
        r.border_clearance_px.check("border_clearance_px", self.border_clearance_px as f64)?;
        r.contour_merge_distance_mm
            .check("contour_merge_distance_mm", self.contour_merge_distance_mm)?;
        r.min_contour_area.check("min_contour_area", self.min_contour_area)?;
        r.polygon_epsilon_factor
            .check("polygon_epsilon_factor", self.polygon_epsilon_factor)?;
        r.center_radius_fraction
            .check("center_radius_fraction", self.center_radius_fraction)?;
        r.min_perimeter.check("min_perimeter", self.min_perimeter)?;
        r.dilation_amount_mm.check("dilation_amount_mm", self.dilation_amount_mm)?;
        r.smoothing_amount_mm.check("smoothing_amount_mm", self.smoothing_amount_mm)?;

        Ok(())
    }

    fn validate_retry(&self) -> Result<()> {
        let retry = &self.boundary_retry;
        if retry.max_attempts == 0 {
            return Err(OutlineError::invalid_parameter(
                "boundary_retry.max_attempts",
                "must be at least 1",
            ));
        }
        let factors = [
            ("boundary_retry.epsilon_start", retry.epsilon_start),
            ("boundary_retry.epsilon_step_up", retry.epsilon_step_up),
            ("boundary_retry.epsilon_step_down", retry.epsilon_step_down),
            ("boundary_retry.fallback_epsilon", retry.fallback_epsilon),
        ];
        for (name, value) in factors {
            if !(value > 0.0 && value < 1.0) {
                return Err(OutlineError::invalid_parameter(
                    name,
                    format!("must be in (0, 1), got {value}"),
                ));
            }
        }
        if !(retry.epsilon_floor >= 0.0 && retry.epsilon_floor < retry.epsilon_start) {
            return Err(OutlineError::invalid_parameter(
                "boundary_retry.epsilon_floor",
                format!("must be in [0, epsilon_start), got {}", retry.epsilon_floor),
            ));
        }
        Ok(())
    }
}

/// Inclusive bounds for one tunable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, name: &'static str, value: f64) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(OutlineError::invalid_parameter(
                name,
                format!("{value} is outside [{}, {}]", self.min, self.max),
            ))
        }
    }
}

/// Slider metadata for interactive front ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterRanges {
    pub lightbox_width_px: ParameterRange,
    pub lightbox_height_px: ParameterRange,
    pub lightbox_width_mm: ParameterRange,
    pub lightbox_height_mm: ParameterRange,
    pub clahe_clip_limit: ParameterRange,
    pub clahe_tile_size: ParameterRange,
    pub lightbox_brightness_bias: ParameterRange,
    pub canny_threshold: ParameterRange,
    pub corner_window_size: ParameterRange,
    pub manual_threshold: ParameterRange,
    pub threshold_offset: ParameterRange,
    pub adaptive_block_radius: ParameterRange,
    pub adaptive_offset: ParameterRange,
    pub morph_kernel_size: ParameterRange,
    pub border_clearance_px: ParameterRange,
    pub contour_merge_distance_mm: ParameterRange,
    pub min_contour_area: ParameterRange,
    pub polygon_epsilon_factor: ParameterRange,
    pub center_radius_fraction: ParameterRange,
    pub min_perimeter: ParameterRange,
    pub dilation_amount_mm: ParameterRange,
    pub smoothing_amount_mm: ParameterRange,
}

impl Default for ParameterRanges {
    fn default() -> Self {
        Self {
            lightbox_width_px: ParameterRange::new(100.0, 10000.0),
            lightbox_height_px: ParameterRange::new(100.0, 10000.0),
            lightbox_width_mm: ParameterRange::new(10.0, 1000.0),
            lightbox_height_mm: ParameterRange::new(10.0, 1000.0),
            clahe_clip_limit: ParameterRange::new(0.1, 10.0),
            clahe_tile_size: ParameterRange::new(2.0, 32.0),
            lightbox_brightness_bias: ParameterRange::new(0.0, 0.9),
            canny_threshold: ParameterRange::new(0.0, 500.0),
            corner_window_size: ParameterRange::new(3.0, 15.0),
            manual_threshold: ParameterRange::new(0.0, 255.0),
            threshold_offset: ParameterRange::new(-50.0, 50.0),
            adaptive_block_radius: ParameterRange::new(1.0, 255.0),
            adaptive_offset: ParameterRange::new(-50.0, 50.0),
            morph_kernel_size: ParameterRange::new(3.0, 15.0),
            border_clearance_px: ParameterRange::new(0.0, 200.0),
            contour_merge_distance_mm: ParameterRange::new(0.0, 20.0),
            min_contour_area: ParameterRange::new(10.0, 1_000_000.0),
            polygon_epsilon_factor: ParameterRange::new(0.0001, 0.1),
            center_radius_fraction: ParameterRange::new(0.05, 1.0),
            min_perimeter: ParameterRange::new(10.0, 10000.0),
            dilation_amount_mm: ParameterRange::new(0.0, 50.0),
            smoothing_amount_mm: ParameterRange::new(0.0, 10.0),
        }
    }
}
