use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

/// Checkpoints of the tracing pipeline, in execution order.
#[derive(
    Debug, Clone, Copy,
    PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Source image decoded to grayscale
    Loaded,
    /// Backdrop located and rectified to the target size
    LightboxCropped,
    /// Local contrast normalized on the rectified image
    Normalized,
    /// Backdrop corners available for visualization
    BoundaryDetected,
    /// Object contour segmented (and merged)
    ObjectDetected,
    /// Contour smoothed, or passed through when smoothing is disabled
    Smoothed,
    /// Contour dilated, or passed through when the amount is zero
    Dilated,
    /// Contour validated and ready for export
    Final,
}

impl Stage {
    pub const COUNT: usize = 8;

    pub const ALL: [Stage; Self::COUNT] = [
        Stage::Loaded,
        Stage::LightboxCropped,
        Stage::Normalized,
        Stage::BoundaryDetected,
        Stage::ObjectDetected,
        Stage::Smoothed,
        Stage::Dilated,
        Stage::Final,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display label used in progress reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Loaded => "Loaded",
            Self::LightboxCropped => "Lightbox Cropped",
            Self::Normalized => "Normalized",
            Self::BoundaryDetected => "Boundary Detected",
            Self::ObjectDetected => "Object Detected",
            Self::Smoothed => "Smoothed",
            Self::Dilated => "Dilated",
            Self::Final => "Final",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Loaded => "Original image loaded and converted to grayscale",
            Self::LightboxCropped => "Perspective corrected and cropped to the lightbox area",
            Self::Normalized => "Lighting normalized with local contrast enhancement",
            Self::BoundaryDetected => "Lightbox corners shown on the rectified image",
            Self::ObjectDetected => "Object contour detected",
            Self::Smoothed => "Contour smoothed to remove small details",
            Self::Dilated => "Contour dilated for fit tolerance",
            Self::Final => "Final validated contour ready for export",
        }
    }

    /// Stage names accepted by `FromStr`.
    pub fn names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}
