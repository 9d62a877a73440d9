use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutlineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Image too small: {width}x{height} (minimum {min}x{min} pixels required)")]
    ImageTooSmall { width: u32, height: u32, min: u32 },

    #[error("No dark pixels found on the backdrop - ensure good contrast")]
    NoContours,

    #[error("No contours found in the lightbox boundary map")]
    NoBoundary,

    #[error("No object contours found in the rectified image")]
    NoObject,

    #[error("Contour failed validation: {0}")]
    ValidationFailed(String),

    #[error("Failed to write DXF: {0}")]
    DxfWrite(#[from] dxf::DxfError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Image processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, OutlineError>;

/// Stable numeric status codes for callers that cannot consume the error enum
/// directly (UI bridges, process exit codes).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize,
    Display, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ErrorCode {
    InvalidInput = -1,
    FileNotFound = -2,
    ImageLoadFailed = -3,
    ImageTooSmall = -4,
    NoContours = -5,
    NoBoundary = -6,
    NoObject = -7,
    DxfWriteFailed = -8,
    InvalidParameters = -9,
    ProcessingFailed = -10,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Human-readable message for the status code.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input parameters",
            Self::FileNotFound => "Input file not found or not readable",
            Self::ImageLoadFailed => "Failed to load image - check format and file integrity",
            Self::ImageTooSmall => "Image too small - minimum 100x100 pixels required",
            Self::NoContours => "No contours found in image - ensure good contrast",
            Self::NoBoundary => "Could not detect rectangular boundary - ensure clear lightbox edges",
            Self::NoObject => "No object found after processing - check image quality",
            Self::DxfWriteFailed => "Failed to write DXF file - check output path permissions",
            Self::InvalidParameters => "Invalid processing parameters - check parameter ranges",
            Self::ProcessingFailed => "Image processing failed",
        }
    }
}

impl OutlineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::InvalidParameter { .. } => ErrorCode::InvalidParameters,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::ImageLoad(_) => ErrorCode::ImageLoadFailed,
            Self::ImageTooSmall { .. } => ErrorCode::ImageTooSmall,
            Self::NoContours => ErrorCode::NoContours,
            Self::NoBoundary => ErrorCode::NoBoundary,
            Self::NoObject => ErrorCode::NoObject,
            Self::DxfWrite(_) => ErrorCode::DxfWriteFailed,
            Self::ValidationFailed(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::GeoJson(_)
            | Self::Processing(_) => ErrorCode::ProcessingFailed,
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_codes_follow_failure_site() {
        assert_eq!(OutlineError::NoBoundary.code(), ErrorCode::NoBoundary);
        assert_eq!(OutlineError::NoObject.code(), ErrorCode::NoObject);
        assert_eq!(OutlineError::NoContours.code(), ErrorCode::NoContours);
        assert_eq!(
            OutlineError::ImageTooSmall { width: 10, height: 10, min: 100 }.code(),
            ErrorCode::ImageTooSmall
        );
        assert_eq!(
            OutlineError::invalid_parameter("min_perimeter", "out of range").code(),
            ErrorCode::InvalidParameters
        );
        assert_eq!(
            OutlineError::ValidationFailed("too few points".into()).code(),
            ErrorCode::ProcessingFailed
        );
    }

    #[test]
    fn test_code_values_are_distinct_and_negative() {
        let values: Vec<i32> = ErrorCode::iter().map(ErrorCode::as_i32).collect();
        assert!(values.iter().all(|v| *v < 0));
        let mut deduped = values.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), values.len());
    }
}
