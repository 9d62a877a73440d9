//! # Lightbox Outline Tracing
//!
//! Turns a photograph of an object lying on a backlit rectangular backdrop
//! into a closed contour measured in millimetres, ready for DXF or GeoJSON
//! export.
//!
//! ## Core Features
//!
//! - **Backdrop calibration**: the backdrop corners are located, refined and
//!   used to rectify the image to a known pixels-per-millimetre scale
//! - **Object segmentation**: Otsu, manual or adaptive thresholding with
//!   fragment merging measured in millimetres
//! - **Refinement**: optional smoothing and clearance dilation in physical units
//! - **Staged execution**: stop at any of eight checkpoints for inspection
//! - **Vector export**: closed polylines in DXF and polygons in GeoJSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use outline::{default_config, process_to_contour, save_contour_to_dxf};
//!
//! let mut config = default_config();
//! config.dilation_amount_mm = 1.0;
//!
//! let traced = process_to_contour("photo.jpg", &config)?;
//! save_contour_to_dxf(&traced.contour, traced.calibration, "outline.dxf")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Inspecting a checkpoint
//!
//! ```rust,no_run
//! use outline::{MemorySink, ProcessingConfig, Stage, StageRunner};
//!
//! let config = ProcessingConfig::default();
//! let mut sink = MemorySink::new();
//! let mut report = |fraction: f64, label: &str| println!("{label}: {:.0}%", fraction * 100.0);
//! let mut runner = StageRunner::builder(&config)
//!     .progress(&mut report)
//!     .debug_sink(&mut sink)
//!     .build();
//! let output = runner.run_path("photo.jpg", Stage::LightboxCropped)?;
//! output.image.save("cropped.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;

use tracing::info;

pub mod error;
pub mod types;
pub mod config;
pub mod stage;
pub mod traits;
pub mod debug;
pub mod algorithms;
pub mod pipeline;
pub mod io;

pub use error::{ErrorCode, OutlineError, Result};
pub use types::{CalibrationModel, Contour, CornerSet, PixelScale, ScaledContour, StageOutput};
pub use config::{
    BoundaryMap, BoundaryRetry, ParameterRange, ParameterRanges, ProcessingConfig,
    SmoothingMode, ThresholdMode,
};
pub use stage::Stage;
pub use traits::{ContourRefiner, DebugSink, ImagePreprocessor, ProgressReporter};
pub use debug::{MemorySink, NoopSink, Snapshot};
pub use pipeline::{builder::StageRunnerBuilder, StageRunner};
pub use io::{
    contour_from_geojson_str, contour_to_dxf, contour_to_geojson, estimate_processing_time,
    is_valid_image_file, save_contour_to_dxf, save_contour_to_geojson,
};

/// Configuration with every parameter at its default.
pub fn default_config() -> ProcessingConfig {
    ProcessingConfig::default()
}

/// Check every parameter against its range and the cross-field rules.
pub fn validate_config(config: &ProcessingConfig) -> Result<()> {
    config.validate()
}

/// Slider metadata for every tunable parameter.
pub fn parameter_ranges() -> ParameterRanges {
    ParameterRanges::default()
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn check_inputs(path: &Path, config: &ProcessingConfig) -> Result<()> {
    config.validate()?;
    if !path.is_file() {
        return Err(OutlineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Run the pipeline on the image at `path` and stop at `stage`.
///
/// The configuration and the input path are checked before any image is
/// decoded.
pub fn process_to_stage(
    path: impl AsRef<Path>,
    config: &ProcessingConfig,
    stage: Stage,
) -> Result<StageOutput> {
    let path = path.as_ref();
    check_inputs(path, config)?;
    StageRunner::new(config, None, None).run_path(path, stage)
}

/// Run the full pipeline and return the final contour with its scale.
pub fn process_to_contour(path: impl AsRef<Path>, config: &ProcessingConfig) -> Result<ScaledContour> {
    let output = process_to_stage(path, config, Stage::Final)?;
    let calibration = output.calibration.ok_or_else(|| {
        OutlineError::Processing("final stage produced no calibration".into())
    })?;
    Ok(ScaledContour {
        contour: output.contour,
        calibration,
    })
}

/// Trace `input` and write the result to `output` as DXF.
pub fn process_image_to_dxf(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<ScaledContour> {
    let traced = process_to_contour(input, config)?;
    save_contour_to_dxf(&traced.contour, traced.calibration, output.as_ref())?;
    info!(
        points = traced.contour.len(),
        output = %output.as_ref().display(),
        "📐 Outline exported"
    );
    Ok(traced)
}
