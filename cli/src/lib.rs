use std::fs;
use std::path::Path;

use clap::{Args, ValueEnum};
use outline::{ProcessingConfig, SmoothingMode, ThresholdMode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Outline(#[from] outline::OutlineError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Serialization format for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }
}

pub fn config_from_str(content: &str, format: ConfigFormat) -> Result<ProcessingConfig, CliError> {
    Ok(match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    })
}

pub fn config_to_string(config: &ProcessingConfig, format: ConfigFormat) -> Result<String, CliError> {
    Ok(match format {
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    })
}

/// Load a configuration, picking the format from the extension. Missing
/// fields take their defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProcessingConfig, CliError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    config_from_str(&fs::read_to_string(path)?, format)
}

pub fn save_config<P: AsRef<Path>>(config: &ProcessingConfig, path: P) -> Result<(), CliError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    fs::write(path, config_to_string(config, format)?)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThresholdArg {
    Auto,
    Manual,
    Adaptive,
}

impl From<ThresholdArg> for ThresholdMode {
    fn from(arg: ThresholdArg) -> Self {
        match arg {
            ThresholdArg::Auto => Self::Auto,
            ThresholdArg::Manual => Self::Manual,
            ThresholdArg::Adaptive => Self::Adaptive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SmoothingArg {
    Curvature,
    Morphological,
}

impl From<SmoothingArg> for SmoothingMode {
    fn from(arg: SmoothingArg) -> Self {
        match arg {
            SmoothingArg::Curvature => Self::CurvatureBased,
            SmoothingArg::Morphological => Self::Morphological,
        }
    }
}

/// Command-line overrides applied on top of a loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,
    /// Rectified backdrop width in pixels
    #[arg(long)]
    pub warp_width: Option<u32>,
    /// Rectified backdrop height in pixels
    #[arg(long)]
    pub warp_height: Option<u32>,
    /// Physical backdrop width in millimetres
    #[arg(long)]
    pub width_mm: Option<f64>,
    /// Physical backdrop height in millimetres
    #[arg(long)]
    pub height_mm: Option<f64>,
    #[arg(long, value_enum)]
    pub threshold: Option<ThresholdArg>,
    /// Fixed threshold for manual mode
    #[arg(long)]
    pub manual_threshold: Option<u8>,
    /// Clearance added around the outline, in millimetres
    #[arg(long)]
    pub dilate_mm: Option<f64>,
    /// Smoothing amount in millimetres; enables smoothing
    #[arg(long)]
    pub smooth_mm: Option<f64>,
    #[arg(long, value_enum)]
    pub smoothing: Option<SmoothingArg>,
    /// Fragment merge distance in millimetres
    #[arg(long)]
    pub merge_mm: Option<f64>,
    #[arg(long)]
    pub no_merge: bool,
    #[arg(long)]
    pub no_subpixel: bool,
    #[arg(long)]
    pub no_morphology: bool,
}

impl ConfigOverrides {
    /// Load the configured file (or defaults) and apply every given flag.
    pub fn resolve(&self) -> Result<ProcessingConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProcessingConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut ProcessingConfig) {
        if let Some(v) = self.warp_width {
            config.lightbox_width_px = v;
        }
        if let Some(v) = self.warp_height {
            config.lightbox_height_px = v;
        }
        if let Some(v) = self.width_mm {
            config.lightbox_width_mm = v;
        }
        if let Some(v) = self.height_mm {
            config.lightbox_height_mm = v;
        }
        if let Some(v) = self.threshold {
            config.threshold_mode = v.into();
        }
        if let Some(v) = self.manual_threshold {
            config.manual_threshold = v;
        }
        if let Some(v) = self.dilate_mm {
            config.dilation_amount_mm = v;
        }
        if let Some(v) = self.smooth_mm {
            config.enable_smoothing = v > 0.0;
            config.smoothing_amount_mm = v;
        }
        if let Some(v) = self.smoothing {
            config.smoothing_mode = v.into();
        }
        if let Some(v) = self.merge_mm {
            config.contour_merge_distance_mm = v;
        }
        if self.no_merge {
            config.merge_nearby_contours = false;
        }
        if self.no_subpixel {
            config.enable_subpixel_refinement = false;
        }
        if self.no_morphology {
            config.disable_morphology = true;
        }
    }
}
