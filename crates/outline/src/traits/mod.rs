use image::GrayImage;
use crate::{
    error::Result,
    types::{CalibrationModel, Contour},
};

/// Trait for image preprocessing steps (contrast normalization, binarization)
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Trait for contour post-processing expressed in physical units
pub trait ContourRefiner: Send + Sync {
    /// Refine `contour`. Implementations return the input unchanged when
    /// their amount is zero.
    fn refine(&self, contour: &Contour, calibration: &CalibrationModel) -> Contour;
}

/// Receives coarse progress milestones from a pipeline run.
pub trait ProgressReporter {
    /// `fraction` is in `[0, 1]`; `label` names the step about to run.
    fn report(&mut self, fraction: f64, label: &str);
}

impl<F> ProgressReporter for F
where
    F: FnMut(f64, &str),
{
    fn report(&mut self, fraction: f64, label: &str) {
        self(fraction, label)
    }
}

/// Collects diagnostic snapshots produced during a single run.
pub trait DebugSink {
    /// Record an intermediate image.
    fn image(&mut self, name: &str, image: &GrayImage);

    /// Record a contour drawn over `background`.
    fn contour(&mut self, name: &str, background: &GrayImage, contour: &[[f64; 2]]);

    /// Whether snapshots are being kept. Producers may skip expensive
    /// rendering when this is false.
    fn enabled(&self) -> bool {
        true
    }
}

/// Convenience for passing a contour value to a sink.
pub(crate) fn record_contour(
    sink: &mut Option<&mut dyn DebugSink>,
    name: &str,
    background: &GrayImage,
    contour: &Contour,
) {
    if let Some(sink) = sink.as_deref_mut() {
        if sink.enabled() {
            sink.contour(name, background, &contour.points);
        }
    }
}

pub(crate) fn record_image(sink: &mut Option<&mut dyn DebugSink>, name: &str, image: &GrayImage) {
    if let Some(sink) = sink.as_deref_mut() {
        if sink.enabled() {
            sink.image(name, image);
        }
    }
}
