pub mod builder;

use std::path::Path;

use image::GrayImage;
use tracing::{info, instrument, warn};

use crate::{
    algorithms::{
        boundary::{boundary_map, locate_in_map},
        dilation::ContourDilator,
        perspective::{rectify, refine_corners},
        preprocessing::ClahePreprocessor,
        segmentation::{object_mask, segment_mask},
        smoothing::ContourSmoother,
        validation::validate_contour,
    },
    config::ProcessingConfig,
    error::{OutlineError, Result},
    io::{check_image_size, load_grayscale},
    stage::Stage,
    traits::{record_contour, record_image, ContourRefiner, DebugSink, ImagePreprocessor, ProgressReporter},
    types::{CalibrationModel, Contour, StageOutput},
};

/// Runs the outline pipeline up to a requested checkpoint.
///
/// A run always starts from the source image; nothing is cached between
/// calls. Progress and debug snapshots go to the optional collaborators given
/// at construction and are scoped to this runner.
pub struct StageRunner<'a> {
    config: &'a ProcessingConfig,
    progress: Option<&'a mut dyn ProgressReporter>,
    debug: Option<&'a mut dyn DebugSink>,
}

impl<'a> StageRunner<'a> {
    /// Create a runner builder for `config`
    pub fn builder(config: &'a ProcessingConfig) -> builder::StageRunnerBuilder<'a> {
        builder::StageRunnerBuilder::new(config)
    }

    pub fn new(
        config: &'a ProcessingConfig,
        progress: Option<&'a mut dyn ProgressReporter>,
        debug: Option<&'a mut dyn DebugSink>,
    ) -> Self {
        Self {
            config,
            progress,
            debug,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        self.config
    }

    /// Load `path` as grayscale and run it up to `target`.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn run_path(&mut self, path: impl AsRef<Path>, target: Stage) -> Result<StageOutput> {
        self.enter(Stage::Loaded);
        let source = load_grayscale(path)?;
        self.run_loaded(source, target)
    }

    /// Run an already decoded image up to `target`.
    pub fn run_image(&mut self, source: GrayImage, target: Stage) -> Result<StageOutput> {
        self.enter(Stage::Loaded);
        check_image_size(&source)?;
        self.run_loaded(source, target)
    }

    fn run_loaded(&mut self, source: GrayImage, target: Stage) -> Result<StageOutput> {
        let config = self.config;
        info!(
            width = source.width(),
            height = source.height(),
            target = %target,
            "🚀 Starting outline pipeline"
        );
        record_image(&mut self.debug, "original", &source);
        if target == Stage::Loaded {
            return Ok(self.checkpoint(Stage::Loaded, source, Contour::empty(), None));
        }

        // Backdrop corners and perspective rectification
        self.enter(Stage::LightboxCropped);
        let map = boundary_map(&source, config)?;
        record_image(&mut self.debug, "boundary_map", &map);
        let detection = locate_in_map(&map, config)?;
        record_contour(&mut self.debug, "boundary_contour", &source, &detection.contour);

        let corners = if config.enable_subpixel_refinement {
            refine_corners(&source, &detection.corners, config.corner_window_size)
        } else {
            detection.corners
        };
        record_contour(&mut self.debug, "boundary_corners", &source, &corners.to_contour());

        let rectified = rectify(
            &source,
            &corners,
            config.lightbox_width_px,
            config.lightbox_height_px,
            config.lightbox_width_mm,
            config.lightbox_height_mm,
        )?;
        let calibration = rectified.calibration;
        info!(
            strategy = ?detection.strategy,
            width = rectified.image.width(),
            height = rectified.image.height(),
            "✂️ Lightbox cropped"
        );
        record_image(&mut self.debug, "rectified", &rectified.image);
        if target == Stage::LightboxCropped {
            return Ok(self.checkpoint(target, rectified.image, Contour::empty(), Some(calibration)));
        }

        self.enter(Stage::Normalized);
        let normalized = ClahePreprocessor {
            clip_limit: config.clahe_clip_limit,
            tile_grid: config.clahe_tile_size,
        }
        .preprocess(&rectified.image)?;
        record_image(&mut self.debug, "normalized", &normalized);
        if target == Stage::Normalized {
            return Ok(self.checkpoint(target, normalized, Contour::empty(), Some(calibration)));
        }

        // Corners are in source coordinates; this checkpoint is for display only
        self.enter(Stage::BoundaryDetected);
        if target == Stage::BoundaryDetected {
            return Ok(self.checkpoint(
                target,
                rectified.image,
                rectified.corners.to_contour(),
                Some(calibration),
            ));
        }

        self.enter(Stage::ObjectDetected);
        let mask = object_mask(&normalized, config)?;
        record_image(&mut self.debug, "object_mask", &mask);
        let object = segment_mask(&mask, config, &calibration)?;
        info!(
            points = object.len(),
            area = object.area(),
            "🎯 Object contour detected"
        );
        record_contour(&mut self.debug, "object_contour", &normalized, &object);
        if target == Stage::ObjectDetected {
            return Ok(self.checkpoint(target, normalized, object, Some(calibration)));
        }

        self.enter(Stage::Smoothed);
        let smoothed = ContourSmoother::from_config(config).refine(&object, &calibration);
        if config.enable_smoothing {
            record_contour(&mut self.debug, "smoothed_contour", &normalized, &smoothed);
        }
        if target == Stage::Smoothed {
            return Ok(self.checkpoint(target, normalized, smoothed, Some(calibration)));
        }

        self.enter(Stage::Dilated);
        let dilated = ContourDilator {
            amount_mm: config.dilation_amount_mm,
        }
        .refine(&smoothed, &calibration);
        if config.dilation_amount_mm > 0.0 {
            record_contour(&mut self.debug, "dilated_contour", &normalized, &dilated);
        }
        if target == Stage::Dilated {
            return Ok(self.checkpoint(target, normalized, dilated, Some(calibration)));
        }

        self.enter(Stage::Final);
        if !validate_contour(&dilated, config) {
            warn!(points = dilated.len(), "Final contour rejected");
            return Err(OutlineError::ValidationFailed(format!(
                "{} points, perimeter {:.1} px (minimum {:.1})",
                dilated.len(),
                dilated.perimeter(),
                config.min_perimeter
            )));
        }
        record_contour(&mut self.debug, "final_contour", &normalized, &dilated);
        Ok(self.checkpoint(Stage::Final, normalized, dilated, Some(calibration)))
    }

    fn enter(&mut self, stage: Stage) {
        if let Some(progress) = self.progress.as_deref_mut() {
            progress.report(stage.index() as f64 / Stage::COUNT as f64, stage.name());
        }
    }

    fn checkpoint(
        &mut self,
        stage: Stage,
        image: GrayImage,
        contour: Contour,
        calibration: Option<CalibrationModel>,
    ) -> StageOutput {
        if let Some(progress) = self.progress.as_deref_mut() {
            progress.report(1.0, "Complete");
        }
        info!(stage = %stage, points = contour.len(), "✅ Reached checkpoint");
        StageOutput {
            stage,
            image,
            contour,
            calibration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{algorithms::test_support::lightbox_scene, debug::MemorySink};

    /// 1200 px frame holding a 1000 px backdrop rectified to 1000 px at 10 px/mm.
    fn config() -> ProcessingConfig {
        ProcessingConfig {
            lightbox_width_px: 1000,
            lightbox_height_px: 1000,
            lightbox_width_mm: 100.0,
            lightbox_height_mm: 100.0,
            ..Default::default()
        }
    }

    fn scene() -> GrayImage {
        lightbox_scene(100, 1000, 200)
    }

    #[test]
    fn test_loaded_returns_source() {
        let config = config();
        let output = StageRunner::new(&config, None, None)
            .run_image(scene(), Stage::Loaded)
            .expect("Should load");
        assert_eq!(output.stage, Stage::Loaded);
        assert_eq!(output.image.dimensions(), (1200, 1200));
        assert!(output.contour.is_empty());
        assert!(output.calibration.is_none());
    }

    #[test]
    fn test_cropped_has_target_size_and_calibration() {
        let config = config();
        let output = StageRunner::new(&config, None, None)
            .run_image(scene(), Stage::LightboxCropped)
            .expect("Should crop");
        assert_eq!(output.image.dimensions(), (1000, 1000));
        assert!(output.contour.is_empty());
        let calibration = output.calibration.expect("Should be calibrated");
        assert!((calibration.mean_pixels_per_mm() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_boundary_checkpoint_carries_corners() {
        let config = config();
        let output = StageRunner::new(&config, None, None)
            .run_image(scene(), Stage::BoundaryDetected)
            .expect("Should detect boundary");
        assert_eq!(output.contour.len(), 4);
        let [x, y] = output.contour.points[0];
        assert!((x - 100.0).abs() <= 2.0 && (y - 100.0).abs() <= 2.0, "{x}, {y}");
    }

    #[test]
    fn test_object_area_matches_scene() {
        let config = config();
        let output = StageRunner::new(&config, None, None)
            .run_image(scene(), Stage::ObjectDetected)
            .expect("Should segment");
        let area = output.contour.area();
        assert!((area - 40_000.0).abs() <= 2_000.0, "area {area}");
    }

    #[test]
    fn test_disabled_refinement_stages_pass_through() {
        let config = config();
        let mut runner = StageRunner::new(&config, None, None);
        let object = runner.run_image(scene(), Stage::ObjectDetected).expect("Should segment");
        let smoothed = runner.run_image(scene(), Stage::Smoothed).expect("Should smooth");
        let dilated = runner.run_image(scene(), Stage::Dilated).expect("Should dilate");
        assert_eq!(object.contour, smoothed.contour);
        assert_eq!(object.contour, dilated.contour);
    }

    #[test]
    fn test_dilation_grows_final_contour() {
        let plain = config();
        let dilated = ProcessingConfig {
            dilation_amount_mm: 2.0,
            ..config()
        };
        let base = StageRunner::new(&plain, None, None)
            .run_image(scene(), Stage::Final)
            .expect("Should finish");
        let grown = StageRunner::new(&dilated, None, None)
            .run_image(scene(), Stage::Final)
            .expect("Should finish");
        assert!(grown.contour.area() > base.contour.area());
    }

    #[test]
    fn test_progress_reports_each_transition() {
        let config = config();
        let mut seen: Vec<(f64, String)> = Vec::new();
        let mut record = |fraction: f64, label: &str| seen.push((fraction, label.to_string()));
        StageRunner::new(&config, Some(&mut record), None)
            .run_image(scene(), Stage::Normalized)
            .expect("Should normalize");

        let labels: Vec<&str> = seen.iter().map(|(_, l)| l.as_str()).collect();
        assert_eq!(labels, ["Loaded", "Lightbox Cropped", "Normalized", "Complete"]);
        assert_eq!(seen[1].0, 1.0 / 8.0);
        assert_eq!(seen[3].0, 1.0);
    }

    #[test]
    fn test_debug_sink_collects_snapshots() {
        let config = config();
        let mut sink = MemorySink::new();
        StageRunner::new(&config, None, Some(&mut sink))
            .run_image(scene(), Stage::Final)
            .expect("Should finish");

        let names: Vec<&str> = sink.snapshots().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"original"));
        assert!(names.contains(&"rectified"));
        assert!(names.contains(&"object_mask"));
        assert_eq!(names.last(), Some(&"final_contour"));
    }

    #[test]
    fn test_blank_image_has_no_boundary() {
        let config = config();
        let blank = GrayImage::new(400, 400);
        let err = StageRunner::new(&config, None, None)
            .run_image(blank, Stage::Final)
            .expect_err("Should fail");
        assert!(matches!(err, OutlineError::NoBoundary));
    }

    #[test]
    fn test_tiny_image_is_rejected() {
        let config = config();
        let err = StageRunner::new(&config, None, None)
            .run_image(GrayImage::new(80, 300), Stage::Loaded)
            .expect_err("Should reject");
        assert!(matches!(err, OutlineError::ImageTooSmall { .. }));
    }

    #[test]
    fn test_short_perimeter_fails_validation() {
        let strict = ProcessingConfig {
            min_perimeter: 5_000.0,
            ..config()
        };
        let err = StageRunner::new(&strict, None, None)
            .run_image(scene(), Stage::Final)
            .expect_err("Should reject");
        assert!(matches!(err, OutlineError::ValidationFailed(_)));
    }
}
