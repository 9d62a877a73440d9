use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use tracing::{debug, info};

use crate::{error::Result, traits::DebugSink};

/// Sink that discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn image(&mut self, _name: &str, _image: &GrayImage) {}

    fn contour(&mut self, _name: &str, _background: &GrayImage, _contour: &[[f64; 2]]) {}

    fn enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub name: String,
    pub image: DynamicImage,
}

/// Keeps snapshots in arrival order for one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    snapshots: Vec<Snapshot>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Write every snapshot as `NN_name.png` and return the written paths.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(self.snapshots.len());
        for (i, snapshot) in self.snapshots.iter().enumerate() {
            let path = dir.join(format!("{:02}_{}.png", i + 1, snapshot.name));
            snapshot.image.save(&path)?;
            debug!(path = %path.display(), "Wrote debug snapshot");
            written.push(path);
        }
        info!(count = written.len(), dir = %dir.display(), "Saved debug snapshots");
        Ok(written)
    }
}

impl DebugSink for MemorySink {
    fn image(&mut self, name: &str, image: &GrayImage) {
        self.snapshots.push(Snapshot {
            name: name.to_string(),
            image: DynamicImage::ImageLuma8(image.clone()),
        });
    }

    fn contour(&mut self, name: &str, background: &GrayImage, contour: &[[f64; 2]]) {
        self.snapshots.push(Snapshot {
            name: name.to_string(),
            image: DynamicImage::ImageRgb8(render_overlay(background, contour)),
        });
    }
}

/// Draw a closed contour in red with its vertices marked in green.
pub fn render_overlay(background: &GrayImage, contour: &[[f64; 2]]) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(background.clone()).to_rgb8();
    let line = Rgb([255, 0, 0]);
    let vertex = Rgb([0, 200, 0]);

    let n = contour.len();
    for i in 0..n {
        let [x0, y0] = contour[i];
        let [x1, y1] = contour[(i + 1) % n];
        draw_line_segment_mut(&mut canvas, (x0 as f32, y0 as f32), (x1 as f32, y1 as f32), line);
    }
    // Only mark vertices on sparse outlines, dense traces would be a solid band
    if n <= 64 {
        for &[x, y] in contour {
            draw_filled_circle_mut(&mut canvas, (x.round() as i32, y.round() as i32), 3, vertex);
        }
    }
    canvas
}
