use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{
    contrast::{otsu_level, threshold},
    integral_image::{integral_image, sum_image_pixels},
};
use crate::{error::Result, traits::ImagePreprocessor};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Contrast-limited adaptive histogram equalization
#[derive(Debug, Clone)]
pub struct ClahePreprocessor {
    pub clip_limit: f64,
    /// Number of tiles along each axis
    pub tile_grid: u32,
}

impl Default for ClahePreprocessor {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

impl ImagePreprocessor for ClahePreprocessor {
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        Ok(clahe(image, self.clip_limit, self.tile_grid))
    }
}

/// Equalize each tile's histogram with the counts clipped at
/// `clip_limit * tile_area / 256`, then blend neighbouring tile mappings
/// bilinearly so tile seams do not show.
pub fn clahe(image: &GrayImage, clip_limit: f64, tile_grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let gx = tile_grid.clamp(1, width) as usize;
    let gy = tile_grid.clamp(1, height) as usize;
    let (w, h) = (width as usize, height as usize);

    let mut luts = vec![[0u8; 256]; gx * gy];
    for ty in 0..gy {
        let (y0, y1) = (ty * h / gy, (ty + 1) * h / gy);
        for tx in 0..gx {
            let (x0, x1) = (tx * w / gx, (tx + 1) * w / gx);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[image.get_pixel(x as u32, y as u32)[0] as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)) as u32;
            luts[ty * gx + tx] = tile_lut(&mut hist, area, clip_limit);
        }
    }

    let tile_w = w as f64 / gx as f64;
    let tile_h = h as f64 / gy as f64;
    // Position in tile-center coordinates -> (lower tile, upper tile, weight)
    let neighbours = |t: f64, tiles: usize| -> (usize, usize, f64) {
        if t <= 0.0 {
            return (0, 0, 0.0);
        }
        let lo = (t.floor() as usize).min(tiles - 1);
        let hi = (lo + 1).min(tiles - 1);
        (lo, hi, (t - lo as f64).clamp(0.0, 1.0))
    };

    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        let (ty0, ty1, fy) = neighbours((y as f64 + 0.5) / tile_h - 0.5, gy);
        for x in 0..w {
            let (tx0, tx1, fx) = neighbours((x as f64 + 0.5) / tile_w - 0.5, gx);
            let v = image.get_pixel(x as u32, y as u32)[0] as usize;

            let top = luts[ty0 * gx + tx0][v] as f64 * (1.0 - fx) + luts[ty0 * gx + tx1][v] as f64 * fx;
            let bottom = luts[ty1 * gx + tx0][v] as f64 * (1.0 - fx) + luts[ty1 * gx + tx1][v] as f64 * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x as u32, y as u32, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let clip = ((clip_limit * area as f64 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }
    let share = excess / 256;
    let residual = (excess % 256) as usize;
    for (i, count) in hist.iter_mut().enumerate() {
        *count += share;
        if i < residual {
            *count += 1;
        }
    }

    let scale = 255.0 / area as f64;
    let mut cdf = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = (cdf as f64 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Binarize so that pixels at or below `level` become foreground.
pub fn threshold_dark(image: &GrayImage, level: u8) -> GrayImage {
    let mut mask = threshold(image, level);
    image::imageops::invert(&mut mask);
    mask
}

/// Otsu level shifted by `offset` (positive = more inclusive of dark pixels).
pub fn offset_level(base: u8, offset: f64) -> u8 {
    (base as f64 + offset).round().clamp(0.0, 255.0) as u8
}

/// Bright-region threshold for the backlit backdrop: a fraction `bias` of the
/// way from the Otsu level to white.
pub fn bright_level(image: &GrayImage, bias: f64) -> u8 {
    let otsu = otsu_level(image) as f64;
    (otsu + (255.0 - otsu) * bias).round().clamp(0.0, 254.0) as u8
}

/// Foreground where a pixel is more than `offset` below the mean of its
/// `(2 * radius + 1)` square neighbourhood (clipped at the image border).
pub fn adaptive_threshold_dark(image: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = image.dimensions();
    let integral: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image(image);

    let mut mask = GrayImage::new(w, h);
    for y in 0..h {
        let (top, bottom) = (y.saturating_sub(radius), (y + radius).min(h - 1));
        for x in 0..w {
            let (left, right) = (x.saturating_sub(radius), (x + radius).min(w - 1));
            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
            let count = ((right - left + 1) * (bottom - top + 1)) as f64;
            let mean = sum as f64 / count;
            if (image.get_pixel(x, y)[0] as f64) < mean - offset as f64 {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    mask
}

/// Force a margin of `clearance` pixels along every edge to background.
pub fn clear_border(mask: &mut GrayImage, clearance: u32) {
    if clearance == 0 {
        return;
    }
    let (w, h) = mask.dimensions();
    for y in 0..h {
        for x in 0..w {
            if x < clearance || y < clearance || x + clearance >= w || y + clearance >= h {
                mask.put_pixel(x, y, Luma([BACKGROUND]));
            }
        }
    }
}
