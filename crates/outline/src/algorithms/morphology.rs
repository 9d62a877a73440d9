//! Binary morphology on `GrayImage` masks.
//!
//! Disk structuring elements are approximated by an octagon: a square
//! (`LInf`) pass followed by a diamond (`L1`) pass, whose Minkowski sum has
//! the same radius as the disk along both axes and diagonals.

use image::GrayImage;
use imageproc::{distance_transform::Norm, morphology};

/// Largest radius a single imageproc pass can apply. Its `u8` distance
/// transform saturates at 255, so a pass of 255 would cover the whole canvas.
const MAX_STEP: u32 = u8::MAX as u32 - 1;

/// Split a disk radius into its square and diamond components.
fn octagon_parts(radius: u32) -> (u32, u32) {
    let square = (radius as f64 * (std::f64::consts::SQRT_2 - 1.0)).round() as u32;
    (square.min(radius), radius - square.min(radius))
}

fn repeat(image: &GrayImage, norm: Norm, radius: u32, op: fn(&GrayImage, Norm, u8) -> GrayImage) -> GrayImage {
    let mut out = image.clone();
    let mut left = radius;
    while left > 0 {
        let step = left.min(MAX_STEP);
        out = op(&out, norm, step as u8);
        left -= step;
    }
    out
}

pub fn dilate_disk(image: &GrayImage, radius: u32) -> GrayImage {
    let (square, diamond) = octagon_parts(radius);
    let out = repeat(image, Norm::LInf, square, morphology::dilate);
    repeat(&out, Norm::L1, diamond, morphology::dilate)
}

pub fn erode_disk(image: &GrayImage, radius: u32) -> GrayImage {
    let (square, diamond) = octagon_parts(radius);
    let out = repeat(image, Norm::LInf, square, morphology::erode);
    repeat(&out, Norm::L1, diamond, morphology::erode)
}

/// Dilate then erode: fills gaps narrower than `2 * radius`.
pub fn close_disk(image: &GrayImage, radius: u32) -> GrayImage {
    erode_disk(&dilate_disk(image, radius), radius)
}

/// Erode then dilate: removes features narrower than `2 * radius`.
pub fn open_disk(image: &GrayImage, radius: u32) -> GrayImage {
    dilate_disk(&erode_disk(image, radius), radius)
}

/// Close then open with a `kernel x kernel` square.
///
/// Pixels outside the image count as background, so specks touching the
/// border are opened away like any other.
pub fn clean_square(image: &GrayImage, kernel: u32) -> GrayImage {
    let k = (kernel / 2).min(MAX_STEP);
    if k == 0 {
        return image.clone();
    }
    let margin = k + 1;
    let closed = morphology::close(&pad(image, margin), Norm::LInf, k as u8);
    let cleaned = morphology::open(&closed, Norm::LInf, k as u8);
    crop(&cleaned, margin, image.width(), image.height())
}

/// Close then open with a disk of diameter `kernel`.
pub fn clean_disk(image: &GrayImage, kernel: u32) -> GrayImage {
    let radius = kernel / 2;
    if radius == 0 {
        return image.clone();
    }
    open_disk(&close_disk(image, radius), radius)
}

/// Copy `image` into the center of a larger black canvas.
pub fn pad(image: &GrayImage, margin: u32) -> GrayImage {
    let mut out = GrayImage::new(image.width() + 2 * margin, image.height() + 2 * margin);
    image::imageops::replace(&mut out, image, margin as i64, margin as i64);
    out
}

/// Inverse of [`pad`].
pub fn crop(image: &GrayImage, margin: u32, width: u32, height: u32) -> GrayImage {
    image::imageops::crop_imm(image, margin, margin, width, height).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn dot(size: u32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        img.put_pixel(size / 2, size / 2, Luma([255]));
        img
    }

    fn count(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p[0] > 0).count()
    }

    #[test]
    fn test_octagon_parts_sum_to_radius() {
        for r in [0, 1, 2, 5, 17, 300] {
            let (s, d) = octagon_parts(r);
            assert_eq!(s + d, r);
        }
    }

    #[test]
    fn test_dilate_disk_reaches_radius_on_axes() {
        let out = dilate_disk(&dot(41), 10);
        assert_eq!(out.get_pixel(30, 20)[0], 255);
        assert_eq!(out.get_pixel(20, 10)[0], 255);
        assert_eq!(out.get_pixel(31, 20)[0], 0);
        // Corner of the bounding square stays outside the disk
        assert_eq!(out.get_pixel(30, 30)[0], 0);
    }

    #[test]
    fn test_large_radius_is_applied_in_steps() {
        // Square component exceeds a single u8 pass
        let out = dilate_disk(&dot(1301), 620);
        assert_eq!(out.get_pixel(1270, 650)[0], 255);
        assert_eq!(out.get_pixel(1271, 650)[0], 0);
    }

    #[test]
    fn test_full_step_does_not_flood_canvas() {
        // Diamond component is exactly 255
        assert_eq!(octagon_parts(435), (180, 255));
        let out = dilate_disk(&dot(1201), 435);
        assert_eq!(out.get_pixel(1035, 600)[0], 255);
        assert_eq!(out.get_pixel(1036, 600)[0], 0);
        assert_eq!(out.get_pixel(600, 1036)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert!(count(&out) < 1201 * 1201 * 9 / 10);

        let eroded = erode_disk(&out, 435);
        assert_eq!(eroded.get_pixel(600, 600)[0], 255);
        assert_eq!(eroded.get_pixel(610, 600)[0], 0);
    }

    #[test]
    fn test_close_fills_gap() {
        let mut img = GrayImage::new(60, 30);
        for y in 10..20 {
            for x in (5..25).chain(29..55) {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        let closed = close_disk(&pad(&img, 10), 3);
        assert_eq!(closed.get_pixel(27 + 10, 15 + 10)[0], 255);
    }

    #[test]
    fn test_open_removes_speck() {
        let mut img = GrayImage::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        img.put_pixel(2, 2, Luma([255]));
        let opened = clean_square(&img, 5);
        assert_eq!(opened.get_pixel(2, 2)[0], 0);
        assert_eq!(count(&opened), 400);
    }

    #[test]
    fn test_clean_square_keeps_region_touching_border() {
        let mut img = GrayImage::new(40, 40);
        for y in 0..40 {
            for x in 0..20 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        // Thin spur along the top edge
        img.put_pixel(30, 0, Luma([255]));
        img.put_pixel(31, 0, Luma([255]));

        let cleaned = clean_square(&img, 5);
        assert_eq!(cleaned.dimensions(), (40, 40));
        assert_eq!(cleaned.get_pixel(0, 0)[0], 255);
        assert_eq!(cleaned.get_pixel(19, 39)[0], 255);
        assert_eq!(cleaned.get_pixel(20, 20)[0], 0);
        assert_eq!(cleaned.get_pixel(30, 0)[0], 0);
        assert_eq!(count(&cleaned), 800);
    }

    #[test]
    fn test_crop_undoes_pad() {
        let img = dot(9);
        assert_eq!(crop(&pad(&img, 3), 3, 9, 9), img);
    }

    #[test]
    fn test_pad_offsets_content() {
        let padded = pad(&dot(5), 4);
        assert_eq!(padded.dimensions(), (13, 13));
        assert_eq!(padded.get_pixel(6, 6)[0], 255);
    }
}
