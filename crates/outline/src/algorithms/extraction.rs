use image::{GrayImage, Luma};
use imageproc::{
    contours::{find_contours, BorderType},
    drawing::{draw_line_segment_mut, draw_polygon_mut},
    point::Point,
};
use crate::types::Contour;

use super::preprocessing::FOREGROUND;

/// Trace the outer border of every top-level foreground region.
///
/// Holes and regions nested inside holes are skipped.
pub fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            Contour::new(
                c.points
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64])
                    .collect(),
            )
        })
        .collect()
}

/// Contour with the largest enclosed area.
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    contours
        .iter()
        .max_by(|a, b| a.area().total_cmp(&b.area()))
}

/// Fill `contours` into a black canvas, shifting every point by `offset`.
pub fn rasterize(contours: &[Contour], width: u32, height: u32, offset: [f64; 2]) -> GrayImage {
    let mut canvas = GrayImage::new(width, height);
    for contour in contours {
        fill_contour(&mut canvas, contour, offset);
    }
    canvas
}

fn fill_contour(canvas: &mut GrayImage, contour: &Contour, offset: [f64; 2]) {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(contour.len());
    for &[x, y] in &contour.points {
        let p = Point::new((x + offset[0]).round() as i32, (y + offset[1]).round() as i32);
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    // The polygon filler rejects an explicitly closed ring
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    match points.len() {
        0 => {}
        1 | 2 => {
            let a = points[0];
            let b = points[points.len() - 1];
            draw_line_segment_mut(
                canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                Luma([FOREGROUND]),
            );
        }
        _ => draw_polygon_mut(canvas, &points, Luma([FOREGROUND])),
    }
}

/// Rasterize a single contour into a tight canvas with `margin` pixels on
/// every side, returning the canvas and the shift applied to the points.
pub fn rasterize_padded(contour: &Contour, margin: u32) -> (GrayImage, [f64; 2]) {
    let (min, max) = contour.bounding_box();
    let offset = [margin as f64 - min[0].floor(), margin as f64 - min[1].floor()];
    let width = (max[0].ceil() - min[0].floor()) as u32 + 2 * margin + 1;
    let height = (max[1].ceil() - min[1].floor()) as u32 + 2 * margin + 1;
    (rasterize(std::slice::from_ref(contour), width, height, offset), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(x0: u32, y0: u32, size: u32) -> GrayImage {
        let mut img = GrayImage::new(100, 100);
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        img
    }

    #[test]
    fn test_external_contours_skip_holes() {
        let mut img = square_mask(20, 20, 60);
        for y in 40..60 {
            for x in 40..60 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 1);
        let (min, max) = contours[0].bounding_box();
        assert_eq!(min, [20.0, 20.0]);
        assert_eq!(max, [79.0, 79.0]);
    }

    #[test]
    fn test_largest_contour() {
        let mut img = square_mask(5, 5, 10);
        for y in 40..80 {
            for x in 40..80 {
                img.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let contours = external_contours(&img);
        assert_eq!(contours.len(), 2);
        let largest = largest_contour(&contours).expect("Should have a largest contour");
        assert!(largest.area() > 1000.0);
        assert!(largest_contour(&[]).is_none());
    }

    #[test]
    fn test_rasterize_round_trips_square() {
        let img = square_mask(30, 30, 40);
        let contour = external_contours(&img).remove(0);
        let redrawn = rasterize(&[contour], 100, 100, [0.0, 0.0]);
        assert_eq!(redrawn, img);
    }

    #[test]
    fn test_rasterize_handles_closed_ring_and_degenerate_input() {
        let ring = Contour::new(vec![[1.0, 1.0], [8.0, 1.0], [8.0, 8.0], [1.0, 8.0], [1.0, 1.0]]);
        let img = rasterize(&[ring], 10, 10, [0.0, 0.0]);
        assert_eq!(img.get_pixel(4, 4)[0], FOREGROUND);

        let line = Contour::new(vec![[1.0, 1.0], [5.0, 1.0]]);
        let img = rasterize(&[line], 10, 10, [0.0, 0.0]);
        assert_eq!(img.get_pixel(3, 1)[0], FOREGROUND);
    }

    #[test]
    fn test_rasterize_padded_offsets() {
        let contour = Contour::new(vec![[50.0, 60.0], [70.0, 60.0], [70.0, 80.0], [50.0, 80.0]]);
        let (canvas, offset) = rasterize_padded(&contour, 5);
        assert_eq!(offset, [-45.0, -55.0]);
        assert_eq!(canvas.dimensions(), (31, 31));
        assert_eq!(canvas.get_pixel(5, 5)[0], FOREGROUND);
        assert_eq!(canvas.get_pixel(25, 25)[0], FOREGROUND);
        assert_eq!(canvas.get_pixel(4, 4)[0], 0);
    }
}
