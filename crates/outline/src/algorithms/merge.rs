use tracing::{debug, warn};

use crate::{config::ProcessingConfig, types::Contour};

use super::{
    extraction::{external_contours, largest_contour, rasterize},
    morphology::close_disk,
};

/// Fragments smaller than this fraction of `min_contour_area` are noise.
const NOISE_AREA_FRACTION: f64 = 0.1;
/// Upper bound on the closing radius, in pixels.
const MAX_MERGE_RADIUS: u32 = 50;

/// Join fragments of one object separated by gaps up to `merge_distance_px`.
///
/// Returns `None` when nothing survives noise filtering or the joined raster
/// yields no contour; the caller then falls back to picking a single
/// fragment. A single surviving fragment is returned as is.
pub fn merge_contours(
    contours: &[Contour],
    merge_distance_px: f64,
    config: &ProcessingConfig,
) -> Option<Contour> {
    let min_area = config.min_contour_area * NOISE_AREA_FRACTION;
    let survivors: Vec<&Contour> = contours.iter().filter(|c| c.area() >= min_area).collect();
    debug!(
        candidates = contours.len(),
        survivors = survivors.len(),
        min_area,
        "Filtered merge candidates"
    );

    match survivors.as_slice() {
        [] => return None,
        [only] => return Some((*only).clone()),
        _ => {}
    }

    let radius = ((merge_distance_px.max(0.0) / 2.0).round() as u32).min(MAX_MERGE_RADIUS);
    let margin = radius + 2;

    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for contour in &survivors {
        let (lo, hi) = contour.bounding_box();
        min = [min[0].min(lo[0]), min[1].min(lo[1])];
        max = [max[0].max(hi[0]), max[1].max(hi[1])];
    }
    let offset = [margin as f64 - min[0].floor(), margin as f64 - min[1].floor()];
    let width = (max[0].ceil() - min[0].floor()) as u32 + 2 * margin + 1;
    let height = (max[1].ceil() - min[1].floor()) as u32 + 2 * margin + 1;

    let owned: Vec<Contour> = survivors.into_iter().cloned().collect();
    let mut mask = rasterize(&owned, width, height, offset);
    if radius > 0 {
        mask = close_disk(&mask, radius);
    }

    let joined = external_contours(&mask);
    match largest_contour(&joined) {
        Some(contour) => {
            debug!(
                radius,
                pieces = joined.len(),
                area = contour.area(),
                "Merged object fragments"
            );
            Some(contour.translate(-offset[0], -offset[1]))
        }
        None => {
            warn!("Merging produced no contour");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Contour {
        Contour::new(vec![[x, y], [x + w, y], [x + w, y + h], [x, y + h]])
    }

    fn config() -> ProcessingConfig {
        ProcessingConfig {
            min_contour_area: 500.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_fragments_within_distance_are_joined() {
        // 10 px gap between x = 80 and x = 90
        let left = rect(20.0, 20.0, 60.0, 60.0);
        let right = rect(90.0, 30.0, 40.0, 40.0);
        let merged = merge_contours(&[left.clone(), right.clone()], 20.0, &config())
            .expect("Should merge");

        let (min, max) = merged.bounding_box();
        assert!(min[0] <= 20.5 && min[1] <= 20.5, "{min:?}");
        assert!(max[0] >= 129.5 && max[1] >= 79.5, "{max:?}");
        assert!(merged.area() > left.area() + right.area());
    }

    #[test]
    fn test_zero_distance_keeps_larger_fragment() {
        let left = rect(20.0, 20.0, 60.0, 60.0);
        let right = rect(90.0, 30.0, 40.0, 40.0);
        let merged = merge_contours(&[right, left.clone()], 0.0, &config()).expect("Should pick");

        let (min, max) = merged.bounding_box();
        assert_eq!(min, [20.0, 20.0]);
        assert_eq!(max, [80.0, 80.0]);
    }

    #[test]
    fn test_noise_is_discarded() {
        let big = rect(10.0, 10.0, 50.0, 50.0);
        let speck = rect(100.0, 100.0, 3.0, 3.0);
        let merged = merge_contours(&[speck, big.clone()], 20.0, &config()).expect("Should keep big");
        assert_eq!(merged, big);

        assert!(merge_contours(&[rect(0.0, 0.0, 2.0, 2.0)], 20.0, &config()).is_none());
        assert!(merge_contours(&[], 20.0, &config()).is_none());
    }
}
