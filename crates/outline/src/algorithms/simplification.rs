use geo::{BoundingRect, ConvexHull, Simplify};
use geo_types::{Coord, LineString, MultiPoint, Point};
use crate::types::{distance, Contour};

/// Share of the tolerance within which a surviving vertex counts as lying on
/// the line through its neighbours.
const COLLINEAR_FRACTION: f64 = 0.25;

/// Ramer-Douglas-Peucker on a closed ring.
///
/// The ring is split at two mutually distant points and each half is
/// simplified as an open chain. Split points, and points RDP picks on a
/// straight edge when several are equally far from a chord, are then removed
/// if they sit on the line through their neighbours, so neither the start of
/// the input nor the split leaks into the result as a spurious vertex.
pub fn simplify_closed(contour: &Contour, epsilon: f64) -> Contour {
    let points = &contour.points;
    if points.len() < 4 || epsilon <= 0.0 {
        return contour.clone();
    }

    let farthest_from = |origin: [f64; 2]| {
        points
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| distance(origin, **a).total_cmp(&distance(origin, **b)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let a = farthest_from(points[0]);
    let b = farthest_from(points[a]);
    if a == b {
        return contour.clone();
    }
    let (start, end) = (a.min(b), a.max(b));

    let first: Vec<[f64; 2]> = points[start..=end].to_vec();
    let second: Vec<[f64; 2]> = points[end..]
        .iter()
        .chain(points[..=start].iter())
        .copied()
        .collect();

    let mut result = simplify_chain(&first, epsilon);
    let tail = simplify_chain(&second, epsilon);
    // Chains share their endpoints
    result.pop();
    result.extend_from_slice(&tail[..tail.len().saturating_sub(1)]);
    Contour::new(drop_collinear(&result, epsilon * COLLINEAR_FRACTION))
}

/// Distance from `p` to the segment `a`-`b`.
pub(crate) fn segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len_sq = dx * dx + dy * dy;
    if len_sq < f64::EPSILON {
        return distance(p, a);
    }
    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, [a[0] + t * dx, a[1] + t * dy])
}

/// Remove ring vertices lying within `tolerance` of the segment joining the
/// vertices kept on either side. Every removed vertex is checked against the
/// final segment that replaces it.
fn drop_collinear(points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
    let n = points.len();
    if n <= 3 {
        return points.to_vec();
    }

    let mut kept = vec![points[0]];
    let mut skipped: Vec<[f64; 2]> = Vec::new();
    for i in 1..n {
        let anchor = kept[kept.len() - 1];
        let next = points[(i + 1) % n];
        skipped.push(points[i]);
        if skipped.iter().all(|&p| segment_distance(p, anchor, next) <= tolerance) {
            continue;
        }
        skipped.clear();
        kept.push(points[i]);
    }

    // The first vertex, with whatever was skipped before wrapping back to it
    if kept.len() > 3 {
        let (anchor, next) = (kept[kept.len() - 1], kept[1]);
        skipped.push(kept[0]);
        if skipped.iter().all(|&p| segment_distance(p, anchor, next) <= tolerance) {
            kept.remove(0);
        }
    }

    if kept.len() < 3 { points.to_vec() } else { kept }
}

fn simplify_chain(points: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    let line = LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect());
    line.simplify(&epsilon)
        .coords()
        .map(|c| [c.x, c.y])
        .collect()
}

/// Convex hull as an open ring (no repeated closing point).
pub fn convex_hull(contour: &Contour) -> Contour {
    let multi: MultiPoint<f64> = contour
        .points
        .iter()
        .map(|&[x, y]| Point::new(x, y))
        .collect();
    let hull = multi.convex_hull();
    let mut points: Vec<[f64; 2]> = hull.exterior().coords().map(|c| [c.x, c.y]).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Contour::new(points)
}

/// Axis-aligned bounding rectangle corners, clockwise from the top-left in
/// image coordinates.
pub fn bounding_rect_corners(contour: &Contour) -> Option<[[f64; 2]; 4]> {
    let line = LineString::new(
        contour
            .points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect(),
    );
    line.bounding_rect().map(|rect| {
        let (min, max) = (rect.min(), rect.max());
        [[min.x, min.y], [max.x, min.y], [max.x, max.y], [min.x, max.y]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::test_support::densify;

    #[test]
    fn test_simplify_square_from_mid_edge_start() {
        let square = densify(&[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]], 1.0);
        // Start halfway along the top edge
        let mut points = square.points.clone();
        points.rotate_left(50);
        let simplified = simplify_closed(&Contour::new(points), 2.0);
        assert_eq!(simplified.len(), 4);
        for corner in [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]] {
            assert!(simplified.points.contains(&corner));
        }
    }

    #[test]
    fn test_simplify_drops_points_on_straight_edges() {
        // Edges of a 60-gon are parallel to the chords RDP splits on, so
        // their midpoints tie with the vertices for the farthest point
        let vertices: Vec<[f64; 2]> = (0..60)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 60.0;
                [200.0 * a.cos(), 200.0 * a.sin()]
            })
            .collect();
        let mut points = Vec::new();
        for i in 0..60 {
            let (a, b) = (vertices[i], vertices[(i + 1) % 60]);
            points.push(a);
            points.push([(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0]);
        }
        let simplified = simplify_closed(&Contour::new(points), 0.15);
        assert_eq!(simplified.len(), 60);
        for p in &simplified.points {
            assert!(vertices.iter().any(|v| distance(*v, *p) < 1e-9), "{p:?}");
        }
    }

    #[test]
    fn test_drop_collinear_bounds_removed_run() {
        // Gentle arc: each point is near its neighbours' chord, but the run as
        // a whole bulges well past the tolerance
        let arc: Vec<[f64; 2]> = (0..=20)
            .map(|i| {
                let x = i as f64 * 10.0;
                [x, 0.005 * x * (200.0 - x)]
            })
            .chain([[200.0, 200.0], [0.0, 200.0]])
            .collect();
        let kept = drop_collinear(&arc, 1.0);
        let ring = Contour::new(kept.clone());
        for p in &arc {
            let nearest = (0..kept.len())
                .map(|i| segment_distance(*p, kept[i], kept[(i + 1) % kept.len()]))
                .fold(f64::INFINITY, f64::min);
            assert!(nearest <= 1.0 + 1e-9, "{p:?} is {nearest} from {ring:?}");
        }
        assert!(kept.len() > 4);
    }

    #[test]
    fn test_segment_distance() {
        assert!((segment_distance([5.0, 3.0], [0.0, 0.0], [10.0, 0.0]) - 3.0).abs() < 1e-12);
        assert!((segment_distance([13.0, 4.0], [0.0, 0.0], [10.0, 0.0]) - 5.0).abs() < 1e-12);
        assert!((segment_distance([3.0, 4.0], [0.0, 0.0], [0.0, 0.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_simplify_keeps_small_input() {
        let tri = Contour::new(vec![[0.0, 0.0], [5.0, 0.0], [0.0, 5.0]]);
        assert_eq!(simplify_closed(&tri, 10.0), tri);
    }

    #[test]
    fn test_convex_hull_drops_concavity() {
        let notch = Contour::new(vec![
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 10.0],
            [5.0, 5.0],
            [0.0, 10.0],
        ]);
        let hull = convex_hull(&notch);
        assert_eq!(hull.len(), 4);
        assert!(!hull.points.contains(&[5.0, 5.0]));
    }

    #[test]
    fn test_bounding_rect_corners() {
        let c = Contour::new(vec![[3.0, 7.0], [9.0, 2.0], [5.0, 11.0]]);
        let corners = bounding_rect_corners(&c).expect("Should have bounds");
        assert_eq!(corners, [[3.0, 2.0], [9.0, 2.0], [9.0, 11.0], [3.0, 11.0]]);
        assert!(bounding_rect_corners(&Contour::empty()).is_none());
    }
}
