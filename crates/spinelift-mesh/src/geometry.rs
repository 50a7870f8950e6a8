//! Planar predicates shared by the simplifier and the minimum-area pass.
//!
//! Orientation follows the pixel coordinate system: a positive
//! [`orient`] value means `a -> b -> c` turns from the +x axis towards the
//! +y axis (counter-clockwise in the usual mathematical picture).

use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Line};

use crate::types::Point;

/// Twice the signed area of triangle `abc`.
pub(crate) fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)))
}

/// Shoelace signed area of a closed polygon.
pub(crate) fn polygon_signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice += p.x.mul_add(q.y, -(q.x * p.y));
    }
    twice / 2.0
}

fn line(a: Point, b: Point) -> Line<f64> {
    Line::new(Coord::from(a), Coord::from(b))
}

/// Whether segments `ab` and `cd` share any point.
pub(crate) fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    line_intersection(line(a, b), line(c, d)).is_some()
}

/// Whether two segments that share exactly one endpoint overlap beyond it.
///
/// Adjacent polygon edges always touch at their shared vertex; they only
/// conflict when they fold back onto each other.
pub(crate) fn adjacent_segments_overlap(shared: Point, a: Point, b: Point) -> bool {
    matches!(
        line_intersection(line(shared, a), line(shared, b)),
        Some(LineIntersection::Collinear { intersection })
            if intersection.start != intersection.end
    )
}

/// Every pair of edges `(i, j)`, `i < j`, of the closed polygon that
/// intersect improperly. Edge `i` runs from point `i` to point `i + 1`.
pub(crate) fn self_intersections(points: &[Point]) -> Vec<(usize, usize)> {
    let n = points.len();
    let mut crossings = Vec::new();
    if n < 3 {
        return crossings;
    }

    // Cheap bounding-box rejection before the exact segment test.
    let boxes: Vec<(f64, f64, f64, f64)> = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            (a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
        })
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let (ax0, ay0, ax1, ay1) = boxes[i];
            let (bx0, by0, bx1, by1) = boxes[j];
            if ax1 < bx0 || bx1 < ax0 || ay1 < by0 || by1 < ay0 {
                continue;
            }

            let a = points[i];
            let b = points[(i + 1) % n];
            let c = points[j];
            let d = points[(j + 1) % n];

            let hit = if j == i + 1 {
                adjacent_segments_overlap(b, a, d)
            } else if i == 0 && j == n - 1 {
                adjacent_segments_overlap(a, b, c)
            } else {
                segments_intersect(a, b, c, d)
            };
            if hit {
                crossings.push((i, j));
            }
        }
    }
    crossings
}

/// Whether the closed polygon has no self-intersections.
pub(crate) fn is_simple(points: &[Point]) -> bool {
    points.len() >= 3 && self_intersections(points).is_empty()
}
