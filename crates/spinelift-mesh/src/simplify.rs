//! Contour simplification using a closed-polygon Ramer-Douglas-Peucker
//! variant.
//!
//! The tolerance is not uniform: at concave (reflex) points it shrinks in
//! proportion to `concave_factor`, so inward notches such as the gap
//! between a character's arm and torso survive aggressive
//! simplification. After the reduction the result is repaired until it
//! no longer crosses itself.

use crate::geometry::{orient, polygon_signed_area, self_intersections};
use crate::types::{Contour, Dimensions, Point};

/// Smallest tolerance ever used, in pixels.
pub const MIN_TOLERANCE: f64 = 0.1;

/// How strongly a fully concave point shrinks its local tolerance when
/// `concave_factor` is 100.
const CONCAVITY_GAIN: f64 = 4.0;

/// Distance, in contour points, to the neighbours used when measuring the
/// turning angle at a point.
const CURVATURE_WINDOW: usize = 3;

/// Base tolerance in pixels for a given detail factor and image size.
#[must_use]
pub fn tolerance_for(detail_factor: f64, dimensions: Dimensions) -> f64 {
    (detail_factor * dimensions.diagonal()).max(MIN_TOLERANCE)
}

/// Simplify a closed contour.
///
/// Points within their local tolerance of the simplified outline are
/// removed. The result keeps the input's winding, has at least three
/// points whenever the input does, contains no consecutive duplicates or
/// exactly collinear vertices, and has no self-intersections unless even
/// the full input outline crosses itself.
#[must_use = "returns the simplified contour"]
pub fn simplify_contour(contour: &Contour, tolerance: f64, concave_factor: f64) -> Contour {
    let points = dedup_closed(contour.points());
    let n = points.len();
    if n <= 3 {
        return Contour::new(points);
    }

    let tolerances = local_tolerances(&points, tolerance, concave_factor);

    let far = farthest_from(&points, 0);
    let mut kept = vec![false; n];
    kept[0] = true;
    kept[far] = true;

    rdp(&points, &tolerances, 0, far, &mut kept);
    rdp(&points, &tolerances, far, n, &mut kept);

    ensure_three(&points, far, &mut kept);
    repair_crossings(&points, &mut kept);

    let simplified: Vec<Point> = points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    Contour::new(drop_collinear(simplified))
}

/// Remove consecutive duplicates, including a closing point that repeats
/// the first.
fn dedup_closed(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last() != Some(&p) {
            out.push(p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Index of the point farthest from `points[origin]` (first on ties).
fn farthest_from(points: &[Point], origin: usize) -> usize {
    let o = points[origin];
    let mut best = origin;
    let mut best_dist = 0.0;
    for (i, &p) in points.iter().enumerate() {
        let d = p.distance_squared(o);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Per-point tolerance: the base tolerance, shrunk at concave points.
fn local_tolerances(points: &[Point], tolerance: f64, concave_factor: f64) -> Vec<f64> {
    let n = points.len();
    if concave_factor <= 0.0 {
        return vec![tolerance; n];
    }

    let winding = polygon_signed_area(points).signum();
    let window = CURVATURE_WINDOW.min(n / 4).max(1);
    let strength = CONCAVITY_GAIN * concave_factor / 100.0;

    (0..n)
        .map(|i| {
            let prev = points[(i + n - window) % n];
            let cur = points[i];
            let next = points[(i + window) % n];
            let concavity = (-turning_sine(prev, cur, next) * winding).max(0.0);
            tolerance / strength.mul_add(concavity, 1.0)
        })
        .collect()
}

/// Sine of the turning angle at `cur`, positive for a turn in the
/// positive orientation.
fn turning_sine(prev: Point, cur: Point, next: Point) -> f64 {
    let lengths = prev.distance(cur) * cur.distance(next);
    if lengths == 0.0 {
        return 0.0;
    }
    (orient(prev, cur, next) / lengths).clamp(-1.0, 1.0)
}

/// Ramer-Douglas-Peucker over the closed run `start..=end`, where `end`
/// may exceed the last index and wraps around to the beginning.
///
/// A point is kept when its distance to the current chord exceeds its
/// local tolerance; of all such points the one with the largest ratio is
/// split on first.
fn rdp(points: &[Point], tolerances: &[f64], start: usize, end: usize, kept: &mut [bool]) {
    let n = points.len();
    let mut stack = vec![(start, end)];

    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let a = points[start % n];
        let b = points[end % n];
        let mut max_ratio = 0.0;
        let mut max_idx = start;

        for i in (start + 1)..end {
            let ratio = perpendicular_distance(points[i % n], a, b) / tolerances[i % n];
            if ratio > max_ratio {
                max_ratio = ratio;
                max_idx = i;
            }
        }

        if max_ratio > 1.0 {
            kept[max_idx % n] = true;
            stack.push((max_idx, end));
            stack.push((start, max_idx));
        }
    }
}

/// Make sure at least three points survive by re-adding the point
/// farthest from the chord between the two anchors.
fn ensure_three(points: &[Point], far: usize, kept: &mut [bool]) {
    if kept.iter().filter(|&&k| k).count() >= 3 {
        return;
    }
    let a = points[0];
    let b = points[far];
    let mut best: Option<(f64, usize)> = None;
    for (i, &p) in points.iter().enumerate() {
        if kept[i] {
            continue;
        }
        let d = perpendicular_distance(p, a, b);
        if best.is_none_or(|(best_d, _)| d > best_d) {
            best = Some((d, i));
        }
    }
    if let Some((_, i)) = best {
        kept[i] = true;
    }
}

/// Re-insert original points until the kept outline no longer crosses
/// itself.
///
/// Each crossing edge gets back the original point that deviates most
/// from it. Stops when the outline is simple or when every crossing edge
/// is already at full resolution.
fn repair_crossings(points: &[Point], kept: &mut [bool]) {
    let n = points.len();
    for _ in 0..n {
        let indices: Vec<usize> = (0..n).filter(|&i| kept[i]).collect();
        let m = indices.len();
        let outline: Vec<Point> = indices.iter().map(|&i| points[i]).collect();
        let crossings = self_intersections(&outline);
        if crossings.is_empty() {
            return;
        }

        let mut refined = false;
        for (i, j) in crossings {
            for edge in [i, j] {
                let start = indices[edge];
                let mut end = indices[(edge + 1) % m];
                if end <= start {
                    end += n;
                }
                if let Some(idx) = deepest_between(points, start, end)
                    && !kept[idx]
                {
                    kept[idx] = true;
                    refined = true;
                }
            }
        }

        if !refined {
            break;
        }
    }

    tracing::warn!("simplified contour still self-intersects at full resolution");
}

/// Index of the original point strictly between `start` and `end`
/// (wrapping) farthest from their chord.
fn deepest_between(points: &[Point], start: usize, end: usize) -> Option<usize> {
    let n = points.len();
    let a = points[start % n];
    let b = points[end % n];
    let mut best: Option<(f64, usize)> = None;
    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i % n], a, b);
        if best.is_none_or(|(best_d, _)| d > best_d) {
            best = Some((d, i % n));
        }
    }
    best.map(|(_, i)| i)
}

/// Drop vertices lying exactly on the line through their neighbours
/// while more than three remain.
fn drop_collinear(mut points: Vec<Point>) -> Vec<Point> {
    loop {
        let before = points.len();
        let mut i = 0;
        while points.len() > 3 && i < points.len() {
            let n = points.len();
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            if orient(prev, points[i], next).abs() < f64::EPSILON {
                points.remove(i);
            } else {
                i += 1;
            }
        }
        if points.len() == before {
            return points;
        }
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
