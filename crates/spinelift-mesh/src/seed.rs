//! Interior seeding: scatter points inside the contour so the
//! triangulation has vertices away from the boundary.
//!
//! Candidates sit on a hexagonal grid with a small deterministic jitter.
//! The jitter is drawn from a PCG generator seeded by hashing the contour
//! and spacing, so the same input always yields the same seeds while
//! different shapes do not share an identical lattice.

use std::hash::Hasher;

use geo::line_measures::Distance;
use geo::{Contains, Euclidean};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rstar::RTree;
use siphasher::sip::SipHasher13;

use crate::types::{Contour, Point};

/// Smallest seed spacing in pixels.
pub const MIN_SPACING: f64 = 1.0;

/// Maximum jitter as a fraction of the spacing, applied on each axis.
const JITTER: f64 = 0.2;

/// Required clearance from the boundary and from other seeds, as a
/// fraction of the spacing.
const CLEARANCE: f64 = 0.5;

/// Fixed SipHash keys so seeds are stable across runs and platforms.
const HASH_KEYS: (u64, u64) = (0x7370_696e_656c_6966, 0x7420_6d65_7368_2121);

/// Distance between neighbouring seeds, or `None` when `density` is 0 or
/// the contour encloses nothing.
///
/// The target triangle area is the contour's bounding area divided by
/// `(density / 100) * density_scaling_factor`, floored at
/// `min_triangle_area`. The spacing is the side of an equilateral
/// triangle of that area, so an undisturbed hexagonal lattice meets the
/// floor.
#[must_use]
pub fn seed_spacing(
    contour: &Contour,
    density: u8,
    density_scaling_factor: f64,
    min_triangle_area: f64,
) -> Option<f64> {
    if density == 0 {
        return None;
    }
    let bounds = contour.bounds()?;
    let bounding_area = bounds.area();
    if bounding_area <= 0.0 {
        return None;
    }

    let divisor = f64::from(density) / 100.0 * density_scaling_factor;
    let target_area = (bounding_area / divisor).max(min_triangle_area);
    Some((4.0 * target_area / 3.0_f64.sqrt()).sqrt().max(MIN_SPACING))
}

/// Generate interior seed points for a contour on a lattice with the
/// given `spacing`, usually from [`seed_spacing`].
///
/// Every returned point lies strictly inside the contour, at least half a
/// spacing from the boundary and from every other seed. Spacings below
/// [`MIN_SPACING`] are raised to it. Returns an empty set for a
/// non-finite or non-positive spacing or a degenerate contour; never
/// fails.
#[must_use = "returns the seed points"]
pub fn seed_interior(contour: &Contour, spacing: f64) -> Vec<Point> {
    if !spacing.is_finite() || spacing <= 0.0 {
        return Vec::new();
    }
    let spacing = spacing.max(MIN_SPACING);
    let Some(bounds) = contour.bounds() else {
        return Vec::new();
    };
    if contour.len() < 3 {
        return Vec::new();
    }

    let polygon = contour.to_polygon();
    let clearance = spacing * CLEARANCE;
    let jitter = spacing * JITTER;
    let row_height = spacing * 3.0_f64.sqrt() / 2.0;

    let mut rng = Pcg64::seed_from_u64(seed_for(contour, spacing));
    let mut accepted: RTree<[f64; 2]> = RTree::new();
    let mut seeds = Vec::new();

    let mut row = 0_u64;
    let mut y = bounds.y + row_height / 2.0;
    while y < bounds.y + bounds.height {
        let offset = if row % 2 == 0 { 0.0 } else { spacing / 2.0 };
        let mut x = bounds.x + spacing / 2.0 + offset;
        while x < bounds.x + bounds.width {
            let candidate = Point::new(
                x + rng.random_range(-jitter..=jitter),
                y + rng.random_range(-jitter..=jitter),
            );
            let geo_point = geo::Point::new(candidate.x, candidate.y);

            let clear_of_seeds = accepted
                .nearest_neighbor(&[candidate.x, candidate.y])
                .is_none_or(|n| Point::new(n[0], n[1]).distance(candidate) >= clearance);

            if clear_of_seeds
                && polygon.contains(&geo_point)
                && Euclidean.distance(&geo_point, polygon.exterior()) >= clearance
            {
                accepted.insert([candidate.x, candidate.y]);
                seeds.push(candidate);
            }
            x += spacing;
        }
        y += row_height;
        row += 1;
    }

    tracing::debug!(spacing, seeds = seeds.len(), "seeded interior");
    seeds
}

/// Hash the contour and spacing into an RNG seed.
fn seed_for(contour: &Contour, spacing: f64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(HASH_KEYS.0, HASH_KEYS.1);
    for p in contour.points() {
        hasher.write_u64(p.x.to_bits());
        hasher.write_u64(p.y.to_bits());
    }
    hasher.write_u64(spacing.to_bits());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds_for(contour: &Contour, density: u8, factor: f64, min_area: f64) -> Vec<Point> {
        seed_spacing(contour, density, factor, min_area)
            .map_or_else(Vec::new, |spacing| seed_interior(contour, spacing))
    }

    fn square(size: f64) -> Contour {
        Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ])
    }

    #[test]
    fn zero_density_yields_nothing() {
        assert!(seeds_for(&square(100.0), 0, 1000.0, 1.0).is_empty());
        assert!(seed_spacing(&square(100.0), 0, 1000.0, 1.0).is_none());
    }

    #[test]
    fn degenerate_contour_yields_nothing() {
        let line = Contour::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert!(seed_interior(&line, 5.0).is_empty());
    }

    #[test]
    fn invalid_spacing_yields_nothing() {
        assert!(seed_interior(&square(100.0), 0.0).is_empty());
        assert!(seed_interior(&square(100.0), -3.0).is_empty());
        assert!(seed_interior(&square(100.0), f64::NAN).is_empty());
    }

    #[test]
    fn lattice_uses_the_given_spacing() {
        let contour = square(100.0);
        let wide = seed_interior(&contour, 20.0);
        let narrow = seed_interior(&contour, 10.0);
        assert!(narrow.len() > wide.len());
        for (i, a) in wide.iter().enumerate() {
            for b in &wide[i + 1..] {
                assert!(a.distance(*b) >= 20.0 * CLEARANCE - 1e-9);
            }
        }
    }

    #[test]
    fn spacing_follows_density() {
        let side = |area: f64| (4.0 * area / 3.0_f64.sqrt()).sqrt();
        // 100x100 bounds, density 50, factor 1000: area 10000 / 500 = 20.
        let spacing = seed_spacing(&square(100.0), 50, 1000.0, 1.0).unwrap_or_default();
        assert!((spacing - side(20.0)).abs() < 1e-12);
        // The minimum triangle area floors the target area.
        let floored = seed_spacing(&square(100.0), 50, 1000.0, 50.0).unwrap_or_default();
        assert!((floored - side(50.0)).abs() < 1e-12);
        // An equilateral triangle with that side has the target area.
        assert!((3.0_f64.sqrt() / 4.0 * floored * floored - 50.0).abs() < 1e-9);
    }

    #[test]
    fn seeds_are_strictly_inside_with_clearance() {
        let contour = square(100.0);
        let spacing = seed_spacing(&contour, 50, 1000.0, 1.0).unwrap_or_default();
        let seeds = seeds_for(&contour, 50, 1000.0, 1.0);
        assert!(!seeds.is_empty());
        for s in &seeds {
            let edge_distance = s.x.min(s.y).min(100.0 - s.x).min(100.0 - s.y);
            assert!(
                edge_distance >= spacing * CLEARANCE - 1e-9,
                "seed ({}, {}) too close to the boundary",
                s.x,
                s.y,
            );
        }
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert!(a.distance(*b) >= spacing * CLEARANCE - 1e-9);
            }
        }
    }

    #[test]
    fn higher_density_gives_more_seeds() {
        let contour = square(100.0);
        let sparse = seeds_for(&contour, 10, 1000.0, 0.1);
        let dense = seeds_for(&contour, 90, 1000.0, 0.1);
        assert!(dense.len() > sparse.len());
    }

    #[test]
    fn seeding_is_deterministic() {
        let contour = square(64.0);
        assert_eq!(
            seeds_for(&contour, 40, 500.0, 1.0),
            seeds_for(&contour, 40, 500.0, 1.0)
        );
    }

    #[test]
    fn concave_regions_excluded() {
        // An L shape: the top-right quadrant is outside.
        let l_shape = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(100.0, 50.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]);
        let seeds = seeds_for(&l_shape, 80, 1000.0, 1.0);
        assert!(!seeds.is_empty());
        assert!(seeds.iter().all(|s| !(s.x > 50.0 && s.y < 50.0)));
    }
}
