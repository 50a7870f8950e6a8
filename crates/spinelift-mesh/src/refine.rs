//! Minimum-area filter: remove vertices until no triangle is smaller
//! than the requested area.
//!
//! Each round walks the undersized triangles of the current constrained
//! triangulation, smallest first. A triangle with a seed vertex loses
//! that seed. A triangle made only of boundary vertices loses the one
//! with the smallest effective area (the triangle it spans with its two
//! boundary neighbours), as long as the chord replacing it crosses no
//! other boundary edge. Convex and reflex vertices both qualify. The
//! caller rebuilds the triangulation after every round that removed
//! something.

use geo::Contains;

use crate::geometry::{adjacent_segments_overlap, orient, polygon_signed_area, segments_intersect};
use crate::triangulate::{Constrained, Triangulation};
use crate::types::{Contour, MeshError, Point, Triangle};

/// Boundary and seeds that survive the minimum-area filter so far.
///
/// Triangle indices refer to `boundary` followed by `seeds`.
#[derive(Debug)]
pub(crate) struct Refinement {
    pub(crate) boundary: Vec<Point>,
    pub(crate) seeds: Vec<Point>,
    collapsed: usize,
}

/// Doubly linked view of the boundary ring for one round of removals.
struct Ring {
    prev: Vec<usize>,
    next: Vec<usize>,
    alive: Vec<bool>,
    len: usize,
}

impl Ring {
    fn new(n: usize) -> Self {
        Self {
            prev: (0..n).map(|i| (i + n - 1) % n).collect(),
            next: (0..n).map(|i| (i + 1) % n).collect(),
            alive: vec![true; n],
            len: n,
        }
    }

    fn remove(&mut self, v: usize) {
        let (p, q) = (self.prev[v], self.next[v]);
        self.next[p] = q;
        self.prev[q] = p;
        self.alive[v] = false;
        self.len -= 1;
    }
}

impl Refinement {
    /// Start from a positively oriented boundary and the seeds that were
    /// not listed in `skipped` (ascending seed indices).
    pub(crate) fn new(boundary: Vec<Point>, seeds: &[Point], skipped: &[usize]) -> Self {
        let seeds = seeds
            .iter()
            .enumerate()
            .filter(|(j, _)| skipped.binary_search(j).is_err())
            .map(|(_, &p)| p)
            .collect();
        Self {
            boundary,
            seeds,
            collapsed: 0,
        }
    }

    fn point(&self, i: usize) -> Point {
        self.boundary
            .get(i)
            .copied()
            .unwrap_or_else(|| self.seeds[i - self.boundary.len()])
    }

    fn area(&self, t: Triangle) -> f64 {
        orient(self.point(t[0]), self.point(t[1]), self.point(t[2])) / 2.0
    }

    /// Run one round of removals against `mesh`, which must have been
    /// built from the current boundary and seeds.
    ///
    /// Returns `false` once every triangle meets `min_area`.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Triangulation`] when some triangle is too
    /// small and no vertex can be removed: the boundary is already a
    /// triangle, or every candidate chord would cross the boundary.
    pub(crate) fn prune(&mut self, mesh: &Constrained, min_area: f64) -> Result<bool, MeshError> {
        let mut small: Vec<(Triangle, f64)> = mesh
            .triangles
            .iter()
            .map(|&t| (t, self.area(t)))
            .filter(|&(_, area)| area < min_area)
            .collect();
        if small.is_empty() {
            return Ok(false);
        }
        small.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n = self.boundary.len();
        let mut ring = Ring::new(n);
        let mut drop_seed = vec![false; self.seeds.len()];
        let mut removed = 0;

        for &(t, _) in &small {
            let touched = t.iter().any(|&v| {
                if v < n {
                    !ring.alive[v]
                } else {
                    drop_seed[v - n]
                }
            });
            if touched {
                continue;
            }
            if let Some(&seed) = t.iter().find(|&&v| v >= n) {
                drop_seed[seed - n] = true;
                removed += 1;
            } else if let Some(v) = self.removable(&ring, t) {
                ring.remove(v);
                removed += 1;
            }
        }

        if removed == 0 {
            let area = small[0].1;
            return Err(MeshError::Triangulation(format!(
                "a triangle of {area:.3} px² is below the minimum area of \
                 {min_area} px² and none of its vertices can be removed"
            )));
        }

        let boundary_removed = n - ring.len;
        if boundary_removed > 0 {
            self.boundary = self
                .boundary
                .iter()
                .zip(&ring.alive)
                .filter_map(|(&p, &alive)| alive.then_some(p))
                .collect();
        }

        let before = self.seeds.len();
        let mut seeds: Vec<Point> = self
            .seeds
            .iter()
            .zip(&drop_seed)
            .filter_map(|(&p, &dropped)| (!dropped).then_some(p))
            .collect();
        let seeds_dropped = before - seeds.len();
        if boundary_removed > 0 {
            // Removing a convex vertex cuts a corner off the region.
            let polygon = Contour::new(self.boundary.clone()).to_polygon();
            seeds.retain(|p| polygon.contains(&geo::Point::new(p.x, p.y)));
        }
        let seeds_outside = before - seeds_dropped - seeds.len();
        self.seeds = seeds;

        self.collapsed += boundary_removed + seeds_dropped + seeds_outside;
        tracing::trace!(
            undersized = small.len(),
            boundary_removed,
            seeds_dropped,
            seeds_outside,
            "minimum-area round"
        );
        Ok(true)
    }

    /// The vertex of the all-boundary triangle `t` to remove, if any.
    fn removable(&self, ring: &Ring, t: Triangle) -> Option<usize> {
        if ring.len <= 3 {
            return None;
        }
        let mut candidates: Vec<(usize, f64)> = t
            .iter()
            .map(|&v| {
                let effective = orient(
                    self.boundary[ring.prev[v]],
                    self.boundary[v],
                    self.boundary[ring.next[v]],
                );
                (v, effective.abs())
            })
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates
            .into_iter()
            .map(|(v, _)| v)
            .find(|&v| self.chord_is_clear(ring, v))
    }

    /// Whether the boundary stays simple and positively oriented when
    /// `v` is replaced by the chord between its neighbours.
    fn chord_is_clear(&self, ring: &Ring, v: usize) -> bool {
        let (p, q) = (ring.prev[v], ring.next[v]);
        let (before, after) = (ring.prev[p], ring.next[q]);
        let (a, b) = (self.boundary[p], self.boundary[q]);

        if adjacent_segments_overlap(a, b, self.boundary[before])
            || adjacent_segments_overlap(b, a, self.boundary[after])
        {
            return false;
        }

        let mut u = after;
        while u != before {
            let w = ring.next[u];
            if segments_intersect(a, b, self.boundary[u], self.boundary[w]) {
                return false;
            }
            u = w;
        }

        let mut remaining = Vec::with_capacity(ring.len - 1);
        let mut u = q;
        while u != v {
            remaining.push(self.boundary[u]);
            u = ring.next[u];
        }
        polygon_signed_area(&remaining) > 0.0
    }

    /// Compact the surviving vertices into the stage output: boundary in
    /// contour order first, then the seeds the triangles reference.
    pub(crate) fn into_triangulation(
        self,
        triangles: &[Triangle],
        skipped_seeds: usize,
    ) -> Triangulation {
        let total = self.boundary.len() + self.seeds.len();
        let mut used = vec![false; total];
        for t in triangles {
            for &v in t {
                used[v] = true;
            }
        }

        let mut remap = vec![0; total];
        let mut vertices = Vec::with_capacity(total);
        for (i, _) in used.iter().enumerate().filter(|&(_, &u)| u) {
            remap[i] = vertices.len();
            vertices.push(self.point(i));
        }
        let boundary_vertex_count = used[..self.boundary.len()].iter().filter(|&&u| u).count();

        if self.collapsed > 0 {
            tracing::debug!(
                collapsed = self.collapsed,
                "removed vertices of undersized triangles"
            );
        }

        Triangulation {
            triangles: triangles.iter().map(|t| t.map(|v| remap[v])).collect(),
            vertices,
            boundary_vertex_count,
            collapsed_vertices: self.collapsed,
            skipped_seeds,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::geometry::orient;
    use crate::triangulate::{Triangulation, triangulate};
    use crate::types::{Contour, MeshError, Point};

    fn rect(w: f64, h: f64) -> Contour {
        Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ])
    }

    fn areas(t: &Triangulation) -> Vec<f64> {
        t.triangles
            .iter()
            .map(|tri| orient(t.vertices[tri[0]], t.vertices[tri[1]], t.vertices[tri[2]]) / 2.0)
            .collect()
    }

    fn total_area(t: &Triangulation) -> f64 {
        areas(t).iter().sum()
    }

    #[test]
    fn no_op_when_all_triangles_large() {
        let triangle = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ]);
        let t = triangulate(&triangle, &[], 1.0).unwrap();
        assert_eq!(t.collapsed_vertices, 0);
        assert_eq!(t.triangles.len(), 1);
    }

    #[test]
    fn seed_near_boundary_removed() {
        let t = triangulate(&rect(10.0, 10.0), &[Point::new(5.0, 0.05)], 1.0).unwrap();
        assert_eq!(t.collapsed_vertices, 1);
        assert_eq!(t.interior_vertex_count(), 0);
        assert_eq!(t.triangles.len(), 2);
        assert!((total_area(&t) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn convex_boundary_vertex_removed() {
        // Whichever diagonal is chosen, one triangle uses the short edge
        // 1 -> 2 and has area 2.5.
        let quad = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.5),
            Point::new(0.0, 10.0),
        ]);
        let t = triangulate(&quad, &[], 5.0).unwrap();
        assert_eq!(t.collapsed_vertices, 1);
        assert_eq!(t.boundary_vertex_count, 3);
        assert_eq!(t.triangles.len(), 1);
        assert!((total_area(&t) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn reflex_boundary_vertex_removed() {
        // A shallow dent in the bottom edge.
        let dented = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(9.0, 0.0),
            Point::new(10.0, 0.3),
            Point::new(11.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 20.0),
            Point::new(0.0, 20.0),
        ]);
        let t = triangulate(&dented, &[], 15.0).unwrap();
        assert!(!t.vertices.contains(&Point::new(10.0, 0.3)));
        assert!(areas(&t).iter().all(|&a| a >= 15.0));
        assert!((total_area(&t) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn finely_sampled_circle_is_coarsened() {
        let n = 400;
        let ring: Vec<Point> = (0..n)
            .map(|i| {
                let angle = f64::from(i) / f64::from(n) * std::f64::consts::TAU;
                Point::new(200.0 + 150.0 * angle.cos(), 200.0 + 150.0 * angle.sin())
            })
            .collect();
        let t = triangulate(&Contour::new(ring), &[], 10.0).unwrap();

        assert!(areas(&t).iter().all(|&a| a >= 10.0));
        assert!(t.boundary_vertex_count >= 3);
        assert_eq!(t.collapsed_vertices, 400 - t.boundary_vertex_count);
        assert_eq!(t.triangles.len(), t.boundary_vertex_count - 2);
    }

    #[test]
    fn corner_seeds_and_boundary_bump_removed() {
        let shape = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.3, 0.4),
            Point::new(30.0, 30.0),
            Point::new(0.0, 30.0),
        ]);
        let seeds = [
            Point::new(15.0, 15.0),
            Point::new(0.3, 0.3),
            Point::new(29.7, 29.7),
        ];
        let t = triangulate(&shape, &seeds, 20.0).unwrap();
        assert!(areas(&t).iter().all(|&a| a >= 20.0));
        assert!(t.collapsed_vertices >= 2);
        assert!(!t.vertices.contains(&Point::new(0.3, 0.3)));
        assert!(!t.vertices.contains(&Point::new(29.7, 29.7)));
        assert_eq!(
            t.triangles.len(),
            2 * t.interior_vertex_count() + t.boundary_vertex_count - 2
        );
    }

    #[test]
    fn unreachable_area_fails() {
        let triangle = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 4.0),
        ]);
        assert!(matches!(
            triangulate(&triangle, &[], 100.0),
            Err(MeshError::Triangulation(_))
        ));
    }
}
