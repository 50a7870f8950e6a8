//! Constrained Delaunay triangulation of the simplified boundary plus
//! interior seed points.
//!
//! The triangulation itself comes from [`spade`]: boundary edges are
//! added as constraints so they survive in the output, seeds are
//! inserted as free vertices, and faces of the convex hull that fall
//! outside the boundary are dropped. [`crate::refine`] then removes
//! vertices until no triangle is smaller than the minimum area.

use std::collections::HashSet;

use geo::Contains;
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, InsertionError, Point2, Triangulation as _};

use crate::geometry::{is_simple, polygon_signed_area};
use crate::refine::Refinement;
use crate::types::{Contour, MeshError, Point, Triangle};

type Cdt = ConstrainedDelaunayTriangulation<Point2<f64>>;

/// Output of the triangulation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    /// Vertex positions: the boundary in contour order, then interior
    /// vertices. Vertices no triangle references are dropped.
    pub vertices: Vec<Point>,
    /// Positively oriented triangles.
    pub triangles: Vec<Triangle>,
    /// Number of leading entries of `vertices` on the boundary.
    pub boundary_vertex_count: usize,
    /// Vertices removed by the minimum-area filter.
    pub collapsed_vertices: usize,
    /// Seeds that could not be inserted (coincident, on the boundary, or
    /// outside it).
    pub skipped_seeds: usize,
}

impl Triangulation {
    /// Number of vertices strictly inside the boundary.
    #[must_use]
    pub const fn interior_vertex_count(&self) -> usize {
        self.vertices.len() - self.boundary_vertex_count
    }
}

/// Triangles of one constrained triangulation, indexing the boundary
/// followed by the seeds.
#[derive(Debug)]
pub(crate) struct Constrained {
    /// Positively oriented triangles inside the boundary.
    pub(crate) triangles: Vec<Triangle>,
    /// Indices into the seed list of seeds that did not become a vertex.
    pub(crate) skipped: Vec<usize>,
}

/// Triangulate the contour with the given interior seeds, then remove
/// vertices until no triangle is smaller than `min_triangle_area`.
///
/// The boundary is reoriented to positive winding if necessary, keeping
/// its first point first.
///
/// # Errors
///
/// Returns [`MeshError::Triangulation`] when the contour has fewer than
/// three points, repeats a point, crosses itself, encloses no area, or
/// when the minimum-area filter cannot be satisfied.
pub fn triangulate(
    contour: &Contour,
    seeds: &[Point],
    min_triangle_area: f64,
) -> Result<Triangulation, MeshError> {
    let boundary = oriented_boundary(contour)?;

    let first = constrained(&boundary, seeds)?;
    let skipped_seeds = first.skipped.len();
    if skipped_seeds > 0 {
        tracing::debug!(skipped_seeds, "seeds not inserted");
    }

    let mut refinement = Refinement::new(boundary, seeds, &first.skipped);
    let mut current = if skipped_seeds == 0 {
        first
    } else {
        constrained(&refinement.boundary, &refinement.seeds)?
    };
    while refinement.prune(&current, min_triangle_area)? {
        current = constrained(&refinement.boundary, &refinement.seeds)?;
    }

    Ok(refinement.into_triangulation(&current.triangles, skipped_seeds))
}

/// Constrained Delaunay triangulation of a positively oriented simple
/// polygon and the seeds strictly inside it.
pub(crate) fn constrained(boundary: &[Point], seeds: &[Point]) -> Result<Constrained, MeshError> {
    let mut cdt = Cdt::new();
    // Input index of each spade vertex, by handle index.
    let mut owner: Vec<Option<usize>> = Vec::with_capacity(boundary.len() + seeds.len());

    let mut ring = Vec::with_capacity(boundary.len());
    for (i, &p) in boundary.iter().enumerate() {
        let handle = insert(&mut cdt, &mut owner, p, i)?.ok_or_else(|| {
            MeshError::Triangulation(format!(
                "the boundary visits ({}, {}) more than once",
                p.x, p.y
            ))
        })?;
        ring.push(handle);
    }

    for (i, &from) in ring.iter().enumerate() {
        let to = ring[(i + 1) % ring.len()];
        if !cdt.can_add_constraint(from, to) {
            return Err(MeshError::Triangulation(format!(
                "boundary edge {i} crosses another boundary edge"
            )));
        }
        cdt.add_constraint(from, to);
    }

    let polygon = Contour::new(boundary.to_vec()).to_polygon();
    let mut skipped = Vec::new();
    for (j, &p) in seeds.iter().enumerate() {
        let inside = polygon.contains(&geo::Point::new(p.x, p.y));
        if !inside || insert(&mut cdt, &mut owner, p, boundary.len() + j)?.is_none() {
            skipped.push(j);
        }
    }

    let mut triangles = Vec::with_capacity(cdt.num_inner_faces());
    for face in cdt.inner_faces() {
        let [a, b, c] = face.vertices().map(|v| v.position());
        let centroid = geo::Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
        if !polygon.contains(&centroid) {
            continue;
        }
        let mut triangle = [0; 3];
        for (slot, vertex) in triangle.iter_mut().zip(face.vertices()) {
            *slot = owner
                .get(vertex.fix().index())
                .copied()
                .flatten()
                .ok_or_else(|| {
                    MeshError::Triangulation("a face references an unknown vertex".into())
                })?;
        }
        triangles.push(triangle);
    }

    if triangles.is_empty() {
        return Err(MeshError::Triangulation(
            "no triangle lies inside the boundary".into(),
        ));
    }
    Ok(Constrained { triangles, skipped })
}

/// Insert `p` and record it as input `index`. Returns `None` when the
/// position is already taken by an earlier vertex.
fn insert(
    cdt: &mut Cdt,
    owner: &mut Vec<Option<usize>>,
    p: Point,
    index: usize,
) -> Result<Option<FixedVertexHandle>, MeshError> {
    let handle = cdt
        .insert(Point2::new(p.x, p.y))
        .map_err(|e: InsertionError| {
            MeshError::Triangulation(format!("cannot insert ({}, {}): {e}", p.x, p.y))
        })?;
    let slot = handle.index();
    if slot >= owner.len() {
        owner.resize(slot + 1, None);
    }
    if owner[slot].is_some() {
        return Ok(None);
    }
    owner[slot] = Some(index);
    Ok(Some(handle))
}

/// Check the boundary and return it with positive orientation.
fn oriented_boundary(contour: &Contour) -> Result<Vec<Point>, MeshError> {
    let points = contour.points();
    if points.len() < 3 {
        return Err(MeshError::Triangulation(format!(
            "the boundary has {} vertices; at least 3 are required",
            points.len()
        )));
    }

    let mut seen = HashSet::with_capacity(points.len());
    for p in points {
        if !seen.insert((p.x.to_bits(), p.y.to_bits())) {
            return Err(MeshError::Triangulation(format!(
                "the boundary visits ({}, {}) more than once",
                p.x, p.y
            )));
        }
    }

    if !is_simple(points) {
        return Err(MeshError::Triangulation(
            "the boundary intersects itself".into(),
        ));
    }

    let area = polygon_signed_area(points);
    if area == 0.0 {
        return Err(MeshError::Triangulation(
            "the boundary encloses no area".into(),
        ));
    }
    if area > 0.0 {
        return Ok(points.to_vec());
    }

    let mut reversed = Vec::with_capacity(points.len());
    reversed.push(points[0]);
    reversed.extend(points[1..].iter().rev());
    Ok(reversed)
}
