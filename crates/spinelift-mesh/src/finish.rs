//! Mesh finishing: texture coordinates, edge classification, and a final
//! topology check.
//!
//! The triangulator already guarantees everything checked here; the
//! checks exist so a bug upstream surfaces as
//! [`MeshError::InvalidTopology`] instead of a malformed mesh.

use std::collections::{BTreeMap, HashSet};

use petgraph::unionfind::UnionFind;

use crate::geometry::orient;
use crate::triangulate::Triangulation;
use crate::types::{Dimensions, Edge, Mesh, MeshError, MeshMetadata, Point, Uv};

/// The three directed edges of a triangle, following its winding.
const fn directed_edges(t: [usize; 3]) -> [(usize, usize); 3] {
    [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])]
}

/// Texture coordinate of a pixel-space point.
///
/// `u = x / width`, `v = 1 - y / height`, so the top row of the image
/// maps to `v = 1`.
#[must_use]
pub fn uv_for(point: Point, dimensions: Dimensions) -> Uv {
    Uv {
        u: point.x / f64::from(dimensions.width),
        v: 1.0 - point.y / f64::from(dimensions.height),
    }
}

/// Inverse of [`uv_for`].
#[must_use]
pub fn point_for(uv: Uv, dimensions: Dimensions) -> Point {
    Point::new(
        uv.u * f64::from(dimensions.width),
        (1.0 - uv.v) * f64::from(dimensions.height),
    )
}

/// Split every undirected edge into boundary (one triangle) and
/// interior (two triangles), each sorted.
///
/// # Errors
///
/// Returns [`MeshError::InvalidTopology`] when an edge is shared by more
/// than two triangles.
pub fn classify_edges(triangles: &[[usize; 3]]) -> Result<(Vec<Edge>, Vec<Edge>), MeshError> {
    let mut uses: BTreeMap<Edge, usize> = BTreeMap::new();
    for &t in triangles {
        for (a, b) in directed_edges(t) {
            *uses.entry([a.min(b), a.max(b)]).or_default() += 1;
        }
    }

    let mut boundary = Vec::new();
    let mut interior = Vec::new();
    for (edge, count) in uses {
        match count {
            1 => boundary.push(edge),
            2 => interior.push(edge),
            n => {
                return Err(MeshError::InvalidTopology(format!(
                    "edge {edge:?} is shared by {n} triangles"
                )));
            }
        }
    }
    Ok((boundary, interior))
}

/// Turn a triangulation into the final mesh.
///
/// # Errors
///
/// Returns [`MeshError::InvalidTopology`] if the triangulation is empty,
/// references a missing vertex, repeats a vertex within a triangle,
/// contains a non-positive triangle, has inconsistent winding, shares an
/// edge between more than two triangles, or its boundary edges do not
/// form exactly one closed loop.
pub fn finish(triangulation: Triangulation, dimensions: Dimensions) -> Result<Mesh, MeshError> {
    let Triangulation {
        vertices,
        triangles,
        boundary_vertex_count,
        ..
    } = triangulation;

    if triangles.is_empty() {
        return Err(MeshError::InvalidTopology("the mesh has no triangles".into()));
    }
    check_triangles(&vertices, &triangles)?;

    let (boundary_edges, interior_edges) = classify_edges(&triangles)?;
    check_boundary_loop(vertices.len(), &boundary_edges)?;

    let uvs = vertices.iter().map(|&p| uv_for(p, dimensions)).collect();
    let metadata = MeshMetadata {
        width: dimensions.width,
        height: dimensions.height,
        vertex_count: vertices.len(),
        triangle_count: triangles.len(),
        boundary_vertex_count,
    };

    tracing::debug!(
        vertices = metadata.vertex_count,
        triangles = metadata.triangle_count,
        boundary_edges = boundary_edges.len(),
        interior_edges = interior_edges.len(),
        "finished mesh"
    );

    Ok(Mesh {
        vertices,
        triangles,
        uvs,
        boundary_edges,
        interior_edges,
        metadata,
    })
}

/// Per-triangle checks plus winding consistency.
fn check_triangles(vertices: &[Point], triangles: &[[usize; 3]]) -> Result<(), MeshError> {
    let mut half_edges = HashSet::with_capacity(triangles.len() * 3);

    for (i, &t) in triangles.iter().enumerate() {
        if let Some(&v) = t.iter().find(|&&v| v >= vertices.len()) {
            return Err(MeshError::InvalidTopology(format!(
                "triangle {i} references vertex {v} of {}",
                vertices.len()
            )));
        }
        let [a, b, c] = t;
        if a == b || b == c || a == c {
            return Err(MeshError::InvalidTopology(format!(
                "triangle {i} repeats a vertex: {t:?}"
            )));
        }
        if orient(vertices[a], vertices[b], vertices[c]) <= 0.0 {
            return Err(MeshError::InvalidTopology(format!(
                "triangle {i} has non-positive area"
            )));
        }
        for edge in directed_edges(t) {
            if !half_edges.insert(edge) {
                return Err(MeshError::InvalidTopology(format!(
                    "directed edge {edge:?} appears twice; triangle winding is inconsistent"
                )));
            }
        }
    }
    Ok(())
}

/// Every boundary vertex has exactly two boundary edges and all boundary
/// edges belong to one connected loop.
fn check_boundary_loop(vertex_count: usize, boundary_edges: &[Edge]) -> Result<(), MeshError> {
    let mut degree = vec![0_usize; vertex_count];
    let mut components = UnionFind::<usize>::new(vertex_count);
    for &[a, b] in boundary_edges {
        degree[a] += 1;
        degree[b] += 1;
        components.union(a, b);
    }

    if let Some((v, &d)) = degree.iter().enumerate().find(|&(_, &d)| d != 0 && d != 2) {
        return Err(MeshError::InvalidTopology(format!(
            "boundary vertex {v} has {d} boundary edges"
        )));
    }

    let loops: HashSet<usize> = boundary_edges
        .iter()
        .map(|&[a, _]| components.find(a))
        .collect();
    if loops.len() != 1 {
        return Err(MeshError::InvalidTopology(format!(
            "the boundary forms {} loops",
            loops.len()
        )));
    }
    Ok(())
}
