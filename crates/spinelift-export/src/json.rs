//! JSON result document.
//!
//! The wire shape returned to job submitters: flat coordinate pairs and
//! index tuples rather than the structured types used inside the
//! pipeline, plus the image rectangle and the parameters the mesh was
//! generated with.

use serde::{Deserialize, Serialize};
use spinelift_mesh::{Bounds, Edge, Mesh, MeshMetadata, MeshParams, Point, Triangle, Uv};

/// Errors from reading or writing a [`MeshDocument`].
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The text was not valid JSON for a mesh document.
    #[error("invalid mesh JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but its parts disagree with each other.
    #[error("inconsistent mesh document: {0}")]
    Inconsistent(String),
}

/// Image size, counts, and generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source image width in pixels.
    pub width: u32,
    /// Source image height in pixels.
    pub height: u32,
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of triangles.
    pub triangle_count: usize,
    /// Number of leading vertices on the outer boundary.
    pub boundary_vertex_count: usize,
    /// The parameters the mesh was generated with.
    pub parameters: MeshParams,
}

/// A mesh in its serialized result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDocument {
    /// `[x, y]` in pixel coordinates.
    pub vertices: Vec<[f64; 2]>,
    /// Vertex index triples, counter-clockwise.
    pub triangles: Vec<Triangle>,
    /// `[u, v]` per vertex.
    pub uvs: Vec<[f64; 2]>,
    /// Edges used by one triangle.
    pub boundary_edges: Vec<Edge>,
    /// Edges shared by two triangles.
    pub interior_edges: Vec<Edge>,
    /// The source image rectangle, `{0, 0, width, height}`.
    pub bounds: Bounds,
    /// Image size, counts, and parameters.
    pub metadata: DocumentMetadata,
}

impl MeshDocument {
    /// Build the document for a finished mesh.
    #[must_use]
    pub fn new(mesh: &Mesh, params: &MeshParams) -> Self {
        let bounds = Bounds {
            x: 0.0,
            y: 0.0,
            width: f64::from(mesh.metadata.width),
            height: f64::from(mesh.metadata.height),
        };
        Self {
            vertices: mesh.vertices.iter().map(|p| [p.x, p.y]).collect(),
            triangles: mesh.triangles.clone(),
            uvs: mesh.uvs.iter().map(|uv| [uv.u, uv.v]).collect(),
            boundary_edges: mesh.boundary_edges.clone(),
            interior_edges: mesh.interior_edges.clone(),
            bounds,
            metadata: DocumentMetadata {
                width: mesh.metadata.width,
                height: mesh.metadata.height,
                vertex_count: mesh.metadata.vertex_count,
                triangle_count: mesh.metadata.triangle_count,
                boundary_vertex_count: mesh.metadata.boundary_vertex_count,
                parameters: params.clone(),
            },
        }
    }

    /// Convert back into a [`Mesh`], checking that counts and indices
    /// agree.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Inconsistent`] when the per-vertex arrays
    /// differ in length, the recorded counts are wrong, or an index
    /// points past the vertex list.
    pub fn into_mesh(self) -> Result<Mesh, ExportError> {
        let n = self.vertices.len();
        if self.uvs.len() != n {
            return Err(ExportError::Inconsistent(format!(
                "{} uvs for {n} vertices",
                self.uvs.len()
            )));
        }
        if self.metadata.vertex_count != n || self.metadata.triangle_count != self.triangles.len()
        {
            return Err(ExportError::Inconsistent(format!(
                "metadata claims {} vertices and {} triangles, found {n} and {}",
                self.metadata.vertex_count,
                self.metadata.triangle_count,
                self.triangles.len()
            )));
        }
        if self.metadata.boundary_vertex_count > n {
            return Err(ExportError::Inconsistent(format!(
                "{} boundary vertices out of {n}",
                self.metadata.boundary_vertex_count
            )));
        }
        let indices = self
            .triangles
            .iter()
            .flatten()
            .chain(self.boundary_edges.iter().flatten())
            .chain(self.interior_edges.iter().flatten());
        if let Some(bad) = indices.copied().find(|&i| i >= n) {
            return Err(ExportError::Inconsistent(format!(
                "vertex index {bad} out of range for {n} vertices"
            )));
        }

        Ok(Mesh {
            vertices: self
                .vertices
                .into_iter()
                .map(|[x, y]| Point::new(x, y))
                .collect(),
            triangles: self.triangles,
            uvs: self.uvs.into_iter().map(|[u, v]| Uv { u, v }).collect(),
            boundary_edges: self.boundary_edges,
            interior_edges: self.interior_edges,
            metadata: MeshMetadata {
                width: self.metadata.width,
                height: self.metadata.height,
                vertex_count: self.metadata.vertex_count,
                triangle_count: self.metadata.triangle_count,
                boundary_vertex_count: self.metadata.boundary_vertex_count,
            },
        })
    }
}

/// Serialize a mesh and its parameters as compact JSON.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_json(mesh: &Mesh, params: &MeshParams) -> Result<String, ExportError> {
    Ok(serde_json::to_string(&MeshDocument::new(mesh, params))?)
}

/// Serialize a mesh and its parameters as indented JSON.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_json_pretty(mesh: &Mesh, params: &MeshParams) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&MeshDocument::new(
        mesh, params,
    ))?)
}

/// Parse a mesh document.
///
/// # Errors
///
/// Returns [`ExportError::Json`] when `text` is not a mesh document.
pub fn from_json(text: &str) -> Result<MeshDocument, ExportError> {
    Ok(serde_json::from_str(text)?)
}
