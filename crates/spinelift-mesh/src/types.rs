//! Shared types for the spinelift mesh pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference the
/// intermediate opacity mask without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can hand images to the
/// pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// A closed outline: the last point implicitly connects back to the
/// first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a new contour from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Shoelace signed area. Positive when the contour turns the way the
    /// x axis turns towards the y axis.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        crate::geometry::polygon_signed_area(&self.0)
    }

    /// Absolute enclosed area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Axis-aligned bounding box, or `None` for an empty contour.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.0.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &self.0[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Bounds {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        })
    }

    /// Convert to a closed `geo` polygon without holes.
    #[must_use]
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        let exterior: Vec<geo::Coord<f64>> = self.0.iter().map(|&p| p.into()).collect();
        geo::Polygon::new(geo::LineString::new(exterior), vec![])
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Bounds {
    /// Enclosed area (`width * height`).
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Length of the image diagonal in pixels.
    #[must_use]
    pub fn diagonal(self) -> f64 {
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        w.hypot(h)
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// A texture coordinate. `u` runs left to right, `v` bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uv {
    /// Horizontal coordinate in `[0, 1]`.
    pub u: f64,
    /// Vertical coordinate in `[0, 1]`, flipped relative to pixel rows.
    pub v: f64,
}

/// Three vertex indices in positive (counter-clockwise) order.
pub type Triangle = [usize; 3];

/// An undirected edge stored as `[low, high]`.
pub type Edge = [usize; 2];

/// Summary statistics attached to every finished mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshMetadata {
    /// Source image width in pixels.
    pub width: u32,
    /// Source image height in pixels.
    pub height: u32,
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of triangles.
    pub triangle_count: usize,
    /// Number of leading vertices that lie on the outer boundary.
    pub boundary_vertex_count: usize,
}

/// The final triangulated mesh.
///
/// Vertices start with the boundary loop in contour order, followed by
/// the interior vertices. Triangles all have positive signed area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions in pixel coordinates.
    pub vertices: Vec<Point>,
    /// Triangle vertex indices.
    pub triangles: Vec<Triangle>,
    /// One texture coordinate per vertex.
    pub uvs: Vec<Uv>,
    /// Edges used by exactly one triangle, sorted.
    pub boundary_edges: Vec<Edge>,
    /// Edges shared by two triangles, sorted.
    pub interior_edges: Vec<Edge>,
    /// Dimensions and counts.
    pub metadata: MeshMetadata,
}

impl Mesh {
    /// The boundary loop vertices (a prefix of [`Self::vertices`]).
    #[must_use]
    pub fn boundary_vertices(&self) -> &[Point] {
        &self.vertices[..self.metadata.boundary_vertex_count]
    }

    /// Tight bounding box of all vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Contour::new(self.boundary_vertices().to_vec()).bounds()
    }

    /// Signed area of one triangle.
    #[must_use]
    pub fn triangle_area(&self, triangle: Triangle) -> f64 {
        let [a, b, c] = triangle.map(|i| self.vertices[i]);
        crate::geometry::orient(a, b, c) / 2.0
    }
}

/// Identifies a pipeline stage in progress events and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Parameter validation, before any processing.
    Validate,
    /// Alpha channel to binary mask.
    Mask,
    /// Outer contour extraction.
    Boundary,
    /// Contour simplification.
    Simplify,
    /// Interior point seeding.
    Seed,
    /// Constrained triangulation and area filtering.
    Triangulate,
    /// UVs, edge classification, and topology checks.
    Finish,
}

impl Stage {
    /// The processing stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::Mask,
        Self::Boundary,
        Self::Simplify,
        Self::Seed,
        Self::Triangulate,
        Self::Finish,
    ];

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Mask => "mask",
            Self::Boundary => "boundary",
            Self::Simplify => "simplify",
            Self::Seed => "seed",
            Self::Triangulate => "triangulate",
            Self::Finish => "finish",
        }
    }

    /// Overall completion percentage once this stage has finished.
    #[must_use]
    pub const fn percent(self) -> u8 {
        match self {
            Self::Validate => 0,
            Self::Mask => 10,
            Self::Boundary => 20,
            Self::Simplify => 30,
            Self::Seed => 50,
            Self::Triangulate => 70,
            Self::Finish => 100,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while generating a mesh.
///
/// Serializable so a job runner can forward failures across a process
/// or network boundary unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum MeshError {
    /// A parameter is missing, mistyped, or out of range.
    #[error("validate stage: invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Wire name of the offending parameter.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No pixel survived the opacity thresholds.
    #[error(
        "mask stage: no pixels pass the opacity thresholds \
         (alpha > {alpha_threshold}, blurred alpha > {binary_threshold})"
    )]
    EmptyMask {
        /// Alpha threshold in effect.
        alpha_threshold: u8,
        /// Binary threshold in effect.
        binary_threshold: u8,
    },

    /// Every outer contour was smaller than the noise floor.
    #[error(
        "boundary stage: no contour encloses at least {min_contour_area} px² \
         ({discarded} smaller contours discarded)"
    )]
    NoContourFound {
        /// Minimum contour area in effect.
        min_contour_area: f64,
        /// Number of outer contours rejected as noise.
        discarded: usize,
    },

    /// The polygon could not be triangulated under the constraints.
    #[error("triangulate stage: {0}")]
    Triangulation(String),

    /// The finished mesh failed a topology check.
    #[error("finish stage: invalid mesh topology: {0}")]
    InvalidTopology(String),

    /// Cancellation was observed before a stage started.
    #[error("{stage} stage: cancelled before the stage started")]
    Cancelled {
        /// The stage that would have run next.
        stage: Stage,
    },
}

impl MeshError {
    /// Which stage produced the error.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::InvalidParameter { .. } => Stage::Validate,
            Self::EmptyMask { .. } => Stage::Mask,
            Self::NoContourFound { .. } => Stage::Boundary,
            Self::Triangulation(_) => Stage::Triangulate,
            Self::InvalidTopology(_) => Stage::Finish,
            Self::Cancelled { stage } => *stage,
        }
    }

    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}
