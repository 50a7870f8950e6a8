//! spinelift-mesh: turn an image with transparency into a 2D triangle
//! mesh for skeletal animation (sans-IO).
//!
//! Stages, in order:
//! opacity mask -> outer contour -> simplification -> interior seeding ->
//! constrained triangulation with a minimum-area filter -> UVs and edge
//! classification.
//!
//! The crate has **no I/O dependencies**: it takes an in-memory
//! [`RgbaImage`] and a [`MeshParams`] and returns a [`Mesh`]. Decoding
//! files and writing results lives in the bench and export crates.
//!
//! Runs are pure functions of their inputs: the same image and
//! parameters always produce the same mesh, and independent runs can
//! proceed in parallel.

pub mod blur;
pub mod contour;
pub mod diagnostics;
pub mod finish;
mod geometry;
pub mod mask;
pub mod params;
pub mod pipeline;
pub mod progress;
mod refine;
pub mod seed;
pub mod simplify;
pub mod triangulate;
pub mod types;

pub use diagnostics::{Clock, PipelineDiagnostics, WebClock};
pub use params::MeshParams;
pub use pipeline::{Pipeline, PipelineStage};
pub use progress::{
    CancellationFlag, ChannelSink, NoProgress, ProgressEvent, ProgressSink, RunOptions,
};
pub use triangulate::Triangulation;
pub use types::{
    Bounds, Contour, Dimensions, Edge, GrayImage, Mesh, MeshError, MeshMetadata, Point,
    RgbaImage, Stage, Triangle, Uv,
};

/// Generate a mesh from an image.
///
/// Equivalent to [`generate_mesh_with`] with no progress sink and no
/// cancellation.
///
/// # Errors
///
/// Returns [`MeshError::InvalidParameter`] before any work when a
/// parameter is out of range, otherwise the error of the first stage
/// that fails. See [`MeshError`] for the stage each variant belongs to.
pub fn generate_mesh(image: &RgbaImage, params: &MeshParams) -> Result<Mesh, MeshError> {
    generate_mesh_with(image, params, &RunOptions::default())
}

/// Generate a mesh, reporting progress after each stage and checking
/// for cancellation before each stage.
///
/// Progress events are delivered in stage order with strictly
/// increasing percentages ending at 100. Nothing is reported when
/// validation fails.
///
/// # Errors
///
/// As [`generate_mesh`], plus [`MeshError::Cancelled`] naming the stage
/// that would have run next when cancellation is observed.
pub fn generate_mesh_with(
    image: &RgbaImage,
    params: &MeshParams,
    options: &RunOptions<'_>,
) -> Result<Mesh, MeshError> {
    pipeline::run(image, params, options, &WebClock).map(|(mesh, _)| mesh)
}

/// Generate a mesh and collect per-stage timing and metrics.
///
/// # Errors
///
/// As [`generate_mesh_with`].
pub fn generate_mesh_with_diagnostics<C: Clock>(
    image: &RgbaImage,
    params: &MeshParams,
    options: &RunOptions<'_>,
    clock: &C,
) -> Result<(Mesh, PipelineDiagnostics), MeshError> {
    pipeline::run(image, params, options, clock)
}
