//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::generate_mesh`] which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use spinelift_mesh::{MeshError, MeshParams, Pipeline, RgbaImage};
//! # fn run(image: &RgbaImage) -> Result<(), MeshError> {
//! let simplified = Pipeline::new(image, MeshParams::default())?
//!     .build_mask()?
//!     .extract_boundary()?
//!     .simplify();
//! println!("{} boundary points", simplified.simplified().len());
//!
//! let mesh = simplified.seed().triangulate()?.finish()?.into_mesh();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages), carrying the intermediates a preview
//! needs. Parameters are validated once, in [`Pipeline::new`].
//!
//! # Memory
//!
//! Every stage from [`MaskBuilt`] onward keeps the binary mask alive
//! (one byte per pixel) so previews can overlay the mesh on it. Callers
//! that only need the mesh should prefer [`crate::generate_mesh`].

use crate::diagnostics::{
    Clock, PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics, reduction_ratio,
};
use crate::params::MeshParams;
use crate::progress::{ProgressEvent, RunOptions};
use crate::triangulate::Triangulation;
use crate::types::{Contour, Dimensions, GrayImage, Mesh, MeshError, Point, RgbaImage, Stage};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state after parameter validation, before any processing.
///
/// Call [`build_mask`](Self::build_mask) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .build_mask() to continue"]
pub struct Pending<'a> {
    image: &'a RgbaImage,
    params: MeshParams,
    dimensions: Dimensions,
}

impl Pending<'_> {
    /// The source image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        self.image
    }

    /// The validated parameters.
    #[must_use]
    pub const fn params(&self) -> &MeshParams {
        &self.params
    }

    /// Build the opacity mask and advance to [`MaskBuilt`].
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::EmptyMask`] when no pixel passes the
    /// thresholds.
    pub fn build_mask(self) -> Result<MaskBuilt, MeshError> {
        let mask = crate::mask::build_mask(
            self.image,
            self.params.alpha_threshold,
            self.params.blur_kernel_size,
            self.params.binary_threshold,
        )?;
        let foreground = crate::mask::count_foreground(&mask);
        Ok(MaskBuilt {
            params: self.params,
            dimensions: self.dimensions,
            mask,
            foreground,
        })
    }
}

// ───────────────────────── Stage 1: MaskBuilt ────────────────────────

/// Pipeline state after building the binary opacity mask.
///
/// Call [`extract_boundary`](Self::extract_boundary) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .extract_boundary() to continue"]
pub struct MaskBuilt {
    params: MeshParams,
    dimensions: Dimensions,
    mask: GrayImage,
    foreground: u64,
}

impl MaskBuilt {
    /// The binary mask (255 = shape, 0 = background).
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Trace the mask and keep the largest outer contour.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NoContourFound`] when every contour is
    /// smaller than `min_contour_area`.
    pub fn extract_boundary(self) -> Result<BoundaryExtracted, MeshError> {
        let contours = crate::contour::trace_outer_contours(&self.mask);
        let contour_count = contours.len();
        let contour = crate::contour::select_largest(contours, self.params.min_contour_area)?;
        Ok(BoundaryExtracted {
            params: self.params,
            dimensions: self.dimensions,
            mask: self.mask,
            contour_count,
            contour,
        })
    }
}

// ───────────────────────── Stage 2: BoundaryExtracted ────────────────

/// Pipeline state after selecting the outer contour.
///
/// Call [`simplify`](Self::simplify) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .simplify() to continue"]
pub struct BoundaryExtracted {
    params: MeshParams,
    dimensions: Dimensions,
    mask: GrayImage,
    contour_count: usize,
    contour: Contour,
}

impl BoundaryExtracted {
    /// The traced contour, before simplification.
    #[must_use]
    pub const fn contour(&self) -> &Contour {
        &self.contour
    }

    /// Simplify the contour and advance to [`Simplified`].
    pub fn simplify(self) -> Simplified {
        let tolerance = crate::simplify::tolerance_for(self.params.detail_factor, self.dimensions);
        let simplified =
            crate::simplify::simplify_contour(&self.contour, tolerance, self.params.concave_factor);
        Simplified {
            params: self.params,
            dimensions: self.dimensions,
            mask: self.mask,
            contour: self.contour,
            tolerance,
            simplified,
        }
    }
}

// ───────────────────────── Stage 3: Simplified ───────────────────────

/// Pipeline state after contour simplification.
///
/// Call [`seed`](Self::seed) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .seed() to continue"]
pub struct Simplified {
    params: MeshParams,
    dimensions: Dimensions,
    mask: GrayImage,
    contour: Contour,
    tolerance: f64,
    simplified: Contour,
}

impl Simplified {
    /// The simplified boundary.
    #[must_use]
    pub const fn simplified(&self) -> &Contour {
        &self.simplified
    }

    /// Base simplification tolerance in pixels.
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Place interior seeds and advance to [`Seeded`].
    pub fn seed(self) -> Seeded {
        let p = &self.params;
        let spacing = crate::seed::seed_spacing(
            &self.simplified,
            p.internal_vertex_density,
            p.density_scaling_factor,
            p.min_triangle_area,
        );
        let seeds = spacing.map_or_else(Vec::new, |spacing| {
            crate::seed::seed_interior(&self.simplified, spacing)
        });
        Seeded {
            params: self.params,
            dimensions: self.dimensions,
            mask: self.mask,
            simplified: self.simplified,
            spacing,
            seeds,
        }
    }
}

// ───────────────────────── Stage 4: Seeded ───────────────────────────

/// Pipeline state after interior seeding.
///
/// Call [`triangulate`](Self::triangulate) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .triangulate() to continue"]
pub struct Seeded {
    params: MeshParams,
    dimensions: Dimensions,
    mask: GrayImage,
    simplified: Contour,
    spacing: Option<f64>,
    seeds: Vec<Point>,
}

impl Seeded {
    /// The interior seed points.
    #[must_use]
    pub fn seeds(&self) -> &[Point] {
        &self.seeds
    }

    /// The simplified boundary the seeds were placed in.
    #[must_use]
    pub const fn simplified(&self) -> &Contour {
        &self.simplified
    }

    /// Triangulate and advance to [`Triangulated`].
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Triangulation`] for a degenerate boundary or
    /// an unreachable minimum triangle area.
    pub fn triangulate(self) -> Result<Triangulated, MeshError> {
        let triangulation = crate::triangulate::triangulate(
            &self.simplified,
            &self.seeds,
            self.params.min_triangle_area,
        )?;
        Ok(Triangulated {
            dimensions: self.dimensions,
            mask: self.mask,
            seed_count: self.seeds.len(),
            triangulation,
        })
    }
}

// ───────────────────────── Stage 5: Triangulated ─────────────────────

/// Pipeline state after triangulation and area filtering.
///
/// Call [`finish`](Self::finish) to produce the mesh.
#[must_use = "pipeline stages are consumed by advancing; call .finish() to continue"]
pub struct Triangulated {
    dimensions: Dimensions,
    mask: GrayImage,
    seed_count: usize,
    triangulation: Triangulation,
}

impl Triangulated {
    /// The triangulation.
    #[must_use]
    pub const fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }

    /// Compute UVs and edges, check topology, and advance to
    /// [`Finished`].
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidTopology`] if the triangulation fails
    /// a topology check.
    pub fn finish(self) -> Result<Finished, MeshError> {
        let mesh = crate::finish::finish(self.triangulation, self.dimensions)?;
        Ok(Finished {
            mask: self.mask,
            mesh,
        })
    }
}

// ───────────────────────── Stage 6: Finished ─────────────────────────

/// The final stage.
#[must_use = "call .into_mesh() to extract the Mesh"]
pub struct Finished {
    mask: GrayImage,
    mesh: Mesh,
}

impl Finished {
    /// The finished mesh.
    #[must_use]
    pub const fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The mask the mesh was built from.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Consume the pipeline and return the mesh.
    #[must_use]
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }
}

// ──────────────────────── PipelineStage trait ─────────────────────────

/// Implemented by every state reached by running a stage.
pub trait PipelineStage {
    /// Human-readable name of the stage that produced this state.
    const NAME: &str;

    /// The stage that produced this state.
    const STAGE: Stage;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;

    /// One-line description used as the progress message.
    fn summary(&self) -> String;
}

impl PipelineStage for MaskBuilt {
    const NAME: &str = "mask";
    const STAGE: Stage = Stage::Mask;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Mask {
            width: self.dimensions.width,
            height: self.dimensions.height,
            blur_kernel_size: self.params.effective_blur_kernel_size(),
            foreground_pixel_count: self.foreground,
            total_pixel_count: self.dimensions.pixel_count(),
        }
    }

    fn summary(&self) -> String {
        format!("{} opaque pixels", self.foreground)
    }
}

impl PipelineStage for BoundaryExtracted {
    const NAME: &str = "boundary";
    const STAGE: Stage = Stage::Boundary;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Boundary {
            contour_count: self.contour_count,
            point_count: self.contour.len(),
            area: self.contour.area(),
        }
    }

    fn summary(&self) -> String {
        format!(
            "boundary of {} points from {} contours",
            self.contour.len(),
            self.contour_count
        )
    }
}

impl PipelineStage for Simplified {
    const NAME: &str = "simplify";
    const STAGE: Stage = Stage::Simplify;

    fn metrics(&self) -> StageMetrics {
        let points_before = self.contour.len();
        let points_after = self.simplified.len();
        StageMetrics::Simplify {
            tolerance: self.tolerance,
            points_before,
            points_after,
            reduction_ratio: reduction_ratio(points_before, points_after),
        }
    }

    fn summary(&self) -> String {
        format!(
            "simplified {} to {} points",
            self.contour.len(),
            self.simplified.len()
        )
    }
}

impl PipelineStage for Seeded {
    const NAME: &str = "seed";
    const STAGE: Stage = Stage::Seed;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Seed {
            spacing: self.spacing,
            seed_count: self.seeds.len(),
        }
    }

    fn summary(&self) -> String {
        format!("{} interior points", self.seeds.len())
    }
}

impl PipelineStage for Triangulated {
    const NAME: &str = "triangulate";
    const STAGE: Stage = Stage::Triangulate;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Triangulate {
            vertex_count: self.triangulation.vertices.len(),
            triangle_count: self.triangulation.triangles.len(),
            skipped_seeds: self.triangulation.skipped_seeds,
            collapsed_vertices: self.triangulation.collapsed_vertices,
        }
    }

    fn summary(&self) -> String {
        format!(
            "{} triangles over {} vertices ({} of {} seeds used)",
            self.triangulation.triangles.len(),
            self.triangulation.vertices.len(),
            self.triangulation.interior_vertex_count(),
            self.seed_count,
        )
    }
}

impl PipelineStage for Finished {
    const NAME: &str = "finish";
    const STAGE: Stage = Stage::Finish;

    fn metrics(&self) -> StageMetrics {
        let smallest_triangle_area = self
            .mesh
            .triangles
            .iter()
            .map(|&t| self.mesh.triangle_area(t))
            .reduce(f64::min)
            .unwrap_or(0.0);
        StageMetrics::Finish {
            boundary_edge_count: self.mesh.boundary_edges.len(),
            interior_edge_count: self.mesh.interior_edges.len(),
            smallest_triangle_area,
        }
    }

    fn summary(&self) -> String {
        format!(
            "mesh complete: {} vertices, {} triangles",
            self.mesh.metadata.vertex_count, self.mesh.metadata.triangle_count
        )
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental mesh generation pipeline.
///
/// Created via [`Pipeline::new`], which validates the parameters. Each
/// stage method consumes the current state and returns the next, making
/// it a compile-time error to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Validate `params` and return the [`Pending`] state.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidParameter`] for the first parameter
    /// that is out of range.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: &RgbaImage, params: MeshParams) -> Result<Pending<'_>, MeshError> {
        params.validate()?;
        let dimensions = Dimensions {
            width: image.width(),
            height: image.height(),
        };
        Ok(Pending {
            image,
            params,
            dimensions,
        })
    }
}

// ───────────────────── Instrumented driver ───────────────────────────

/// Run one stage: check cancellation, time it, report progress.
fn step<C, S, F>(
    options: &RunOptions<'_>,
    clock: &C,
    advance: F,
) -> Result<(S, StageDiagnostics), MeshError>
where
    C: Clock,
    S: PipelineStage,
    F: FnOnce() -> Result<S, MeshError>,
{
    if options.is_cancelled() {
        tracing::info!(stage = S::NAME, "cancelled");
        return Err(MeshError::Cancelled { stage: S::STAGE });
    }

    let start = clock.now();
    let state = advance()
        .inspect_err(|e| tracing::debug!(stage = S::NAME, error = %e, "stage failed"))?;
    let duration = clock.elapsed(&start);

    let summary = state.summary();
    tracing::debug!(stage = S::NAME, ?duration, "{summary}");
    options.report(&ProgressEvent::new(S::STAGE, summary));

    let metrics = state.metrics();
    Ok((state, StageDiagnostics { duration, metrics }))
}

/// Run every stage with cancellation checks, progress reports, and
/// timing.
pub(crate) fn run<C: Clock>(
    image: &RgbaImage,
    params: &MeshParams,
    options: &RunOptions<'_>,
    clock: &C,
) -> Result<(Mesh, PipelineDiagnostics), MeshError> {
    let start = clock.now();
    let pending = Pipeline::new(image, params.clone())?;
    tracing::info!(
        width = image.width(),
        height = image.height(),
        density = params.internal_vertex_density,
        "generating mesh"
    );

    let (masked, mask) = step(options, clock, || pending.build_mask())?;
    let (bounded, boundary) = step(options, clock, || masked.extract_boundary())?;
    let (simplified, simplify) = step(options, clock, || Ok(bounded.simplify()))?;
    let (seeded, seed) = step(options, clock, || Ok(simplified.seed()))?;
    let (triangulated, triangulate) = step(options, clock, || seeded.triangulate())?;
    let (finished, finish) = step(options, clock, || triangulated.finish())?;

    let mesh = finished.into_mesh();
    let diagnostics = PipelineDiagnostics {
        mask,
        boundary,
        simplify,
        seed,
        triangulate,
        finish,
        total_duration: clock.elapsed(&start),
        summary: PipelineSummary {
            image_width: mesh.metadata.width,
            image_height: mesh.metadata.height,
            pixel_count: Dimensions {
                width: mesh.metadata.width,
                height: mesh.metadata.height,
            }
            .pixel_count(),
            vertex_count: mesh.metadata.vertex_count,
            triangle_count: mesh.metadata.triangle_count,
        },
    };
    tracing::info!(
        vertices = mesh.metadata.vertex_count,
        triangles = mesh.metadata.triangle_count,
        "mesh generated"
    );
    Ok((mesh, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    /// Opaque rectangle `(x0, y0)..=(x1, y1)` on a transparent canvas.
    fn rect_image(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
                Rgba([200, 50, 50, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn new_validates_parameters() {
        let image = rect_image(10, 10, 2, 2, 7, 7);
        let params = MeshParams {
            detail_factor: 1.0,
            ..MeshParams::default()
        };
        assert!(matches!(
            Pipeline::new(&image, params),
            Err(MeshError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn stages_expose_intermediates() {
        let image = rect_image(64, 48, 8, 8, 55, 39);
        let masked = Pipeline::new(&image, MeshParams::default())
            .unwrap()
            .build_mask()
            .unwrap();
        assert_eq!(masked.mask().dimensions(), (64, 48));
        assert!(matches!(
            masked.metrics(),
            StageMetrics::Mask {
                foreground_pixel_count: 1536,
                ..
            }
        ));

        let bounded = masked.extract_boundary().unwrap();
        assert!(bounded.contour().len() >= 4);

        let simplified = bounded.simplify();
        assert_eq!(simplified.simplified().len(), 4);
        assert!(simplified.tolerance() > 0.0);

        let seeded = simplified.seed();
        assert!(seeded.seeds().is_empty());

        let triangulated = seeded.triangulate().unwrap();
        assert_eq!(triangulated.triangulation().triangles.len(), 2);

        let finished = triangulated.finish().unwrap();
        assert_eq!(finished.mesh().metadata.vertex_count, 4);
        assert_eq!(Finished::NAME, "finish");
        assert_eq!(finished.mask().dimensions(), (64, 48));
    }

    #[test]
    fn empty_mask_stops_at_mask_stage() {
        let image = RgbaImage::new(16, 16);
        let err = Pipeline::new(&image, MeshParams::default())
            .unwrap()
            .build_mask()
            .err()
            .unwrap();
        assert_eq!(err.stage(), Stage::Mask);
    }
}
