//! Pipeline diagnostics: timing and counts for each stage.
//!
//! Every call to [`generate_mesh_with_diagnostics`](crate::generate_mesh_with_diagnostics)
//! collects these alongside the mesh. They are meant for parameter
//! tuning: how many pixels survived the mask, how aggressively the
//! contour was simplified, how many seeds were placed and how many
//! vertices the area filter removed.
//!
//! Durations are measured through the [`Clock`] trait so callers can
//! supply their own time source. [`WebClock`] uses the `web-time` crate,
//! which maps to `std::time::Instant` on native targets and
//! `performance.now()` on WASM.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: opacity mask.
    pub mask: StageDiagnostics,
    /// Stage 2: outer contour extraction.
    pub boundary: StageDiagnostics,
    /// Stage 3: contour simplification.
    pub simplify: StageDiagnostics,
    /// Stage 4: interior seeding.
    pub seed: StageDiagnostics,
    /// Stage 5: triangulation and minimum-area filter.
    pub triangulate: StageDiagnostics,
    /// Stage 6: UVs, edge classification, and topology checks.
    pub finish: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts for the whole run.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Opacity mask metrics.
    Mask {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Blur kernel actually applied (after odd coercion).
        blur_kernel_size: u32,
        /// Pixels that passed both thresholds.
        foreground_pixel_count: u64,
        /// Total pixel count.
        total_pixel_count: u64,
    },
    /// Boundary extraction metrics.
    Boundary {
        /// Top-level outer contours traced, before the noise filter.
        contour_count: usize,
        /// Points in the selected contour.
        point_count: usize,
        /// Area enclosed by the selected contour, in square pixels.
        area: f64,
    },
    /// Contour simplification metrics.
    Simplify {
        /// Base tolerance in pixels.
        tolerance: f64,
        /// Points before simplification.
        points_before: usize,
        /// Points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Interior seeding metrics.
    Seed {
        /// Seed spacing in pixels, `None` when seeding was disabled.
        spacing: Option<f64>,
        /// Seeds placed.
        seed_count: usize,
    },
    /// Triangulation metrics.
    Triangulate {
        /// Vertices in the triangulation.
        vertex_count: usize,
        /// Triangles in the triangulation.
        triangle_count: usize,
        /// Seeds that could not be inserted.
        skipped_seeds: usize,
        /// Vertices removed by the minimum-area filter.
        collapsed_vertices: usize,
    },
    /// Mesh finishing metrics.
    Finish {
        /// Edges used by one triangle.
        boundary_edge_count: usize,
        /// Edges shared by two triangles.
        interior_edge_count: usize,
        /// Area of the smallest triangle, in square pixels.
        smallest_triangle_area: f64,
    },
}

/// High-level summary counts for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Vertices in the final mesh.
    pub vertex_count: usize,
    /// Triangles in the final mesh.
    pub triangle_count: usize,
}

impl PipelineDiagnostics {
    /// Per-stage diagnostics in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Mask", &self.mask),
            ("Boundary", &self.boundary),
            ("Simplify", &self.simplify),
            ("Seed", &self.seed),
            ("Triangulate", &self.triangulate),
            ("Finish", &self.finish),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Mesh Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Vertices: {}  |  Triangles: {}",
            self.summary.vertex_count, self.summary.triangle_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Mask {
            width,
            height,
            blur_kernel_size,
            foreground_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixel_count > 0 {
                *foreground_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "{width}x{height} kernel={blur_kernel_size} opaque={foreground_pixel_count} ({coverage:.1}%)",
            )
        }
        StageMetrics::Boundary {
            contour_count,
            point_count,
            area,
        } => format!("{contour_count} contours, kept {point_count} pts enclosing {area:.1}px²"),
        StageMetrics::Simplify {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
        } => {
            format!(
                "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
                reduction_ratio * 100.0,
            )
        }
        StageMetrics::Seed {
            spacing: Some(spacing),
            seed_count,
        } => format!("spacing={spacing:.2}px seeds={seed_count}"),
        StageMetrics::Seed { spacing: None, .. } => "disabled".to_owned(),
        StageMetrics::Triangulate {
            vertex_count,
            triangle_count,
            skipped_seeds,
            collapsed_vertices,
        } => format!(
            "{vertex_count} verts, {triangle_count} tris (skipped={skipped_seeds} collapsed={collapsed_vertices})",
        ),
        StageMetrics::Finish {
            boundary_edge_count,
            interior_edge_count,
            smallest_triangle_area,
        } => format!(
            "edges boundary={boundary_edge_count} interior={interior_edge_count} min_area={smallest_triangle_area:.2}px²",
        ),
    }
}

/// Reduction ratio `1 - after / before`, 0 for an empty input.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn reduction_ratio(before: usize, after: usize) -> f64 {
    if before > 0 {
        1.0 - (after as f64 / before as f64)
    } else {
        0.0
    }
}
