//! spinelift-bench: batch CLI for meshing images and collecting diagnostics.
//!
//! Runs the mesh pipeline over one or more image files with configurable
//! parameters, printing per-stage diagnostics for each. Useful for:
//!
//! - Batch-converting sprites into `<stem>.mesh.json` result documents
//! - Tuning detail, density, and minimum triangle area against real art
//! - Measuring per-stage durations to identify bottlenecks
//! - Eyeballing results through SVG wireframe previews
//!
//! Set `RUST_LOG=debug` to see per-stage progress on stderr.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin spinelift-bench -- [OPTIONS] <IMAGES>...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use clap::builder::RangedU64ValueParser;
use spinelift_export::SvgMetadata;
use spinelift_mesh::{
    CancellationFlag, Clock, Mesh, MeshParams, PipelineDiagnostics, ProgressEvent, RunOptions,
};
use tracing_subscriber::EnvFilter;

/// Batch mesh generation and diagnostics for spinelift.
///
/// Meshes each image with the given parameters and prints detailed
/// per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "spinelift-bench", version)]
struct Cli {
    /// Input images (PNG, JPEG, BMP, WebP). Transparency drives the mesh.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Simplification tolerance as a fraction of the image diagonal.
    #[arg(long, default_value_t = MeshParams::DEFAULT_DETAIL_FACTOR)]
    detail_factor: f64,

    /// Alpha a pixel must exceed to count as opaque.
    #[arg(long, default_value_t = MeshParams::DEFAULT_ALPHA_THRESHOLD)]
    alpha_threshold: u8,

    /// Boundary concavity allowance (0 disables concavity preservation).
    #[arg(long, default_value_t = MeshParams::DEFAULT_CONCAVE_FACTOR)]
    concave_factor: f64,

    /// Interior vertex density (0 disables interior seeding).
    #[arg(long, default_value_t = MeshParams::DEFAULT_INTERNAL_VERTEX_DENSITY)]
    internal_vertex_density: u8,

    /// Box blur kernel size applied to the alpha channel.
    #[arg(long, default_value_t = MeshParams::DEFAULT_BLUR_KERNEL_SIZE)]
    blur_kernel_size: u32,

    /// Threshold applied after blurring.
    #[arg(long, default_value_t = MeshParams::DEFAULT_BINARY_THRESHOLD)]
    binary_threshold: u8,

    /// Contours enclosing less area than this (pixels) are discarded.
    #[arg(long, default_value_t = MeshParams::DEFAULT_MIN_CONTOUR_AREA)]
    min_contour_area: f64,

    /// Divisor turning density into a target triangle area.
    #[arg(long, default_value_t = MeshParams::DEFAULT_DENSITY_SCALING_FACTOR)]
    density_scaling_factor: f64,

    /// Smallest triangle area allowed in the output (pixels).
    #[arg(long, default_value_t = MeshParams::DEFAULT_MIN_TRIANGLE_AREA)]
    min_triangle_area: f64,

    /// All nine parameters as a flat JSON object.
    ///
    /// When provided, the individual parameter flags are ignored. Every
    /// key must be present; unknown keys are ignored with a warning.
    #[arg(long)]
    params_json: Option<String>,

    /// Directory to write `<stem>.mesh.json` results into.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Also write `<stem>.svg` wireframe previews.
    ///
    /// Previews go into `--out-dir` when given, otherwise next to the
    /// input image.
    #[arg(long)]
    svg: bool,

    /// Draw a marker at every vertex in SVG previews.
    #[arg(long, requires = "svg")]
    show_vertices: bool,

    /// Number of runs per image for averaging.
    #[arg(long, default_value_t = 1, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Number of images meshed concurrently.
    #[arg(long, default_value_t = 1, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    jobs: usize,

    /// Cancel an image's runs once they have taken this many seconds.
    #[arg(long, value_parser = RangedU64ValueParser::<u64>::new().range(1..))]
    timeout_secs: Option<u64>,
}

/// Build [`MeshParams`] from CLI arguments.
///
/// If `--params-json` is provided it goes through the same flat-map
/// translation job submitters use, and the individual flags are ignored.
fn params_from_cli(cli: &Cli) -> Result<MeshParams, String> {
    if let Some(ref json) = cli.params_json {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| format!("Error parsing --params-json: {e}"))?;
        let map = value
            .as_object()
            .ok_or("Error in --params-json: expected a JSON object")?;
        return MeshParams::from_map(map).map_err(|e| format!("Error in --params-json: {e}"));
    }

    let params = MeshParams {
        detail_factor: cli.detail_factor,
        alpha_threshold: cli.alpha_threshold,
        concave_factor: cli.concave_factor,
        internal_vertex_density: cli.internal_vertex_density,
        blur_kernel_size: cli.blur_kernel_size,
        binary_threshold: cli.binary_threshold,
        min_contour_area: cli.min_contour_area,
        density_scaling_factor: cli.density_scaling_factor,
        min_triangle_area: cli.min_triangle_area,
    };
    params.validate().map_err(|e| e.to_string())?;
    Ok(params)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref dir) = cli.out_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Error creating {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    eprintln!("Params: {params:#?}");
    eprintln!(
        "Images: {}  Runs: {}  Jobs: {}",
        cli.images.len(),
        cli.runs,
        cli.jobs
    );
    eprintln!();

    let succeeded = run_batch(&cli, &params);
    let total = cli.images.len();
    println!("{succeeded}/{total} images processed successfully");

    if succeeded == total {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Everything produced for one image.
struct ImageOutcome {
    diagnostics: Vec<PipelineDiagnostics>,
    written: Vec<PathBuf>,
}

/// Mesh every image on up to `--jobs` worker threads, printing each
/// result as it arrives. Returns the number of images that succeeded.
fn run_batch(cli: &Cli, params: &MeshParams) -> usize {
    let next = AtomicUsize::new(0);
    let next = &next;
    let workers = cli.jobs.min(cli.images.len());
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(path) = cli.images.get(index) else {
                        break;
                    };
                    let outcome = process_image(path, params, cli);
                    if tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut succeeded = 0;
        for (index, outcome) in rx {
            let path = &cli.images[index];
            match outcome {
                Ok(outcome) => {
                    succeeded += 1;
                    print_outcome(path, &outcome, cli);
                }
                Err(msg) => eprintln!("Pipeline error: {msg}"),
            }
        }
        succeeded
    })
}

/// Decode, mesh `--runs` times under the optional watchdog, and write
/// the requested outputs.
fn process_image(path: &Path, params: &MeshParams, cli: &Cli) -> Result<ImageOutcome, String> {
    let rgba = image::open(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?
        .to_rgba8();
    tracing::info!(
        image = %path.display(),
        width = rgba.width(),
        height = rgba.height(),
        "meshing"
    );

    let cancel = CancellationFlag::new();
    let progress = |event: &ProgressEvent| {
        tracing::debug!(
            image = %path.display(),
            stage = %event.stage,
            percent = event.percent,
            "{}",
            event.message
        );
    };
    let options = RunOptions::default()
        .with_progress(&progress)
        .with_cancel(&cancel);

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let (mesh, diagnostics) = thread::scope(|scope| {
        if let Some(secs) = cli.timeout_secs {
            let cancel = &cancel;
            scope.spawn(move || {
                if matches!(
                    done_rx.recv_timeout(Duration::from_secs(secs)),
                    Err(RecvTimeoutError::Timeout)
                ) {
                    tracing::warn!(image = %path.display(), secs, "timed out; cancelling");
                    cancel.cancel();
                }
            });
        }
        let result = mesh_runs(&rgba, params, &options, cli.runs);
        drop(done_tx);
        result
    })
    .map_err(|e| format!("{}: {e}", path.display()))?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh");
    let mut written = Vec::new();

    if let Some(ref dir) = cli.out_dir {
        let target = dir.join(format!("{stem}.mesh.json"));
        let json = spinelift_export::to_json_pretty(&mesh, params).map_err(|e| e.to_string())?;
        std::fs::write(&target, json)
            .map_err(|e| format!("Error writing {}: {e}", target.display()))?;
        written.push(target);
    }

    if cli.svg {
        let dir = cli
            .out_dir
            .as_deref()
            .or_else(|| path.parent())
            .unwrap_or_else(|| Path::new("."));
        let target = dir.join(format!("{stem}.svg"));
        let params_json = serde_json::to_string(params).map_err(|e| e.to_string())?;
        let desc = format!(
            "{} vertices, {} triangles",
            mesh.metadata.vertex_count, mesh.metadata.triangle_count
        );
        let metadata = SvgMetadata {
            title: Some(stem),
            description: Some(&desc),
            params_json: Some(&params_json),
        };
        let svg = spinelift_export::to_svg(&mesh, &metadata, cli.show_vertices);
        std::fs::write(&target, svg)
            .map_err(|e| format!("Error writing {}: {e}", target.display()))?;
        written.push(target);
    }

    Ok(ImageOutcome {
        diagnostics,
        written,
    })
}

/// Run the pipeline `runs` times, keeping the last mesh.
fn mesh_runs(
    rgba: &spinelift_mesh::RgbaImage,
    params: &MeshParams,
    options: &RunOptions<'_>,
    runs: usize,
) -> Result<(Mesh, Vec<PipelineDiagnostics>), String> {
    let mut all_diagnostics = Vec::with_capacity(runs);
    let mut last = None;
    for _ in 0..runs {
        let (mesh, diagnostics) =
            spinelift_mesh::generate_mesh_with_diagnostics(rgba, params, options, &StdClock)
                .map_err(|e| e.to_string())?;
        all_diagnostics.push(diagnostics);
        last = Some(mesh);
    }
    let mesh = last.ok_or("no runs requested")?;
    Ok((mesh, all_diagnostics))
}

fn print_outcome(path: &Path, outcome: &ImageOutcome, cli: &Cli) {
    eprintln!("Image: {}", path.display());
    for (run, diagnostics) in outcome.diagnostics.iter().enumerate() {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }
        if cli.json {
            match serde_json::to_string_pretty(diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error serializing diagnostics: {e}"),
            }
        } else {
            println!("{}", diagnostics.report());
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&outcome.diagnostics);
    }

    for target in &outcome.written {
        eprintln!("Wrote {}", target.display());
    }
    eprintln!();
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (i, (name, _)) in first.stages().iter().enumerate() {
        let stage_total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[i].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = stage_total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
