//! End-to-end properties of mesh generation on synthetic images.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeSet;
use std::sync::Mutex;

use image::Rgba;
use spinelift_mesh::finish::point_for;
use spinelift_mesh::{
    CancellationFlag, Dimensions, Mesh, MeshError, MeshParams, ProgressEvent, RgbaImage,
    RunOptions, Stage, generate_mesh, generate_mesh_with,
};

fn opaque(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]))
}

/// Opaque disc of `radius` centred in a `size` x `size` transparent
/// canvas.
fn disc(size: u32, radius: f64) -> RgbaImage {
    let centre = f64::from(size) / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) + 0.5 - centre;
        let dy = f64::from(y) + 0.5 - centre;
        if dx.hypot(dy) <= radius {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// A "U" shape: a block with a deep notch cut from the top.
fn u_shape() -> RgbaImage {
    RgbaImage::from_fn(120, 100, |x, y| {
        let block = (10..110).contains(&x) && (10..90).contains(&y);
        let notch = (45..75).contains(&x) && y < 70;
        if block && !notch {
            Rgba([0, 0, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn with_density(density: u8) -> MeshParams {
    MeshParams {
        internal_vertex_density: density,
        ..MeshParams::default()
    }
}

/// Record every progress event delivered during a run.
fn run_recording(
    image: &RgbaImage,
    params: &MeshParams,
    cancel: Option<&CancellationFlag>,
) -> (Result<Mesh, MeshError>, Vec<ProgressEvent>) {
    let events = Mutex::new(Vec::new());
    let sink = |e: &ProgressEvent| events.lock().unwrap().push(e.clone());
    let mut options = RunOptions::default().with_progress(&sink);
    if let Some(flag) = cancel {
        options = options.with_cancel(flag);
    }
    let result = generate_mesh_with(image, params, &options);
    (result, events.into_inner().unwrap())
}

fn assert_well_formed(mesh: &Mesh, min_area: f64) {
    let n = mesh.vertices.len();
    assert_eq!(mesh.uvs.len(), n);
    assert_eq!(mesh.metadata.vertex_count, n);
    assert_eq!(mesh.metadata.triangle_count, mesh.triangles.len());

    for &t in &mesh.triangles {
        assert!(t.iter().all(|&v| v < n), "triangle {t:?} out of range");
        let area = mesh.triangle_area(t);
        assert!(
            area >= min_area,
            "triangle {t:?} has area {area} below {min_area}"
        );
    }

    let boundary: BTreeSet<[usize; 2]> = mesh.boundary_edges.iter().copied().collect();
    let interior: BTreeSet<[usize; 2]> = mesh.interior_edges.iter().copied().collect();
    assert!(boundary.is_disjoint(&interior));

    let mut from_triangles = BTreeSet::new();
    for &[a, b, c] in &mesh.triangles {
        for (p, q) in [(a, b), (b, c), (c, a)] {
            let edge = [p.min(q), p.max(q)];
            assert!(
                boundary.contains(&edge) != interior.contains(&edge),
                "edge {edge:?} must be in exactly one set"
            );
            from_triangles.insert(edge);
        }
    }
    let classified: BTreeSet<[usize; 2]> = boundary.union(&interior).copied().collect();
    assert_eq!(from_triangles, classified);

    for uv in &mesh.uvs {
        assert!((0.0..=1.0).contains(&uv.u) && (0.0..=1.0).contains(&uv.v));
    }
}

// --- boundary-only meshes ---

#[test]
fn opaque_square_is_two_triangles() {
    let mesh = generate_mesh(&opaque(512, 512), &MeshParams::default()).unwrap();
    assert_eq!(mesh.metadata.vertex_count, 4);
    assert_eq!(mesh.metadata.boundary_vertex_count, 4);
    assert_eq!(mesh.metadata.triangle_count, 2);
    assert_well_formed(&mesh, 1.0);

    let bounds = mesh.bounds().unwrap();
    assert!(bounds.x.abs() <= 1.0 && bounds.y.abs() <= 1.0);
    assert!((bounds.width - 511.0).abs() <= 1.0);
    assert!((bounds.height - 511.0).abs() <= 1.0);
}

#[test]
fn opaque_rectangle_covers_image() {
    for params in [
        MeshParams::default(),
        MeshParams {
            detail_factor: 0.05,
            concave_factor: 100.0,
            blur_kernel_size: 7,
            min_triangle_area: 50.0,
            ..MeshParams::default()
        },
    ] {
        let mesh = generate_mesh(&opaque(300, 120), &params).unwrap();
        assert_eq!(mesh.metadata.boundary_vertex_count, 4);
        let bounds = mesh.bounds().unwrap();
        assert!(bounds.width >= 297.0, "width {}", bounds.width);
        assert!(bounds.height >= 117.0, "height {}", bounds.height);
    }
}

#[test]
fn transparent_image_fails_at_mask() {
    let (result, events) = run_recording(&RgbaImage::new(64, 64), &MeshParams::default(), None);
    let err = result.unwrap_err();
    assert!(matches!(err, MeshError::EmptyMask { .. }));
    assert_eq!(err.stage(), Stage::Mask);
    assert!(events.is_empty());
}

#[test]
fn speck_below_noise_floor_fails_at_boundary() {
    let image = RgbaImage::from_fn(64, 64, |x, y| {
        if (30..33).contains(&x) && (30..33).contains(&y) {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let (result, events) = run_recording(&image, &MeshParams::default(), None);
    assert!(matches!(
        result.unwrap_err(),
        MeshError::NoContourFound { discarded: 1, .. }
    ));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].stage, Stage::Mask);
}

// --- parameters ---

#[test]
fn invalid_parameter_rejected_before_any_stage() {
    let params = MeshParams {
        min_triangle_area: 0.0,
        ..MeshParams::default()
    };
    let (result, events) = run_recording(&opaque(32, 32), &params, None);
    match result.unwrap_err() {
        MeshError::InvalidParameter { name, .. } => assert_eq!(name, "min_triangle_area"),
        other => panic!("unexpected error {other}"),
    }
    assert!(events.is_empty());
}

#[test]
fn even_blur_kernel_matches_next_odd() {
    let image = disc(100, 35.0);
    let even = MeshParams {
        blur_kernel_size: 4,
        ..with_density(30)
    };
    let odd = MeshParams {
        blur_kernel_size: 5,
        ..with_density(30)
    };
    assert_eq!(
        generate_mesh(&image, &even).unwrap(),
        generate_mesh(&image, &odd).unwrap()
    );
}

#[test]
fn map_parameters_drive_the_pipeline() {
    let mut map = with_density(40).to_map();
    map.insert("priority".into(), serde_json::json!("high"));
    let params = MeshParams::from_map(&map).unwrap();
    assert_eq!(params, with_density(40));
    generate_mesh(&disc(80, 30.0), &params).unwrap();

    map.remove("binary_threshold");
    assert!(matches!(
        MeshParams::from_map(&map),
        Err(MeshError::InvalidParameter { .. })
    ));
}

// --- interior seeding and triangle quality ---

#[test]
fn output_is_deterministic() {
    let image = disc(100, 40.0);
    let params = with_density(50);
    assert_eq!(
        generate_mesh(&image, &params).unwrap(),
        generate_mesh(&image, &params).unwrap()
    );
}

#[test]
fn density_adds_interior_vertices() {
    let image = disc(100, 40.0);
    let sparse = generate_mesh(&image, &with_density(0)).unwrap();
    let dense = generate_mesh(&image, &with_density(50)).unwrap();
    assert_eq!(
        sparse.metadata.vertex_count,
        sparse.metadata.boundary_vertex_count
    );
    assert!(dense.metadata.vertex_count > sparse.metadata.vertex_count);
    assert_well_formed(&sparse, 1.0);
    assert_well_formed(&dense, 1.0);
}

#[test]
fn triangles_respect_minimum_area() {
    let image = disc(120, 50.0);
    for min_triangle_area in [0.5, 4.0, 25.0] {
        let params = MeshParams {
            min_triangle_area,
            ..with_density(80)
        };
        let mesh = generate_mesh(&image, &params).unwrap();
        assert_well_formed(&mesh, min_triangle_area);
    }
}

#[test]
fn finely_detailed_boundary_meets_minimum_area() {
    // A small detail factor keeps hundreds of boundary vertices, so
    // consecutive boundary vertices span slivers far below the minimum.
    let image = disc(400, 150.0);
    for min_triangle_area in [10.0, 50.0, 100.0] {
        let params = MeshParams {
            internal_vertex_density: 0,
            detail_factor: 0.001,
            min_triangle_area,
            ..MeshParams::default()
        };
        let mesh = generate_mesh(&image, &params)
            .unwrap_or_else(|e| panic!("min area {min_triangle_area}: {e}"));
        assert_well_formed(&mesh, min_triangle_area);
        assert!(mesh.metadata.boundary_vertex_count >= 3);
    }
}

#[test]
fn dense_seeds_with_large_minimum_area() {
    let params = MeshParams {
        internal_vertex_density: 100,
        detail_factor: 0.001,
        min_triangle_area: 100.0,
        ..MeshParams::default()
    };
    let mesh = generate_mesh(&disc(400, 150.0), &params).unwrap();
    assert_well_formed(&mesh, 100.0);
    assert!(mesh.vertices.len() > mesh.metadata.boundary_vertex_count);
}

#[test]
fn unreachable_minimum_area_fails() {
    // An 8x8 block encloses 49 px² between pixel centres.
    let image = RgbaImage::from_fn(32, 32, |x, y| {
        if (12..20).contains(&x) && (12..20).contains(&y) {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let params = MeshParams {
        min_triangle_area: 100.0,
        ..MeshParams::default()
    };
    let err = generate_mesh(&image, &params).unwrap_err();
    assert!(matches!(err, MeshError::Triangulation(_)));
    assert_eq!(err.stage(), Stage::Triangulate);
}

#[test]
fn concave_shape_keeps_its_notch() {
    let params = MeshParams {
        concave_factor: 100.0,
        ..with_density(20)
    };
    let mesh = generate_mesh(&u_shape(), &params).unwrap();
    assert_well_formed(&mesh, params.min_triangle_area);

    // No triangle may cover the notch.
    for &t in &mesh.triangles {
        let [a, b, c] = t.map(|i| mesh.vertices[i]);
        let cx = (a.x + b.x + c.x) / 3.0;
        let cy = (a.y + b.y + c.y) / 3.0;
        assert!(
            !((46.0..74.0).contains(&cx) && cy < 68.0),
            "triangle {t:?} covers the notch"
        );
    }
}

#[test]
fn uv_round_trip_recovers_vertices() {
    let image = disc(90, 30.0);
    let mesh = generate_mesh(&image, &with_density(60)).unwrap();
    let dims = Dimensions {
        width: 90,
        height: 90,
    };
    for (vertex, uv) in mesh.vertices.iter().zip(&mesh.uvs) {
        let back = point_for(*uv, dims);
        assert!(back.distance(*vertex) < 1e-9);
    }
}

#[test]
fn boundary_vertices_come_first() {
    let mesh = generate_mesh(&disc(100, 40.0), &with_density(50)).unwrap();
    let b = mesh.metadata.boundary_vertex_count;
    let on_boundary: BTreeSet<usize> = mesh.boundary_edges.iter().flatten().copied().collect();
    assert_eq!(on_boundary, (0..b).collect());
}

// --- progress and cancellation ---

#[test]
fn progress_strictly_increases_to_completion() {
    let (result, events) = run_recording(&disc(64, 25.0), &with_density(30), None);
    result.unwrap();
    let stages: Vec<Stage> = events.iter().map(|e| e.stage).collect();
    assert_eq!(stages, Stage::ALL.to_vec());
    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert_eq!(percents, vec![10, 20, 30, 50, 70, 100]);
    assert!(events.iter().all(|e| !e.message.is_empty()));
}

#[test]
fn cancelled_before_start() {
    let flag = CancellationFlag::new();
    flag.cancel();
    let (result, events) = run_recording(&opaque(32, 32), &MeshParams::default(), Some(&flag));
    assert_eq!(
        result.unwrap_err(),
        MeshError::Cancelled { stage: Stage::Mask }
    );
    assert!(events.is_empty());
}

#[test]
fn cancelled_between_stages() {
    let flag = CancellationFlag::new();
    let events = Mutex::new(Vec::new());
    let sink = |e: &ProgressEvent| {
        events.lock().unwrap().push(e.stage);
        if e.stage == Stage::Boundary {
            flag.cancel();
        }
    };
    let options = RunOptions::default()
        .with_progress(&sink)
        .with_cancel(&flag);
    let err = generate_mesh_with(&opaque(40, 40), &MeshParams::default(), &options).unwrap_err();
    assert_eq!(
        err,
        MeshError::Cancelled {
            stage: Stage::Simplify
        }
    );
    assert_eq!(
        events.into_inner().unwrap(),
        vec![Stage::Mask, Stage::Boundary]
    );
}

#[test]
fn parallel_runs_are_independent() {
    let image = disc(100, 40.0);
    let params = with_density(50);
    let expected = generate_mesh(&image, &params).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| generate_mesh(&image, &params).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
