//! Integration test: mesh an in-memory sprite and export it to JSON and SVG.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{Rgba, RgbaImage};
use spinelift_mesh::{MeshParams, generate_mesh};

/// An opaque disc on a transparent background.
fn disc(size: u32, radius: f64) -> RgbaImage {
    let center = f64::from(size) / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) + 0.5 - center;
        let dy = f64::from(y) + 0.5 - center;
        if dx.hypot(dy) <= radius {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[test]
fn disc_pipeline_to_json_and_back() {
    let params = MeshParams {
        internal_vertex_density: 40,
        ..MeshParams::default()
    };
    let mesh = generate_mesh(&disc(120, 45.0), &params).expect("pipeline should succeed");

    let text = spinelift_export::to_json(&mesh, &params).unwrap();
    let document = spinelift_export::from_json(&text).unwrap();

    assert_eq!(document.metadata.parameters, params);
    assert_eq!(document.metadata.width, 120);
    assert_eq!(document.vertices.len(), mesh.vertices.len());
    assert_eq!(document.uvs.len(), document.vertices.len());

    // Bounds cover the whole image even though the disc sits inside it.
    assert!(document.bounds.x.abs() < f64::EPSILON);
    assert!(document.bounds.y.abs() < f64::EPSILON);
    assert!((document.bounds.width - 120.0).abs() < f64::EPSILON);
    assert!((document.bounds.height - 120.0).abs() < f64::EPSILON);
    assert!(mesh.bounds().unwrap().width < document.bounds.width);

    let restored = document.into_mesh().unwrap();
    assert_eq!(restored.triangles, mesh.triangles);
    assert_eq!(restored.boundary_edges, mesh.boundary_edges);
    assert_eq!(restored.interior_edges, mesh.interior_edges);
    assert_eq!(restored.metadata, mesh.metadata);
    for (a, b) in restored.vertices.iter().zip(&mesh.vertices) {
        assert!(a.distance(*b) < 1e-9);
    }
}

#[test]
fn disc_pipeline_to_svg() {
    let params = MeshParams::default();
    let mesh = generate_mesh(&disc(80, 30.0), &params).expect("pipeline should succeed");
    let params_json = serde_json::to_string(&params).unwrap();

    let svg = spinelift_export::to_svg(
        &mesh,
        &spinelift_export::SvgMetadata {
            title: Some("disc"),
            description: None,
            params_json: Some(&params_json),
        },
        true,
    );

    assert!(svg.contains("<svg"));
    assert!(svg.contains(r#"id="boundary""#));
    assert!(svg.contains(r#"viewBox="0 0 80 80""#));
    assert_eq!(svg.matches("<circle").count(), mesh.vertices.len());
    assert!(svg.contains("</svg>"));
}
