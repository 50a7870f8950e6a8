//! SVG wireframe preview.
//!
//! Draws a finished mesh in image pixel space using the [`svg`] crate
//! for document construction, XML escaping, and path data formatting:
//! interior edges as one thin grey path, the boundary loop as a closed
//! black path, and optionally a dot per vertex.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements so
//! previews of different images and parameter sets can be told apart.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Title};
use svg::node::{Node, Text};

use spinelift_mesh::{Edge, Mesh, Point};

/// Radius of the vertex markers, in pixels.
const VERTEX_RADIUS: f64 = 1.5;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`, typically the source image file stem.
    pub title: Option<&'a str>,

    /// Emitted as `<desc>`, typically a one-line parameter summary.
    pub description: Option<&'a str>,

    /// Serialized [`MeshParams`](spinelift_mesh::MeshParams), emitted
    /// inside `<metadata>` so a preview records how it was produced.
    pub params_json: Option<&'a str>,
}

fn edge_path_data(vertices: &[Point], edges: &[Edge]) -> Data {
    edges.iter().fold(Data::new(), |data, &[a, b]| {
        let (a, b) = (vertices[a], vertices[b]);
        data.move_to((a.x, a.y)).line_to((b.x, b.y))
    })
}

fn loop_path_data(points: &[Point]) -> Option<Data> {
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let data = rest
        .iter()
        .fold(Data::new().move_to((first.x, first.y)), |data, p| {
            data.line_to((p.x, p.y))
        });
    Some(data.close())
}

/// Render `mesh` as an SVG wireframe.
///
/// The document is `width` by `height` pixels with a matching
/// `viewBox`, so coordinates are the mesh's own pixel coordinates.
/// Vertex markers are drawn only when `show_vertices` is set.
#[must_use]
pub fn to_svg(mesh: &Mesh, metadata: &SvgMetadata<'_>, show_vertices: bool) -> String {
    let (w, h) = (mesh.metadata.width, mesh.metadata.height);
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(params_json) = metadata.params_json {
        let mut params_el = Element::new("spinelift:params");
        params_el.assign("xmlns:spinelift", "urn:spinelift:params");
        params_el.append(Text::new(params_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(params_el);
        doc = doc.add(metadata_el);
    }

    if !mesh.interior_edges.is_empty() {
        let path = Path::new()
            .set("id", "interior-edges")
            .set("d", edge_path_data(&mesh.vertices, &mesh.interior_edges))
            .set("fill", "none")
            .set("stroke", "grey")
            .set("stroke-width", 0.5);
        doc = doc.add(path);
    }

    if let Some(data) = loop_path_data(mesh.boundary_vertices()) {
        let path = Path::new()
            .set("id", "boundary")
            .set("d", data)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 1);
        doc = doc.add(path);
    }

    if show_vertices {
        let dots = mesh.vertices.iter().fold(
            Group::new().set("id", "vertices").set("fill", "red"),
            |group, p| {
                group.add(
                    Circle::new()
                        .set("cx", p.x)
                        .set("cy", p.y)
                        .set("r", VERTEX_RADIUS),
                )
            },
        );
        doc = doc.add(dots);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spinelift_mesh::{MeshMetadata, Uv};

    use super::*;

    fn square() -> Mesh {
        Mesh {
            vertices: vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 9.0),
                Point::new(9.0, 9.0),
                Point::new(9.0, 0.0),
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            uvs: vec![Uv { u: 0.0, v: 0.0 }; 4],
            boundary_edges: vec![[0, 1], [0, 3], [1, 2], [2, 3]],
            interior_edges: vec![[0, 2]],
            metadata: MeshMetadata {
                width: 10,
                height: 12,
                vertex_count: 4,
                triangle_count: 2,
                boundary_vertex_count: 4,
            },
        }
    }

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    #[test]
    fn document_is_in_pixel_space() {
        let svg = to_svg(&square(), &no_meta(), false);
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"width="10""#));
        assert!(svg.contains(r#"height="12""#));
        assert!(svg.contains(r#"viewBox="0 0 10 12""#));
    }

    #[test]
    fn interior_edges_are_one_path() {
        let svg = to_svg(&square(), &no_meta(), false);
        assert!(svg.contains(r#"id="interior-edges""#));
        assert!(svg.contains(r#"d="M0,0 L9,9""#));
    }

    #[test]
    fn boundary_is_a_closed_loop_in_vertex_order() {
        let svg = to_svg(&square(), &no_meta(), false);
        assert!(svg.contains(r#"id="boundary""#));
        assert!(svg.contains(r#"d="M0,0 L0,9 L9,9 L9,0 "#));
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn mesh_without_interior_edges_has_only_the_boundary() {
        let mut mesh = square();
        mesh.interior_edges.clear();
        let svg = to_svg(&mesh, &no_meta(), false);
        assert!(!svg.contains("interior-edges"));
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn vertices_drawn_only_on_request() {
        let hidden = to_svg(&square(), &no_meta(), false);
        assert!(!hidden.contains("<circle"));
        let shown = to_svg(&square(), &no_meta(), true);
        assert_eq!(shown.matches("<circle").count(), 4);
        assert!(shown.contains(r#"id="vertices""#));
    }

    #[test]
    fn title_and_desc_come_before_paths() {
        let meta = SvgMetadata {
            title: Some("sprite"),
            description: Some("detail=0.01"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&square(), &meta, false);
        let title_pos = svg.find("<title>sprite</title>").unwrap();
        let desc_pos = svg.find("<desc>detail=0.01</desc>").unwrap();
        let path_pos = svg.find("<path").unwrap();
        assert!(title_pos < desc_pos);
        assert!(desc_pos < path_pos);
    }

    #[test]
    fn title_and_desc_omitted_when_none() {
        let svg = to_svg(&square(), &no_meta(), false);
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<desc>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn special_characters_in_title_are_escaped() {
        let meta = SvgMetadata {
            title: Some("A <B> & C"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&square(), &meta, false);
        assert!(svg.contains("<title>A &lt;B&gt; &amp; C</title>"));
    }

    #[test]
    fn params_json_is_embedded_in_metadata() {
        let meta = SvgMetadata {
            params_json: Some(r#"{"min_triangle_area":8.0}"#),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&square(), &meta, false);
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains(r#"<spinelift:params xmlns:spinelift="urn:spinelift:params">"#));
        assert!(svg.contains("min_triangle_area"));
    }
}
