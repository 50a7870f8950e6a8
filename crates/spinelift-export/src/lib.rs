//! spinelift-export: Pure format serializers (sans-IO)
//!
//! Converts finished meshes into output formats: the JSON result
//! document handed back to job submitters, and an SVG wireframe preview.

pub mod json;
pub mod svg;

pub use json::{DocumentMetadata, ExportError, MeshDocument, from_json, to_json, to_json_pretty};
pub use svg::{SvgMetadata, to_svg};
