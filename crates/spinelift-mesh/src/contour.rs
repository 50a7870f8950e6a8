//! Boundary extraction: trace the outer contours of the opacity mask and
//! keep the largest one.
//!
//! Uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]. Only top-level outer borders
//! are considered; holes and shapes nested inside holes are ignored.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::{Contour, MeshError, Point};

/// Every top-level outer contour of the mask, in discovery order.
///
/// The mask is padded by one background pixel before tracing so shapes
/// touching the image edge still produce a closed outer border. Points
/// are pixel centres in the original (unpadded) coordinate system.
#[must_use = "returns the traced contours"]
pub fn trace_outer_contours(mask: &GrayImage) -> Vec<Contour> {
    let (w, h) = mask.dimensions();
    let mut padded = GrayImage::new(w + 2, h + 2);
    image::imageops::replace(&mut padded, mask, 1, 1);

    let contours: Vec<imageproc::contours::Contour<i32>> =
        imageproc::contours::find_contours(&padded);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x - 1), f64::from(p.y - 1)))
                .collect();
            Contour::new(points)
        })
        .collect()
}

/// Pick the contour with the largest enclosed area.
///
/// Contours enclosing less than `min_contour_area` square pixels are
/// discarded as noise. When several contours share the maximum area the
/// first one in `contours` wins.
///
/// # Errors
///
/// Returns [`MeshError::NoContourFound`] when every contour is below the
/// noise floor (or there are none).
pub fn select_largest(contours: Vec<Contour>, min_contour_area: f64) -> Result<Contour, MeshError> {
    let total = contours.len();
    let mut best: Option<(f64, Contour)> = None;

    for contour in contours {
        let area = contour.area();
        if area < min_contour_area {
            continue;
        }
        if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
            best = Some((area, contour));
        }
    }

    match best {
        Some((area, contour)) => {
            tracing::debug!(
                candidates = total,
                area,
                points = contour.len(),
                "selected outer contour"
            );
            Ok(contour)
        }
        None => Err(MeshError::NoContourFound {
            min_contour_area,
            discarded: total,
        }),
    }
}

/// Trace the mask and return its largest outer contour.
///
/// # Errors
///
/// Returns [`MeshError::NoContourFound`] as described in
/// [`select_largest`].
pub fn extract_boundary(mask: &GrayImage, min_contour_area: f64) -> Result<Contour, MeshError> {
    select_largest(trace_outer_contours(mask), min_contour_area)
}
