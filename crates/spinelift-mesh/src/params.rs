//! Mesh generation parameters: defaults, ranges, validation, and the
//! flat key/value wire format used by job submitters.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::MeshError;

/// The nine knobs that control mesh generation.
///
/// Every field is required; [`Default`] provides the values the service
/// has always shipped with, but the pipeline itself never fills in
/// missing values. Call [`validate`](Self::validate) (the pipeline does
/// this on entry) to range-check a hand-built value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshParams {
    /// Simplification tolerance as a fraction of the image diagonal.
    pub detail_factor: f64,

    /// Pixels with alpha strictly above this value count as opaque.
    pub alpha_threshold: u8,

    /// Concavity preservation strength (0 disables it).
    pub concave_factor: f64,

    /// Interior vertex density, 0 to 100. Zero means boundary-only.
    pub internal_vertex_density: u8,

    /// Box blur kernel size. Even values are bumped to the next odd
    /// value; 1 disables blurring.
    pub blur_kernel_size: u32,

    /// Threshold applied to the blurred alpha channel.
    pub binary_threshold: u8,

    /// Outer contours enclosing less than this many square pixels are
    /// treated as noise.
    pub min_contour_area: f64,

    /// Divides the contour's bounding area when deriving interior seed
    /// spacing.
    pub density_scaling_factor: f64,

    /// Triangles smaller than this many square pixels are removed.
    pub min_triangle_area: f64,
}

impl MeshParams {
    /// Default simplification tolerance fraction.
    pub const DEFAULT_DETAIL_FACTOR: f64 = 0.01;
    /// Default alpha threshold.
    pub const DEFAULT_ALPHA_THRESHOLD: u8 = 10;
    /// Default concavity preservation.
    pub const DEFAULT_CONCAVE_FACTOR: f64 = 0.0;
    /// Default interior density (boundary-only meshes).
    pub const DEFAULT_INTERNAL_VERTEX_DENSITY: u8 = 0;
    /// Default blur kernel (no blur).
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 1;
    /// Default binary threshold.
    pub const DEFAULT_BINARY_THRESHOLD: u8 = 128;
    /// Default noise floor for contours.
    pub const DEFAULT_MIN_CONTOUR_AREA: f64 = 10.0;
    /// Default seed spacing scale.
    pub const DEFAULT_DENSITY_SCALING_FACTOR: f64 = 1000.0;
    /// Default minimum triangle area.
    pub const DEFAULT_MIN_TRIANGLE_AREA: f64 = 1.0;

    /// Accepted range for [`detail_factor`](Self::detail_factor).
    pub const DETAIL_FACTOR_RANGE: RangeInclusive<f64> = 0.001..=0.050;
    /// Accepted range for [`concave_factor`](Self::concave_factor).
    pub const CONCAVE_FACTOR_RANGE: RangeInclusive<f64> = 0.0..=100.0;
    /// Accepted range for
    /// [`internal_vertex_density`](Self::internal_vertex_density).
    pub const INTERNAL_VERTEX_DENSITY_RANGE: RangeInclusive<u8> = 0..=100;
    /// Accepted range for [`blur_kernel_size`](Self::blur_kernel_size).
    pub const BLUR_KERNEL_SIZE_RANGE: RangeInclusive<u32> = 1..=21;
    /// Accepted range for [`min_contour_area`](Self::min_contour_area).
    pub const MIN_CONTOUR_AREA_RANGE: RangeInclusive<f64> = 1.0..=1000.0;
    /// Accepted range for
    /// [`density_scaling_factor`](Self::density_scaling_factor).
    pub const DENSITY_SCALING_FACTOR_RANGE: RangeInclusive<f64> = 100.0..=10_000.0;
    /// Accepted range for [`min_triangle_area`](Self::min_triangle_area).
    pub const MIN_TRIANGLE_AREA_RANGE: RangeInclusive<f64> = 0.1..=100.0;

    /// Wire names of every parameter, in documentation order.
    pub const NAMES: [&str; 9] = [
        "detail_factor",
        "alpha_threshold",
        "concave_factor",
        "internal_vertex_density",
        "blur_kernel_size",
        "binary_threshold",
        "min_contour_area",
        "density_scaling_factor",
        "min_triangle_area",
    ];

    /// Check every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidParameter`] naming the first field that
    /// is non-finite or out of range.
    pub fn validate(&self) -> Result<(), MeshError> {
        check_float("detail_factor", self.detail_factor, &Self::DETAIL_FACTOR_RANGE)?;
        check_float("concave_factor", self.concave_factor, &Self::CONCAVE_FACTOR_RANGE)?;
        check_int(
            "internal_vertex_density",
            self.internal_vertex_density,
            &Self::INTERNAL_VERTEX_DENSITY_RANGE,
        )?;
        check_int(
            "blur_kernel_size",
            self.blur_kernel_size,
            &Self::BLUR_KERNEL_SIZE_RANGE,
        )?;
        check_float(
            "min_contour_area",
            self.min_contour_area,
            &Self::MIN_CONTOUR_AREA_RANGE,
        )?;
        check_float(
            "density_scaling_factor",
            self.density_scaling_factor,
            &Self::DENSITY_SCALING_FACTOR_RANGE,
        )?;
        check_float(
            "min_triangle_area",
            self.min_triangle_area,
            &Self::MIN_TRIANGLE_AREA_RANGE,
        )?;
        Ok(())
    }

    /// The kernel size actually used for blurring: the next odd value at
    /// or above [`blur_kernel_size`](Self::blur_kernel_size).
    #[must_use]
    pub const fn effective_blur_kernel_size(&self) -> u32 {
        self.blur_kernel_size | 1
    }

    /// Build parameters from a flat key/value map as sent by job
    /// submitters.
    ///
    /// Every parameter must be present. Integer parameters must hold JSON
    /// integers; float parameters accept any JSON number. Keys that are
    /// not parameters are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidParameter`] for a missing key, a value
    /// of the wrong type, or a value out of range.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, MeshError> {
        for key in map.keys() {
            if !Self::NAMES.contains(&key.as_str()) {
                tracing::warn!(parameter = %key, "ignoring unknown mesh parameter");
            }
        }

        let params = Self {
            detail_factor: float_field(map, "detail_factor")?,
            alpha_threshold: int_field(map, "alpha_threshold")?,
            concave_factor: float_field(map, "concave_factor")?,
            internal_vertex_density: int_field(map, "internal_vertex_density")?,
            blur_kernel_size: int_field(map, "blur_kernel_size")?,
            binary_threshold: int_field(map, "binary_threshold")?,
            min_contour_area: float_field(map, "min_contour_area")?,
            density_scaling_factor: float_field(map, "density_scaling_factor")?,
            min_triangle_area: float_field(map, "min_triangle_area")?,
        };
        params.validate()?;
        Ok(params)
    }

    /// The inverse of [`from_map`](Self::from_map).
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("detail_factor".into(), self.detail_factor.into());
        map.insert("alpha_threshold".into(), self.alpha_threshold.into());
        map.insert("concave_factor".into(), self.concave_factor.into());
        map.insert(
            "internal_vertex_density".into(),
            self.internal_vertex_density.into(),
        );
        map.insert("blur_kernel_size".into(), self.blur_kernel_size.into());
        map.insert("binary_threshold".into(), self.binary_threshold.into());
        map.insert("min_contour_area".into(), self.min_contour_area.into());
        map.insert(
            "density_scaling_factor".into(),
            self.density_scaling_factor.into(),
        );
        map.insert("min_triangle_area".into(), self.min_triangle_area.into());
        map
    }
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            detail_factor: Self::DEFAULT_DETAIL_FACTOR,
            alpha_threshold: Self::DEFAULT_ALPHA_THRESHOLD,
            concave_factor: Self::DEFAULT_CONCAVE_FACTOR,
            internal_vertex_density: Self::DEFAULT_INTERNAL_VERTEX_DENSITY,
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            binary_threshold: Self::DEFAULT_BINARY_THRESHOLD,
            min_contour_area: Self::DEFAULT_MIN_CONTOUR_AREA,
            density_scaling_factor: Self::DEFAULT_DENSITY_SCALING_FACTOR,
            min_triangle_area: Self::DEFAULT_MIN_TRIANGLE_AREA,
        }
    }
}

fn check_float(name: &str, value: f64, range: &RangeInclusive<f64>) -> Result<(), MeshError> {
    if !value.is_finite() {
        return Err(MeshError::invalid_parameter(name, "must be a finite number"));
    }
    if !range.contains(&value) {
        return Err(MeshError::invalid_parameter(
            name,
            format!(
                "{value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        ));
    }
    Ok(())
}

fn check_int<T>(name: &str, value: T, range: &RangeInclusive<T>) -> Result<(), MeshError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(MeshError::invalid_parameter(
            name,
            format!(
                "{value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        ))
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, name: &str) -> Result<&'a Value, MeshError> {
    map.get(name)
        .ok_or_else(|| MeshError::invalid_parameter(name, "missing"))
}

fn float_field(map: &Map<String, Value>, name: &str) -> Result<f64, MeshError> {
    let value = lookup(map, name)?;
    value.as_f64().ok_or_else(|| {
        MeshError::invalid_parameter(name, format!("expected a number, got {}", kind(value)))
    })
}

fn int_field<T: TryFrom<u64>>(map: &Map<String, Value>, name: &str) -> Result<T, MeshError> {
    let value = lookup(map, name)?;
    let raw = value.as_u64().ok_or_else(|| {
        MeshError::invalid_parameter(
            name,
            format!("expected a non-negative integer, got {}", kind(value)),
        )
    })?;
    T::try_from(raw)
        .map_err(|_| MeshError::invalid_parameter(name, format!("{raw} is too large")))
}

/// Short description of a JSON value's type for error messages.
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a fractional number",
        Value::Number(_) => "a negative integer",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
