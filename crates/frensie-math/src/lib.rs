#![warn(missing_docs)]

//! Math types for the FRENSIE geometry layer.
//!
//! Thin wrappers around nalgebra plus the handful of direction helpers the
//! ray-tracing code needs: unit-vector checks, specular reflection and
//! tolerance constants for boundary handling.

use nalgebra::{Unit, Vector3};

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Distance below which a point is considered to lie on a boundary (cm).
    pub boundary: f64,
    /// Allowed deviation of a direction's norm from one.
    pub unit_norm: f64,
}

impl Tolerance {
    /// Default tracking tolerances (1e-5 cm boundary, 1e-10 norm deviation).
    pub const DEFAULT: Self = Self {
        boundary: 1e-5,
        unit_norm: 1e-10,
    };

    /// Check if a scalar distance is effectively zero.
    pub fn is_on_boundary(&self, d: f64) -> bool {
        d.abs() < self.boundary
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Convert a raw triple into a nalgebra vector.
#[inline]
pub fn to_vec3(v: &[f64; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// Convert a nalgebra vector back into a raw triple.
#[inline]
pub fn to_array(v: &Vec3) -> [f64; 3] {
    [v.x, v.y, v.z]
}

/// Check that a direction has unit length.
pub fn is_unit_vector(direction: &[f64; 3]) -> bool {
    let norm_sq = direction[0] * direction[0]
        + direction[1] * direction[1]
        + direction[2] * direction[2];

    (norm_sq.sqrt() - 1.0).abs() < Tolerance::DEFAULT.unit_norm
}

/// Normalize a direction, returning `None` for the zero vector.
pub fn normalize(direction: &[f64; 3]) -> Option<[f64; 3]> {
    let v = to_vec3(direction);
    let norm = v.norm();

    if norm < f64::EPSILON {
        return None;
    }

    Some(to_array(&(v / norm)))
}

/// Reflect a unit direction about a surface normal.
///
/// The result is `d - 2 (d . n) n`. The sign of `n` does not matter.
pub fn reflect_direction(direction: &[f64; 3], normal: &[f64; 3]) -> [f64; 3] {
    let d = to_vec3(direction);
    let n = Dir3::new_normalize(to_vec3(normal));
    let reflected = d - 2.0 * d.dot(&n) * n.as_ref();

    to_array(&reflected)
}

/// Format a triple as `{x,y,z}` for diagnostics.
pub fn array_to_string(data: &[f64; 3]) -> String {
    format!("{{{},{},{}}}", data[0], data[1], data[2])
}
