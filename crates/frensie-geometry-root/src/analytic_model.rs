//! A small CSG engine: a tree of boxes, spheres and z-aligned tubes.
//!
//! Every volume except the top one is placed inside a mother volume and
//! owns the region of its shape not covered by its own daughters. Sibling
//! shapes must not overlap; this is not checked.
//!
//! # Geometry file
//!
//! ```toml
//! [[volume]]
//! name = "world"
//! material = "graveyard"
//! shape = { type = "box", half_lengths = [10.0, 10.0, 10.0] }
//!
//! [[volume]]
//! name = "core"
//! material = "uranium"
//! mother = "world"
//! shape = { type = "sphere", center = [0.0, 0.0, 1.0], radius = 2.0 }
//! ```

use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::Path;

use frensie_math::{to_array, to_vec3, Tolerance, Vec3};
use serde::Deserialize;

use crate::engine::{RootEngine, RootEngineError, RootEngineResult, RootNavigator, VolumeIndex};

/// Tolerance used by [`AnalyticModel::load`] to decide when a point lies on
/// a shape.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// An analytic solid.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    /// Axis-aligned box.
    Box {
        /// Center of the box.
        #[serde(default)]
        center: [f64; 3],
        /// Half extents along x, y and z.
        half_lengths: [f64; 3],
    },
    /// Sphere.
    Sphere {
        /// Center of the sphere.
        #[serde(default)]
        center: [f64; 3],
        /// Radius.
        radius: f64,
    },
    /// Closed cylinder with its axis along z.
    Tube {
        /// Center of the tube.
        #[serde(default)]
        center: [f64; 3],
        /// Radius.
        radius: f64,
        /// Half length along z.
        half_length: f64,
    },
}

impl Shape {
    fn is_valid(&self) -> bool {
        let positive = |x: f64| x.is_finite() && x > 0.0;

        match *self {
            Shape::Box { half_lengths, .. } => half_lengths.iter().all(|&h| positive(h)),
            Shape::Sphere { radius, .. } => positive(radius),
            Shape::Tube {
                radius,
                half_length,
                ..
            } => positive(radius) && positive(half_length),
        }
    }

    fn center(&self) -> [f64; 3] {
        match *self {
            Shape::Box { center, .. } | Shape::Sphere { center, .. } | Shape::Tube { center, .. } => {
                center
            }
        }
    }

    /// Enclosed volume.
    pub fn capacity(&self) -> f64 {
        match *self {
            Shape::Box { half_lengths: h, .. } => 8.0 * h[0] * h[1] * h[2],
            Shape::Sphere { radius, .. } => 4.0 / 3.0 * PI * radius.powi(3),
            Shape::Tube {
                radius,
                half_length,
                ..
            } => PI * radius * radius * 2.0 * half_length,
        }
    }

    /// Check if a point is inside or within `tolerance` of the shape.
    pub fn contains(&self, point: &[f64; 3], tolerance: f64) -> bool {
        let p = to_vec3(point) - to_vec3(&self.center());

        match *self {
            Shape::Box { half_lengths: h, .. } => {
                (0..3).all(|axis| p[axis].abs() <= h[axis] + tolerance)
            }
            Shape::Sphere { radius, .. } => p.norm() <= radius + tolerance,
            Shape::Tube {
                radius,
                half_length,
                ..
            } => p.xy().norm() <= radius + tolerance && p.z.abs() <= half_length + tolerance,
        }
    }

    /// Outward normals of every face the point lies on.
    fn touching_normals(&self, point: &[f64; 3], tolerance: f64) -> Vec<Vec3> {
        let p = to_vec3(point) - to_vec3(&self.center());
        let mut normals = Vec::new();

        match *self {
            Shape::Box { half_lengths: h, .. } => {
                for axis in 0..3 {
                    if (p[axis] - h[axis]).abs() <= tolerance {
                        normals.push(Vec3::ith(axis, 1.0));
                    }
                    if (p[axis] + h[axis]).abs() <= tolerance {
                        normals.push(Vec3::ith(axis, -1.0));
                    }
                }
            }
            Shape::Sphere { radius, .. } => {
                let r = p.norm();
                if (r - radius).abs() <= tolerance && r > 0.0 {
                    normals.push(p / r);
                }
            }
            Shape::Tube {
                radius,
                half_length,
                ..
            } => {
                let rho = p.xy().norm();
                if (rho - radius).abs() <= tolerance && rho > 0.0 {
                    normals.push(Vec3::new(p.x / rho, p.y / rho, 0.0));
                }
                if (p.z - half_length).abs() <= tolerance {
                    normals.push(Vec3::z());
                }
                if (p.z + half_length).abs() <= tolerance {
                    normals.push(-Vec3::z());
                }
            }
        }

        normals
    }

    /// Check if a ray starting at `point` lies in the shape. A point on the
    /// surface is inside only when the direction heads into the shape.
    pub fn contains_directed(&self, point: &[f64; 3], direction: &[f64; 3], tolerance: f64) -> bool {
        if !self.contains(point, tolerance) {
            return false;
        }

        let d = to_vec3(direction);

        self.touching_normals(point, tolerance)
            .iter()
            .all(|normal| normal.dot(&d) < 0.0)
    }

    /// Parameter interval over which the ray lies inside the shape.
    fn interval(&self, point: &[f64; 3], direction: &[f64; 3]) -> Option<(f64, f64)> {
        let c = self.center();
        let full = (f64::NEG_INFINITY, f64::INFINITY);

        match *self {
            Shape::Box { half_lengths: h, .. } => (0..3).try_fold(full, |acc, axis| {
                let range = slab(
                    point[axis],
                    direction[axis],
                    c[axis] - h[axis],
                    c[axis] + h[axis],
                )?;
                overlap(acc, range)
            }),
            Shape::Sphere { radius, .. } => {
                let oc = to_vec3(point) - to_vec3(&c);
                let d = to_vec3(direction);

                quadratic_roots(d.dot(&d), 2.0 * oc.dot(&d), oc.dot(&oc) - radius * radius)
            }
            Shape::Tube {
                radius,
                half_length,
                ..
            } => {
                let oc = (to_vec3(point) - to_vec3(&c)).xy();
                let d = to_vec3(direction).xy();
                let a = d.dot(&d);

                // Parallel to the axis
                let radial = if a < 1e-12 {
                    (oc.dot(&oc) <= radius * radius).then_some(full)?
                } else {
                    quadratic_roots(a, 2.0 * oc.dot(&d), oc.dot(&oc) - radius * radius)?
                };

                let caps = slab(point[2], direction[2], c[2] - half_length, c[2] + half_length)?;

                overlap(radial, caps)
            }
        }
    }

    /// Distance along the ray to where it leaves the shape.
    pub fn distance_out(&self, point: &[f64; 3], direction: &[f64; 3]) -> f64 {
        self.interval(point, direction)
            .map_or(0.0, |(_, exit)| exit.max(0.0))
    }

    /// Distance along the ray to where it enters the shape, if it does.
    /// Grazing contacts shorter than `tolerance` do not count.
    pub fn distance_in(&self, point: &[f64; 3], direction: &[f64; 3], tolerance: f64) -> Option<f64> {
        let (entry, exit) = self.interval(point, direction)?;

        if exit <= tolerance || exit - entry <= tolerance {
            return None;
        }

        Some(entry.max(0.0))
    }

    /// Outward unit normal of the face nearest to `point`.
    pub fn normal(&self, point: &[f64; 3]) -> [f64; 3] {
        let p = to_vec3(point) - to_vec3(&self.center());

        let normal = match *self {
            Shape::Box { half_lengths: h, .. } => {
                let (axis, sign) = (0..3)
                    .flat_map(|axis| {
                        [
                            ((h[axis] - p[axis]).abs(), axis, 1.0),
                            ((p[axis] + h[axis]).abs(), axis, -1.0),
                        ]
                    })
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .map_or((2, 1.0), |(_, axis, sign)| (axis, sign));

                Vec3::ith(axis, sign)
            }
            Shape::Sphere { .. } => p.try_normalize(0.0).unwrap_or_else(Vec3::z),
            Shape::Tube {
                radius,
                half_length,
                ..
            } => {
                let rho = p.xy().norm();

                if (rho - radius).abs() < (half_length - p.z.abs()).abs() && rho > 0.0 {
                    Vec3::new(p.x / rho, p.y / rho, 0.0)
                } else if p.z >= 0.0 {
                    Vec3::z()
                } else {
                    -Vec3::z()
                }
            }
        };

        to_array(&normal)
    }

    /// Distance from `point` to the surface in any direction.
    pub fn safety(&self, point: &[f64; 3]) -> f64 {
        let p = to_vec3(point) - to_vec3(&self.center());
        let inside = self.contains(point, 0.0);

        match *self {
            Shape::Box { half_lengths: h, .. } => {
                if inside {
                    (0..3)
                        .map(|axis| h[axis] - p[axis].abs())
                        .fold(f64::INFINITY, f64::min)
                } else {
                    (0..3)
                        .map(|axis| (p[axis].abs() - h[axis]).max(0.0).powi(2))
                        .sum::<f64>()
                        .sqrt()
                }
            }
            Shape::Sphere { radius, .. } => (p.norm() - radius).abs(),
            Shape::Tube {
                radius,
                half_length,
                ..
            } => {
                let rho = p.xy().norm();

                if inside {
                    (radius - rho).min(half_length - p.z.abs())
                } else {
                    ((rho - radius).max(0.0).powi(2) + (p.z.abs() - half_length).max(0.0).powi(2))
                        .sqrt()
                }
            }
        }
    }
}

/// Interval of `t` for which `p + t d` lies in `[lo, hi]`.
fn slab(p: f64, d: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    if d == 0.0 {
        return (p >= lo && p <= hi).then_some((f64::NEG_INFINITY, f64::INFINITY));
    }

    let inv_direction = 1.0 / d;
    let t0 = (lo - p) * inv_direction;
    let t1 = (hi - p) * inv_direction;

    Some((t0.min(t1), t0.max(t1)))
}

fn overlap(a: (f64, f64), b: (f64, f64)) -> Option<(f64, f64)> {
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);

    (lo <= hi).then_some((lo, hi))
}

fn quadratic_roots(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();

    Some(((-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)))
}

#[derive(Debug, Deserialize)]
struct GeometryFile {
    #[serde(default, rename = "volume")]
    volumes: Vec<VolumeSpec>,
}

#[derive(Debug, Deserialize)]
struct VolumeSpec {
    name: String,
    material: String,
    #[serde(default)]
    mother: Option<String>,
    shape: Shape,
}

#[derive(Debug, Clone)]
struct Volume {
    name: String,
    material: String,
    shape: Shape,
    daughters: Vec<VolumeIndex>,
    unique_id: u64,
}

/// Navigation state of an [`AnalyticModel`].
#[derive(Debug, Clone, Default)]
pub struct AnalyticNavigator {
    point: [f64; 3],
    direction: [f64; 3],
    node: Option<VolumeIndex>,
    next_boundary: Option<(f64, VolumeIndex)>,
}

impl RootNavigator for AnalyticNavigator {
    fn set_current_point(&mut self, point: [f64; 3]) {
        self.point = point;
        self.next_boundary = None;
    }

    fn set_current_direction(&mut self, direction: [f64; 3]) {
        self.direction = direction;
        self.next_boundary = None;
    }

    fn set_current_node(&mut self, node: Option<VolumeIndex>) {
        self.node = node;
        self.next_boundary = None;
    }

    fn current_point(&self) -> &[f64; 3] {
        &self.point
    }

    fn current_direction(&self) -> &[f64; 3] {
        &self.direction
    }

    fn current_node(&self) -> Option<VolumeIndex> {
        self.node
    }

    fn next_boundary(&self) -> Option<(f64, VolumeIndex)> {
        self.next_boundary
    }
}

/// A volume tree of analytic shapes.
#[derive(Debug, Clone)]
pub struct AnalyticModel {
    volumes: Vec<Volume>,
    top: VolumeIndex,
    tolerance: f64,
}

impl AnalyticModel {
    /// Parse and build a geometry.
    pub fn from_toml_str(source: &str, tolerance: f64) -> RootEngineResult<Self> {
        let file: GeometryFile = toml::from_str(source)?;
        Self::build(file, tolerance)
    }

    fn build(file: GeometryFile, tolerance: f64) -> RootEngineResult<Self> {
        let invalid = |msg: String| RootEngineError::InvalidModel(msg);

        if tolerance.is_nan() || tolerance <= 0.0 {
            return Err(invalid(format!("tolerance must be positive, got {tolerance}")));
        }

        let mut index_of_name = HashMap::new();

        for (index, spec) in file.volumes.iter().enumerate() {
            if index_of_name.insert(spec.name.as_str(), index).is_some() {
                return Err(invalid(format!("volume name '{}' is used twice", spec.name)));
            }
            if !spec.shape.is_valid() {
                return Err(invalid(format!("volume '{}' has a degenerate shape", spec.name)));
            }
        }

        let mut mothers = Vec::with_capacity(file.volumes.len());

        for spec in &file.volumes {
            let mother = match &spec.mother {
                Some(name) => Some(*index_of_name.get(name.as_str()).ok_or_else(|| {
                    invalid(format!(
                        "volume '{}' is placed in unknown volume '{name}'",
                        spec.name
                    ))
                })?),
                None => None,
            };
            mothers.push(mother);
        }

        let tops: Vec<_> = (0..mothers.len()).filter(|&i| mothers[i].is_none()).collect();
        let [top] = tops.as_slice() else {
            return Err(invalid(format!(
                "exactly one top volume is required, found {}",
                tops.len()
            )));
        };

        // Every mother chain must reach the top volume
        for start in 0..mothers.len() {
            let mut current = start;
            let mut depth = 0;

            while let Some(mother) = mothers[current] {
                current = mother;
                depth += 1;

                if depth > mothers.len() {
                    return Err(invalid(format!(
                        "volume '{}' is part of a placement cycle",
                        file.volumes[start].name
                    )));
                }
            }
        }

        let mut volumes: Vec<Volume> = file
            .volumes
            .into_iter()
            .map(|spec| Volume {
                name: spec.name,
                material: spec.material,
                shape: spec.shape,
                daughters: Vec::new(),
                unique_id: 0,
            })
            .collect();

        for (index, mother) in mothers.iter().enumerate() {
            if let Some(mother) = *mother {
                volumes[mother].daughters.push(index);
            }
        }

        Ok(Self {
            volumes,
            top: *top,
            tolerance,
        })
    }

    /// Tolerance used for on-surface decisions.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn volume(&self, volume: VolumeIndex) -> RootEngineResult<&Volume> {
        self.volumes
            .get(volume)
            .ok_or(RootEngineError::VolumeNotFound(volume))
    }

    /// Innermost volume holding a ray start.
    fn locate(&self, point: &[f64; 3], direction: &[f64; 3]) -> Option<VolumeIndex> {
        let holds = |index: VolumeIndex| {
            self.volumes[index]
                .shape
                .contains_directed(point, direction, self.tolerance)
        };

        if !holds(self.top) {
            return None;
        }

        let mut node = self.top;

        while let Some(daughter) = self.volumes[node]
            .daughters
            .iter()
            .copied()
            .find(|&daughter| holds(daughter))
        {
            node = daughter;
        }

        Some(node)
    }
}

impl RootEngine for AnalyticModel {
    type Navigator = AnalyticNavigator;

    fn load(path: &Path) -> RootEngineResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| RootEngineError::Load(format!("{}: {err}", path.display())))?;

        Self::from_toml_str(&source, DEFAULT_TOLERANCE)
    }

    fn volumes(&self) -> Vec<VolumeIndex> {
        (0..self.volumes.len()).collect()
    }

    fn top_volume(&self) -> VolumeIndex {
        self.top
    }

    fn volume_name(&self, volume: VolumeIndex) -> RootEngineResult<&str> {
        Ok(&self.volume(volume)?.name)
    }

    fn material_name(&self, volume: VolumeIndex) -> RootEngineResult<&str> {
        Ok(&self.volume(volume)?.material)
    }

    fn set_unique_id(&mut self, volume: VolumeIndex, id: u64) -> RootEngineResult<()> {
        self.volumes
            .get_mut(volume)
            .ok_or(RootEngineError::VolumeNotFound(volume))?
            .unique_id = id;

        Ok(())
    }

    fn unique_id(&self, volume: VolumeIndex) -> RootEngineResult<u64> {
        Ok(self.volume(volume)?.unique_id)
    }

    fn capacity(&self, volume: VolumeIndex) -> RootEngineResult<f64> {
        let v = self.volume(volume)?;

        let daughters: f64 = v
            .daughters
            .iter()
            .map(|&d| self.volumes[d].shape.capacity())
            .sum();

        Ok(v.shape.capacity() - daughters)
    }

    fn is_inside(&self, volume: VolumeIndex, point: &[f64; 3]) -> RootEngineResult<bool> {
        let v = self.volume(volume)?;

        Ok(v.shape.contains(point, self.tolerance)
            && !v
                .daughters
                .iter()
                .any(|&d| self.volumes[d].shape.contains(point, self.tolerance)))
    }

    fn find_node(&self, navigator: &mut AnalyticNavigator) -> Option<VolumeIndex> {
        let node = self.locate(&navigator.point, &navigator.direction);
        navigator.set_current_node(node);

        node
    }

    fn find_next_boundary(&self, navigator: &mut AnalyticNavigator) -> RootEngineResult<f64> {
        let node = navigator.node.ok_or(RootEngineError::NotLocated)?;
        let v = self.volume(node)?;
        let (point, direction) = (&navigator.point, &navigator.direction);

        let mut nearest = (v.shape.distance_out(point, direction), node);

        for &daughter in &v.daughters {
            if let Some(t) = self.volumes[daughter]
                .shape
                .distance_in(point, direction, self.tolerance)
            {
                if t < nearest.0 {
                    nearest = (t, daughter);
                }
            }
        }

        navigator.next_boundary = Some(nearest);

        Ok(nearest.0)
    }

    fn step(&self, navigator: &mut AnalyticNavigator) -> RootEngineResult<Option<VolumeIndex>> {
        let distance = match navigator.next_boundary {
            Some((distance, _)) => distance,
            None => self.find_next_boundary(navigator)?,
        };

        let p = to_vec3(&navigator.point) + distance * to_vec3(&navigator.direction);
        navigator.set_current_point(to_array(&p));

        Ok(self.find_node(navigator))
    }

    fn find_normal(
        &self,
        volume: VolumeIndex,
        point: &[f64; 3],
        direction: &[f64; 3],
    ) -> RootEngineResult<[f64; 3]> {
        let shape = &self.volume(volume)?.shape;

        if !Tolerance::DEFAULT.is_on_boundary(shape.safety(point)) {
            return Err(RootEngineError::Failure(format!(
                "point ({}, {}, {}) is not on the boundary of volume {volume}",
                point[0], point[1], point[2]
            )));
        }

        let normal = to_vec3(&shape.normal(point));

        let oriented = if normal.dot(&to_vec3(direction)) < 0.0 {
            -normal
        } else {
            normal
        };

        Ok(to_array(&oriented))
    }

    fn safety(&self, navigator: &AnalyticNavigator) -> RootEngineResult<f64> {
        let node = navigator.node.ok_or(RootEngineError::NotLocated)?;
        let v = self.volume(node)?;
        let point = &navigator.point;

        Ok(v.daughters
            .iter()
            .map(|&d| self.volumes[d].shape.safety(point))
            .fold(v.shape.safety(point), f64::min))
    }
}
