//! An axis-aligned faceted engine.
//!
//! Volumes are boxes and surfaces are sets of rectangular facets, each facet
//! being one face of one box. A facet separates its box from the box whose
//! opposite face coincides with it, if there is one; these neighbours are
//! found when the model is built.
//!
//! # Model file
//!
//! ```toml
//! [[volume]]
//! id = 53
//! min = [-50.0, -50.0, 20.0]
//! max = [50.0, 50.0, 60.959999084]
//! properties = { material = ["1"], density = ["-8.0"] }
//!
//! [[surface]]
//! id = 242
//! facets = [{ volume = 53, face = "+z" }]
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{DagMcEngine, EngineError, EngineResult, EntityHandle, RayHistory};

const VOLUME_TAG: u64 = 3 << 56;
const SURFACE_TAG: u64 = 2 << 56;
const INDEX_MASK: u64 = (1 << 56) - 1;

/// Errors raised while building a [`BoxModel`].
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model file is not valid TOML or does not match the schema.
    #[error("model parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The tolerance is not a positive number.
    #[error("invalid tolerance {0}")]
    InvalidTolerance(f64),

    /// A volume has no extent along some axis.
    #[error("volume {0} has min >= max along some axis")]
    DegenerateVolume(u64),

    /// A facet refers to a volume id that does not exist.
    #[error("surface {surface} refers to unknown volume {volume}")]
    UnknownVolume {
        /// Surface id.
        surface: u64,
        /// Missing volume id.
        volume: u64,
    },

    /// A surface has no facets.
    #[error("surface {0} has no facets")]
    EmptySurface(u64),

    /// More than one box touches a facet from the other side.
    #[error("surface {0} has a facet with more than one neighbouring volume")]
    AmbiguousNeighbour(u64),

    /// A surface separates more than two volumes.
    #[error("surface {0} bounds more than two volumes")]
    TooManyParents(u64),
}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        EngineError::Load(err.to_string())
    }
}

/// A face of an axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Face {
    /// Low x face.
    #[serde(rename = "-x")]
    NegX,
    /// High x face.
    #[serde(rename = "+x")]
    PosX,
    /// Low y face.
    #[serde(rename = "-y")]
    NegY,
    /// High y face.
    #[serde(rename = "+y")]
    PosY,
    /// Low z face.
    #[serde(rename = "-z")]
    NegZ,
    /// High z face.
    #[serde(rename = "+z")]
    PosZ,
}

impl Face {
    /// The face crossed when leaving a box along `axis` in the given sense.
    pub fn exit(axis: usize, positive: bool) -> Self {
        match (axis, positive) {
            (0, false) => Self::NegX,
            (0, true) => Self::PosX,
            (1, false) => Self::NegY,
            (1, true) => Self::PosY,
            (_, false) => Self::NegZ,
            (_, true) => Self::PosZ,
        }
    }

    /// Axis the face is perpendicular to.
    pub fn axis(self) -> usize {
        match self {
            Self::NegX | Self::PosX => 0,
            Self::NegY | Self::PosY => 1,
            Self::NegZ | Self::PosZ => 2,
        }
    }

    /// True for the high face along its axis.
    pub fn is_max(self) -> bool {
        matches!(self, Self::PosX | Self::PosY | Self::PosZ)
    }

    /// The face on the other side of the box.
    pub fn opposite(self) -> Self {
        Self::exit(self.axis(), !self.is_max())
    }

    /// Unit normal pointing out of the box.
    pub fn outward_normal(self) -> [f64; 3] {
        let mut normal = [0.0; 3];
        normal[self.axis()] = if self.is_max() { 1.0 } else { -1.0 };
        normal
    }

    /// The two axes spanning the face.
    fn in_plane_axes(self) -> [usize; 2] {
        match self.axis() {
            0 => [1, 2],
            1 => [0, 2],
            _ => [0, 1],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default, rename = "volume")]
    volumes: Vec<VolumeSpec>,
    #[serde(default, rename = "surface")]
    surfaces: Vec<SurfaceSpec>,
}

#[derive(Debug, Deserialize)]
struct VolumeSpec {
    id: u64,
    min: [f64; 3],
    max: [f64; 3],
    #[serde(default)]
    properties: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FacetSpec {
    volume: u64,
    face: Face,
}

#[derive(Debug, Deserialize)]
struct SurfaceSpec {
    id: u64,
    facets: Vec<FacetSpec>,
    #[serde(default)]
    properties: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
struct BoxVolume {
    id: u64,
    min: [f64; 3],
    max: [f64; 3],
    properties: BTreeMap<String, Vec<String>>,
}

impl BoxVolume {
    fn face_plane(&self, face: Face) -> f64 {
        if face.is_max() {
            self.max[face.axis()]
        } else {
            self.min[face.axis()]
        }
    }
}

#[derive(Debug, Clone)]
struct Facet {
    owner: usize,
    neighbour: Option<usize>,
    face: Face,
    plane: f64,
    lo: [f64; 2],
    hi: [f64; 2],
}

impl Facet {
    fn area(&self) -> f64 {
        (self.hi[0] - self.lo[0]) * (self.hi[1] - self.lo[1])
    }

    fn contains(&self, point: &[f64; 3], tolerance: f64) -> bool {
        let [a, b] = self.face.in_plane_axes();

        (point[self.face.axis()] - self.plane).abs() <= tolerance
            && point[a] >= self.lo[0] - tolerance
            && point[a] <= self.hi[0] + tolerance
            && point[b] >= self.lo[1] - tolerance
            && point[b] <= self.hi[1] + tolerance
    }

    /// The face this facet presents to `volume`, if it bounds it.
    fn face_seen_from(&self, volume: usize) -> Option<Face> {
        if self.owner == volume {
            Some(self.face)
        } else if self.neighbour == Some(volume) {
            Some(self.face.opposite())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct BoxSurface {
    id: u64,
    facets: Vec<Facet>,
    properties: BTreeMap<String, Vec<String>>,
}

/// Facets crossed by a ray since it was last reset.
#[derive(Debug, Clone, Default)]
pub struct BoxHistory {
    crossed: Vec<EntityHandle>,
}

impl BoxHistory {
    /// Surfaces hit, oldest first.
    pub fn crossed(&self) -> &[EntityHandle] {
        &self.crossed
    }
}

impl RayHistory for BoxHistory {
    fn reset(&mut self) {
        self.crossed.clear();
    }

    fn reset_to_last_intersection(&mut self) {
        let last = self.crossed.pop();
        self.crossed.clear();
        self.crossed.extend(last);
    }
}

/// A model made of axis-aligned boxes.
#[derive(Debug, Clone)]
pub struct BoxModel {
    volumes: Vec<BoxVolume>,
    surfaces: Vec<BoxSurface>,
    tolerance: f64,
}

impl BoxModel {
    /// Parse and build a model. `tolerance` is used both to match coincident
    /// faces and to decide when a point lies on a face.
    pub fn from_toml_str(source: &str, tolerance: f64) -> Result<Self, ModelError> {
        let file: ModelFile = toml::from_str(source)?;
        Self::build(file, tolerance)
    }

    fn build(file: ModelFile, tolerance: f64) -> Result<Self, ModelError> {
        if tolerance.is_nan() || tolerance <= 0.0 {
            return Err(ModelError::InvalidTolerance(tolerance));
        }

        let mut volumes = Vec::with_capacity(file.volumes.len());
        let mut index_of_id = HashMap::new();

        for spec in file.volumes {
            if (0..3).any(|a| spec.min[a] >= spec.max[a]) {
                return Err(ModelError::DegenerateVolume(spec.id));
            }

            index_of_id.insert(spec.id, volumes.len());
            volumes.push(BoxVolume {
                id: spec.id,
                min: spec.min,
                max: spec.max,
                properties: spec.properties,
            });
        }

        let mut surfaces = Vec::with_capacity(file.surfaces.len());

        for spec in file.surfaces {
            if spec.facets.is_empty() {
                return Err(ModelError::EmptySurface(spec.id));
            }

            let mut facets = Vec::with_capacity(spec.facets.len());
            let mut parents = BTreeSet::new();

            for facet_spec in &spec.facets {
                let owner = *index_of_id.get(&facet_spec.volume).ok_or(
                    ModelError::UnknownVolume {
                        surface: spec.id,
                        volume: facet_spec.volume,
                    },
                )?;

                let facet = Self::make_facet(&volumes, owner, facet_spec.face, tolerance)
                    .ok_or(ModelError::AmbiguousNeighbour(spec.id))?;

                parents.insert(facet.owner);
                parents.extend(facet.neighbour);
                facets.push(facet);
            }

            if parents.len() > 2 {
                return Err(ModelError::TooManyParents(spec.id));
            }

            surfaces.push(BoxSurface {
                id: spec.id,
                facets,
                properties: spec.properties,
            });
        }

        Ok(Self {
            volumes,
            surfaces,
            tolerance,
        })
    }

    /// Build the facet covering `face` of `owner`. Returns `None` when more
    /// than one box touches it from the other side.
    fn make_facet(volumes: &[BoxVolume], owner: usize, face: Face, tolerance: f64) -> Option<Facet> {
        let owner_box = &volumes[owner];
        let [a, b] = face.in_plane_axes();
        let plane = owner_box.face_plane(face);
        let lo = [owner_box.min[a], owner_box.min[b]];
        let hi = [owner_box.max[a], owner_box.max[b]];

        let overlaps = |other: &BoxVolume| {
            let da = hi[0].min(other.max[a]) - lo[0].max(other.min[a]);
            let db = hi[1].min(other.max[b]) - lo[1].max(other.min[b]);
            da > tolerance && db > tolerance
        };

        let mut neighbours = volumes.iter().enumerate().filter(|(index, other)| {
            *index != owner
                && (other.face_plane(face.opposite()) - plane).abs() <= tolerance
                && overlaps(*other)
        });

        let neighbour = neighbours.next().map(|(index, _)| index);

        if neighbours.next().is_some() {
            return None;
        }

        Some(Facet {
            owner,
            neighbour,
            face,
            plane,
            lo,
            hi,
        })
    }

    /// Tolerance used for point and face comparisons.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn volume_handle(index: usize) -> EntityHandle {
        tagged_handle(VOLUME_TAG, index)
    }

    fn surface_handle(index: usize) -> EntityHandle {
        tagged_handle(SURFACE_TAG, index)
    }

    fn volume_index(&self, handle: EntityHandle) -> EngineResult<usize> {
        untag(handle, VOLUME_TAG)
            .filter(|&index| index < self.volumes.len())
            .ok_or(EngineError::EntityNotFound(handle))
    }

    fn surface_index(&self, handle: EntityHandle) -> EngineResult<usize> {
        untag(handle, SURFACE_TAG)
            .filter(|&index| index < self.surfaces.len())
            .ok_or(EngineError::EntityNotFound(handle))
    }

    /// Surface whose facet on `face` of `volume` contains `point`.
    fn surface_at(&self, volume: usize, face: Face, point: &[f64; 3]) -> Option<EntityHandle> {
        self.surfaces.iter().enumerate().find_map(|(index, surface)| {
            surface
                .facets
                .iter()
                .any(|facet| {
                    facet.face_seen_from(volume) == Some(face)
                        && facet.contains(point, self.tolerance)
                })
                .then(|| Self::surface_handle(index))
        })
    }
}

fn tagged_handle(tag: u64, index: usize) -> EntityHandle {
    match EntityHandle::new(tag | (index as u64 + 1)) {
        Some(handle) => handle,
        None => unreachable!("tagged handles are never zero"),
    }
}

fn untag(handle: EntityHandle, tag: u64) -> Option<usize> {
    let raw = handle.get();

    if raw & !INDEX_MASK != tag {
        return None;
    }

    (raw & INDEX_MASK)
        .checked_sub(1)
        .and_then(|index| usize::try_from(index).ok())
}

impl DagMcEngine for BoxModel {
    type History = BoxHistory;

    fn load(path: &Path, facet_tolerance: f64) -> EngineResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| EngineError::Load(format!("{}: {err}", path.display())))?;

        Ok(Self::from_toml_str(&source, facet_tolerance)?)
    }

    fn volumes(&self) -> Vec<EntityHandle> {
        (0..self.volumes.len()).map(Self::volume_handle).collect()
    }

    fn surfaces(&self) -> Vec<EntityHandle> {
        (0..self.surfaces.len()).map(Self::surface_handle).collect()
    }

    fn volume_id(&self, volume: EntityHandle) -> EngineResult<u64> {
        Ok(self.volumes[self.volume_index(volume)?].id)
    }

    fn surface_id(&self, surface: EntityHandle) -> EngineResult<u64> {
        Ok(self.surfaces[self.surface_index(surface)?].id)
    }

    fn detect_available_props(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .volumes
            .iter()
            .flat_map(|v| v.properties.keys())
            .chain(self.surfaces.iter().flat_map(|s| s.properties.keys()))
            .collect();

        names.into_iter().cloned().collect()
    }

    fn prop_values(&self, entity: EntityHandle, property: &str) -> Option<Vec<String>> {
        let properties = if let Ok(index) = self.volume_index(entity) {
            &self.volumes[index].properties
        } else if let Ok(index) = self.surface_index(entity) {
            &self.surfaces[index].properties
        } else {
            return None;
        };

        properties.get(property).cloned()
    }

    fn point_in_volume(
        &self,
        volume: EntityHandle,
        position: &[f64; 3],
        direction: &[f64; 3],
        _history: Option<&BoxHistory>,
    ) -> EngineResult<i32> {
        let v = &self.volumes[self.volume_index(volume)?];
        let tol = self.tolerance;

        // Direction components along the outward normals of touched faces
        let mut touching = Vec::new();

        for axis in 0..3 {
            if position[axis] < v.min[axis] - tol || position[axis] > v.max[axis] + tol {
                return Ok(0);
            }
            if (position[axis] - v.min[axis]).abs() <= tol {
                touching.push(-direction[axis]);
            }
            if (position[axis] - v.max[axis]).abs() <= tol {
                touching.push(direction[axis]);
            }
        }

        let code = if touching.iter().any(|&d| d > 0.0) {
            0
        } else if touching.iter().all(|&d| d < 0.0) {
            1
        } else {
            -1
        };

        Ok(code)
    }

    fn ray_fire(
        &self,
        volume: EntityHandle,
        position: &[f64; 3],
        direction: &[f64; 3],
        mut history: Option<&mut BoxHistory>,
    ) -> EngineResult<Option<(EntityHandle, f64)>> {
        let index = self.volume_index(volume)?;
        let v = &self.volumes[index];

        // Slab exits, nearest first
        let mut exits: Vec<(f64, usize)> = (0..3)
            .filter(|&axis| direction[axis] != 0.0)
            .map(|axis| {
                let inv_direction = 1.0 / direction[axis];
                let plane = if direction[axis] > 0.0 {
                    v.max[axis]
                } else {
                    v.min[axis]
                };
                ((plane - position[axis]) * inv_direction, axis)
            })
            .collect();

        exits.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (t, axis) in exits {
            let face = Face::exit(axis, direction[axis] > 0.0);
            let hit = [
                position[0] + t * direction[0],
                position[1] + t * direction[1],
                position[2] + t * direction[2],
            ];

            let Some(surface) = self.surface_at(index, face, &hit) else {
                return Ok(None);
            };

            // The start lies beyond this face: report the raw distance
            if t < -self.tolerance {
                return Ok(Some((surface, t)));
            }

            // Heading straight back out through a facet already crossed
            let already_crossed = history
                .as_ref()
                .is_some_and(|h| h.crossed.contains(&surface));

            if t < self.tolerance && already_crossed {
                return Ok(None);
            }

            if let Some(h) = history.as_mut() {
                h.crossed.push(surface);
            }

            return Ok(Some((surface, t.max(0.0))));
        }

        Ok(None)
    }

    fn next_vol(
        &self,
        surface: EntityHandle,
        volume: EntityHandle,
    ) -> EngineResult<Option<EntityHandle>> {
        let s = &self.surfaces[self.surface_index(surface)?];
        let v = self.volume_index(volume)?;

        for facet in &s.facets {
            if facet.owner == v {
                return Ok(facet.neighbour.map(Self::volume_handle));
            }
            if facet.neighbour == Some(v) {
                return Ok(Some(Self::volume_handle(facet.owner)));
            }
        }

        Err(EngineError::Failure(format!(
            "volume {} is not bounded by surface {}",
            self.volumes[v].id, s.id
        )))
    }

    fn get_angle(
        &self,
        surface: EntityHandle,
        position: &[f64; 3],
        _history: Option<&BoxHistory>,
    ) -> EngineResult<[f64; 3]> {
        let s = &self.surfaces[self.surface_index(surface)?];

        s.facets
            .iter()
            .find(|facet| facet.contains(position, self.tolerance))
            .map(|facet| facet.face.outward_normal())
            .ok_or_else(|| {
                EngineError::Failure(format!(
                    "point ({}, {}, {}) is not on surface {}",
                    position[0], position[1], position[2], s.id
                ))
            })
    }

    fn measure_volume(&self, volume: EntityHandle) -> EngineResult<f64> {
        let v = &self.volumes[self.volume_index(volume)?];

        Ok((0..3).map(|axis| v.max[axis] - v.min[axis]).product())
    }

    fn measure_area(&self, surface: EntityHandle) -> EngineResult<f64> {
        let s = &self.surfaces[self.surface_index(surface)?];

        Ok(s.facets.iter().map(Facet::area).sum())
    }

    fn closest_to_location(&self, volume: EntityHandle, position: &[f64; 3]) -> EngineResult<f64> {
        let v = &self.volumes[self.volume_index(volume)?];

        Ok((0..3)
            .map(|axis| {
                (position[axis] - v.min[axis])
                    .abs()
                    .min((v.max[axis] - position[axis]).abs())
            })
            .fold(f64::INFINITY, f64::min))
    }
}
