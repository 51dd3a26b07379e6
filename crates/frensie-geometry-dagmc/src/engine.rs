//! Contract of the faceted CAD engine behind the DagMC backend.
//!
//! The engine answers point-in-volume, ray-fire, next-volume, normal and
//! measure queries about an already-loaded model. It is a black box: this
//! crate only translates handles and manages tracing state around it.

use std::fmt;
use std::num::NonZeroU64;
use std::path::Path;

use frensie_geometry::GeometryError;
use thiserror::Error;

/// Engine-native reference to a volume or a surface.
///
/// Engines never hand out a zero handle, so "no entity" is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(NonZeroU64);

impl EntityHandle {
    /// Wrap a raw handle, returning `None` for the invalid value 0.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The raw 64-bit value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Errors reported by the engine itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The model file could not be read or parsed.
    #[error("failed to load model: {0}")]
    Load(String),

    /// A handle does not refer to an entity of the expected kind.
    #[error("entity {0} not found")]
    EntityNotFound(EntityHandle),

    /// The query itself failed.
    #[error("engine failure: {0}")]
    Failure(String),
}

/// Result type for engine queries.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl From<EngineError> for GeometryError {
    fn from(err: EngineError) -> Self {
        GeometryError::InvalidGeometry(err.to_string())
    }
}

/// Facets already intersected by a ray.
///
/// The engine owns the meaning of this record; the tracing layer only stores
/// it next to the ray and resets it when the ray is re-seeded or redirected.
pub trait RayHistory: Default + Clone + Send + fmt::Debug {
    /// Forget every recorded intersection.
    fn reset(&mut self);

    /// Forget everything except the most recent intersection.
    fn reset_to_last_intersection(&mut self);
}

/// A loaded faceted model.
pub trait DagMcEngine: Send + Sync + Sized {
    /// Per-ray accelerator record.
    type History: RayHistory;

    /// Load a model file. `facet_tolerance` bounds the faceting error.
    fn load(path: &Path, facet_tolerance: f64) -> EngineResult<Self>;

    /// All volumes, in the engine's canonical order.
    fn volumes(&self) -> Vec<EntityHandle>;

    /// All surfaces, in the engine's canonical order.
    fn surfaces(&self) -> Vec<EntityHandle>;

    /// User-facing global id of a volume.
    fn volume_id(&self, volume: EntityHandle) -> EngineResult<u64>;

    /// User-facing global id of a surface.
    fn surface_id(&self, surface: EntityHandle) -> EngineResult<u64>;

    /// Names of every property that appears anywhere in the model.
    fn detect_available_props(&self) -> Vec<String>;

    /// Values of `property` on an entity, or `None` if it does not carry it.
    ///
    /// Flag properties carry an empty value list.
    fn prop_values(&self, entity: EntityHandle, property: &str) -> Option<Vec<String>>;

    /// Classify a point against a volume.
    ///
    /// Returns `1` inside, `0` outside, `-1` on the boundary. The direction
    /// resolves points that lie on the boundary.
    fn point_in_volume(
        &self,
        volume: EntityHandle,
        position: &[f64; 3],
        direction: &[f64; 3],
        history: Option<&Self::History>,
    ) -> EngineResult<i32>;

    /// Fire a ray from inside `volume`.
    ///
    /// Returns the surface hit and the distance to it, or `None` when the ray
    /// leaves the volume through a gap. The hit is appended to `history`.
    fn ray_fire(
        &self,
        volume: EntityHandle,
        position: &[f64; 3],
        direction: &[f64; 3],
        history: Option<&mut Self::History>,
    ) -> EngineResult<Option<(EntityHandle, f64)>>;

    /// The volume on the other side of `surface` as seen from `volume`.
    fn next_vol(
        &self,
        surface: EntityHandle,
        volume: EntityHandle,
    ) -> EngineResult<Option<EntityHandle>>;

    /// Unit normal of `surface` at a point on it, in the surface's sense.
    fn get_angle(
        &self,
        surface: EntityHandle,
        position: &[f64; 3],
        history: Option<&Self::History>,
    ) -> EngineResult<[f64; 3]>;

    /// Volume of a volume entity.
    fn measure_volume(&self, volume: EntityHandle) -> EngineResult<f64>;

    /// Area of a surface entity.
    fn measure_area(&self, surface: EntityHandle) -> EngineResult<f64>;

    /// Distance from a point inside `volume` to its nearest boundary in any
    /// direction.
    fn closest_to_location(&self, volume: EntityHandle, position: &[f64; 3]) -> EngineResult<f64>;
}
