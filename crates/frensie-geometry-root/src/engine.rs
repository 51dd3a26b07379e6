//! Contract of the analytic geometry engine behind the Root backend.
//!
//! The engine is a volume tree navigated by per-thread navigators, in the
//! manner of a CSG geometry manager: locate the node holding a point, compute
//! the step to the next boundary, take that step and relocate.

use std::fmt;
use std::path::Path;

use frensie_geometry::GeometryError;
use thiserror::Error;

/// Engine-native index of a volume.
pub type VolumeIndex = usize;

/// Errors reported by the engine.
#[derive(Error, Debug)]
pub enum RootEngineError {
    /// The geometry file could not be read.
    #[error("failed to load geometry: {0}")]
    Load(String),

    /// The geometry file is not valid TOML or does not match the schema.
    #[error("geometry parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The geometry is structurally wrong.
    #[error("invalid geometry: {0}")]
    InvalidModel(String),

    /// A volume index is out of range.
    #[error("volume {0} not found")]
    VolumeNotFound(VolumeIndex),

    /// The navigator has no current node.
    #[error("navigator is not located in any volume")]
    NotLocated,

    /// The query itself failed.
    #[error("engine failure: {0}")]
    Failure(String),
}

/// Result type for engine queries.
pub type RootEngineResult<T> = std::result::Result<T, RootEngineError>;

impl From<RootEngineError> for GeometryError {
    fn from(err: RootEngineError) -> Self {
        GeometryError::InvalidGeometry(err.to_string())
    }
}

/// Navigation state: a point, a direction, the node holding the point and
/// the last computed step.
pub trait RootNavigator: Default + Clone + Send + fmt::Debug {
    /// Move the navigator to `point`. The computed step is forgotten; the
    /// current node is kept.
    fn set_current_point(&mut self, point: [f64; 3]);

    /// Point the navigator along `direction`. The computed step is forgotten.
    fn set_current_direction(&mut self, direction: [f64; 3]);

    /// Force the current node without a search.
    fn set_current_node(&mut self, node: Option<VolumeIndex>);

    /// Current point.
    fn current_point(&self) -> &[f64; 3];

    /// Current direction.
    fn current_direction(&self) -> &[f64; 3];

    /// Node holding the current point, if located.
    fn current_node(&self) -> Option<VolumeIndex>;

    /// Step to the next boundary and the volume whose shape it belongs to,
    /// if [`RootEngine::find_next_boundary`] has been called since the last
    /// move.
    fn next_boundary(&self) -> Option<(f64, VolumeIndex)>;
}

/// A loaded analytic geometry.
pub trait RootEngine: Send + Sync + Sized {
    /// Per-thread navigation state.
    type Navigator: RootNavigator;

    /// Load a geometry file.
    fn load(path: &Path) -> RootEngineResult<Self>;

    /// All volumes.
    fn volumes(&self) -> Vec<VolumeIndex>;

    /// The top (world) volume.
    fn top_volume(&self) -> VolumeIndex;

    /// Name of a volume.
    fn volume_name(&self, volume: VolumeIndex) -> RootEngineResult<&str>;

    /// Name of the material filling a volume.
    fn material_name(&self, volume: VolumeIndex) -> RootEngineResult<&str>;

    /// Attach a user id to a volume.
    fn set_unique_id(&mut self, volume: VolumeIndex, id: u64) -> RootEngineResult<()>;

    /// The user id attached to a volume, 0 if none was set.
    fn unique_id(&self, volume: VolumeIndex) -> RootEngineResult<u64>;

    /// Volume of the region owned by a node, daughters excluded.
    fn capacity(&self, volume: VolumeIndex) -> RootEngineResult<f64>;

    /// Check if a point lies in the region owned by a node. Points on a
    /// boundary belong to the innermost shape touching them.
    fn is_inside(&self, volume: VolumeIndex, point: &[f64; 3]) -> RootEngineResult<bool>;

    /// Locate the current point, resolving boundary points by the direction.
    /// The located node is stored in the navigator and returned.
    fn find_node(&self, navigator: &mut Self::Navigator) -> Option<VolumeIndex>;

    /// Compute the distance to the next boundary from the current node.
    fn find_next_boundary(&self, navigator: &mut Self::Navigator) -> RootEngineResult<f64>;

    /// Move onto the next boundary and relocate. Returns the new node, or
    /// `None` when the step leaves the world.
    fn step(&self, navigator: &mut Self::Navigator) -> RootEngineResult<Option<VolumeIndex>>;

    /// Unit normal of a volume's shape at a point on it, oriented along
    /// `direction`.
    fn find_normal(
        &self,
        volume: VolumeIndex,
        point: &[f64; 3],
        direction: &[f64; 3],
    ) -> RootEngineResult<[f64; 3]>;

    /// Distance from the current point to the nearest boundary of its node
    /// in any direction.
    fn safety(&self, navigator: &Self::Navigator) -> RootEngineResult<f64>;
}
