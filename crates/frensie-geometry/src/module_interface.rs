//! Backend-neutral geometry interface used by particle transport code.
//!
//! Every geometry backend implements [`ModuleInterface`]; transport code is
//! written against the trait and monomorphized per backend. Tracing queries
//! return the backend's [`LostParticleError`] unchanged, so the transport
//! loop sees the diagnostic the backend produced.

use crate::error::TraceResult;
use crate::module_traits::{
    BoundaryHit, InternalCellHandle, InternalSurfaceHandle, PointLocation, ThreadIndex,
};
use crate::ray::Ray;

/// Uniform geometry API for transport code.
///
/// Internal-ray operations act on the tracing cursor owned by worker slot
/// `thread`. Each slot must only be driven by one worker at a time.
pub trait ModuleInterface: Send + Sync {
    /// Prepare the backend for a new simulation run.
    ///
    /// Clears run-scoped caches and guarantees at least one worker slot. The
    /// backend itself must already be loaded.
    fn initialize(&mut self);

    /// Allocate one internal ray cursor per worker.
    fn enable_thread_support(&mut self, num_threads: usize);

    /// Number of worker slots currently allocated.
    fn thread_capacity(&self) -> usize;

    /// Check if a cell exists.
    fn does_cell_exist(&self, cell: InternalCellHandle) -> bool;

    /// Check if a surface exists.
    fn does_surface_exist(&self, surface: InternalSurfaceHandle) -> bool;

    /// Set the internal ray of `thread`, starting in `start_cell`.
    ///
    /// The ray is fired so the distance to the next boundary is known.
    fn set_internal_ray(
        &self,
        thread: ThreadIndex,
        ray: &Ray,
        start_cell: InternalCellHandle,
    ) -> TraceResult<()>;

    /// Find the cell containing a freshly created ray.
    fn find_cell_containing_start_ray(&self, ray: &Ray) -> TraceResult<InternalCellHandle>;

    /// The cell containing the internal ray of `thread`.
    fn find_cell_containing_internal_ray(&self, thread: ThreadIndex) -> InternalCellHandle;

    /// Distance from the internal ray to the next boundary and the surface hit.
    fn fire_internal_ray(&self, thread: ThreadIndex) -> TraceResult<BoundaryHit>;

    /// Move the internal ray onto the next boundary.
    ///
    /// Returns `true` if the boundary reflected the ray. When `surface_normal`
    /// is given it receives the normal of the crossed surface.
    fn advance_internal_ray_to_cell_boundary(
        &self,
        thread: ThreadIndex,
        surface_normal: Option<&mut [f64; 3]>,
    ) -> TraceResult<bool>;

    /// Move the internal ray a distance shorter than the distance to the
    /// next boundary.
    fn advance_internal_ray_by_substep(&self, thread: ThreadIndex, substep_distance: f64);

    /// Redirect the internal ray, dropping its cached intersection data.
    fn change_internal_ray_direction(
        &self,
        thread: ThreadIndex,
        direction: [f64; 3],
    ) -> TraceResult<()>;

    /// Current position of the internal ray.
    fn get_internal_ray_position(&self, thread: ThreadIndex) -> [f64; 3];

    /// Current direction of the internal ray.
    fn get_internal_ray_direction(&self, thread: ThreadIndex) -> [f64; 3];

    /// Check if entering `cell` ends a particle history.
    fn is_termination_cell(&self, cell: InternalCellHandle) -> bool;

    /// Location of the ray head with respect to `cell`.
    fn get_point_location(&self, ray: &Ray, cell: InternalCellHandle)
        -> TraceResult<PointLocation>;
}
