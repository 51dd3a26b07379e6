//! [`ModuleInterface`] for the Root backend.

use frensie_geometry::{
    BoundaryHit, InternalCellHandle, InternalSurfaceHandle, ModuleInterface, PointLocation, Ray,
    ThreadIndex, TraceResult,
};

use crate::engine::RootEngine;
use crate::geometry::Root;

impl<E: RootEngine> ModuleInterface for Root<E> {
    fn initialize(&mut self) {
        if self.thread_capacity() == 0 {
            Root::enable_thread_support(self, 1);
        }
    }

    fn enable_thread_support(&mut self, num_threads: usize) {
        Root::enable_thread_support(self, num_threads);
    }

    fn thread_capacity(&self) -> usize {
        Root::thread_capacity(self)
    }

    fn does_cell_exist(&self, cell: InternalCellHandle) -> bool {
        Root::does_cell_exist(self, cell)
    }

    fn does_surface_exist(&self, surface: InternalSurfaceHandle) -> bool {
        Root::does_surface_exist(self, surface)
    }

    fn set_internal_ray(
        &self,
        thread: ThreadIndex,
        ray: &Ray,
        start_cell: InternalCellHandle,
    ) -> TraceResult<()> {
        self.set_internal_ray_in_cell(thread, ray, start_cell);
        Ok(())
    }

    fn find_cell_containing_start_ray(&self, ray: &Ray) -> TraceResult<InternalCellHandle> {
        self.find_cell_containing_external_ray(ray)
    }

    fn find_cell_containing_internal_ray(&self, thread: ThreadIndex) -> InternalCellHandle {
        Root::find_cell_containing_internal_ray(self, thread)
    }

    fn fire_internal_ray(&self, thread: ThreadIndex) -> TraceResult<BoundaryHit> {
        Root::fire_internal_ray(self, thread)
    }

    fn advance_internal_ray_to_cell_boundary(
        &self,
        thread: ThreadIndex,
        surface_normal: Option<&mut [f64; 3]>,
    ) -> TraceResult<bool> {
        Root::advance_internal_ray_to_cell_boundary(self, thread, surface_normal)
    }

    fn advance_internal_ray_by_substep(&self, thread: ThreadIndex, substep_distance: f64) {
        Root::advance_internal_ray_by_substep(self, thread, substep_distance);
    }

    fn change_internal_ray_direction(
        &self,
        thread: ThreadIndex,
        direction: [f64; 3],
    ) -> TraceResult<()> {
        Root::change_internal_ray_direction(self, thread, direction);
        Ok(())
    }

    fn get_internal_ray_position(&self, thread: ThreadIndex) -> [f64; 3] {
        Root::get_internal_ray_position(self, thread)
    }

    fn get_internal_ray_direction(&self, thread: ThreadIndex) -> [f64; 3] {
        Root::get_internal_ray_direction(self, thread)
    }

    fn is_termination_cell(&self, cell: InternalCellHandle) -> bool {
        Root::is_termination_cell(self, cell)
    }

    fn get_point_location(
        &self,
        ray: &Ray,
        cell: InternalCellHandle,
    ) -> TraceResult<PointLocation> {
        Root::get_point_location(self, ray, cell)
    }
}
