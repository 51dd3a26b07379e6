//! [`ModuleInterface`] for the DagMC backend.

use frensie_geometry::{
    BoundaryHit, InternalCellHandle, InternalSurfaceHandle, ModuleInterface, PointLocation, Ray,
    ThreadIndex, TraceResult,
};

use crate::engine::DagMcEngine;
use crate::geometry::DagMc;

impl<E: DagMcEngine> ModuleInterface for DagMc<E> {
    fn initialize(&mut self) {
        self.clear_found_cell_cache();

        if self.thread_capacity() == 0 {
            DagMc::enable_thread_support(self, 1);
        }
    }

    fn enable_thread_support(&mut self, num_threads: usize) {
        DagMc::enable_thread_support(self, num_threads);
    }

    fn thread_capacity(&self) -> usize {
        DagMc::thread_capacity(self)
    }

    fn does_cell_exist(&self, cell: InternalCellHandle) -> bool {
        DagMc::does_cell_exist(self, cell)
    }

    fn does_surface_exist(&self, surface: InternalSurfaceHandle) -> bool {
        DagMc::does_surface_exist(self, surface)
    }

    fn set_internal_ray(
        &self,
        thread: ThreadIndex,
        ray: &Ray,
        start_cell: InternalCellHandle,
    ) -> TraceResult<()> {
        self.set_internal_ray_in_cell(thread, ray, start_cell, false)
    }

    fn find_cell_containing_start_ray(&self, ray: &Ray) -> TraceResult<InternalCellHandle> {
        self.find_and_cache_cell_containing_external_ray(ray)
    }

    fn find_cell_containing_internal_ray(&self, thread: ThreadIndex) -> InternalCellHandle {
        DagMc::find_cell_containing_internal_ray(self, thread)
    }

    fn fire_internal_ray(&self, thread: ThreadIndex) -> TraceResult<BoundaryHit> {
        DagMc::fire_internal_ray(self, thread)
    }

    fn advance_internal_ray_to_cell_boundary(
        &self,
        thread: ThreadIndex,
        surface_normal: Option<&mut [f64; 3]>,
    ) -> TraceResult<bool> {
        DagMc::advance_internal_ray_to_cell_boundary(self, thread, surface_normal)
    }

    fn advance_internal_ray_by_substep(&self, thread: ThreadIndex, substep_distance: f64) {
        DagMc::advance_internal_ray_by_substep(self, thread, substep_distance);
    }

    fn change_internal_ray_direction(
        &self,
        thread: ThreadIndex,
        direction: [f64; 3],
    ) -> TraceResult<()> {
        DagMc::change_internal_ray_direction(self, thread, direction)
    }

    fn get_internal_ray_position(&self, thread: ThreadIndex) -> [f64; 3] {
        DagMc::get_internal_ray_position(self, thread)
    }

    fn get_internal_ray_direction(&self, thread: ThreadIndex) -> [f64; 3] {
        DagMc::get_internal_ray_direction(self, thread)
    }

    fn is_termination_cell(&self, cell: InternalCellHandle) -> bool {
        DagMc::is_termination_cell(self, cell)
    }

    fn get_point_location(
        &self,
        ray: &Ray,
        cell: InternalCellHandle,
    ) -> TraceResult<PointLocation> {
        DagMc::get_point_location(self, ray, cell)
    }
}
