//! The Root geometry context.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use frensie_geometry::{
    BoundaryHit, GeometryError, InternalCellHandle, InternalSurfaceHandle, LostParticleError,
    PointLocation, Ray, Result, ThreadIndex, TraceResult, INVALID_CELL_HANDLE,
};
use frensie_math::{array_to_string, is_unit_vector};
use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};

use crate::config::RootConfig;
use crate::engine::{RootEngine, RootNavigator, VolumeIndex};

/// A loaded analytic geometry ready for ray tracing.
///
/// Cell ids are assigned once, in volume order starting from 1. The outer
/// boundary of every volume is a surface carrying the volume's cell id.
pub struct Root<E: RootEngine> {
    engine: E,
    config: RootConfig,
    cells: BTreeMap<InternalCellHandle, VolumeIndex>,
    volume_cells: HashMap<VolumeIndex, InternalCellHandle>,
    termination_cells: BTreeSet<InternalCellHandle>,
    void_cells: BTreeSet<InternalCellHandle>,
    internal_rays: Vec<Mutex<E::Navigator>>,
}

impl<E: RootEngine> Root<E> {
    /// Load a geometry file and build the context.
    pub fn initialize(path: impl AsRef<Path>, config: RootConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        let engine = E::load(path)?;

        info!("loaded Root geometry {}", path.display());

        Self::from_engine(engine, config)
    }

    /// Assign cell ids and build the context around a loaded engine.
    pub fn from_engine(mut engine: E, config: RootConfig) -> Result<Self> {
        config.validate()?;

        let mut cells = BTreeMap::new();
        let mut volume_cells = HashMap::new();
        let mut termination_cells = BTreeSet::new();
        let mut void_cells = BTreeSet::new();

        for (number, volume) in engine.volumes().into_iter().enumerate() {
            engine.set_unique_id(volume, number as u64 + 1)?;
            let id = engine.unique_id(volume)?;

            cells.insert(id, volume);
            volume_cells.insert(volume, id);

            let material = engine.material_name(volume)?;

            if material == config.terminal_material {
                termination_cells.insert(id);
            } else if material == config.void_material {
                void_cells.insert(id);
            }
        }

        if termination_cells.is_empty() {
            return Err(GeometryError::InvalidGeometry(format!(
                "no cell is filled with the terminal material '{}'",
                config.terminal_material
            )));
        }

        let root = Self {
            engine,
            config,
            cells,
            volume_cells,
            termination_cells,
            void_cells,
            internal_rays: vec![Mutex::new(E::Navigator::default())],
        };

        info!(
            "Root geometry ready: {} cells ({} termination, {} void)",
            root.cells.len(),
            root.termination_cells.len(),
            root.void_cells.len()
        );

        Ok(root)
    }

    /// Always true: a context only exists once its geometry is loaded.
    pub fn is_initialized(&self) -> bool {
        true
    }

    /// The configuration the context was built with.
    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Allocate one navigator per worker. Existing navigators are kept.
    pub fn enable_thread_support(&mut self, num_threads: usize) {
        debug_assert!(num_threads > 0, "at least one thread is required");

        self.internal_rays
            .resize_with(num_threads.max(1), || Mutex::new(E::Navigator::default()));

        debug!("{} navigators allocated", self.internal_rays.len());
    }

    /// Number of navigators.
    pub fn thread_capacity(&self) -> usize {
        self.internal_rays.len()
    }

    /// Check if a cell exists.
    pub fn does_cell_exist(&self, cell: InternalCellHandle) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Check if a surface exists. Every cell's boundary is a surface.
    pub fn does_surface_exist(&self, surface: InternalSurfaceHandle) -> bool {
        self.cells.contains_key(&surface)
    }

    /// Problem cells, optionally including void and termination cells.
    pub fn get_cells(
        &self,
        include_void_cells: bool,
        include_termination_cells: bool,
    ) -> BTreeSet<InternalCellHandle> {
        self.cells
            .keys()
            .copied()
            .filter(|&cell| {
                if self.is_termination_cell(cell) {
                    include_termination_cells
                } else if self.is_void_cell(cell) {
                    include_void_cells
                } else {
                    true
                }
            })
            .collect()
    }

    /// Termination cells.
    pub fn termination_cells(&self) -> &BTreeSet<InternalCellHandle> {
        &self.termination_cells
    }

    /// Check if entering the cell ends a particle history.
    pub fn is_termination_cell(&self, cell: InternalCellHandle) -> bool {
        debug_assert!(self.does_cell_exist(cell));

        self.termination_cells.contains(&cell)
    }

    /// Check if the cell is filled with the void material.
    pub fn is_void_cell(&self, cell: InternalCellHandle) -> bool {
        debug_assert!(self.does_cell_exist(cell));

        self.void_cells.contains(&cell)
    }

    /// Name of the material filling a cell.
    pub fn get_cell_material_name(&self, cell: InternalCellHandle) -> Result<&str> {
        Ok(self.engine.material_name(self.volume(cell))?)
    }

    /// Volume of the region owned by a cell.
    pub fn get_cell_volume(&self, cell: InternalCellHandle) -> Result<f64> {
        let volume = self.engine.capacity(self.volume(cell))?;

        if volume <= 0.0 {
            return Err(GeometryError::InvalidGeometry(format!(
                "an invalid volume was calculated for cell {cell}"
            )));
        }

        Ok(volume)
    }

    /// Location of the ray head with respect to a cell. Root never reports
    /// [`PointLocation::On`].
    pub fn get_point_location(
        &self,
        ray: &Ray,
        cell: InternalCellHandle,
    ) -> TraceResult<PointLocation> {
        let inside = self
            .engine
            .is_inside(self.volume(cell), ray.position())
            .map_err(|err| LostParticleError::PointLocationFailed {
                cell,
                position: *ray.position(),
                direction: *ray.direction(),
                reason: err.to_string(),
            })?;

        Ok(if inside {
            PointLocation::Inside
        } else {
            PointLocation::Outside
        })
    }

    /// Normal of a cell's boundary at the ray head, oriented along the ray.
    pub fn get_surface_normal(
        &self,
        surface: InternalSurfaceHandle,
        ray: &Ray,
    ) -> TraceResult<[f64; 3]> {
        self.engine
            .find_normal(self.volume(surface), ray.position(), ray.direction())
            .map_err(|err| LostParticleError::SurfaceNormalFailed {
                surface,
                position: *ray.position(),
                reason: err.to_string(),
            })
    }

    /// Find the cell containing the ray head. The internal rays are not
    /// touched.
    pub fn find_cell_containing_external_ray(&self, ray: &Ray) -> TraceResult<InternalCellHandle> {
        let mut navigator = E::Navigator::default();
        navigator.set_current_point(*ray.position());
        navigator.set_current_direction(*ray.direction());

        self.engine
            .find_node(&mut navigator)
            .map(|volume| self.cell_id(volume))
            .ok_or(LostParticleError::CellNotFound {
                position: *ray.position(),
                direction: *ray.direction(),
            })
    }

    /// Set the internal ray of `thread`, searching for its start cell.
    pub fn set_internal_ray(&self, thread: ThreadIndex, ray: &Ray) -> TraceResult<()> {
        let cell = self.find_cell_containing_external_ray(ray)?;

        self.set_internal_ray_in_cell(thread, ray, cell);

        Ok(())
    }

    /// Set the internal ray of `thread` inside a known cell.
    pub fn set_internal_ray_in_cell(&self, thread: ThreadIndex, ray: &Ray, cell: InternalCellHandle) {
        let mut navigator = self.internal_ray(thread);

        navigator.set_current_point(*ray.position());
        navigator.set_current_direction(*ray.direction());
        navigator.set_current_node(Some(self.volume(cell)));
    }

    /// Check if the internal ray of `thread` is located in a cell.
    pub fn is_internal_ray_set(&self, thread: ThreadIndex) -> bool {
        self.internal_ray(thread).current_node().is_some()
    }

    /// Cell containing the internal ray of `thread`.
    pub fn find_cell_containing_internal_ray(&self, thread: ThreadIndex) -> InternalCellHandle {
        match self.internal_ray(thread).current_node() {
            Some(volume) => self.cell_id(volume),
            None => panic!("the internal ray of thread {thread} is not set"),
        }
    }

    /// Distance to the next boundary along the internal ray.
    pub fn fire_internal_ray(&self, thread: ThreadIndex) -> TraceResult<BoundaryHit> {
        let mut navigator = self.internal_ray(thread);

        self.fire(&mut navigator).map(|(hit, _)| hit)
    }

    /// Move the internal ray across the next boundary into the cell beyond.
    ///
    /// Always returns `false`: Root geometries have no reflecting surfaces.
    pub fn advance_internal_ray_to_cell_boundary(
        &self,
        thread: ThreadIndex,
        surface_normal: Option<&mut [f64; 3]>,
    ) -> TraceResult<bool> {
        let mut navigator = self.internal_ray(thread);
        let cell = self.navigator_cell(&navigator);

        let (hit, crossed) = self.fire(&mut navigator)?;

        let next = self
            .engine
            .step(&mut navigator)
            .map_err(|err| self.misfire(&navigator, cell, err.to_string()))?;

        if let Some(out) = surface_normal {
            *out = self
                .engine
                .find_normal(
                    crossed,
                    navigator.current_point(),
                    navigator.current_direction(),
                )
                .map_err(|err| LostParticleError::SurfaceNormalFailed {
                    surface: hit.surface,
                    position: *navigator.current_point(),
                    reason: err.to_string(),
                })?;
        }

        match next {
            Some(_) => Ok(false),
            None => Err(LostParticleError::BoundaryCellNotFound {
                cell,
                surface: hit.surface,
                reason: "the ray left the world volume".into(),
            }),
        }
    }

    /// Move the internal ray a distance shorter than the distance to the
    /// next boundary.
    pub fn advance_internal_ray_by_substep(&self, thread: ThreadIndex, substep_distance: f64) {
        debug_assert!(substep_distance >= 0.0);

        let mut navigator = self.internal_ray(thread);
        let p = navigator.current_point();
        let d = navigator.current_direction();

        let point = [
            p[0] + substep_distance * d[0],
            p[1] + substep_distance * d[1],
            p[2] + substep_distance * d[2],
        ];

        navigator.set_current_point(point);
    }

    /// Redirect the internal ray.
    pub fn change_internal_ray_direction(&self, thread: ThreadIndex, direction: [f64; 3]) {
        debug_assert!(
            is_unit_vector(&direction),
            "ray direction {} is not a unit vector",
            array_to_string(&direction)
        );

        self.internal_ray(thread).set_current_direction(direction);
    }

    /// Position of the internal ray.
    pub fn get_internal_ray_position(&self, thread: ThreadIndex) -> [f64; 3] {
        *self.internal_ray(thread).current_point()
    }

    /// Direction of the internal ray.
    pub fn get_internal_ray_direction(&self, thread: ThreadIndex) -> [f64; 3] {
        *self.internal_ray(thread).current_direction()
    }

    /// Distance from the internal ray to the nearest boundary in any
    /// direction.
    pub fn get_distance_to_closest_boundary(&self, thread: ThreadIndex) -> TraceResult<f64> {
        let navigator = self.internal_ray(thread);

        self.engine.safety(&navigator).map_err(|err| {
            self.misfire(
                &navigator,
                self.navigator_cell(&navigator),
                format!("closest boundary query failed: {err}"),
            )
        })
    }

    fn internal_ray(&self, thread: ThreadIndex) -> MutexGuard<'_, E::Navigator> {
        debug_assert!(
            thread < self.internal_rays.len(),
            "thread {thread} has no navigator (capacity {})",
            self.internal_rays.len()
        );

        self.internal_rays[thread].lock()
    }

    fn volume(&self, cell: InternalCellHandle) -> VolumeIndex {
        match self.cells.get(&cell) {
            Some(&volume) => volume,
            None => panic!("cell {cell} does not exist"),
        }
    }

    fn cell_id(&self, volume: VolumeIndex) -> InternalCellHandle {
        match self.volume_cells.get(&volume) {
            Some(&cell) => cell,
            None => panic!("engine volume {volume} has no cell id"),
        }
    }

    fn navigator_cell(&self, navigator: &E::Navigator) -> InternalCellHandle {
        navigator
            .current_node()
            .map_or(INVALID_CELL_HANDLE, |volume| self.cell_id(volume))
    }

    fn misfire(
        &self,
        navigator: &E::Navigator,
        cell: InternalCellHandle,
        reason: String,
    ) -> LostParticleError {
        LostParticleError::RayMisfire {
            cell,
            position: *navigator.current_point(),
            direction: *navigator.current_direction(),
            reason,
        }
    }

    /// The next boundary and the volume whose shape it belongs to. Computed
    /// results are reused until the navigator moves.
    fn fire(&self, navigator: &mut E::Navigator) -> TraceResult<(BoundaryHit, VolumeIndex)> {
        let (distance, volume) = match navigator.next_boundary() {
            Some(boundary) => boundary,
            None => {
                let cell = self.navigator_cell(navigator);

                self.engine
                    .find_next_boundary(navigator)
                    .map_err(|err| self.misfire(navigator, cell, err.to_string()))?;

                navigator.next_boundary().ok_or_else(|| {
                    self.misfire(navigator, cell, "no boundary was found".into())
                })?
            }
        };

        Ok((
            BoundaryHit {
                distance,
                surface: self.cell_id(volume),
            },
            volume,
        ))
    }
}
