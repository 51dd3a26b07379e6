//! The DagMC geometry context.
//!
//! A [`DagMc`] owns a loaded engine, the id/handle tables built from it, the
//! found-cell cache and one internal ray per worker slot. Everything except
//! the cache and the ray slots is read-only after construction.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use frensie_geometry::{
    BoundaryHit, GeometryError, InternalCellHandle, InternalSurfaceHandle, LostParticleError,
    PointLocation, Ray, Result, ThreadIndex, TraceResult,
};
use frensie_math::{reflect_direction, Tolerance};
use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::engine::{DagMcEngine, EngineResult, EntityHandle};
use crate::handler::EntityHandler;
use crate::properties::{parse_estimator_value, DagMcConfig, EstimatorSpec, PropertyNames};
use crate::ray::DagMcRay;

type InternalRay<E> = DagMcRay<<E as DagMcEngine>::History>;

/// A loaded DagMC model ready for ray tracing.
pub struct DagMc<E: DagMcEngine> {
    engine: E,
    config: DagMcConfig,
    cells: EntityHandler,
    surfaces: EntityHandler,
    termination_cells: BTreeSet<InternalCellHandle>,
    reflecting_surfaces: BTreeSet<InternalSurfaceHandle>,
    cell_materials: BTreeMap<InternalCellHandle, u64>,
    cell_densities: BTreeMap<InternalCellHandle, f64>,
    cell_estimators: BTreeMap<u64, EstimatorSpec>,
    surface_estimators: BTreeMap<u64, EstimatorSpec>,
    found_cell_cache: Mutex<Vec<EntityHandle>>,
    internal_rays: Vec<Mutex<InternalRay<E>>>,
}

impl<E: DagMcEngine> DagMc<E> {
    /// Load a model file and build the context.
    pub fn initialize(path: impl AsRef<Path>, config: DagMcConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        let engine = E::load(path, config.facet_tolerance)?;

        info!("loaded DagMC model {}", path.display());

        Self::from_engine(engine, config)
    }

    /// Build the context around an engine that already holds a model.
    pub fn from_engine(engine: E, config: DagMcConfig) -> Result<Self> {
        config.validate()?;

        let names = &config.property_names;

        for name in engine.detect_available_props() {
            if !names.is_known(&name) {
                warn!("property '{name}' found in the model is not recognized and will be ignored");
            }
        }

        let cells = EntityHandler::new(
            "cell",
            engine
                .volumes()
                .into_iter()
                .map(|handle| engine.volume_id(handle).map(|id| (id, handle)))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            config.use_fast_id_lookup,
        )?;

        let surfaces = EntityHandler::new(
            "surface",
            engine
                .surfaces()
                .into_iter()
                .map(|handle| engine.surface_id(handle).map(|id| (id, handle)))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            config.use_fast_id_lookup,
        )?;

        let termination_cells: BTreeSet<_> =
            entities_with_property(&engine, &cells, &names.termination_cell)
                .into_iter()
                .map(|(id, _)| id)
                .collect();

        if termination_cells.is_empty() {
            return Err(GeometryError::InvalidGeometry(
                "at least one termination cell must be set".into(),
            ));
        }

        let reflecting_surfaces =
            entities_with_property(&engine, &surfaces, &names.reflecting_surface)
                .into_iter()
                .map(|(id, _)| id)
                .collect();

        let cell_materials = parse_single_values(
            entities_with_property(&engine, &cells, &names.material),
            &names.material,
            |value| value.parse::<u64>().ok(),
        )?;

        let cell_densities = parse_single_values(
            entities_with_property(&engine, &cells, &names.density),
            &names.density,
            |value| value.parse::<f64>().ok().filter(|d| d.is_finite()),
        )?;

        let cell_estimators = extract_estimators(
            entities_with_property(&engine, &cells, &names.estimator),
            names,
            EntityKind::Cell,
        )?;

        let surface_estimators = extract_estimators(
            entities_with_property(&engine, &surfaces, &names.estimator),
            names,
            EntityKind::Surface,
        )?;

        let dagmc = Self {
            engine,
            config,
            cells,
            surfaces,
            termination_cells,
            reflecting_surfaces,
            cell_materials,
            cell_densities,
            cell_estimators,
            surface_estimators,
            found_cell_cache: Mutex::new(Vec::new()),
            internal_rays: vec![Mutex::new(DagMcRay::new())],
        };

        info!(
            "DagMC geometry ready: {} cells ({} termination), {} surfaces ({} reflecting), \
             {} cell estimators, {} surface estimators",
            dagmc.cells.len(),
            dagmc.termination_cells.len(),
            dagmc.surfaces.len(),
            dagmc.reflecting_surfaces.len(),
            dagmc.cell_estimators.len(),
            dagmc.surface_estimators.len()
        );

        Ok(dagmc)
    }

    /// Always true: a context only exists once its model is loaded.
    pub fn is_initialized(&self) -> bool {
        true
    }

    /// The configuration the context was built with.
    pub fn config(&self) -> &DagMcConfig {
        &self.config
    }

    /// Property names in use.
    pub fn property_names(&self) -> &PropertyNames {
        &self.config.property_names
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Allocate one internal ray per worker. Existing slots are kept.
    pub fn enable_thread_support(&mut self, num_threads: usize) {
        debug_assert!(num_threads > 0, "at least one thread is required");

        self.internal_rays
            .resize_with(num_threads.max(1), || Mutex::new(DagMcRay::new()));
    }

    /// Number of internal ray slots.
    pub fn thread_capacity(&self) -> usize {
        self.internal_rays.len()
    }

    /// Check if a cell exists.
    pub fn does_cell_exist(&self, cell: InternalCellHandle) -> bool {
        self.cells.contains_id(cell)
    }

    /// Check if a surface exists.
    pub fn does_surface_exist(&self, surface: InternalSurfaceHandle) -> bool {
        self.surfaces.contains_id(surface)
    }

    /// Volume of a cell, as measured by the engine.
    pub fn get_cell_volume(&self, cell: InternalCellHandle) -> Result<f64> {
        let volume = self.engine.measure_volume(self.cell_handle(cell))?;

        if volume <= 0.0 {
            return Err(GeometryError::InvalidGeometry(format!(
                "an invalid volume was calculated for cell {cell}"
            )));
        }

        Ok(volume)
    }

    /// Area of a surface, as measured by the engine.
    pub fn get_surface_area(&self, surface: InternalSurfaceHandle) -> Result<f64> {
        let area = self.engine.measure_area(self.surface_handle(surface))?;

        if area <= 0.0 {
            return Err(GeometryError::InvalidGeometry(format!(
                "an invalid surface area was calculated for surface {surface}"
            )));
        }

        Ok(area)
    }

    /// Check if entering the cell ends a particle history.
    pub fn is_termination_cell(&self, cell: InternalCellHandle) -> bool {
        debug_assert!(self.does_cell_exist(cell));

        self.termination_cells.contains(&cell)
    }

    /// Check if the cell has no material.
    pub fn is_void_cell(&self, cell: InternalCellHandle) -> bool {
        debug_assert!(self.does_cell_exist(cell));

        !self.cell_materials.contains_key(&cell)
    }

    /// Check if the surface reflects particles.
    pub fn is_reflecting_surface(&self, surface: InternalSurfaceHandle) -> bool {
        debug_assert!(self.does_surface_exist(surface));

        self.reflecting_surfaces.contains(&surface)
    }

    /// Problem cells, optionally including void and termination cells.
    ///
    /// A termination cell is only governed by `include_termination_cells`,
    /// even when it is also void.
    pub fn get_cells(
        &self,
        include_void_cells: bool,
        include_termination_cells: bool,
    ) -> BTreeSet<InternalCellHandle> {
        self.cells
            .ids()
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

    /// Problem surfaces.
    pub fn get_surfaces(&self) -> BTreeSet<InternalSurfaceHandle> {
        self.surfaces.ids().collect()
    }

    /// Termination cells.
    pub fn termination_cells(&self) -> &BTreeSet<InternalCellHandle> {
        &self.termination_cells
    }

    /// Reflecting surfaces.
    pub fn reflecting_surfaces(&self) -> &BTreeSet<InternalSurfaceHandle> {
        &self.reflecting_surfaces
    }

    /// Material id of every non-void cell.
    pub fn cell_material_ids(&self) -> &BTreeMap<InternalCellHandle, u64> {
        &self.cell_materials
    }

    /// Density of every cell that declares one.
    pub fn cell_densities(&self) -> &BTreeMap<InternalCellHandle, f64> {
        &self.cell_densities
    }

    /// Distinct material ids used in the model.
    pub fn material_ids(&self) -> BTreeSet<u64> {
        self.cell_materials.values().copied().collect()
    }

    /// Estimators attached to cells, keyed by estimator id.
    pub fn cell_estimator_data(&self) -> &BTreeMap<u64, EstimatorSpec> {
        &self.cell_estimators
    }

    /// Estimators attached to surfaces, keyed by estimator id.
    pub fn surface_estimator_data(&self) -> &BTreeMap<u64, EstimatorSpec> {
        &self.surface_estimators
    }

    /// Location of the ray head with respect to a cell.
    pub fn get_point_location(
        &self,
        ray: &Ray,
        cell: InternalCellHandle,
    ) -> TraceResult<PointLocation> {
        self.point_location(ray.position(), ray.direction(), self.cell_handle(cell))
    }

    /// The cell on the other side of `surface` when leaving `cell`.
    pub fn get_boundary_cell(
        &self,
        cell: InternalCellHandle,
        surface: InternalSurfaceHandle,
    ) -> TraceResult<InternalCellHandle> {
        let handle = self.boundary_cell_handle(self.cell_handle(cell), self.surface_handle(surface))?;

        Ok(self.cell_id(handle))
    }

    /// Normal of a surface at a point on it.
    pub fn get_surface_normal(
        &self,
        surface: InternalSurfaceHandle,
        position: &[f64; 3],
    ) -> TraceResult<[f64; 3]> {
        self.surface_handle_normal(self.surface_handle(surface), position, None)
    }

    /// Forget every cached start cell.
    pub fn clear_found_cell_cache(&self) {
        self.found_cell_cache.lock().clear();

        debug!("found-cell cache cleared");
    }

    /// Cells currently in the found-cell cache, in insertion order.
    pub fn found_cell_cache(&self) -> Vec<InternalCellHandle> {
        let cache = self.found_cell_cache.lock().clone();

        cache.into_iter().map(|handle| self.cell_id(handle)).collect()
    }

    /// Find the cell containing the ray head by testing every cell.
    pub fn find_cell_containing_external_ray(&self, ray: &Ray) -> TraceResult<InternalCellHandle> {
        let handle = self.find_cell_handle_containing_ray(ray.position(), ray.direction(), false)?;

        Ok(self.cell_id(handle))
    }

    /// Find the cell containing the ray head, stepping into the next cell when
    /// the head sits on the boundary the ray is about to leave through.
    pub fn find_cell_containing_external_ray_checked(
        &self,
        ray: &Ray,
    ) -> TraceResult<InternalCellHandle> {
        let handle = self.find_cell_handle_containing_ray(ray.position(), ray.direction(), true)?;

        Ok(self.cell_id(handle))
    }

    /// Find the cell containing the ray head, trying cached cells first and
    /// caching the result.
    pub fn find_and_cache_cell_containing_external_ray(
        &self,
        ray: &Ray,
    ) -> TraceResult<InternalCellHandle> {
        let handle = self.find_and_cache_cell_handle(ray.position(), ray.direction())?;

        Ok(self.cell_id(handle))
    }

    /// Distance to the next boundary from an external ray.
    ///
    /// The cell containing the ray is found first.
    pub fn fire_external_ray(&self, ray: &Ray) -> TraceResult<BoundaryHit> {
        let cell = self.find_cell_handle_containing_ray(ray.position(), ray.direction(), false)?;

        self.fire_from_cell_handle(ray.position(), ray.direction(), cell)
    }

    /// Distance to the next boundary from an external ray inside `cell`.
    pub fn fire_external_ray_in_cell(
        &self,
        ray: &Ray,
        cell: InternalCellHandle,
    ) -> TraceResult<BoundaryHit> {
        self.fire_from_cell_handle(ray.position(), ray.direction(), self.cell_handle(cell))
    }

    /// Set the internal ray of `thread`, searching for its start cell.
    pub fn set_internal_ray(
        &self,
        thread: ThreadIndex,
        ray: &Ray,
        cache_start_cell: bool,
    ) -> TraceResult<()> {
        let cell = if cache_start_cell {
            self.find_and_cache_cell_handle(ray.position(), ray.direction())?
        } else {
            self.find_cell_handle_containing_ray(ray.position(), ray.direction(), false)?
        };

        self.set_internal_ray_with_handle(thread, ray, cell)
    }

    /// Set the internal ray of `thread` inside a known cell.
    pub fn set_internal_ray_in_cell(
        &self,
        thread: ThreadIndex,
        ray: &Ray,
        cell: InternalCellHandle,
        cache_start_cell: bool,
    ) -> TraceResult<()> {
        let handle = self.cell_handle(cell);

        if cache_start_cell {
            self.add_cell_to_found_cell_cache(handle);
        }

        self.set_internal_ray_with_handle(thread, ray, handle)
    }

    /// Check if the internal ray of `thread` has been set.
    pub fn is_internal_ray_set(&self, thread: ThreadIndex) -> bool {
        self.internal_ray(thread).is_ready()
    }

    /// Cell containing the internal ray of `thread`.
    pub fn find_cell_containing_internal_ray(&self, thread: ThreadIndex) -> InternalCellHandle {
        let ray = self.internal_ray(thread);
        debug_assert!(ray.is_ready());

        self.cell_id(ray.current_cell())
    }

    /// Distance to the next boundary along the internal ray.
    ///
    /// Firing an already fired ray returns the cached result.
    pub fn fire_internal_ray(&self, thread: ThreadIndex) -> TraceResult<BoundaryHit> {
        let mut ray = self.internal_ray(thread);

        self.fire_ray(&mut ray)
    }

    /// Move the internal ray onto the next boundary.
    ///
    /// At a reflecting surface the ray stays in its cell, takes the reflected
    /// direction and `true` is returned. Otherwise it enters the cell across
    /// the boundary. The ray is fired again in both cases.
    pub fn advance_internal_ray_to_cell_boundary(
        &self,
        thread: ThreadIndex,
        surface_normal: Option<&mut [f64; 3]>,
    ) -> TraceResult<bool> {
        let mut ray = self.internal_ray(thread);

        self.fire_ray(&mut ray)?;

        let surface = ray.intersection_surface();
        let current_cell = ray.current_cell();

        let reflected = if self.is_reflecting_surface(self.surface_id(surface)) {
            ray.advance_to_intersection_surface(current_cell);

            let normal = self.surface_handle_normal(surface, ray.position(), Some(ray.history()))?;

            if let Some(out) = surface_normal {
                *out = normal;
            }

            let direction = reflect_direction(ray.direction(), &normal);
            ray.change_direction(direction, true);

            true
        } else {
            let next_cell = self.boundary_cell_handle(current_cell, surface)?;
            ray.advance_to_intersection_surface(next_cell);

            if let Some(out) = surface_normal {
                *out = self.surface_handle_normal(surface, ray.position(), Some(ray.history()))?;
            }

            false
        };

        self.fire_ray(&mut ray)?;

        Ok(reflected)
    }

    /// Move the internal ray a distance shorter than the distance to the
    /// next boundary.
    pub fn advance_internal_ray_by_substep(&self, thread: ThreadIndex, substep_distance: f64) {
        let mut ray = self.internal_ray(thread);

        ray.advance_substep(substep_distance);
    }

    /// Redirect the internal ray and fire it again.
    pub fn change_internal_ray_direction(
        &self,
        thread: ThreadIndex,
        direction: [f64; 3],
    ) -> TraceResult<()> {
        let mut ray = self.internal_ray(thread);

        ray.change_direction(direction, false);
        self.fire_ray(&mut ray)?;

        Ok(())
    }

    /// Position of the internal ray.
    pub fn get_internal_ray_position(&self, thread: ThreadIndex) -> [f64; 3] {
        *self.internal_ray(thread).position()
    }

    /// Direction of the internal ray.
    pub fn get_internal_ray_direction(&self, thread: ThreadIndex) -> [f64; 3] {
        *self.internal_ray(thread).direction()
    }

    /// Distance from the internal ray to the nearest boundary in any
    /// direction.
    pub fn get_distance_to_closest_boundary(&self, thread: ThreadIndex) -> TraceResult<f64> {
        let ray = self.internal_ray(thread);
        let cell = ray.current_cell();

        self.engine
            .closest_to_location(cell, ray.position())
            .map_err(|err| LostParticleError::RayMisfire {
                cell: self.cell_id(cell),
                position: *ray.position(),
                direction: *ray.direction(),
                reason: format!("closest boundary query failed: {err}"),
            })
    }

    fn internal_ray(&self, thread: ThreadIndex) -> MutexGuard<'_, InternalRay<E>> {
        debug_assert!(
            thread < self.internal_rays.len(),
            "thread {thread} has no internal ray (capacity {})",
            self.internal_rays.len()
        );

        self.internal_rays[thread].lock()
    }

    fn cell_handle(&self, cell: InternalCellHandle) -> EntityHandle {
        match self.cells.handle(cell) {
            Some(handle) => handle,
            None => panic!("cell {cell} does not exist"),
        }
    }

    fn surface_handle(&self, surface: InternalSurfaceHandle) -> EntityHandle {
        match self.surfaces.handle(surface) {
            Some(handle) => handle,
            None => panic!("surface {surface} does not exist"),
        }
    }

    fn cell_id(&self, handle: EntityHandle) -> InternalCellHandle {
        match self.cells.id(handle) {
            Some(id) => id,
            None => panic!("engine volume {handle} is not a problem cell"),
        }
    }

    fn surface_id(&self, handle: EntityHandle) -> InternalSurfaceHandle {
        match self.surfaces.id(handle) {
            Some(id) => id,
            None => panic!("engine surface {handle} is not a problem surface"),
        }
    }

    fn set_internal_ray_with_handle(
        &self,
        thread: ThreadIndex,
        ray: &Ray,
        cell: EntityHandle,
    ) -> TraceResult<()> {
        let mut internal_ray = self.internal_ray(thread);

        internal_ray.set_from_ray(ray, cell);
        self.fire_ray(&mut internal_ray)?;

        Ok(())
    }

    fn fire_ray(&self, ray: &mut InternalRay<E>) -> TraceResult<BoundaryHit> {
        if ray.knows_intersection_surface() {
            return Ok(BoundaryHit {
                distance: ray.distance_to_intersection_surface(),
                surface: self.surface_id(ray.intersection_surface()),
            });
        }

        let cell = ray.current_cell();
        let position = *ray.position();
        let direction = *ray.direction();

        let (surface, distance) = self.checked_ray_fire(
            cell,
            &position,
            &direction,
            self.engine
                .ray_fire(cell, &position, &direction, Some(ray.history_mut())),
        )?;

        ray.set_intersection_surface_data(surface, distance);

        Ok(BoundaryHit {
            distance,
            surface: self.surface_id(surface),
        })
    }

    fn fire_from_cell_handle(
        &self,
        position: &[f64; 3],
        direction: &[f64; 3],
        cell: EntityHandle,
    ) -> TraceResult<BoundaryHit> {
        let (surface, distance) = self.checked_ray_fire(
            cell,
            position,
            direction,
            self.engine.ray_fire(cell, position, direction, None),
        )?;

        Ok(BoundaryHit {
            distance,
            surface: self.surface_id(surface),
        })
    }

    /// Turn an engine ray-fire answer into a hit, treating missing surfaces
    /// and negative distances as misfires.
    fn checked_ray_fire(
        &self,
        cell: EntityHandle,
        position: &[f64; 3],
        direction: &[f64; 3],
        answer: EngineResult<Option<(EntityHandle, f64)>>,
    ) -> TraceResult<(EntityHandle, f64)> {
        let misfire = |reason: String| LostParticleError::RayMisfire {
            cell: self.cell_id(cell),
            position: *position,
            direction: *direction,
            reason,
        };

        match answer {
            Ok(Some((surface, distance))) if distance >= 0.0 => Ok((surface, distance)),
            Ok(Some((surface, distance))) => Err(misfire(format!(
                "negative distance {distance} to surface {}",
                self.surface_id(surface)
            ))),
            Ok(None) => Err(misfire("no surface was hit".into())),
            Err(err) => Err(misfire(err.to_string())),
        }
    }

    fn point_location(
        &self,
        position: &[f64; 3],
        direction: &[f64; 3],
        cell: EntityHandle,
    ) -> TraceResult<PointLocation> {
        let failure = |reason: String| LostParticleError::PointLocationFailed {
            cell: self.cell_id(cell),
            position: *position,
            direction: *direction,
            reason,
        };

        let code = self
            .engine
            .point_in_volume(cell, position, direction, None)
            .map_err(|err| failure(err.to_string()))?;

        PointLocation::from_engine_code(code)
            .ok_or_else(|| failure(format!("unexpected point-in-volume result {code}")))
    }

    fn boundary_cell_handle(
        &self,
        cell: EntityHandle,
        surface: EntityHandle,
    ) -> TraceResult<EntityHandle> {
        let not_found = |reason: String| LostParticleError::BoundaryCellNotFound {
            cell: self.cell_id(cell),
            surface: self.surface_id(surface),
            reason,
        };

        match self.engine.next_vol(surface, cell) {
            Ok(Some(next)) if self.cells.id(next).is_some() => Ok(next),
            Ok(Some(next)) => Err(not_found(format!("volume {next} is not a problem cell"))),
            Ok(None) => Err(not_found("no volume lies across the surface".into())),
            Err(err) => Err(not_found(err.to_string())),
        }
    }

    fn surface_handle_normal(
        &self,
        surface: EntityHandle,
        position: &[f64; 3],
        history: Option<&E::History>,
    ) -> TraceResult<[f64; 3]> {
        self.engine
            .get_angle(surface, position, history)
            .map_err(|err| LostParticleError::SurfaceNormalFailed {
                surface: self.surface_id(surface),
                position: *position,
                reason: err.to_string(),
            })
    }

    /// Test every problem cell, in engine order, and return the first that
    /// strictly contains the point.
    fn find_cell_handle_containing_ray(
        &self,
        position: &[f64; 3],
        direction: &[f64; 3],
        check_on_boundary: bool,
    ) -> TraceResult<EntityHandle> {
        let mut found = None;

        for &cell in self.cells.handles() {
            if self.point_location(position, direction, cell)? == PointLocation::Inside {
                found = Some(cell);
                break;
            }
        }

        let Some(cell) = found else {
            return Err(LostParticleError::CellNotFound {
                position: *position,
                direction: *direction,
            });
        };

        if check_on_boundary {
            let hit = self.fire_from_cell_handle(position, direction, cell)?;

            if Tolerance::DEFAULT.is_on_boundary(hit.distance) {
                return self.boundary_cell_handle(cell, self.surface_handle(hit.surface));
            }
        }

        Ok(cell)
    }

    /// First cached cell that strictly contains the point.
    ///
    /// The cache is copied out so the lock is not held during engine queries.
    fn check_found_cell_cache(
        &self,
        position: &[f64; 3],
        direction: &[f64; 3],
    ) -> TraceResult<Option<EntityHandle>> {
        let cached = self.found_cell_cache.lock().clone();

        for cell in cached {
            if self.point_location(position, direction, cell)? == PointLocation::Inside {
                return Ok(Some(cell));
            }
        }

        Ok(None)
    }

    fn add_cell_to_found_cell_cache(&self, cell: EntityHandle) {
        let mut cache = self.found_cell_cache.lock();

        if !cache.contains(&cell) {
            cache.push(cell);
        }
    }

    fn find_and_cache_cell_handle(
        &self,
        position: &[f64; 3],
        direction: &[f64; 3],
    ) -> TraceResult<EntityHandle> {
        if let Some(cell) = self.check_found_cell_cache(position, direction)? {
            return Ok(cell);
        }

        let cell = self.find_cell_handle_containing_ray(position, direction, false)?;
        self.add_cell_to_found_cell_cache(cell);

        Ok(cell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Cell,
    Surface,
}

impl EntityKind {
    fn name(self) -> &'static str {
        match self {
            Self::Cell => "cell",
            Self::Surface => "surface",
        }
    }
}

/// Ids and values of every entity that carries `property`, in engine order.
fn entities_with_property<E: DagMcEngine>(
    engine: &E,
    handler: &EntityHandler,
    property: &str,
) -> Vec<(u64, Vec<String>)> {
    handler
        .handles()
        .iter()
        .filter_map(|&handle| {
            let values = engine.prop_values(handle, property)?;
            handler.id(handle).map(|id| (id, values))
        })
        .collect()
}

/// Parse properties that must carry exactly one value.
fn parse_single_values<T>(
    entries: Vec<(u64, Vec<String>)>,
    property: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<BTreeMap<u64, T>> {
    let mut parsed = BTreeMap::new();

    for (id, values) in entries {
        let invalid = |reason: String| GeometryError::InvalidProperty {
            property: property.to_string(),
            entity: id,
            reason,
        };

        let [value] = values.as_slice() else {
            return Err(invalid(format!(
                "expected exactly one value, found {}",
                values.len()
            )));
        };

        let value = parse(value.as_str()).ok_or_else(|| invalid(format!("cannot parse '{value}'")))?;
        parsed.insert(id, value);
    }

    Ok(parsed)
}

/// Group estimator property values and validate each estimator.
fn extract_estimators(
    entries: Vec<(u64, Vec<String>)>,
    names: &PropertyNames,
    kind: EntityKind,
) -> Result<BTreeMap<u64, EstimatorSpec>> {
    let mut entities_by_value: BTreeMap<String, BTreeSet<u64>> = BTreeMap::new();

    for (id, values) in entries {
        for value in values {
            entities_by_value.entry(value).or_default().insert(id);
        }
    }

    let mut estimators = BTreeMap::new();

    for (value, entities) in entities_by_value {
        let first_entity = entities.iter().next().copied().unwrap_or_default();

        let (id, estimator_type, particle_type) = parse_estimator_value(&value, names)
            .map_err(|reason| GeometryError::InvalidProperty {
                property: names.estimator.clone(),
                entity: first_entity,
                reason,
            })?;

        if estimators.contains_key(&id) {
            return Err(GeometryError::InvalidGeometry(format!(
                "estimator id {id} is used multiple times"
            )));
        }

        let type_matches = match kind {
            EntityKind::Cell => estimator_type.is_cell_estimator(),
            EntityKind::Surface => estimator_type.is_surface_estimator(),
        };

        if !type_matches {
            return Err(GeometryError::InvalidGeometry(format!(
                "{} estimator {id} has an estimator type that does not apply to {}s",
                kind.name(),
                kind.name()
            )));
        }

        if entities.is_empty() {
            return Err(GeometryError::InvalidGeometry(format!(
                "estimator {id} has no {}s assigned",
                kind.name()
            )));
        }

        estimators.insert(
            id,
            EstimatorSpec {
                estimator_type,
                particle_type,
                entities: entities.into_iter().collect(),
            },
        );
    }

    Ok(estimators)
}
