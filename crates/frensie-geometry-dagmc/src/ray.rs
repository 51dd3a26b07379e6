//! The internal ray-tracing cursor of the DagMC backend.

use frensie_geometry::Ray;
use frensie_math::is_unit_vector;

use crate::engine::{EntityHandle, RayHistory};

/// A ray together with the cell it is in, the engine's ray history, and the
/// cached distance to the next boundary.
///
/// The cursor starts empty. Any `set` makes it ready; it never becomes empty
/// again. While ready it may additionally know its intersection surface,
/// which is dropped whenever the direction changes or the ray crosses a
/// boundary.
#[derive(Debug, Clone)]
pub struct DagMcRay<H: RayHistory> {
    ray: Option<Ray>,
    current_cell: Option<EntityHandle>,
    history: H,
    intersection: Option<(EntityHandle, f64)>,
}

impl<H: RayHistory> Default for DagMcRay<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RayHistory> DagMcRay<H> {
    /// An empty cursor.
    pub fn new() -> Self {
        Self {
            ray: None,
            current_cell: None,
            history: H::default(),
            intersection: None,
        }
    }

    /// A ready cursor at `position` heading along `direction` inside `cell`.
    pub fn with_cell(position: [f64; 3], direction: [f64; 3], cell: EntityHandle) -> Self {
        let mut ray = Self::new();
        ray.set(position, direction, cell);
        ray
    }

    /// Re-seed the cursor. Clears the history and the intersection data.
    pub fn set(&mut self, position: [f64; 3], direction: [f64; 3], cell: EntityHandle) {
        debug_assert!(is_unit_vector(&direction));

        self.ray = Some(Ray::from_arrays(position, direction));
        self.current_cell = Some(cell);
        self.history.reset();
        self.intersection = None;
    }

    /// Re-seed the cursor from an existing ray.
    pub fn set_from_ray(&mut self, ray: &Ray, cell: EntityHandle) {
        self.set(*ray.position(), *ray.direction(), cell);
    }

    /// True once position, direction and cell have been set.
    pub fn is_ready(&self) -> bool {
        self.ray.is_some() && self.current_cell.is_some()
    }

    fn ray(&self) -> &Ray {
        match &self.ray {
            Some(ray) => ray,
            None => panic!("the DagMC ray has not been set"),
        }
    }

    fn ray_mut(&mut self) -> &mut Ray {
        match &mut self.ray {
            Some(ray) => ray,
            None => panic!("the DagMC ray has not been set"),
        }
    }

    /// Current position. The cursor must be ready.
    pub fn position(&self) -> &[f64; 3] {
        self.ray().position()
    }

    /// Current direction. The cursor must be ready.
    pub fn direction(&self) -> &[f64; 3] {
        self.ray().direction()
    }

    /// The ray as a value.
    pub fn as_ray(&self) -> &Ray {
        self.ray()
    }

    /// Engine handle of the cell containing the ray. The cursor must be ready.
    pub fn current_cell(&self) -> EntityHandle {
        match self.current_cell {
            Some(cell) => cell,
            None => panic!("the DagMC ray has no current cell"),
        }
    }

    /// Redirect the ray.
    ///
    /// The intersection data is always dropped. A reflection keeps the last
    /// intersection in the history so the engine does not hit the reflecting
    /// facet again; any other change resets the history.
    pub fn change_direction(&mut self, direction: [f64; 3], reflection: bool) {
        debug_assert!(self.is_ready());

        self.ray_mut().change_direction(direction);

        if reflection {
            self.history.reset_to_last_intersection();
        } else {
            self.history.reset();
        }

        self.intersection = None;
    }

    /// Remember the next boundary along the ray.
    pub fn set_intersection_surface_data(&mut self, surface: EntityHandle, distance: f64) {
        debug_assert!(self.is_ready());
        debug_assert!(distance >= 0.0);

        self.intersection = Some((surface, distance));
    }

    /// Forget the next boundary.
    pub fn reset_intersection_surface_data(&mut self) {
        self.intersection = None;
    }

    /// True if the next boundary is known.
    pub fn knows_intersection_surface(&self) -> bool {
        self.intersection.is_some()
    }

    /// Surface of the next boundary. It must be known.
    pub fn intersection_surface(&self) -> EntityHandle {
        match self.intersection {
            Some((surface, _)) => surface,
            None => panic!("the DagMC ray does not know its intersection surface"),
        }
    }

    /// Distance to the next boundary. It must be known.
    pub fn distance_to_intersection_surface(&self) -> f64 {
        match self.intersection {
            Some((_, distance)) => distance,
            None => panic!("the DagMC ray does not know its intersection surface"),
        }
    }

    /// Move onto the known boundary and continue in `next_cell`.
    pub fn advance_to_intersection_surface(&mut self, next_cell: EntityHandle) {
        debug_assert!(self.knows_intersection_surface());

        let distance = self.distance_to_intersection_surface();
        self.ray_mut().advance_head(distance);
        self.current_cell = Some(next_cell);
        self.intersection = None;
    }

    /// Move part of the way to the known boundary without leaving the cell.
    pub fn advance_substep(&mut self, substep_distance: f64) {
        debug_assert!(self.knows_intersection_surface());
        debug_assert!(substep_distance >= 0.0);
        debug_assert!(substep_distance < self.distance_to_intersection_surface());

        self.ray_mut().advance_head(substep_distance);

        if let Some((_, distance)) = &mut self.intersection {
            *distance -= substep_distance;
        }
    }

    /// The engine's ray history.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// The engine's ray history, for queries that record into it.
    pub fn history_mut(&mut self) -> &mut H {
        &mut self.history
    }
}
