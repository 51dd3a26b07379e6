//! Ray representation: an owned value type and a borrowed view over
//! caller-owned buffers.

use std::cell::Cell;
use std::fmt;

use frensie_math::{array_to_string, is_unit_vector};

/// A ray in 3D space defined by a position and a unit direction.
///
/// The ray owns copies of its position and direction. Use [`RayView`] when the
/// ray must alias buffers owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    position: [f64; 3],
    direction: [f64; 3],
}

impl Ray {
    /// Create a ray from scalar coordinates.
    ///
    /// The direction must already be normalized.
    pub fn new(x: f64, y: f64, z: f64, u: f64, v: f64, w: f64) -> Self {
        Self::from_arrays([x, y, z], [u, v, w])
    }

    /// Create a ray by copying a position and a direction.
    pub fn from_arrays(position: [f64; 3], direction: [f64; 3]) -> Self {
        debug_assert!(
            is_unit_vector(&direction),
            "ray direction {} is not a unit vector",
            array_to_string(&direction)
        );

        Self { position, direction }
    }

    /// The ray head position.
    #[inline]
    pub fn position(&self) -> &[f64; 3] {
        &self.position
    }

    /// The unit direction of the ray.
    #[inline]
    pub fn direction(&self) -> &[f64; 3] {
        &self.direction
    }

    /// Evaluate the ray at parameter `t`: `position + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> [f64; 3] {
        [
            self.position[0] + t * self.direction[0],
            self.position[1] + t * self.direction[1],
            self.position[2] + t * self.direction[2],
        ]
    }

    /// Replace the direction, leaving the position untouched.
    pub fn change_direction(&mut self, direction: [f64; 3]) {
        debug_assert!(
            is_unit_vector(&direction),
            "ray direction {} is not a unit vector",
            array_to_string(&direction)
        );

        self.direction = direction;
    }

    /// Move the ray head along the direction by `distance`.
    pub fn advance_head(&mut self, distance: f64) {
        self.position = self.at(distance);
    }
}

impl fmt::Display for Ray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            array_to_string(&self.position),
            array_to_string(&self.direction)
        )
    }
}

/// Reinterpret a mutable triple as shared cells so it can back a [`RayView`]
/// while remaining writable by its owner.
pub fn as_cells(data: &mut [f64; 3]) -> &[Cell<f64>; 3] {
    let cells = Cell::from_mut(&mut data[..]).as_slice_of_cells();

    // A slice of length 3 always converts to an array reference of length 3
    match cells.try_into() {
        Ok(array) => array,
        Err(_) => unreachable!(),
    }
}

/// A non-owning ray over caller-supplied buffers.
///
/// Writes made by the owner of the buffers are visible through the view, and
/// [`RayView::advance_head`] / [`RayView::change_direction`] write straight
/// into the owner's buffers. The buffers must outlive the view.
#[derive(Debug, Clone, Copy)]
pub struct RayView<'a> {
    position: &'a [Cell<f64>; 3],
    direction: &'a [Cell<f64>; 3],
}

impl<'a> RayView<'a> {
    /// Create a view over a position buffer and a direction buffer.
    pub fn new(position: &'a [Cell<f64>; 3], direction: &'a [Cell<f64>; 3]) -> Self {
        let view = Self {
            position,
            direction,
        };

        debug_assert!(
            is_unit_vector(&view.direction()),
            "ray direction {} is not a unit vector",
            array_to_string(&view.direction())
        );

        view
    }

    /// Snapshot of the current head position.
    #[inline]
    pub fn position(&self) -> [f64; 3] {
        [
            self.position[0].get(),
            self.position[1].get(),
            self.position[2].get(),
        ]
    }

    /// Snapshot of the current direction.
    #[inline]
    pub fn direction(&self) -> [f64; 3] {
        [
            self.direction[0].get(),
            self.direction[1].get(),
            self.direction[2].get(),
        ]
    }

    /// Overwrite the direction buffer.
    pub fn change_direction(&self, direction: [f64; 3]) {
        debug_assert!(is_unit_vector(&direction));

        for (cell, value) in self.direction.iter().zip(direction) {
            cell.set(value);
        }
    }

    /// Move the head position along the direction by `distance`.
    pub fn advance_head(&self, distance: f64) {
        for (p, d) in self.position.iter().zip(self.direction.iter()) {
            p.set(p.get() + distance * d.get());
        }
    }

    /// Copy the current state into an owned [`Ray`].
    pub fn to_ray(&self) -> Ray {
        Ray::from_arrays(self.position(), self.direction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ray_construction() {
        let ray = Ray::new(1.0, 1.0, 1.0, 0.0, 0.0, 1.0);
        assert_eq!(ray.position(), &[1.0, 1.0, 1.0]);
        assert_eq!(ray.direction(), &[0.0, 0.0, 1.0]);

        let from_arrays = Ray::from_arrays([1.0, 1.0, 1.0], [0.0, 0.0, 1.0]);
        assert_eq!(ray, from_arrays);
    }

    #[test]
    fn test_advance_head() {
        let mut ray = Ray::new(1.0, 1.0, 1.0, 0.0, 0.0, 1.0);
        ray.advance_head(2.0);
        assert_eq!(ray.position(), &[1.0, 1.0, 3.0]);
        assert_eq!(ray.direction(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_advance_is_additive() {
        let s = 1.0 / 3.0f64.sqrt();
        let mut twice = Ray::new(-1.0, 2.0, 0.5, s, -s, s);
        let mut once = twice;

        twice.advance_head(1.25);
        twice.advance_head(3.5);
        once.advance_head(4.75);

        for i in 0..3 {
            assert_relative_eq!(twice.position()[i], once.position()[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_change_direction_keeps_position() {
        let mut ray = Ray::new(1.0, 1.0, 1.0, 0.0, 0.0, 1.0);
        ray.change_direction([1.0, 0.0, 0.0]);
        assert_eq!(ray.direction(), &[1.0, 0.0, 0.0]);
        assert_eq!(ray.position(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_display() {
        let ray = Ray::new(1.0, 2.0, 3.0, 0.0, 1.0, 0.0);
        assert_eq!(ray.to_string(), "{1,2,3} -> {0,1,0}");
    }

    #[test]
    fn test_view_sees_owner_writes() {
        let position = [Cell::new(1.0), Cell::new(1.0), Cell::new(1.0)];
        let direction = [Cell::new(0.0), Cell::new(0.0), Cell::new(1.0)];

        let view = RayView::new(&position, &direction);

        position[0].set(5.0);
        direction[2].set(0.0);
        direction[1].set(1.0);

        assert_eq!(view.position(), [5.0, 1.0, 1.0]);
        assert_eq!(view.direction(), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_owner_sees_view_writes() {
        let mut position = [1.0, 1.0, 1.0];
        let mut direction = [0.0, 0.0, 1.0];

        {
            let view = RayView::new(as_cells(&mut position), as_cells(&mut direction));
            view.advance_head(2.0);
            view.change_direction([1.0, 0.0, 0.0]);
            view.advance_head(1.0);
        }

        assert_eq!(position, [2.0, 1.0, 3.0]);
        assert_eq!(direction, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_view_to_owned_ray_is_detached() {
        let position = [Cell::new(0.0), Cell::new(0.0), Cell::new(0.0)];
        let direction = [Cell::new(1.0), Cell::new(0.0), Cell::new(0.0)];
        let view = RayView::new(&position, &direction);

        let owned = view.to_ray();
        view.advance_head(3.0);

        assert_eq!(owned.position(), &[0.0, 0.0, 0.0]);
        assert_eq!(view.position(), [3.0, 0.0, 0.0]);
    }
}
