//! Handle types and small value types shared by every geometry backend.

use serde::{Deserialize, Serialize};

/// Transport-facing cell identifier. Unique per problem.
pub type InternalCellHandle = u64;

/// Transport-facing surface identifier. Unique per problem.
pub type InternalSurfaceHandle = u64;

/// Index of the worker slot that owns an internal ray.
pub type ThreadIndex = usize;

/// Cell handle value that never names a problem cell.
pub const INVALID_CELL_HANDLE: InternalCellHandle = 0;

/// Surface handle value that never names a problem surface.
pub const INVALID_SURFACE_HANDLE: InternalSurfaceHandle = 0;

/// Location of a point with respect to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointLocation {
    /// Strictly inside the cell.
    Inside,
    /// Outside the cell.
    Outside,
    /// On the cell boundary (the direction could not disambiguate).
    On,
}

impl PointLocation {
    /// Map an engine's ternary point-in-volume code.
    ///
    /// `1` is inside, `0` is outside and `-1` is on the boundary. Any other
    /// value is not a valid answer and yields `None`.
    pub fn from_engine_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Inside),
            0 => Some(Self::Outside),
            -1 => Some(Self::On),
            _ => None,
        }
    }
}

/// Nearest boundary crossing along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryHit {
    /// Distance from the ray head to the crossing.
    pub distance: f64,
    /// Surface that will be crossed.
    pub surface: InternalSurfaceHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_code_mapping() {
        assert_eq!(PointLocation::from_engine_code(1), Some(PointLocation::Inside));
        assert_eq!(PointLocation::from_engine_code(0), Some(PointLocation::Outside));
        assert_eq!(PointLocation::from_engine_code(-1), Some(PointLocation::On));
        assert_eq!(PointLocation::from_engine_code(2), None);
        assert_eq!(PointLocation::from_engine_code(-7), None);
    }
}
