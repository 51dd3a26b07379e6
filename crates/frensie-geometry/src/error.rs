//! Error types for geometry initialization and ray tracing.

use frensie_math::array_to_string;
use thiserror::Error;

use crate::module_traits::{InternalCellHandle, InternalSurfaceHandle};

/// A geometric query could not produce a definite answer.
///
/// This is the only channel through which ray tracing reports failure. The
/// usual causes are gaps or overlaps in a faceted model and numerical edge
/// cases. Transport code is expected to end the affected particle history and
/// carry on with the next one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LostParticleError {
    /// No problem cell contains the ray head.
    #[error(
        "could not find a cell that contains the ray (position {}, direction {})",
        array_to_string(.position),
        array_to_string(.direction)
    )]
    CellNotFound {
        /// Ray head position.
        position: [f64; 3],
        /// Ray direction.
        direction: [f64; 3],
    },

    /// The engine could not find a boundary along the ray.
    #[error(
        "ray misfire in cell {cell} (position {}, direction {}): {reason}",
        array_to_string(.position),
        array_to_string(.direction)
    )]
    RayMisfire {
        /// Cell the ray was fired from.
        cell: InternalCellHandle,
        /// Ray head position.
        position: [f64; 3],
        /// Ray direction.
        direction: [f64; 3],
        /// Engine diagnostic.
        reason: String,
    },

    /// The engine failed to classify a point against a cell.
    #[error(
        "could not determine the location of the ray with respect to cell {cell} \
         (position {}, direction {}): {reason}",
        array_to_string(.position),
        array_to_string(.direction)
    )]
    PointLocationFailed {
        /// Cell being tested.
        cell: InternalCellHandle,
        /// Ray head position.
        position: [f64; 3],
        /// Ray direction.
        direction: [f64; 3],
        /// Engine diagnostic.
        reason: String,
    },

    /// No cell lies on the far side of a boundary surface.
    #[error("could not find the boundary cell across surface {surface} from cell {cell}: {reason}")]
    BoundaryCellNotFound {
        /// Cell being left.
        cell: InternalCellHandle,
        /// Surface being crossed.
        surface: InternalSurfaceHandle,
        /// Engine diagnostic.
        reason: String,
    },

    /// The engine could not evaluate a surface normal.
    #[error("could not evaluate the normal of surface {surface} at {}: {reason}", array_to_string(.position))]
    SurfaceNormalFailed {
        /// Surface queried.
        surface: InternalSurfaceHandle,
        /// Point on the surface.
        position: [f64; 3],
        /// Engine diagnostic.
        reason: String,
    },
}

/// Errors raised while setting up a geometry.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// The model could not be loaded or is inconsistent.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A property attached to a cell or surface could not be parsed.
    #[error("invalid property '{property}' on entity {entity}: {reason}")]
    InvalidProperty {
        /// Property name.
        property: String,
        /// Cell or surface id carrying the property.
        entity: u64,
        /// What is wrong with it.
        reason: String,
    },

    /// Configuration values are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read a configuration or model file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a TOML document.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The worker pool for batch tracking could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A tracing query failed during setup.
    #[error(transparent)]
    LostParticle(#[from] LostParticleError),
}

/// Result type for geometry setup.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Result type for ray-tracing queries.
pub type TraceResult<T> = std::result::Result<T, LostParticleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_particle_message() {
        let err = LostParticleError::CellNotFound {
            position: [-40.0, -40.0, 59.0],
            direction: [0.0, 0.0, 1.0],
        };
        let msg = err.to_string();
        assert!(msg.contains("{-40,-40,59}"));
        assert!(msg.contains("{0,0,1}"));
    }

    #[test]
    fn test_lost_particle_converts_to_geometry_error() {
        fn setup() -> Result<()> {
            Err(LostParticleError::BoundaryCellNotFound {
                cell: 53,
                surface: 242,
                reason: "no neighbour".into(),
            })?;
            Ok(())
        }

        match setup() {
            Err(GeometryError::LostParticle(LostParticleError::BoundaryCellNotFound {
                cell,
                surface,
                ..
            })) => {
                assert_eq!(cell, 53);
                assert_eq!(surface, 242);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
