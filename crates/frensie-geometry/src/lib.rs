#![warn(missing_docs)]

//! Backend-neutral core of the FRENSIE geometry layer.
//!
//! Particle transport code talks to a geometry engine through this crate
//! only: it builds [`Ray`]s, holds [`InternalCellHandle`]s and
//! [`InternalSurfaceHandle`]s, and drives a backend through the
//! [`ModuleInterface`] trait.
//!
//! # Architecture
//!
//! - [`Ray`] / [`RayView`] - owned and borrowed ray representations
//! - [`ModuleInterface`] - the uniform API every backend implements
//! - [`LostParticleError`] - the only failure channel of ray-tracing queries
//! - [`tracker`] - history and batch tracking written against the trait
//!
//! # Example
//!
//! ```ignore
//! use frensie_geometry::{tracker, ModuleInterface, Ray};
//!
//! fn run<M: ModuleInterface>(geometry: &M) {
//!     let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
//!     match tracker::track_particle(geometry, 0, &ray, &Default::default()) {
//!         Ok(track) => println!("visited {:?}", track.cells),
//!         Err(lost) => eprintln!("lost particle: {lost}"),
//!     }
//! }
//! ```

pub mod error;
mod module_interface;
mod module_traits;
mod ray;
pub mod tracker;

pub use error::{GeometryError, LostParticleError, Result, TraceResult};
pub use module_interface::ModuleInterface;
pub use module_traits::{
    BoundaryHit, InternalCellHandle, InternalSurfaceHandle, PointLocation, ThreadIndex,
    INVALID_CELL_HANDLE, INVALID_SURFACE_HANDLE,
};
pub use ray::{as_cells, Ray, RayView};
