#![warn(missing_docs)]

//! DagMC backend for the FRENSIE geometry layer.
//!
//! Wraps a faceted CAD engine behind [`ModuleInterface`]: problem cells and
//! surfaces are addressed by their user ids, the engine's own handles never
//! leave this crate, and each worker slot owns one [`DagMcRay`] tracing
//! cursor.
//!
//! # Architecture
//!
//! - [`DagMcEngine`] - contract of the CAD engine (point-in-volume, ray fire,
//!   next volume, normals, measures, properties)
//! - [`DagMc`] - the geometry context built from a loaded engine
//! - [`DagMcRay`] - per-thread cursor caching the next boundary
//! - [`DagMcConfig`] / [`PropertyNames`] - load settings
//! - [`BoxModel`] - an axis-aligned faceted engine loaded from TOML
//!
//! # Example
//!
//! ```ignore
//! use frensie_geometry::{ModuleInterface, Ray};
//! use frensie_geometry_dagmc::{BoxModel, DagMc, DagMcConfig};
//!
//! let mut geometry = DagMc::<BoxModel>::initialize("stacked.toml", DagMcConfig::default())?;
//! geometry.enable_thread_support(4);
//!
//! let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
//! let cell = geometry.find_cell_containing_start_ray(&ray)?;
//! ModuleInterface::set_internal_ray(&geometry, 0, &ray, cell)?;
//! let hit = geometry.fire_internal_ray(0)?;
//! ```
//!
//! [`ModuleInterface`]: frensie_geometry::ModuleInterface

pub mod box_model;
pub mod engine;
mod geometry;
mod handler;
mod interface;
pub mod properties;
mod ray;

pub use box_model::{BoxHistory, BoxModel};
pub use engine::{DagMcEngine, EngineError, EngineResult, EntityHandle, RayHistory};
pub use geometry::DagMc;
pub use handler::EntityHandler;
pub use properties::{DagMcConfig, EstimatorSpec, EstimatorType, ParticleType, PropertyNames};
pub use ray::DagMcRay;
