#![warn(missing_docs)]

//! Root backend for the FRENSIE geometry layer.
//!
//! Wraps a CSG volume-tree engine behind [`ModuleInterface`]. Every engine
//! volume becomes one cell, numbered from 1 in volume order, and the outer
//! boundary of each volume is the surface carrying the same number. Cells
//! are classified by the material filling them.
//!
//! # Architecture
//!
//! - [`RootEngine`] / [`RootNavigator`] - contract of the volume-tree engine
//! - [`Root`] - the geometry context, one navigator per worker slot
//! - [`RootConfig`] - terminal and void material names
//! - [`AnalyticModel`] - boxes, spheres and tubes loaded from TOML
//!
//! # Example
//!
//! ```ignore
//! use frensie_geometry::{tracker, Ray};
//! use frensie_geometry_root::{AnalyticModel, Root, RootConfig};
//!
//! let geometry = Root::<AnalyticModel>::initialize("nested_boxes.toml", RootConfig::default())?;
//!
//! let ray = Ray::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0);
//! let track = tracker::track_particle(&geometry, 0, &ray, &Default::default())?;
//! assert!(track.terminated);
//! ```
//!
//! [`ModuleInterface`]: frensie_geometry::ModuleInterface

pub mod analytic_model;
pub mod config;
pub mod engine;
mod geometry;
mod interface;

pub use analytic_model::{AnalyticModel, AnalyticNavigator, Shape};
pub use config::RootConfig;
pub use engine::{RootEngine, RootEngineError, RootEngineResult, RootNavigator, VolumeIndex};
pub use geometry::Root;
