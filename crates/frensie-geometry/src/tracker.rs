//! Particle tracking on top of [`ModuleInterface`].
//!
//! A history starts at a ray, finds its start cell, and crosses boundaries
//! until it enters a termination cell. A [`LostParticleError`] ends only the
//! history that raised it; batches count such histories and keep going.

use log::{debug, warn};
use rayon::prelude::*;

use crate::error::{GeometryError, LostParticleError, TraceResult};
use crate::module_interface::ModuleInterface;
use crate::module_traits::{InternalCellHandle, InternalSurfaceHandle, ThreadIndex};
use crate::ray::Ray;

/// Limits applied to a single history.
#[derive(Debug, Clone, Copy)]
pub struct TrackLimits {
    /// Maximum number of boundary crossings (reflections included).
    pub max_crossings: usize,
}

impl Default for TrackLimits {
    fn default() -> Self {
        Self {
            max_crossings: 10_000,
        }
    }
}

/// The path of one particle history through the geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    /// Cells entered, starting with the start cell.
    pub cells: Vec<InternalCellHandle>,
    /// Surfaces reached, in order (reflecting surfaces included).
    pub surfaces: Vec<InternalSurfaceHandle>,
    /// Total distance travelled.
    pub path_length: f64,
    /// Number of reflections.
    pub reflections: usize,
    /// True if the history ended in a termination cell.
    pub terminated: bool,
}

/// Outcome counts for a batch of histories.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchSummary {
    /// Histories run.
    pub histories: usize,
    /// Histories that reached a termination cell.
    pub terminated: usize,
    /// Histories that hit the crossing limit.
    pub truncated: usize,
    /// Histories ended by a lost-particle error.
    pub lost: usize,
    /// Summed path length of the histories that were not lost.
    pub total_path_length: f64,
}

impl BatchSummary {
    fn merge(self, other: Self) -> Self {
        Self {
            histories: self.histories + other.histories,
            terminated: self.terminated + other.terminated,
            truncated: self.truncated + other.truncated,
            lost: self.lost + other.lost,
            total_path_length: self.total_path_length + other.total_path_length,
        }
    }

    fn from_outcome(outcome: &TraceResult<Track>) -> Self {
        match outcome {
            Ok(track) => Self {
                histories: 1,
                terminated: usize::from(track.terminated),
                truncated: usize::from(!track.terminated),
                lost: 0,
                total_path_length: track.path_length,
            },
            Err(_) => Self {
                histories: 1,
                lost: 1,
                ..Self::default()
            },
        }
    }
}

/// Follow one history using the internal ray of `thread`.
pub fn track_particle<M: ModuleInterface + ?Sized>(
    module: &M,
    thread: ThreadIndex,
    ray: &Ray,
    limits: &TrackLimits,
) -> TraceResult<Track> {
    let start_cell = module.find_cell_containing_start_ray(ray)?;
    module.set_internal_ray(thread, ray, start_cell)?;

    let mut track = Track {
        cells: vec![start_cell],
        ..Track::default()
    };

    if module.is_termination_cell(start_cell) {
        track.terminated = true;
        return Ok(track);
    }

    for _ in 0..limits.max_crossings {
        let hit = module.fire_internal_ray(thread)?;
        let reflected = module.advance_internal_ray_to_cell_boundary(thread, None)?;

        track.path_length += hit.distance;
        track.surfaces.push(hit.surface);

        if reflected {
            track.reflections += 1;
            continue;
        }

        let cell = module.find_cell_containing_internal_ray(thread);
        track.cells.push(cell);

        if module.is_termination_cell(cell) {
            track.terminated = true;
            break;
        }
    }

    if !track.terminated {
        debug!(
            "history starting at {ray} truncated after {} crossings",
            limits.max_crossings
        );
    }

    Ok(track)
}

/// Run a batch of histories on a pool with one worker per ray slot.
///
/// Lost particles are logged once and counted; they never abort the batch.
pub fn track_batch<M: ModuleInterface>(
    module: &M,
    rays: &[Ray],
    limits: &TrackLimits,
) -> Result<BatchSummary, GeometryError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(module.thread_capacity().max(1))
        .build()?;

    let summary = pool.install(|| {
        rays.par_iter()
            .map(|ray| {
                let thread = rayon::current_thread_index().unwrap_or(0);
                let outcome = track_particle(module, thread, ray, limits);

                if let Err(err) = &outcome {
                    report_lost_particle(ray, err);
                }

                BatchSummary::from_outcome(&outcome)
            })
            .reduce(BatchSummary::default, BatchSummary::merge)
    });

    Ok(summary)
}

fn report_lost_particle(ray: &Ray, err: &LostParticleError) {
    warn!("lost particle starting at {ray}: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_merge() {
        let a = BatchSummary {
            histories: 2,
            terminated: 1,
            truncated: 1,
            lost: 0,
            total_path_length: 3.0,
        };
        let b = BatchSummary {
            histories: 1,
            lost: 1,
            ..BatchSummary::default()
        };
        let merged = a.merge(b);
        assert_eq!(merged.histories, 3);
        assert_eq!(merged.terminated, 1);
        assert_eq!(merged.truncated, 1);
        assert_eq!(merged.lost, 1);
        assert_eq!(merged.total_path_length, 3.0);
    }

    #[test]
    fn test_summary_from_outcome() {
        let track = Track {
            cells: vec![1, 2],
            surfaces: vec![7],
            path_length: 4.5,
            reflections: 0,
            terminated: true,
        };
        let s = BatchSummary::from_outcome(&Ok(track));
        assert_eq!(s.terminated, 1);
        assert_eq!(s.total_path_length, 4.5);

        let lost = BatchSummary::from_outcome(&Err(LostParticleError::CellNotFound {
            position: [0.0; 3],
            direction: [0.0, 0.0, 1.0],
        }));
        assert_eq!(lost.lost, 1);
        assert_eq!(lost.histories, 1);
    }
}
