//! frensie-geom - inspect geometry models and trace rays through them

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use frensie_geometry::tracker::{self, TrackLimits};
use frensie_geometry::{ModuleInterface, Ray};
use frensie_geometry_dagmc::{BoxModel, DagMc, DagMcConfig};
use frensie_geometry_root::{AnalyticModel, Root, RootConfig};
use log::info;

#[derive(Parser)]
#[command(name = "frensie-geom")]
#[command(about = "Inspect FRENSIE geometry models and trace rays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cells and surfaces of a model
    Info {
        /// Model file
        model: PathBuf,
        /// Geometry backend
        #[arg(short, long, value_enum, default_value_t = Backend::Dagmc)]
        backend: Backend,
        /// Backend configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Trace a ray through a model
    Trace {
        /// Model file
        model: PathBuf,
        /// Geometry backend
        #[arg(short, long, value_enum, default_value_t = Backend::Dagmc)]
        backend: Backend,
        /// Backend configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Start position as x,y,z
        #[arg(long, value_parser = parse_triple, allow_hyphen_values = true)]
        position: [f64; 3],
        /// Direction as u,v,w (normalized before use)
        #[arg(long, value_parser = parse_triple, allow_hyphen_values = true)]
        direction: [f64; 3],
        /// Worker threads
        #[arg(short, long, default_value_t = 1)]
        threads: usize,
        /// Number of histories to run from the same start
        #[arg(long, default_value_t = 1)]
        histories: usize,
        /// Surface crossings allowed per history
        #[arg(long, default_value_t = TrackLimits::default().max_crossings)]
        max_crossings: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Faceted CAD geometry
    Dagmc,
    /// CSG volume tree
    Root,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info {
            model,
            backend,
            config,
        } => match backend {
            Backend::Dagmc => show_dagmc_info(&load_dagmc(&model, config.as_deref())?),
            Backend::Root => show_root_info(&load_root(&model, config.as_deref())?),
        },
        Commands::Trace {
            model,
            backend,
            config,
            position,
            direction,
            threads,
            histories,
            max_crossings,
        } => {
            let direction = frensie_math::normalize(&direction)
                .context("the direction must be a non-zero vector")?;
            let ray = Ray::from_arrays(position, direction);
            let limits = TrackLimits { max_crossings };

            if threads == 0 {
                bail!("at least one thread is required");
            }

            match backend {
                Backend::Dagmc => {
                    let mut geometry = load_dagmc(&model, config.as_deref())?;
                    trace(&mut geometry, &ray, threads, histories, &limits)
                }
                Backend::Root => {
                    let mut geometry = load_root(&model, config.as_deref())?;
                    trace(&mut geometry, &ray, threads, histories, &limits)
                }
            }
        }
    }
}

fn load_dagmc(model: &Path, config: Option<&Path>) -> Result<DagMc<BoxModel>> {
    let config = match config {
        Some(path) => DagMcConfig::from_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => DagMcConfig::default(),
    };

    DagMc::initialize(model, config)
        .with_context(|| format!("failed to load DagMC model {}", model.display()))
}

fn load_root(model: &Path, config: Option<&Path>) -> Result<Root<AnalyticModel>> {
    let config = match config {
        Some(path) => RootConfig::from_file(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => RootConfig::default(),
    };

    Root::initialize(model, config)
        .with_context(|| format!("failed to load Root model {}", model.display()))
}

fn show_dagmc_info(geometry: &DagMc<BoxModel>) -> Result<()> {
    let cells = geometry.get_cells(true, true);
    let surfaces = geometry.get_surfaces();

    println!("Backend: DagMC");
    println!("Termination cells: {:?}", geometry.termination_cells());
    println!("Cells: {}", cells.len());
    for &cell in &cells {
        let kind = if geometry.is_termination_cell(cell) {
            " (termination)"
        } else if geometry.is_void_cell(cell) {
            " (void)"
        } else {
            ""
        };
        println!("  {cell}: volume {:.6}{kind}", geometry.get_cell_volume(cell)?);
    }

    println!("Surfaces: {}", surfaces.len());
    for &surface in &surfaces {
        let kind = if geometry.is_reflecting_surface(surface) {
            " (reflecting)"
        } else {
            ""
        };
        println!("  {surface}: area {:.6}{kind}", geometry.get_surface_area(surface)?);
    }

    Ok(())
}

fn show_root_info(geometry: &Root<AnalyticModel>) -> Result<()> {
    let cells = geometry.get_cells(true, true);

    println!("Backend: Root");
    println!("Termination cells: {:?}", geometry.termination_cells());
    println!("Cells: {}", cells.len());
    for &cell in &cells {
        let kind = if geometry.is_termination_cell(cell) {
            " (termination)"
        } else if geometry.is_void_cell(cell) {
            " (void)"
        } else {
            ""
        };
        println!(
            "  {cell}: {} volume {:.6}{kind}",
            geometry.get_cell_material_name(cell)?,
            geometry.get_cell_volume(cell)?
        );
    }
    println!("Surfaces: {} (one per cell boundary)", cells.len());

    Ok(())
}

fn trace<M: ModuleInterface>(
    geometry: &mut M,
    ray: &Ray,
    threads: usize,
    histories: usize,
    limits: &TrackLimits,
) -> Result<()> {
    geometry.initialize();
    geometry.enable_thread_support(threads);

    if histories <= 1 {
        let track = tracker::track_particle(geometry, 0, ray, limits)
            .with_context(|| format!("lost particle starting at {ray}"))?;

        println!("Cells: {:?}", track.cells);
        println!("Surfaces: {:?}", track.surfaces);
        println!("Path length: {:.6}", track.path_length);
        println!("Reflections: {}", track.reflections);
        println!(
            "Status: {}",
            if track.terminated {
                "terminated"
            } else {
                "truncated"
            }
        );

        return Ok(());
    }

    info!("running {histories} histories on {threads} threads");

    let rays = vec![*ray; histories];
    let summary = tracker::track_batch(geometry, &rays, limits)?;

    println!("Histories: {}", summary.histories);
    println!("Terminated: {}", summary.terminated);
    println!("Truncated: {}", summary.truncated);
    println!("Lost: {}", summary.lost);
    println!(
        "Mean path length: {:.6}",
        summary.total_path_length / summary.histories as f64
    );

    Ok(())
}

fn parse_triple(s: &str) -> Result<[f64; 3], String> {
    let values = s
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid number in '{s}': {err}"))?;

    <[f64; 3]>::try_from(values).map_err(|values| {
        format!("expected three comma-separated values, got {}", values.len())
    })
}
