use std::collections::BTreeSet;
use std::path::PathBuf;

use approx::assert_relative_eq;
use frensie_geometry::tracker::{track_batch, track_particle, TrackLimits};
use frensie_geometry::{
    GeometryError, LostParticleError, ModuleInterface, PointLocation, Ray,
};
use frensie_geometry_dagmc::{
    BoxModel, DagMc, DagMcConfig, DagMcEngine, EstimatorType, ParticleType,
};

fn model_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/stacked.toml")
}

fn load() -> DagMc<BoxModel> {
    DagMc::initialize(model_path(), DagMcConfig::default()).unwrap()
}

fn load_with_tolerance(facet_tolerance: f64) -> DagMc<BoxModel> {
    let config = DagMcConfig {
        facet_tolerance,
        ..DagMcConfig::default()
    };
    DagMc::initialize(model_path(), config).unwrap()
}

#[test]
fn test_cells_and_surfaces() {
    let dagmc = load();

    assert!(dagmc.is_initialized());
    assert_eq!(
        dagmc.get_cells(true, true),
        BTreeSet::from([53, 54, 55, 82, 83, 100])
    );
    assert_eq!(dagmc.get_cells(false, false), BTreeSet::from([53, 54, 82, 83]));
    assert_eq!(
        dagmc.get_cells(true, false),
        BTreeSet::from([53, 54, 55, 82, 83])
    );
    assert_eq!(
        dagmc.get_cells(false, true),
        BTreeSet::from([53, 54, 82, 83, 100])
    );
    assert_eq!(
        dagmc.get_surfaces(),
        BTreeSet::from([240, 241, 242, 248, 250, 394, 408, 600, 653, 654, 655, 682, 683])
    );
}

#[test]
fn test_existence_queries_are_idempotent() {
    let dagmc = load();

    let before: Vec<bool> = (0..1000).map(|id| dagmc.does_cell_exist(id)).collect();
    let surfaces_before: Vec<bool> = (0..1000).map(|id| dagmc.does_surface_exist(id)).collect();

    let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
    track_particle(&dagmc, 0, &ray, &TrackLimits::default()).unwrap();

    let after: Vec<bool> = (0..1000).map(|id| dagmc.does_cell_exist(id)).collect();
    let surfaces_after: Vec<bool> = (0..1000).map(|id| dagmc.does_surface_exist(id)).collect();

    assert_eq!(before, after);
    assert_eq!(surfaces_before, surfaces_after);
    assert!(dagmc.does_cell_exist(53));
    assert!(!dagmc.does_cell_exist(56));
    assert!(dagmc.does_surface_exist(408));
    assert!(!dagmc.does_surface_exist(409));
}

#[test]
fn test_cell_properties() {
    let dagmc = load();

    assert!(dagmc.is_termination_cell(100));
    assert!(!dagmc.is_termination_cell(53));
    assert!(dagmc.is_void_cell(55));
    assert!(dagmc.is_void_cell(100));
    assert!(!dagmc.is_void_cell(54));

    assert_eq!(dagmc.termination_cells(), &BTreeSet::from([100]));
    assert_eq!(dagmc.material_ids(), BTreeSet::from([1, 2, 3]));
    assert_eq!(dagmc.cell_material_ids().get(&54), Some(&2));
    assert_eq!(dagmc.cell_densities().get(&53), Some(&-8.0));
    assert_eq!(dagmc.cell_densities().get(&83), Some(&0.001));
}

#[test]
fn test_surface_properties() {
    let dagmc = load();

    assert!(dagmc.is_reflecting_surface(408));
    assert!(dagmc.is_reflecting_surface(653));
    assert!(!dagmc.is_reflecting_surface(242));
    assert!(!dagmc.is_reflecting_surface(600));
    assert_eq!(
        dagmc.reflecting_surfaces(),
        &BTreeSet::from([408, 653, 654, 655, 682, 683])
    );
}

#[test]
fn test_estimator_data() {
    let dagmc = load();

    let cell_estimators = dagmc.cell_estimator_data();
    assert_eq!(cell_estimators.len(), 2);
    assert_eq!(
        cell_estimators[&1].estimator_type,
        EstimatorType::CellTrackLengthFlux
    );
    assert_eq!(cell_estimators[&1].particle_type, ParticleType::Neutron);
    assert_eq!(cell_estimators[&1].entities, vec![53, 54]);
    assert_eq!(
        cell_estimators[&2].estimator_type,
        EstimatorType::CellCollisionFlux
    );
    assert_eq!(cell_estimators[&2].entities, vec![53]);

    let surface_estimators = dagmc.surface_estimator_data();
    assert_eq!(surface_estimators.len(), 2);
    assert_eq!(surface_estimators[&3].estimator_type, EstimatorType::SurfaceFlux);
    assert_eq!(surface_estimators[&3].entities, vec![242, 248]);
    assert_eq!(
        surface_estimators[&4].estimator_type,
        EstimatorType::SurfaceCurrent
    );
    assert_eq!(surface_estimators[&4].particle_type, ParticleType::Electron);
}

#[test]
fn test_volumes_and_areas() {
    let dagmc = load();

    assert_relative_eq!(
        dagmc.get_cell_volume(53).unwrap(),
        100.0 * 100.0 * 40.959999084,
        max_relative = 1e-12
    );
    assert_relative_eq!(dagmc.get_surface_area(242).unwrap(), 10_000.0);
    assert_relative_eq!(
        dagmc.get_surface_area(653).unwrap(),
        4.0 * 100.0 * 40.959999084,
        max_relative = 1e-12
    );
}

#[test]
fn test_find_cell_containing_external_ray() {
    let dagmc = load();

    let cases = [(59.0, 53), (61.0, 54), (64.0, 55), (108.0, 82), (120.0, 83), (10.0, 100)];

    for (z, expected) in cases {
        let ray = Ray::new(-40.0, -40.0, z, 0.0, 0.0, 1.0);
        assert_eq!(dagmc.find_cell_containing_external_ray(&ray).unwrap(), expected);
    }
}

#[test]
fn test_boundary_point_resolved_by_direction() {
    let dagmc = load();

    let up = Ray::new(-40.0, -40.0, 60.959999084, 0.0, 0.0, 1.0);
    let down = Ray::new(-40.0, -40.0, 60.959999084, 0.0, 0.0, -1.0);

    assert_eq!(dagmc.find_cell_containing_external_ray(&up).unwrap(), 54);
    assert_eq!(dagmc.find_cell_containing_external_ray(&down).unwrap(), 53);

    assert_eq!(dagmc.get_point_location(&up, 53).unwrap(), PointLocation::Outside);
    assert_eq!(dagmc.get_point_location(&up, 54).unwrap(), PointLocation::Inside);

    let tangent = Ray::new(-40.0, -40.0, 60.959999084, 1.0, 0.0, 0.0);
    assert_eq!(dagmc.get_point_location(&tangent, 53).unwrap(), PointLocation::On);
}

#[test]
fn test_checked_search_steps_across_boundary() {
    // A tight facet tolerance keeps the point strictly inside cell 53
    let dagmc = load_with_tolerance(1e-7);
    let ray = Ray::new(-40.0, -40.0, 60.959999084 - 5e-6, 0.0, 0.0, 1.0);

    assert_eq!(dagmc.find_cell_containing_external_ray(&ray).unwrap(), 53);
    assert_eq!(
        dagmc.find_cell_containing_external_ray_checked(&ray).unwrap(),
        54
    );

    let interior = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
    assert_eq!(
        dagmc.find_cell_containing_external_ray_checked(&interior).unwrap(),
        53
    );
}

#[test]
fn test_found_cell_cache_is_transparent() {
    let dagmc = load();
    let rays = [
        Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0),
        Ray::new(-40.0, -40.0, 61.0, 0.0, 0.0, 1.0),
        Ray::new(-40.0, -40.0, 64.0, 0.0, 0.0, 1.0),
    ];

    let cold: Vec<_> = rays
        .iter()
        .map(|ray| dagmc.find_and_cache_cell_containing_external_ray(ray).unwrap())
        .collect();
    assert_eq!(cold, vec![53, 54, 55]);
    assert_eq!(dagmc.found_cell_cache(), vec![53, 54, 55]);

    // Warm cache, reversed order
    let warm: Vec<_> = rays
        .iter()
        .rev()
        .map(|ray| dagmc.find_and_cache_cell_containing_external_ray(ray).unwrap())
        .collect();
    assert_eq!(warm, vec![55, 54, 53]);
    assert_eq!(dagmc.found_cell_cache(), vec![53, 54, 55]);

    dagmc.clear_found_cell_cache();
    assert!(dagmc.found_cell_cache().is_empty());

    let cleared: Vec<_> = rays
        .iter()
        .map(|ray| dagmc.find_and_cache_cell_containing_external_ray(ray).unwrap())
        .collect();
    assert_eq!(cleared, cold);

    let uncached: Vec<_> = rays
        .iter()
        .map(|ray| dagmc.find_cell_containing_external_ray(ray).unwrap())
        .collect();
    assert_eq!(uncached, cold);
}

#[test]
fn test_cache_keeps_insertion_order() {
    let dagmc = load();

    dagmc
        .find_and_cache_cell_containing_external_ray(&Ray::new(0.0, 0.0, 120.0, 0.0, 0.0, 1.0))
        .unwrap();
    dagmc
        .find_and_cache_cell_containing_external_ray(&Ray::new(0.0, 0.0, 30.0, 0.0, 0.0, 1.0))
        .unwrap();

    assert_eq!(dagmc.found_cell_cache(), vec![83, 53]);
}

#[test]
fn test_external_ray_trace() {
    let dagmc = load();
    let mut ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);

    let cell = dagmc.find_cell_containing_external_ray(&ray).unwrap();
    assert_eq!(cell, 53);

    let hit = dagmc.fire_external_ray(&ray).unwrap();
    assert_relative_eq!(hit.distance, 1.959999084, epsilon = 1e-9);
    assert_eq!(hit.surface, 242);

    ray.advance_head(hit.distance);
    let cell = dagmc.get_boundary_cell(cell, hit.surface).unwrap();
    assert_eq!(cell, 54);

    let hit = dagmc.fire_external_ray_in_cell(&ray, cell).unwrap();
    assert_relative_eq!(hit.distance, 2.54, epsilon = 1e-9);
    assert_eq!(hit.surface, 248);

    assert_eq!(dagmc.get_boundary_cell(cell, hit.surface).unwrap(), 55);
}

#[test]
fn test_internal_ray_trace() {
    let dagmc = load();
    let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);

    assert!(!dagmc.is_internal_ray_set(0));
    dagmc.set_internal_ray(0, &ray, true).unwrap();
    assert!(dagmc.is_internal_ray_set(0));
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 53);
    assert_eq!(dagmc.found_cell_cache(), vec![53]);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_relative_eq!(hit.distance, 1.959999084, epsilon = 1e-9);
    assert_eq!(hit.surface, 242);

    // Firing again returns the cached intersection
    assert_eq!(dagmc.fire_internal_ray(0).unwrap(), hit);

    let mut normal = [0.0; 3];
    let reflected = dagmc
        .advance_internal_ray_to_cell_boundary(0, Some(&mut normal))
        .unwrap();
    assert!(!reflected);
    assert_eq!(normal, [0.0, 0.0, 1.0]);
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 54);
    assert_relative_eq!(dagmc.get_internal_ray_position(0)[2], 60.959999084, epsilon = 1e-9);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_relative_eq!(hit.distance, 2.54, epsilon = 1e-9);
    assert_eq!(hit.surface, 248);

    dagmc.advance_internal_ray_to_cell_boundary(0, None).unwrap();
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 55);
}

#[test]
fn test_reflection() {
    let dagmc = load();
    let ray = Ray::new(-40.0, -40.0, 108.0, 0.0, 0.0, 1.0);

    dagmc.set_internal_ray(0, &ray, false).unwrap();
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 82);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_eq!(hit.surface, 394);
    assert_relative_eq!(hit.distance, 2.0, epsilon = 1e-9);

    let reflected = dagmc.advance_internal_ray_to_cell_boundary(0, None).unwrap();
    assert!(!reflected);
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 83);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_eq!(hit.surface, 408);
    assert_relative_eq!(hit.distance, 17.526, epsilon = 1e-9);

    let mut normal = [0.0; 3];
    let reflected = dagmc
        .advance_internal_ray_to_cell_boundary(0, Some(&mut normal))
        .unwrap();
    assert!(reflected);
    assert_eq!(normal, [0.0, 0.0, 1.0]);
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 83);
    assert_eq!(dagmc.get_internal_ray_direction(0), [0.0, 0.0, -1.0]);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_eq!(hit.surface, 394);
    assert_relative_eq!(hit.distance, 17.526, epsilon = 1e-9);
}

#[test]
fn test_substep_and_direction_change() {
    let dagmc = load();
    let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
    dagmc.set_internal_ray(0, &ray, false).unwrap();

    dagmc.advance_internal_ray_by_substep(0, 1.0);
    assert_eq!(dagmc.get_internal_ray_position(0), [-40.0, -40.0, 60.0]);
    assert_eq!(dagmc.find_cell_containing_internal_ray(0), 53);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_eq!(hit.surface, 242);
    assert_relative_eq!(hit.distance, 0.959999084, epsilon = 1e-9);

    assert_relative_eq!(
        dagmc.get_distance_to_closest_boundary(0).unwrap(),
        0.959999084,
        epsilon = 1e-9
    );

    dagmc.change_internal_ray_direction(0, [1.0, 0.0, 0.0]).unwrap();
    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_eq!(hit.surface, 653);
    assert_relative_eq!(hit.distance, 90.0, epsilon = 1e-9);

    let mut normal = [0.0; 3];
    assert!(dagmc
        .advance_internal_ray_to_cell_boundary(0, Some(&mut normal))
        .unwrap());
    assert_eq!(normal, [1.0, 0.0, 0.0]);
    assert_eq!(dagmc.get_internal_ray_direction(0), [-1.0, 0.0, 0.0]);

    let hit = dagmc.fire_internal_ray(0).unwrap();
    assert_eq!(hit.surface, 653);
    assert_relative_eq!(hit.distance, 100.0, epsilon = 1e-9);
}

#[test]
fn test_lost_particles() {
    let dagmc = load();

    let outside = Ray::new(0.0, 0.0, 200.0, 0.0, 0.0, 1.0);
    assert!(matches!(
        dagmc.find_cell_containing_external_ray(&outside),
        Err(LostParticleError::CellNotFound { .. })
    ));
    assert!(matches!(
        dagmc.find_cell_containing_start_ray(&outside),
        Err(LostParticleError::CellNotFound { .. })
    ));

    // Nothing lies below the graveyard
    assert!(matches!(
        dagmc.get_boundary_cell(100, 240),
        Err(LostParticleError::BoundaryCellNotFound {
            cell: 100,
            surface: 240,
            ..
        })
    ));

    let down = Ray::new(0.0, 0.0, 10.0, 0.0, 0.0, -1.0);
    dagmc.set_internal_ray(0, &down, false).unwrap();
    assert!(dagmc.advance_internal_ray_to_cell_boundary(0, None).is_err());
}

#[test]
fn test_ray_outside_its_cell_misfires() {
    let dagmc = load();

    // Cell 54 ends at z = 63.5
    let above = Ray::new(0.0, 0.0, 70.0, 0.0, 0.0, 1.0);

    assert!(matches!(
        dagmc.set_internal_ray_in_cell(0, &above, 54, false),
        Err(LostParticleError::RayMisfire { cell: 54, .. })
    ));
    assert!(matches!(
        dagmc.fire_internal_ray(0),
        Err(LostParticleError::RayMisfire { cell: 54, .. })
    ));
    assert!(matches!(
        dagmc.fire_external_ray_in_cell(&above, 54),
        Err(LostParticleError::RayMisfire { cell: 54, .. })
    ));
}

#[test]
fn test_surface_normal() {
    let dagmc = load();

    assert_eq!(
        dagmc
            .get_surface_normal(408, &[-40.0, -40.0, 127.526])
            .unwrap(),
        [0.0, 0.0, 1.0]
    );
    assert!(matches!(
        dagmc.get_surface_normal(408, &[-40.0, -40.0, 100.0]),
        Err(LostParticleError::SurfaceNormalFailed { surface: 408, .. })
    ));
}

#[test]
fn test_module_interface() {
    let mut dagmc = load();
    ModuleInterface::initialize(&mut dagmc);
    ModuleInterface::enable_thread_support(&mut dagmc, 2);
    assert_eq!(ModuleInterface::thread_capacity(&dagmc), 2);

    let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
    let cell = dagmc.find_cell_containing_start_ray(&ray).unwrap();
    assert_eq!(cell, 53);
    assert_eq!(dagmc.found_cell_cache(), vec![53]);

    ModuleInterface::set_internal_ray(&dagmc, 1, &ray, cell).unwrap();
    assert_eq!(ModuleInterface::find_cell_containing_internal_ray(&dagmc, 1), 53);
    assert!(!dagmc.is_internal_ray_set(0));

    let hit = ModuleInterface::fire_internal_ray(&dagmc, 1).unwrap();
    assert_eq!(hit.surface, 242);

    ModuleInterface::advance_internal_ray_by_substep(&dagmc, 1, 0.5);
    assert_eq!(
        ModuleInterface::get_internal_ray_position(&dagmc, 1),
        [-40.0, -40.0, 59.5]
    );

    ModuleInterface::change_internal_ray_direction(&dagmc, 1, [0.0, 0.0, -1.0]).unwrap();
    assert_eq!(
        ModuleInterface::get_internal_ray_direction(&dagmc, 1),
        [0.0, 0.0, -1.0]
    );
    let hit = ModuleInterface::fire_internal_ray(&dagmc, 1).unwrap();
    assert_eq!(hit.surface, 241);
    assert_relative_eq!(hit.distance, 39.5, epsilon = 1e-9);

    assert!(!ModuleInterface::advance_internal_ray_to_cell_boundary(&dagmc, 1, None).unwrap());
    let cell = ModuleInterface::find_cell_containing_internal_ray(&dagmc, 1);
    assert!(ModuleInterface::is_termination_cell(&dagmc, cell));

    assert_eq!(
        ModuleInterface::get_point_location(&dagmc, &ray, 53).unwrap(),
        PointLocation::Inside
    );
    assert_eq!(
        ModuleInterface::get_point_location(&dagmc, &ray, 54).unwrap(),
        PointLocation::Outside
    );

    // Re-initializing clears the cache
    ModuleInterface::initialize(&mut dagmc);
    assert!(dagmc.found_cell_cache().is_empty());
}

#[test]
fn test_track_particle_with_reflection() {
    let dagmc = load();
    let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);

    let track = track_particle(&dagmc, 0, &ray, &TrackLimits::default()).unwrap();

    assert!(track.terminated);
    assert_eq!(track.cells, vec![53, 54, 55, 82, 83, 82, 55, 54, 53, 100]);
    assert_eq!(
        track.surfaces,
        vec![242, 248, 250, 394, 408, 394, 250, 248, 242, 241]
    );
    assert_eq!(track.reflections, 1);
    assert_relative_eq!(
        track.path_length,
        (127.526 - 59.0) + (127.526 - 20.0),
        epsilon = 1e-9
    );
}

#[test]
fn test_track_particle_truncated() {
    let dagmc = load();
    let ray = Ray::new(0.0, 0.0, 59.0, 1.0, 0.0, 0.0);

    let limits = TrackLimits { max_crossings: 10 };
    let track = track_particle(&dagmc, 0, &ray, &limits).unwrap();

    assert!(!track.terminated);
    assert_eq!(track.reflections, 10);
    assert_eq!(track.cells, vec![53]);
    assert_relative_eq!(track.path_length, 50.0 + 9.0 * 100.0, epsilon = 1e-9);
}

#[test]
fn test_parallel_tracking_matches_serial() {
    let mut dagmc = load();
    dagmc.enable_thread_support(4);

    let s = 1.0 / 2.0f64.sqrt();
    let rays: Vec<Ray> = (0..32)
        .map(|i| {
            let x = -45.0 + 2.5 * f64::from(i);
            let z = 25.0 + 3.0 * f64::from(i);
            if i % 2 == 0 {
                Ray::new(x, 0.0, z, 0.0, 0.0, 1.0)
            } else {
                Ray::new(x, 0.0, z, s, 0.0, -s)
            }
        })
        .collect();

    let limits = TrackLimits::default();
    let serial: Vec<_> = rays
        .iter()
        .map(|ray| track_particle(&dagmc, 0, ray, &limits).unwrap())
        .collect();

    let parallel: Vec<Vec<_>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|thread| {
                let dagmc = &dagmc;
                let rays = &rays;
                let limits = &limits;
                scope.spawn(move || {
                    rays.iter()
                        .skip(thread)
                        .step_by(4)
                        .map(|ray| track_particle(dagmc, thread, ray, limits).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (thread, tracks) in parallel.iter().enumerate() {
        for (k, track) in tracks.iter().enumerate() {
            let expected = &serial[thread + 4 * k];
            assert_eq!(track.cells, expected.cells);
            assert_eq!(track.surfaces, expected.surfaces);
            assert_relative_eq!(track.path_length, expected.path_length, epsilon = 1e-9);
        }
    }

    let summary = track_batch(&dagmc, &rays, &limits).unwrap();
    assert_eq!(summary.histories, rays.len());
    assert_eq!(summary.terminated, rays.len());
    assert_eq!(summary.lost, 0);
    let serial_length: f64 = serial.iter().map(|t| t.path_length).sum();
    assert_relative_eq!(summary.total_path_length, serial_length, epsilon = 1e-6);
}

#[test]
fn test_batch_counts_lost_particles() {
    let dagmc = load();
    let rays = [
        Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0),
        Ray::new(0.0, 0.0, 500.0, 0.0, 0.0, 1.0),
    ];

    let summary = track_batch(&dagmc, &rays, &TrackLimits::default()).unwrap();
    assert_eq!(summary.histories, 2);
    assert_eq!(summary.terminated, 1);
    assert_eq!(summary.lost, 1);
}

fn from_model(source: &str) -> Result<DagMc<BoxModel>, GeometryError> {
    let engine = BoxModel::from_toml_str(source, 1e-6).unwrap();
    DagMc::from_engine(engine, DagMcConfig::default())
}

const SINGLE_CELL: &str = r#"
    [[volume]]
    id = 1
    min = [0.0, 0.0, 0.0]
    max = [1.0, 1.0, 1.0]
"#;

#[test]
fn test_missing_termination_cell_rejected() {
    assert!(matches!(
        from_model(SINGLE_CELL),
        Err(GeometryError::InvalidGeometry(_))
    ));
}

#[test]
fn test_invalid_properties_rejected() {
    let two_materials = r#"
        [[volume]]
        id = 1
        min = [0.0, 0.0, 0.0]
        max = [1.0, 1.0, 1.0]
        properties = { "termination.cell" = [], material = ["1", "2"] }
    "#;
    assert!(matches!(
        from_model(two_materials),
        Err(GeometryError::InvalidProperty { entity: 1, .. })
    ));

    let bad_density = r#"
        [[volume]]
        id = 1
        min = [0.0, 0.0, 0.0]
        max = [1.0, 1.0, 1.0]
        properties = { "termination.cell" = [], density = ["heavy"] }
    "#;
    assert!(matches!(
        from_model(bad_density),
        Err(GeometryError::InvalidProperty { .. })
    ));

    let bad_estimator = r#"
        [[volume]]
        id = 1
        min = [0.0, 0.0, 0.0]
        max = [1.0, 1.0, 1.0]
        properties = { "termination.cell" = [], estimator = ["1.cell.tl.flux.x"] }
    "#;
    assert!(matches!(
        from_model(bad_estimator),
        Err(GeometryError::InvalidProperty { .. })
    ));
}

#[test]
fn test_custom_property_names() {
    let source = r#"
        [[volume]]
        id = 1
        min = [0.0, 0.0, 0.0]
        max = [1.0, 1.0, 1.0]
        properties = { graveyard = [] }
    "#;

    let mut config = DagMcConfig::default();
    config.property_names.termination_cell = "graveyard".into();

    let engine = BoxModel::from_toml_str(source, 1e-6).unwrap();
    let dagmc = DagMc::from_engine(engine, config).unwrap();
    assert!(dagmc.is_termination_cell(1));
}

#[test]
fn test_missing_model_file() {
    let result = DagMc::<BoxModel>::initialize("no/such/model.toml", DagMcConfig::default());
    assert!(matches!(result, Err(GeometryError::InvalidGeometry(_))));
}

#[test]
fn test_engine_load_matches_initialize() {
    let engine = BoxModel::load(&model_path(), 1e-3).unwrap();
    assert_eq!(engine.volumes().len(), 6);
    assert_eq!(engine.surfaces().len(), 13);
}

#[test]
fn test_scanning_id_lookup_matches_hashed() {
    let hashed = load();
    let scanning = DagMc::<BoxModel>::initialize(
        model_path(),
        DagMcConfig {
            use_fast_id_lookup: false,
            ..DagMcConfig::default()
        },
    )
    .unwrap();

    assert_eq!(scanning.get_cells(true, true), hashed.get_cells(true, true));
    assert_eq!(scanning.get_surfaces(), hashed.get_surfaces());
    assert_eq!(scanning.termination_cells(), hashed.termination_cells());
    assert!(scanning.does_cell_exist(54));
    assert!(!scanning.does_cell_exist(56));
    assert!(scanning.does_surface_exist(248));

    let ray = Ray::new(-40.0, -40.0, 59.0, 0.0, 0.0, 1.0);
    assert_eq!(scanning.find_cell_containing_external_ray(&ray).unwrap(), 53);

    let limits = TrackLimits::default();
    let expected = track_particle(&hashed, 0, &ray, &limits).unwrap();
    let track = track_particle(&scanning, 0, &ray, &limits).unwrap();

    assert_eq!(track.cells, expected.cells);
    assert_eq!(track.surfaces, expected.surfaces);
    assert_relative_eq!(track.path_length, expected.path_length);
}
