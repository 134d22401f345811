//! Integration tests for the frame pipeline.
//!
//! Everything here runs on the headless [`CpuBackend`], which executes the
//! same kernels the compute shaders do.

use std::f32::consts::FRAC_PI_2;

use glam::Mat4;
use rand::rngs::StdRng;
use rand::SeedableRng;

use physarum::field::Parity;
use physarum::kernels::StepParams;
use physarum::prelude::*;

fn orchestrator(world: WorldConfig, sim: SimConfig) -> Orchestrator<CpuBackend> {
    let backend = CpuBackend::new(&world).with_viewport(32, 32);
    let settings = Settings {
        world,
        sim,
        ..Default::default()
    };
    Orchestrator::new(backend, settings, 2024).unwrap()
}

fn radial_histogram(store: &AgentStore, center: Vec3, radius: f32, power: i32, bins: usize) -> Vec<usize> {
    let mut histogram = vec![0; bins];
    for agent in store.iter() {
        let t = (agent.position().distance(center) / radius).powi(power);
        histogram[((t * bins as f32) as usize).min(bins - 1)] += 1;
    }
    histogram
}

// ============================================================================
// Seeding Tests
// ============================================================================

#[test]
fn test_flat_seeding_is_uniform_over_disk() {
    let world = WorldConfig::two_d().with_extent(800, 800, 1).with_agents(20_000).with_spawn_radius(100.0);
    let store = AgentStore::seed(&world, &mut StdRng::seed_from_u64(3));
    let center = world.center();

    for agent in store.iter() {
        assert!(agent.position().distance(center) <= 100.0 + 1.0e-3);
        assert_eq!(agent.position().z, 0.0);
    }

    // r² is uniform for a uniform disk
    for count in radial_histogram(&store, center, 100.0, 2, 10) {
        assert!((1700..=2300).contains(&count), "bin count {}", count);
    }
}

#[test]
fn test_volume_seeding_is_uniform_over_ball() {
    let world = WorldConfig::three_d().with_agents(20_000).with_spawn_radius(40.0);
    let store = AgentStore::seed(&world, &mut StdRng::seed_from_u64(4));
    let center = world.center();

    for agent in store.iter() {
        assert!(agent.position().distance(center) <= 40.0 + 1.0e-3);
    }

    // r³ is uniform for a uniform ball
    for count in radial_histogram(&store, center, 40.0, 3, 10) {
        assert!((1700..=2300).contains(&count), "bin count {}", count);
    }
}

#[test]
fn test_reseed_clears_every_pair() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(500).with_spawn_radius(4.0);
    let mut orch = orchestrator(world, SimConfig::default());

    for _ in 0..3 {
        orch.step();
    }
    assert!(orch.backend().agents().iter().any(|a| a.is_paired()));

    assert_eq!(orch.backend().parity(), Parity::B);

    for _ in 0..2 {
        orch.reseed();
        assert_eq!(orch.backend().parity(), Parity::A);
        assert!(orch.backend().agents().iter().all(|a| a.partner == UNPAIRED));
        assert!(orch.agents().iter().all(|a| a.partner == UNPAIRED));
        assert_eq!(orch.backend().field_sum(), 0.0);
    }
}

// ============================================================================
// Field Tests
// ============================================================================

#[test]
fn test_read_field_alternates_every_step() {
    let world = WorldConfig::two_d().with_extent(32, 32, 1).with_agents(50).with_spawn_radius(5.0);
    let mut orch = orchestrator(world, SimConfig::default());

    let mut expected = Parity::A;
    assert_eq!(orch.backend().parity(), expected);
    for _ in 0..6 {
        orch.step();
        expected = expected.flipped();
        assert_eq!(orch.backend().parity(), expected);
    }
}

#[test]
fn test_uniform_field_decays_geometrically() {
    let world = WorldConfig::two_d().with_extent(16, 16, 1).with_agents(0);
    let mut orch = orchestrator(world, SimConfig::default().with_decay(0.32));
    orch.backend_mut().load_field(&[2.0; 256]);

    let steps = 5;
    for _ in 0..steps {
        orch.step();
    }

    let expected = 2.0 * 0.32f32.powi(steps);
    for &v in orch.backend().field() {
        assert!((v - expected).abs() <= expected * 1.0e-4, "{} != {}", v, expected);
    }
}

#[test]
fn test_single_agent_deposits_exactly() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(1);

    for deposit in [5.0, 0.3, 0.1, 1.7, 999.9] {
        let mut backend = CpuBackend::new(&world);
        backend.sync_agents(&[Agent::new(Vec3::new(32.5, 32.5, 0.0), 0.0, FRAC_PI_2)]);

        let params = StepParams::new(&world, &SimConfig::default().with_deposit(deposit), 8.0, 11);
        backend.begin_step(&params);
        backend.clear_occupancy();
        backend.update_agents();

        assert_eq!(backend.accepted_moves(), 1);
        let cell = backend.shape().index_of(backend.agents()[0].position());
        assert_eq!(backend.pre_diffusion_value(cell), deposit);
    }
}

#[test]
fn test_stacked_deposits_do_not_wrap() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(600);
    let mut backend = CpuBackend::new(&world);
    // Zero move distance keeps every agent in the one cell.
    let agents = vec![Agent::new(Vec3::new(32.5, 32.5, 0.0), 0.0, FRAC_PI_2); 600];
    backend.sync_agents(&agents);

    let sim = SimConfig::default().with_deposit(1000.0).with_move_distance(0.0).with_decay(0.32);
    let params = StepParams::new(&world, &sim, 8.0, 5);
    backend.begin_step(&params);
    backend.clear_occupancy();
    backend.update_agents();

    assert_eq!(backend.accepted_moves(), 600);
    let cell = backend.shape().index_of(Vec3::new(32.5, 32.5, 0.0));
    assert_eq!(backend.pre_diffusion_value(cell), 600_000.0);

    backend.diffuse();
    backend.swap_fields();
    let sum = backend.field_sum();
    assert!((sum - 192_000.0).abs() < 192_000.0 * 1.0e-4, "field sum {}", sum);
}

#[test]
fn test_one_step_trail_mass() {
    let world = WorldConfig::two_d().with_extent(800, 800, 1).with_agents(1000).with_spawn_radius(50.0);
    let sim = SimConfig::default().with_deposit(5.0).with_decay(0.32);
    let mut orch = orchestrator(world, sim);

    orch.step();

    let sum = orch.backend().field_sum();
    assert!((sum - 1600.0).abs() < 0.5, "field sum {}", sum);
}

// ============================================================================
// Collision Tests
// ============================================================================

#[test]
fn test_collision_keeps_one_agent_per_cell() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(2000).with_spawn_radius(5.0);
    let mut orch = orchestrator(world, SimConfig::default().with_collision(true));

    orch.step();

    let occupancy = orch.backend().occupancy();
    assert!(occupancy.iter().all(|&n| n <= 1));
    let claimed = occupancy.iter().filter(|&&n| n == 1).count();
    assert_eq!(claimed, orch.backend().accepted_moves());
    assert!(claimed < 2000);
}

#[test]
fn test_without_collision_cells_stack() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(2000).with_spawn_radius(5.0);
    let mut orch = orchestrator(world, SimConfig::default());

    orch.step();

    assert_eq!(orch.backend().accepted_moves(), 2000);
    assert!(orch.backend().occupancy().iter().any(|&n| n > 1));
}

// ============================================================================
// Compositor Tests
// ============================================================================

#[test]
fn test_empty_scene_composites_to_black() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(0);
    let mut orch = orchestrator(world, SimConfig::default());
    orch.apply(Command::TogglePause);
    orch.apply(Command::ToggleDepthOfField);

    for mode in DofMode::ALL {
        orch.settings_mut().dof.mode = mode;
        orch.tick(FrameInput::default()).unwrap();
        let image = orch.backend().image();
        assert_eq!(image.len(), 32 * 32);
        assert!(image.iter().all(|&v| v == 0.0), "{:?} left light in an empty scene", mode);
    }
}

#[test]
fn test_dense_in_focus_splat_saturates() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(30_000);
    let mut backend = CpuBackend::new(&world).with_viewport(32, 32);
    let focus = Vec3::new(32.0, 32.0, 0.0);
    backend.sync_agents(&vec![Agent::new(focus, 0.0, FRAC_PI_2); 30_000]);

    let eye = Vec3::new(32.0, 32.0, 250.0);
    let view_proj = Mat4::perspective_rh(0.8, 1.0, 0.1, 1000.0) * Mat4::look_at_rh(eye, focus, Vec3::Y);
    let request = RenderRequest {
        mode: RenderMode::DepthOfField,
        view_proj,
        camera_position: eye,
        view_direction: Vec3::NEG_Z,
        dof: DofConfig {
            mode: DofMode::Particles,
            focal_distance: 250.0,
            sample_weight: 10.0,
            iterations: 64,
            ..Default::default()
        },
        view: ViewConfig::default(),
        frame_seed: 3,
    };
    backend.render(&request).unwrap();

    let image = backend.image();
    assert!(image.iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
    assert_eq!(image.iter().cloned().fold(0.0, f32::max), 1.0);
    assert_eq!(image.iter().filter(|&&v| v > 0.0).count(), 1);
}

#[test]
fn test_composited_pixels_are_finite_and_normalised() {
    let world = WorldConfig::two_d().with_extent(64, 64, 1).with_agents(300).with_spawn_radius(20.0);
    let mut orch = orchestrator(world, SimConfig::default());
    orch.apply(Command::ToggleDepthOfField);

    for mode in DofMode::ALL {
        orch.settings_mut().dof.mode = mode;
        orch.tick(FrameInput::default()).unwrap();
        for &v in orch.backend().image() {
            assert!(v.is_finite());
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
