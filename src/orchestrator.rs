//! Per-frame control flow.
//!
//! Every tick the orchestrator applies queued commands, lets an external
//! controller override settings, moves the camera, runs one simulation step
//! unless paused, and finally draws exactly one render path.
//!
//! ```text
//!            TogglePause
//! Simulating <----------> Paused
//!      |  Reseed             | Reseed
//!      v                     v
//!  (reseed agents, clear fields, back to the same state)
//! ```
//!
//! Render mode, UI visibility and auto-rotate are independent toggles.

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agents::AgentStore;
use crate::backend::{ComputeBackend, RenderRequest};
use crate::camera::Camera;
use crate::config::{RenderMode, Settings};
use crate::error::{ConfigError, RenderError};
use crate::kernels::StepParams;
use crate::midi::ExternalController;

/// Radians per second of the auto-rotating camera.
pub const AUTO_ROTATE_SPEED: f32 = 0.2;

/// A discrete user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    TogglePause,
    ToggleUi,
    ToggleDepthOfField,
    ToggleAutoRotate,
    Reseed,
}

/// Whether simulation steps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Simulating,
    Paused,
}

/// Input gathered for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub commands: Vec<Command>,
    /// Pointer movement while the orbit button is held, in pixels.
    pub drag: Vec2,
    /// Wheel movement in lines.
    pub scroll: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
}

/// What happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub stepped: bool,
    pub reseeded: bool,
}

/// Drives a [`ComputeBackend`] frame by frame.
pub struct Orchestrator<B: ComputeBackend> {
    backend: B,
    agents: AgentStore,
    settings: Settings,
    camera: Camera,
    run_state: RunState,
    render_mode: RenderMode,
    show_ui: bool,
    auto_rotate: bool,
    controller: Option<ExternalController>,
    rng: StdRng,
    frame: u64,
    steps: u64,
}

impl<B: ComputeBackend> Orchestrator<B> {
    /// Seed agents and upload them to `backend`.
    pub fn new(mut backend: B, settings: Settings, seed: u64) -> Result<Self, ConfigError> {
        settings.world.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let agents = AgentStore::seed(&settings.world, &mut rng);
        backend.sync_agents(agents.as_slice());
        backend.clear_fields();

        let extent = settings.world.extent();
        let camera = if settings.world.dimensionality.is_3d() {
            Camera::orbit(extent)
        } else {
            Camera::top_down(extent.x, extent.y)
        };

        log::info!(
            "{} backend: {} agents on a {}x{}x{} field",
            backend.name(),
            agents.len(),
            settings.world.width,
            settings.world.height,
            settings.world.depth
        );

        Ok(Self {
            backend,
            agents,
            settings,
            camera,
            run_state: RunState::Simulating,
            render_mode: RenderMode::Standard,
            show_ui: true,
            auto_rotate: false,
            controller: None,
            rng,
            frame: 0,
            steps: 0,
        })
    }

    /// Attach an external controller. Without one, controller polling is skipped.
    pub fn with_controller(mut self, controller: ExternalController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn agents(&self) -> &AgentStore {
        &self.agents
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings the UI edits in place; changes apply on the next step.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn show_ui(&self) -> bool {
        self.show_ui
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    /// Simulation steps run so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Apply a state toggle. `Reseed` runs immediately.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::TogglePause => {
                self.run_state = match self.run_state {
                    RunState::Simulating => RunState::Paused,
                    RunState::Paused => RunState::Simulating,
                };
                log::info!("simulation {:?}", self.run_state);
            }
            Command::ToggleUi => self.show_ui = !self.show_ui,
            Command::ToggleDepthOfField => {
                self.render_mode = self.render_mode.toggled();
                log::info!("render mode {:?}", self.render_mode);
            }
            Command::ToggleAutoRotate => self.auto_rotate = !self.auto_rotate,
            Command::Reseed => self.reseed(),
        }
    }

    /// Scatter agents again and clear every field. Run state is unchanged.
    pub fn reseed(&mut self) {
        let world = &self.settings.world;
        let radius = world.spawn_radius;
        self.agents.reseed(world, radius, &mut self.rng);
        self.backend.sync_agents(self.agents.as_slice());
        self.backend.clear_fields();
        log::info!("reseeded {} agents within radius {:.1}", self.agents.len(), radius);
    }

    /// Run one simulation step regardless of the run state.
    pub fn step(&mut self) {
        let params = StepParams::new(
            &self.settings.world,
            &self.settings.sim,
            self.settings.dof.break_distance,
            self.rng.gen(),
        );
        self.backend.begin_step(&params);
        self.backend.clear_occupancy();
        self.backend.update_agents();
        self.backend.pair_agents();
        self.backend.diffuse();
        self.backend.swap_fields();
        self.backend.end_step();
        self.steps += 1;
    }

    /// Build the render request for the current camera and mode.
    pub fn render_request(&mut self) -> RenderRequest {
        let (w, h) = self.backend.viewport();
        let aspect = w.max(1) as f32 / h.max(1) as f32;
        RenderRequest {
            mode: self.render_mode,
            view_proj: self.camera.view_proj(aspect),
            camera_position: self.camera.position(),
            view_direction: self.camera.forward(),
            dof: self.settings.dof.clone(),
            view: self.settings.view.clone(),
            frame_seed: self.rng.gen(),
        }
    }

    /// Advance one frame.
    pub fn tick(&mut self, input: FrameInput) -> Result<FrameReport, RenderError> {
        let mut report = FrameReport::default();
        let mut commands = input.commands;

        if let Some(controller) = self.controller.as_mut() {
            controller.poll(&mut self.settings.sim, &mut commands);
        }

        for command in commands {
            if command == Command::Reseed {
                report.reseeded = true;
            }
            self.apply(command);
        }

        self.camera.orbit_by(input.drag);
        self.camera.zoom_by(input.scroll);
        if self.auto_rotate {
            self.camera.auto_rotate(input.dt, AUTO_ROTATE_SPEED);
        }

        if self.run_state == RunState::Simulating {
            self.step();
            report.stepped = true;
        }

        let request = self.render_request();
        self.backend.render(&request)?;
        self.frame += 1;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::config::WorldConfig;
    use crate::field::Parity;
    use crate::midi::{ChannelController, ExternalController, STATUS_CONTROL, STATUS_PRESS, midimix};

    fn orchestrator() -> Orchestrator<CpuBackend> {
        let settings = Settings {
            world: WorldConfig::two_d().with_extent(64, 64, 1).with_agents(200).with_spawn_radius(10.0),
            ..Settings::default()
        };
        let backend = CpuBackend::new(&settings.world).with_viewport(16, 16);
        Orchestrator::new(backend, settings, 42).unwrap()
    }

    #[test]
    fn test_tick_steps_and_flips() {
        let mut orch = orchestrator();
        let report = orch.tick(FrameInput::default()).unwrap();
        assert!(report.stepped);
        assert_eq!(orch.backend().parity(), Parity::B);
        assert_eq!(orch.steps(), 1);
    }

    #[test]
    fn test_paused_skips_step_but_renders() {
        let mut orch = orchestrator();
        let input = FrameInput {
            commands: vec![Command::TogglePause],
            ..Default::default()
        };
        let report = orch.tick(input).unwrap();
        assert!(!report.stepped);
        assert_eq!(orch.run_state(), RunState::Paused);
        assert_eq!(orch.backend().parity(), Parity::A);
        assert_eq!(orch.backend().image().len(), 256);
    }

    #[test]
    fn test_reseed_returns_to_prior_state() {
        let mut orch = orchestrator();
        orch.apply(Command::TogglePause);
        let input = FrameInput {
            commands: vec![Command::Reseed],
            ..Default::default()
        };
        let report = orch.tick(input).unwrap();
        assert!(report.reseeded);
        assert_eq!(orch.run_state(), RunState::Paused);
        assert_eq!(orch.backend().field_sum(), 0.0);
    }

    #[test]
    fn test_toggles() {
        let mut orch = orchestrator();
        assert!(orch.show_ui());
        orch.apply(Command::ToggleUi);
        orch.apply(Command::ToggleDepthOfField);
        orch.apply(Command::ToggleAutoRotate);
        assert!(!orch.show_ui());
        assert!(orch.auto_rotate());
        assert_eq!(orch.render_mode(), RenderMode::DepthOfField);
        orch.tick(FrameInput::default()).unwrap();
    }

    #[test]
    fn test_controller_overrides_and_commands() {
        let (source, sender) = ChannelController::new();
        let mut orch = orchestrator().with_controller(ExternalController::midimix(Box::new(source)));
        assert!(orch.has_controller());

        sender.send([STATUS_CONTROL, midimix::KNOBS[0][5], 0]).unwrap();
        sender.send([STATUS_PRESS, midimix::BUTTONS_MUTE[1], 127]).unwrap();
        let report = orch.tick(FrameInput::default()).unwrap();

        assert_eq!(orch.settings().sim.decay_factor, 0.0);
        assert_eq!(orch.run_state(), RunState::Paused);
        assert!(!report.stepped);
    }
}
