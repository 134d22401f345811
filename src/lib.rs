//! # Physarum
//!
//! GPU-accelerated slime-mold simulation with a depth-of-field compositor.
//!
//! Agents wander a 2D grid or a 3D volume, sense a diffusing trail field
//! ahead of them, steer towards the strongest reading, and deposit trail
//! where they land. The field is blurred and decayed every step, and the
//! result is drawn either as additive field slices or through a thin-lens
//! depth-of-field pass.
//!
//! ## Quick Start
//!
//! ```ignore
//! use physarum::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     let settings = Settings {
//!         world: WorldConfig::three_d().with_agents(200_000),
//!         ..Default::default()
//!     };
//!     physarum::run(settings, 7)
//! }
//! ```
//!
//! ## Headless
//!
//! Every kernel has a host implementation in [`backend::CpuBackend`], so the
//! whole frame pipeline runs without a window:
//!
//! ```ignore
//! use physarum::prelude::*;
//!
//! let world = WorldConfig::two_d().with_agents(1_000);
//! let backend = CpuBackend::new(&world);
//! let settings = Settings { world, ..Default::default() };
//! let mut sim = Orchestrator::new(backend, settings, 42)?;
//! sim.step();
//! println!("trail mass: {}", sim.backend().field_sum());
//! ```
//!
//! ## Pipeline
//!
//! One step is five barrier-separated stages, each a compute pass on the
//! GPU and a rayon loop on the CPU:
//!
//! 1. clear occupancy, deposit and claim grids
//! 2. agent update: sense, steer, move, claim a cell, deposit
//! 3. pairing: break stretched pairs and match agents sharing a cell
//! 4. diffusion: 3×3(×3) blur of field plus deposits, then decay
//! 5. swap the ping-pong field buffers
//!
//! ## Controls
//!
//! | Key | Action |
//! |-----|--------|
//! | F1 | Toggle control panel |
//! | F2 | Reseed agents |
//! | F3 | Toggle depth of field |
//! | F4 | Toggle auto-rotate |
//! | Space | Pause / resume |
//! | Escape | Quit |
//! | Left drag | Orbit camera (3D) |
//! | Wheel | Zoom |
//!
//! An external controller is opt-in. The binary reads a raw MIDI device
//! with `--controller <path>`; embedders build an
//! [`midi::ExternalController`] around any [`midi::ControllerSource`] and
//! pass it to [`App::with_controller`] before [`run_app`].

pub mod agents;
pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod field;
pub mod gpu;
pub mod input;
pub mod kernels;
pub mod midi;
pub mod orchestrator;
pub mod palette;
pub mod time;
#[cfg(feature = "egui")]
pub mod ui;
mod window;

pub use bytemuck;
pub use glam::{Vec2, Vec3};
pub use window::{run, run_app, App};

/// Common imports.
pub mod prelude {
    pub use crate::agents::{Agent, AgentStore, UNPAIRED};
    pub use crate::backend::{ComputeBackend, CpuBackend, RenderRequest};
    pub use crate::config::{
        Dimensionality, DofConfig, DofMode, RenderMode, Settings, SimConfig, SimParam, ViewConfig, WorldConfig,
    };
    pub use crate::error::{ConfigError, GpuError, RenderError, SimulationError};
    pub use crate::input::{Input, KeyBindings, MouseButton};
    pub use crate::midi::{ChannelController, ControllerSource, ExternalController};
    pub use crate::orchestrator::{Command, FrameInput, Orchestrator, RunState};
    pub use crate::palette::Palette;
    pub use crate::{Vec2, Vec3};
    pub use winit::keyboard::KeyCode;
    #[cfg(feature = "egui")]
    pub use egui;
}
