//! # Compute Backends
//!
//! The frame orchestrator drives the simulation through [`ComputeBackend`].
//! Each method is one barrier-separated stage of a step; a stage never
//! starts before the previous one has fully completed.
//!
//! - [`CpuBackend`] runs every kernel as a rayon parallel loop. It needs no
//!   device and is what the tests and benchmarks use.
//! - [`GpuBackend`](crate::gpu::GpuBackend) records each stage as a compute
//!   pass and presents to a window surface.

mod cpu;

pub use cpu::CpuBackend;

use glam::{Mat4, Vec3};

use crate::agents::Agent;
use crate::config::{DofConfig, RenderMode, ViewConfig};
use crate::error::RenderError;
use crate::field::{FieldShape, Parity};
use crate::kernels::StepParams;

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub mode: RenderMode,
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    /// Unit vector the camera looks along.
    pub view_direction: Vec3,
    pub dof: DofConfig,
    pub view: ViewConfig,
    pub frame_seed: u32,
}

/// A device able to run the per-frame kernels.
pub trait ComputeBackend {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    fn shape(&self) -> FieldShape;

    /// Which field buffer agents read from this step.
    fn parity(&self) -> Parity;

    /// Output size in pixels.
    fn viewport(&self) -> (u32, u32);

    /// Replace the device copy of every agent.
    fn sync_agents(&mut self, agents: &[Agent]);

    /// Zero both field buffers and all scratch grids.
    fn clear_fields(&mut self);

    /// Start a simulation step with the given uniforms.
    fn begin_step(&mut self, params: &StepParams);

    /// Zero occupancy, deposit and claim grids.
    fn clear_occupancy(&mut self);

    /// Sense, steer, move, claim and deposit for every agent.
    fn update_agents(&mut self);

    /// Break stretched pairs and form new ones from cell claims.
    fn pair_agents(&mut self);

    /// Blur and decay the read field plus deposits into the write field.
    fn diffuse(&mut self);

    /// Make the freshly written field the read field.
    fn swap_fields(&mut self);

    /// Finish the step, submitting any recorded work.
    fn end_step(&mut self);

    /// Draw one frame along the requested path.
    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError>;
}
