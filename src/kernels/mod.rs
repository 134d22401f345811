//! Host reference of the per-frame kernels.
//!
//! The WGSL compute shaders in [`crate::gpu::shaders`] and the rayon loops in
//! [`crate::backend::cpu`] run the same algorithms; the scalar math they
//! share lives here so both stay in lockstep.
//!
//! [`StepParams`] is the uniform block every simulation kernel reads. Its
//! field order matches the WGSL `SimParams` struct.

pub mod agent;
pub mod diffuse;
pub mod dof;

use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::config::{SimConfig, WorldConfig};

/// Upper bound on a single deposit.
pub const MAX_DEPOSIT: f32 = 1000.0;

/// Uniform block for the agent, pairing and diffusion kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StepParams {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub agent_count: u32,

    pub sense_spread: f32,
    pub sense_distance: f32,
    pub turn_angle: f32,
    pub move_distance: f32,

    pub deposit_value: f32,
    pub decay_factor: f32,
    pub diffusion: f32,
    pub center_attraction: f32,

    pub sense_coupling: f32,
    pub move_coupling: f32,
    pub jitter: f32,
    pub collision: u32,

    pub occupancy_threshold: u32,
    pub frame_seed: u32,
    pub three_d: u32,
    pub break_distance: f32,
}

impl StepParams {
    /// Pack the current settings, clamping values the kernels cannot use.
    pub fn new(world: &WorldConfig, sim: &SimConfig, break_distance: f32, frame_seed: u32) -> Self {
        Self {
            width: world.width,
            height: world.height,
            depth: world.depth,
            agent_count: world.agent_count,
            sense_spread: sim.sense_spread,
            sense_distance: sim.sense_distance.max(0.0),
            turn_angle: sim.turn_angle,
            move_distance: sim.move_distance.max(0.0),
            deposit_value: sim.deposit_value.clamp(0.0, MAX_DEPOSIT),
            decay_factor: sim.decay_factor.clamp(0.0, 1.0),
            diffusion: sim.diffusion.max(0.0),
            center_attraction: sim.center_attraction,
            sense_coupling: sim.sense_coupling,
            move_coupling: sim.move_coupling,
            jitter: sim.jitter.max(0.0),
            collision: sim.collision as u32,
            occupancy_threshold: sim.occupancy_threshold.max(1),
            frame_seed,
            three_d: world.dimensionality.is_3d() as u32,
            break_distance: break_distance.max(0.0),
        }
    }

    pub fn is_3d(&self) -> bool {
        self.three_d != 0
    }

    pub fn extent(&self) -> Vec3 {
        Vec3::new(self.width as f32, self.height as f32, self.depth as f32)
    }

    /// World midpoint; z is 0 for flat worlds.
    pub fn center(&self) -> Vec3 {
        let c = self.extent() * 0.5;
        if self.is_3d() {
            c
        } else {
            Vec3::new(c.x, c.y, 0.0)
        }
    }

    /// Half the world diagonal, never below 1.
    pub fn radius(&self) -> f32 {
        let e = self.extent();
        let e = if self.is_3d() { e } else { Vec3::new(e.x, e.y, 0.0) };
        (e.length() * 0.5).max(1.0)
    }

}

/// Add `value` to an `f32` held as raw bits in `cell`.
///
/// Compare-and-swap on the bit pattern, as the shaders do with
/// `atomicCompareExchangeWeak`.
#[inline]
pub fn atomic_add_f32(cell: &AtomicU32, value: f32) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f32::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Read an `f32` held as raw bits.
#[inline]
pub fn load_f32(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

/// PCG hash, the same integer mix the shaders use.
#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Per-invocation random stream keyed by item index and frame seed.
#[derive(Debug, Clone, Copy)]
pub struct KernelRng {
    state: u32,
}

impl KernelRng {
    pub fn new(index: u32, frame_seed: u32) -> Self {
        Self {
            state: pcg_hash(index ^ pcg_hash(frame_seed)),
        }
    }

    /// Uniform value in `[0, 1]`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.state = pcg_hash(self.state);
        self.state as f32 / 4_294_967_295.0
    }
}
