//! Agent records and seeding.
//!
//! [`Agent`] is laid out to match the WGSL `Agent` struct byte for byte, so
//! the host store can be uploaded to a storage buffer with a single
//! `bytemuck::cast_slice`.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

use crate::config::{Dimensionality, WorldConfig};

/// Partner value of an agent that is not paired.
pub const UNPAIRED: u32 = u32::MAX;

/// A single slime-mold agent.
///
/// `theta` is the azimuth in `[0, 2π)`. `phi` is the polar angle in `[0, π]`;
/// 2D agents keep it at π/2 so their heading lies in the xy plane.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Agent {
    pub position: [f32; 3],
    pub theta: f32,
    pub phi: f32,
    /// Spare per-agent scalar, reset to 0 on seeding.
    pub info: f32,
    /// Index of the paired agent, or [`UNPAIRED`].
    pub partner: u32,
    pub _pad: u32,
}

impl Agent {
    pub fn new(position: Vec3, theta: f32, phi: f32) -> Self {
        Self {
            position: position.to_array(),
            theta,
            phi,
            info: 0.0,
            partner: UNPAIRED,
            _pad: 0,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn is_paired(&self) -> bool {
        self.partner != UNPAIRED
    }
}

/// Host copy of every agent.
///
/// The count is fixed at construction; reseeding overwrites all records in
/// place.
#[derive(Debug, Clone)]
pub struct AgentStore {
    agents: Vec<Agent>,
}

impl AgentStore {
    /// Allocate `world.agent_count` agents and seed them.
    pub fn seed<R: Rng>(world: &WorldConfig, rng: &mut R) -> Self {
        let mut store = Self {
            agents: vec![Agent::zeroed(); world.agent_count as usize],
        };
        store.reseed(world, world.spawn_radius, rng);
        store
    }

    /// Build a store from explicit records.
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Scatter every agent uniformly inside a disk (2D) or ball (3D) of
    /// `radius` around the world center, with a uniform random heading.
    pub fn reseed<R: Rng>(&mut self, world: &WorldConfig, radius: f32, rng: &mut R) {
        let center = world.center();
        let max = world.extent() - Vec3::splat(1.0e-3);
        for agent in &mut self.agents {
            let (offset, theta, phi) = match world.dimensionality {
                Dimensionality::TwoD => {
                    let angle = rng.gen_range(0.0..TAU);
                    let r = rng.gen::<f32>().sqrt() * radius;
                    let offset = Vec3::new(angle.cos() * r, angle.sin() * r, 0.0);
                    (offset, rng.gen_range(0.0..TAU), FRAC_PI_2)
                }
                Dimensionality::ThreeD => {
                    let r = rng.gen::<f32>().cbrt() * radius;
                    let dir = unit_direction(rng.gen_range(0.0..TAU), polar_from_unit(rng.gen()));
                    let theta = rng.gen_range(0.0..TAU);
                    (dir * r, theta, polar_from_unit(rng.gen()))
                }
            };
            let mut position = (center + offset).clamp(Vec3::ZERO, max.max(Vec3::ZERO));
            if !world.dimensionality.is_3d() {
                position.z = 0.0;
            }
            *agent = Agent::new(position, theta, phi);
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    pub fn as_mut_slice(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }
}

/// Polar angle with `cos(phi)` uniform over `[-1, 1]`.
fn polar_from_unit(u: f32) -> f32 {
    (1.0 - 2.0 * u).clamp(-1.0, 1.0).acos().clamp(0.0, PI)
}

/// Unit vector for azimuth `theta` and polar angle `phi`.
pub fn unit_direction(theta: f32, phi: f32) -> Vec3 {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    Vec3::new(sp * ct, sp * st, cp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_agent_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Agent>(), 32);
        assert_eq!(std::mem::align_of::<Agent>(), 4);
    }

    #[test]
    fn test_seed_2d_inside_disk() {
        let world = WorldConfig::two_d().with_agents(2000).with_spawn_radius(100.0);
        let mut rng = StdRng::seed_from_u64(1);
        let store = AgentStore::seed(&world, &mut rng);
        let center = world.center();
        assert_eq!(store.len(), 2000);
        for a in store.iter() {
            assert!(a.position().distance(center) <= 100.0 + 1e-3);
            assert_eq!(a.position[2], 0.0);
            assert!(a.theta >= 0.0 && a.theta < TAU);
            assert_eq!(a.partner, UNPAIRED);
        }
    }

    #[test]
    fn test_seed_3d_inside_ball() {
        let world = WorldConfig::three_d().with_agents(2000).with_spawn_radius(30.0);
        let mut rng = StdRng::seed_from_u64(2);
        let store = AgentStore::seed(&world, &mut rng);
        let center = world.center();
        for a in store.iter() {
            assert!(a.position().distance(center) <= 30.0 + 1e-3);
            assert!(a.phi >= 0.0 && a.phi <= PI);
        }
    }

    #[test]
    fn test_unit_direction_is_normalized() {
        for i in 0..16 {
            let d = unit_direction(i as f32 * 0.4, i as f32 * 0.2);
            assert!((d.length() - 1.0).abs() < 1e-5);
        }
        let flat = unit_direction(0.0, FRAC_PI_2);
        assert!((flat - Vec3::X).length() < 1e-5);
    }
}
