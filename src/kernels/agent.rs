//! Sense, steer and move for a single agent.
//!
//! Steering follows the classic three-probe rule: keep going if the forward
//! probe beats both sides, turn randomly if it loses to both, otherwise turn
//! toward the stronger side. Volumes use a forward probe plus a four-probe
//! cone. Every probe is penalised by its distance to the world center.

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;

use super::{atomic_add_f32, KernelRng, StepParams};
use crate::agents::{unit_direction, Agent, UNPAIRED};
use crate::field::FieldShape;

/// Shared scratch grids written by the update kernel.
pub struct ScratchGrids<'a> {
    pub occupancy: &'a [AtomicU32],
    /// Trail deposited this step, `f32` bits per cell.
    pub deposits: &'a [AtomicU32],
    pub claims: &'a [AtomicU32],
}

/// Field intensity at `p`, or 0 outside the world.
#[inline]
pub fn sample(field: &[f32], shape: &FieldShape, p: Vec3) -> f32 {
    if shape.contains(p) {
        field[shape.index_of(p)]
    } else {
        0.0
    }
}

/// Wrap an angle into `[0, 2π)`.
#[inline]
pub fn wrap_angle(theta: f32) -> f32 {
    let t = theta.rem_euclid(TAU);
    if t >= TAU {
        0.0
    } else {
        t
    }
}

/// Multiplier applied to sense and move distance by local trail density.
#[inline]
pub fn coupling(strength: f32, local: f32) -> f32 {
    (1.0 + strength * local / (1.0 + local)).max(0.0)
}

/// Heading vector of an agent. Flat worlds ignore `phi`.
#[inline]
pub fn heading(agent: &Agent, three_d: bool) -> Vec3 {
    if three_d {
        unit_direction(agent.theta, agent.phi)
    } else {
        let (s, c) = agent.theta.sin_cos();
        Vec3::new(c, s, 0.0)
    }
}

/// Two unit vectors perpendicular to `d` and to each other.
pub fn orthonormal_basis(d: Vec3) -> (Vec3, Vec3) {
    let helper = if d.z.abs() < 0.9 { Vec3::Z } else { Vec3::X };
    let u = d.cross(helper).normalize();
    let v = d.cross(u);
    (u, v)
}

fn score(field: &[f32], shape: &FieldShape, params: &StepParams, p: Vec3) -> f32 {
    sample(field, shape, p) - params.center_attraction * p.distance(params.center()) / params.radius()
}

/// Recover `(theta, phi)` from a direction vector.
fn angles_of(d: Vec3) -> (f32, f32) {
    (wrap_angle(d.y.atan2(d.x)), d.z.clamp(-1.0, 1.0).acos())
}

/// Update the agent's heading from the field around it.
pub fn steer(agent: &mut Agent, field: &[f32], shape: &FieldShape, params: &StepParams, rng: &mut KernelRng) {
    let pos = agent.position();
    let local = sample(field, shape, pos);
    let sd = params.sense_distance * coupling(params.sense_coupling, local);
    let half = params.sense_spread * 0.5;
    let turn = params.turn_angle;
    let choice = rng.next_f32();

    if params.is_3d() {
        let d = unit_direction(agent.theta, agent.phi);
        let (u, v) = orthonormal_basis(d);
        let forward = score(field, shape, params, pos + d * sd);

        let mut sides = [Vec3::ZERO; 4];
        let mut scores = [0.0f32; 4];
        let mut best = 0;
        for k in 0..4 {
            let a = k as f32 * FRAC_PI_2;
            sides[k] = u * a.cos() + v * a.sin();
            let probe = d * half.cos() + sides[k] * half.sin();
            scores[k] = score(field, shape, params, pos + probe * sd);
            if scores[k] > scores[best] {
                best = k;
            }
        }

        let beats_all = scores.iter().all(|&s| forward > s);
        let loses_all = scores.iter().all(|&s| forward < s);
        let mut dir = d;
        if !beats_all {
            let k = if loses_all { ((choice * 4.0) as usize).min(3) } else { best };
            dir = (d * turn.cos() + sides[k] * turn.sin()).normalize();
        }
        let (mut theta, mut phi) = angles_of(dir);
        theta += (rng.next_f32() * 2.0 - 1.0) * params.jitter * turn;
        phi += (rng.next_f32() * 2.0 - 1.0) * params.jitter * turn;
        if phi < 0.0 {
            phi = -phi;
            theta += PI;
        } else if phi > PI {
            phi = TAU - phi;
            theta += PI;
        }
        agent.theta = wrap_angle(theta);
        agent.phi = phi.clamp(0.0, PI);
    } else {
        let probe = |angle: f32| {
            let (s, c) = angle.sin_cos();
            score(field, shape, params, pos + Vec3::new(c, s, 0.0) * sd)
        };
        let f = probe(agent.theta);
        let l = probe(agent.theta + half);
        let r = probe(agent.theta - half);

        let mut theta = agent.theta;
        if f > l && f > r {
            // keep heading
        } else if f < l && f < r {
            theta += if choice < 0.5 { turn } else { -turn };
        } else if l > r {
            theta += turn;
        } else if r > l {
            theta -= turn;
        }
        theta += (rng.next_f32() * 2.0 - 1.0) * params.jitter * turn;
        agent.theta = wrap_angle(theta);
    }
}

/// Candidate position after moving along the heading, reflected off the
/// world walls. Reflection flips the heading component it crossed.
pub fn advance(agent: &mut Agent, field: &[f32], shape: &FieldShape, params: &StepParams) -> Vec3 {
    let pos = agent.position();
    let three_d = params.is_3d();
    let local = sample(field, shape, pos);
    let distance = params.move_distance * coupling(params.move_coupling, local);
    let mut dir = heading(agent, three_d);
    let mut next = pos + dir * distance;

    let extent = params.extent();
    let axes = if three_d { 3 } else { 2 };
    let mut reflected = false;
    for a in 0..axes {
        let e = extent[a];
        if next[a] < 0.0 {
            next[a] = -next[a];
            dir[a] = -dir[a];
            reflected = true;
        } else if next[a] >= e {
            next[a] = 2.0 * e - next[a];
            dir[a] = -dir[a];
            reflected = true;
        }
        next[a] = next[a].clamp(0.0, e - 1.0e-3);
    }
    if !three_d {
        next.z = 0.0;
    }

    if reflected {
        let (theta, phi) = angles_of(dir);
        agent.theta = theta;
        if three_d {
            agent.phi = phi;
        }
    }
    next
}

/// Full update of one agent: steer, move, claim occupancy and deposit.
///
/// Returns `true` if the move was accepted.
pub fn update_agent(
    index: u32,
    agent: &mut Agent,
    field: &[f32],
    shape: &FieldShape,
    params: &StepParams,
    grids: &ScratchGrids<'_>,
) -> bool {
    let mut rng = KernelRng::new(index, params.frame_seed);
    steer(agent, field, shape, params, &mut rng);
    let next = advance(agent, field, shape, params);
    let cell = shape.index_of(next);

    let prev = grids.occupancy[cell].fetch_add(1, Ordering::Relaxed);
    if params.collision != 0 && prev >= params.occupancy_threshold {
        grids.occupancy[cell].fetch_sub(1, Ordering::Relaxed);
        agent.theta = wrap_angle(rng.next_f32() * TAU);
        if params.is_3d() {
            agent.phi = (1.0 - 2.0 * rng.next_f32()).clamp(-1.0, 1.0).acos();
        }
        return false;
    }

    agent.position = next.to_array();
    atomic_add_f32(&grids.deposits[cell], params.deposit_value);
    grids.claims[cell].fetch_max(index + 1, Ordering::Relaxed);
    true
}

/// Partner of agent `index` after this step's moves.
///
/// Pairs further apart than `break_distance` break; an unpaired agent pairs
/// with whichever other agent last claimed its cell.
pub fn resolve_partner(index: u32, agents: &[Agent], shape: &FieldShape, params: &StepParams, claims: &[AtomicU32]) -> u32 {
    let agent = &agents[index as usize];
    let pos = agent.position();
    let mut partner = agent.partner;

    if partner != UNPAIRED {
        let broken = partner as usize >= agents.len()
            || partner == index
            || agents[partner as usize].position().distance(pos) > params.break_distance;
        if broken {
            partner = UNPAIRED;
        }
    }

    if partner == UNPAIRED {
        let claimant = claims[shape.index_of(pos)].load(Ordering::Relaxed);
        if claimant != 0 && claimant - 1 != index {
            partner = claimant - 1;
        }
    }
    partner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimConfig, WorldConfig};
    use crate::kernels::load_f32;

    fn params_2d(size: u32) -> StepParams {
        let world = WorldConfig::two_d().with_extent(size, size, 1);
        let sim = SimConfig::default().with_center_attraction(0.0).with_jitter(0.0);
        StepParams::new(&world, &sim, 4.0, 7)
    }

    fn grids(n: usize) -> (Vec<AtomicU32>, Vec<AtomicU32>, Vec<AtomicU32>) {
        (
            (0..n).map(|_| AtomicU32::new(0)).collect(),
            (0..n).map(|_| AtomicU32::new(0)).collect(),
            (0..n).map(|_| AtomicU32::new(0)).collect(),
        )
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(-0.5) - (TAU - 0.5)).abs() < 1e-5);
        assert!((wrap_angle(TAU + 0.25) - 0.25).abs() < 1e-5);
        assert!(wrap_angle(TAU) < TAU);
    }

    #[test]
    fn test_steer_toward_left_trail() {
        let params = params_2d(64);
        let shape = FieldShape::new(64, 64, 1);
        let mut field = vec![0.0; shape.total_cells()];
        let mut agent = Agent::new(Vec3::new(10.5, 32.5, 0.0), 0.0, FRAC_PI_2);

        // Light up the left probe target only.
        let half = params.sense_spread * 0.5;
        let left = agent.position() + Vec3::new(half.cos(), half.sin(), 0.0) * params.sense_distance;
        field[shape.index_of(left)] = 10.0;

        let mut rng = KernelRng::new(0, 1);
        steer(&mut agent, &field, &shape, &params, &mut rng);
        assert!((agent.theta - params.turn_angle).abs() < 1e-5);
    }

    #[test]
    fn test_steer_keeps_heading_on_forward_trail() {
        let params = params_2d(64);
        let shape = FieldShape::new(64, 64, 1);
        let mut field = vec![0.0; shape.total_cells()];
        let mut agent = Agent::new(Vec3::new(10.5, 32.5, 0.0), 0.0, FRAC_PI_2);
        let ahead = agent.position() + Vec3::X * params.sense_distance;
        field[shape.index_of(ahead)] = 10.0;

        let mut rng = KernelRng::new(0, 1);
        steer(&mut agent, &field, &shape, &params, &mut rng);
        assert_eq!(agent.theta, 0.0);
    }

    #[test]
    fn test_advance_reflects_off_wall() {
        let params = params_2d(16);
        let shape = FieldShape::new(16, 16, 1);
        let field = vec![0.0; shape.total_cells()];
        let mut agent = Agent::new(Vec3::new(15.5, 8.0, 0.0), 0.0, FRAC_PI_2);
        let next = advance(&mut agent, &field, &shape, &params);
        assert!(next.x < 16.0 && next.x >= 0.0);
        assert!((next.x - 15.5).abs() < 1e-4);
        assert!((agent.theta - PI).abs() < 1e-4);
    }

    #[test]
    fn test_collision_refuses_full_cell() {
        let mut params = params_2d(16);
        params.collision = 1;
        let shape = FieldShape::new(16, 16, 1);
        let field = vec![0.0; shape.total_cells()];
        let (occ, dep, claims) = grids(shape.total_cells());
        let g = ScratchGrids { occupancy: &occ, deposits: &dep, claims: &claims };

        // Without trail, jitter or center pull both agents head straight along +x
        // and land in the same cell.
        let start = Vec3::new(4.5, 4.5, 0.0);
        let mut first = Agent::new(start, 0.0, FRAC_PI_2);
        let mut second = first;
        assert!(update_agent(0, &mut first, &field, &shape, &params, &g));
        assert_eq!(first.position(), Vec3::new(5.5, 4.5, 0.0));

        assert!(!update_agent(1, &mut second, &field, &shape, &params, &g));
        assert_eq!(second.position(), start);
        assert_eq!(occ[shape.index_of(first.position())].load(Ordering::Relaxed), 1);
        assert_eq!(dep.iter().map(load_f32).sum::<f32>(), params.deposit_value);
    }

    #[test]
    fn test_deposit_and_claim() {
        let params = params_2d(16);
        let shape = FieldShape::new(16, 16, 1);
        let field = vec![0.0; shape.total_cells()];
        let (occ, dep, claims) = grids(shape.total_cells());
        let g = ScratchGrids { occupancy: &occ, deposits: &dep, claims: &claims };

        let mut agent = Agent::new(Vec3::new(8.5, 8.5, 0.0), 0.0, FRAC_PI_2);
        assert!(update_agent(3, &mut agent, &field, &shape, &params, &g));
        let cell = shape.index_of(agent.position());
        assert_eq!(load_f32(&dep[cell]), params.deposit_value);
        assert_eq!(claims[cell].load(Ordering::Relaxed), 4);
        assert_eq!(occ[cell].load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_pairs_break_beyond_distance() {
        let params = params_2d(64);
        let shape = FieldShape::new(64, 64, 1);
        let claims: Vec<AtomicU32> = (0..shape.total_cells()).map(|_| AtomicU32::new(0)).collect();
        let mut a = Agent::new(Vec3::new(1.0, 1.0, 0.0), 0.0, FRAC_PI_2);
        let b = Agent::new(Vec3::new(40.0, 40.0, 0.0), 0.0, FRAC_PI_2);
        a.partner = 1;
        let agents = [a, b];
        assert_eq!(resolve_partner(0, &agents, &shape, &params, &claims), UNPAIRED);

        claims[shape.index_of(a.position())].store(2, Ordering::Relaxed);
        assert_eq!(resolve_partner(0, &agents, &shape, &params, &claims), 1);
    }

    #[test]
    fn test_steer_3d_keeps_unit_angles() {
        let world = WorldConfig::three_d().with_extent(32, 32, 32);
        let params = StepParams::new(&world, &SimConfig::default(), 4.0, 3);
        let shape = FieldShape::new(32, 32, 32);
        let field = vec![0.0; shape.total_cells()];
        for i in 0..64 {
            let mut agent = Agent::new(Vec3::splat(16.0), i as f32 * 0.1, (i as f32 * 0.05).min(PI));
            let mut rng = KernelRng::new(i, 5);
            steer(&mut agent, &field, &shape, &params, &mut rng);
            assert!(agent.theta >= 0.0 && agent.theta < TAU);
            assert!(agent.phi >= 0.0 && agent.phi <= PI);
        }
    }
}
