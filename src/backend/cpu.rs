//! # CPU Backend
//!
//! Parallel computation using Rayon.
//!
//! Fields and scratch grids live in host memory; the shared accumulators are
//! atomics so the agent loop can scatter into them from every worker, just
//! as the compute shaders do. Rendering produces a single-channel brightness
//! image, which is enough to check the compositor without a window.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use super::{ComputeBackend, RenderRequest};
use crate::agents::{Agent, UNPAIRED};
use crate::config::{DofMode, RenderMode, WorldConfig};
use crate::error::RenderError;
use crate::field::{FieldShape, Parity, PingPong};
use crate::kernels::agent::{orthonormal_basis, resolve_partner, sample, update_agent, ScratchGrids};
use crate::kernels::diffuse::diffuse_cell;
use crate::kernels::dof::{
    circle_of_confusion, focus_weight, intersect_box, normalize, pixel_ray, project, splat_weight, to_fixed,
    DofParams, LENS_RADIUS_PER_APERTURE,
};
use crate::kernels::{load_f32, KernelRng, StepParams};

fn zeroed_u32(n: usize) -> Vec<AtomicU32> {
    (0..n).map(|_| AtomicU32::new(0)).collect()
}

/// Headless backend running every kernel on the CPU.
pub struct CpuBackend {
    shape: FieldShape,
    agents: Vec<Agent>,
    fields: PingPong<Vec<f32>>,
    deposits: Vec<AtomicU32>,
    occupancy: Vec<AtomicU32>,
    claims: Vec<AtomicU32>,
    params: StepParams,
    viewport: (u32, u32),
    image: Vec<f32>,
    accepted: usize,
}

impl CpuBackend {
    pub fn new(world: &WorldConfig) -> Self {
        let shape = FieldShape::from_world(world);
        let cells = shape.total_cells();
        log::debug!("cpu backend: {}x{}x{} field", shape.width, shape.height, shape.depth);
        Self {
            shape,
            agents: Vec::new(),
            fields: PingPong::new([vec![0.0; cells], vec![0.0; cells]]),
            deposits: zeroed_u32(cells),
            occupancy: zeroed_u32(cells),
            claims: zeroed_u32(cells),
            params: bytemuck::Zeroable::zeroed(),
            viewport: (256, 256),
            image: Vec::new(),
            accepted: 0,
        }
    }

    /// Set the size of images produced by [`render`](ComputeBackend::render).
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width.max(1), height.max(1));
        self
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// The current read field.
    pub fn field(&self) -> &[f32] {
        self.fields.read()
    }

    /// Overwrite the read field.
    pub fn load_field(&mut self, values: &[f32]) {
        let slot = self.fields.parity().index();
        self.fields.slots_mut()[slot].copy_from_slice(values);
    }

    pub fn field_sum(&self) -> f64 {
        self.fields.read().iter().map(|&v| v as f64).sum()
    }

    /// Read field plus this step's deposits, as diffusion will see it.
    pub fn pre_diffusion_value(&self, cell: usize) -> f32 {
        self.fields.read()[cell] + load_f32(&self.deposits[cell])
    }

    pub fn occupancy(&self) -> Vec<u32> {
        self.occupancy.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// Moves accepted during the last agent update.
    pub fn accepted_moves(&self) -> usize {
        self.accepted
    }

    /// Brightness in 0.0-1.0 per pixel of the last rendered frame.
    pub fn image(&self) -> &[f32] {
        &self.image
    }

    fn clear_scratch(&self) {
        self.occupancy.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
        self.deposits.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
        self.claims.par_iter().for_each(|c| c.store(0, Ordering::Relaxed));
    }

    fn render_standard(&mut self, request: &RenderRequest) {
        let (w, h) = self.viewport;
        let shape = self.shape;
        let field = self.fields.read();
        let intensity = request.view.intensity;
        // Column sums through the volume, viewed down the z axis.
        self.image = (0..w as usize * h as usize)
            .into_par_iter()
            .map(|i| {
                let px = (i % w as usize) as f32 + 0.5;
                let py = (i / w as usize) as f32 + 0.5;
                let x = ((px / w as f32) * shape.width as f32) as u32;
                let y = ((1.0 - py / h as f32) * shape.height as f32) as u32;
                let x = x.min(shape.width - 1);
                let y = y.min(shape.height - 1);
                let total: f32 = (0..shape.depth).map(|z| field[shape.index(x, y, z)]).sum();
                1.0 - (-total * intensity).exp()
            })
            .collect();
    }

    fn render_dof(&mut self, request: &RenderRequest) {
        let params = DofParams::new(
            &request.dof,
            request.view_proj,
            request.camera_position,
            Vec3::new(self.shape.width as f32, self.shape.height as f32, self.shape.depth as f32),
            self.viewport,
            self.agents.len() as u32,
            request.frame_seed,
        );
        let pixels = params.pixel_count();
        let accum = zeroed_u32(pixels + 1);

        match request.dof.mode {
            DofMode::Trail => self.march_trails(&params, &accum),
            DofMode::Particles => self.splat_agents(&params, &accum, false),
            DofMode::ParticlePairs => self.splat_agents(&params, &accum, true),
        }

        let max = accum[pixels].load(Ordering::Relaxed);
        self.image = accum[..pixels].iter().map(|v| normalize(v.load(Ordering::Relaxed), max)).collect();
    }

    fn splat_agents(&self, params: &DofParams, accum: &[AtomicU32], pairs: bool) {
        let agents = &self.agents;
        agents.par_iter().enumerate().for_each(|(i, agent)| {
            let mut rng = KernelRng::new(i as u32, params.frame_seed);
            splat_point(params, accum, agent.position(), params.iterations, 1.0, &mut rng);

            if pairs && agent.partner != UNPAIRED && (agent.partner as usize) < agents.len() && agent.partner > i as u32 {
                let other = agents[agent.partner as usize].position();
                if other.distance(agent.position()) <= params.break_distance {
                    for _ in 0..params.iterations {
                        let t = rng.next_f32();
                        splat_point(params, accum, agent.position().lerp(other, t), 1, 0.5, &mut rng);
                    }
                }
            }
        });
    }

    fn march_trails(&self, params: &DofParams, accum: &[AtomicU32]) {
        let field = self.fields.read();
        let shape = self.shape;
        let screen = params.screen();
        let extent = Vec3::from_array(params.world_extent);
        let inv = params.inv_view_proj();
        let max_cell = &accum[params.pixel_count()];

        accum[..params.pixel_count()].par_iter().enumerate().for_each(|(i, out)| {
            let x = (i % params.screen_width as usize) as u32;
            let y = (i / params.screen_width as usize) as u32;
            let mut rng = KernelRng::new(i as u32, params.frame_seed);
            let (origin, dir) = pixel_ray(inv, x, y, screen);

            let (u, v) = orthonormal_basis(dir);
            let angle = rng.next_f32() * std::f32::consts::TAU;
            let radius = rng.next_f32().sqrt() * params.aperture * LENS_RADIUS_PER_APERTURE;
            let lens = origin + (u * angle.cos() + v * angle.sin()) * radius;
            let focus = origin + dir * params.focal_distance;
            let ray = (focus - lens).normalize_or_zero();
            if ray == Vec3::ZERO {
                return;
            }

            let (t0, t1) = intersect_box(lens, ray, Vec3::ZERO, extent);
            if t0 > t1 {
                return;
            }
            let step = (t1 - t0) / params.iterations as f32;
            let mut acc = 0.0;
            for k in 0..params.iterations {
                let t = t0 + (k as f32 + 0.5) * step;
                acc += sample(field, &shape, lens + ray * t) * focus_weight(t, params);
                if acc >= params.break_distance {
                    break;
                }
            }
            let value = to_fixed(acc);
            out.store(value, Ordering::Relaxed);
            max_cell.fetch_max(value, Ordering::Relaxed);
        });
    }
}

/// Scatter `samples` jittered copies of `p` over its circle of confusion.
fn splat_point(params: &DofParams, accum: &[AtomicU32], p: Vec3, samples: u32, scale: f32, rng: &mut KernelRng) {
    let screen = params.screen();
    let Some(center) = project(params.view_proj(), p, screen) else {
        return;
    };
    let depth = p.distance(Vec3::from_array(params.camera_pos));
    let coc = circle_of_confusion(depth, params);
    let value = to_fixed(splat_weight(coc, params) * scale);
    if value == 0 {
        return;
    }
    let max_index = params.pixel_count();

    for _ in 0..samples {
        let angle = rng.next_f32() * std::f32::consts::TAU;
        let r = rng.next_f32().sqrt() * coc;
        let pixel = center + Vec2::new(angle.cos(), angle.sin()) * r;
        if pixel.x < 0.0 || pixel.y < 0.0 || pixel.x >= screen.x || pixel.y >= screen.y {
            continue;
        }
        let index = pixel.y as usize * params.screen_width as usize + pixel.x as usize;
        let total = saturating_accumulate(&accum[index], value);
        accum[max_index].fetch_max(total, Ordering::Relaxed);
    }
}

/// Add `value` to `cell`, pinning at `u32::MAX`. Returns the new total.
fn saturating_accumulate(cell: &AtomicU32, value: u32) -> u32 {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = current.saturating_add(value);
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => current = actual,
        }
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn shape(&self) -> FieldShape {
        self.shape
    }

    fn parity(&self) -> Parity {
        self.fields.parity()
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn sync_agents(&mut self, agents: &[Agent]) {
        self.agents.clear();
        self.agents.extend_from_slice(agents);
    }

    fn clear_fields(&mut self) {
        for slot in self.fields.slots_mut() {
            slot.par_iter_mut().for_each(|v| *v = 0.0);
        }
        self.fields.reset();
        self.clear_scratch();
    }

    fn begin_step(&mut self, params: &StepParams) {
        self.params = *params;
    }

    fn clear_occupancy(&mut self) {
        self.clear_scratch();
    }

    fn update_agents(&mut self) {
        let shape = self.shape;
        let params = self.params;
        let field = self.fields.read();
        let grids = ScratchGrids {
            occupancy: &self.occupancy,
            deposits: &self.deposits,
            claims: &self.claims,
        };
        self.accepted = self
            .agents
            .par_iter_mut()
            .enumerate()
            .map(|(i, agent)| update_agent(i as u32, agent, field, &shape, &params, &grids) as usize)
            .sum();
    }

    fn pair_agents(&mut self) {
        let shape = self.shape;
        let params = self.params;
        let agents = &self.agents;
        let claims = &self.claims;
        let partners: Vec<u32> = (0..agents.len())
            .into_par_iter()
            .map(|i| resolve_partner(i as u32, agents, &shape, &params, claims))
            .collect();
        for (agent, partner) in self.agents.iter_mut().zip(partners) {
            agent.partner = partner;
        }
    }

    fn diffuse(&mut self) {
        let shape = self.shape;
        let params = self.params;
        let deposits = &self.deposits;
        let (read, write) = self.fields.split();
        write.par_iter_mut().enumerate().for_each(|(i, out)| {
            *out = diffuse_cell(&shape, shape.coords(i), &params, |j| {
                read[j] + load_f32(&deposits[j])
            });
        });
    }

    fn swap_fields(&mut self) {
        self.fields.swap();
    }

    fn end_step(&mut self) {}

    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError> {
        match request.mode {
            RenderMode::Standard => self.render_standard(request),
            RenderMode::DepthOfField => self.render_dof(request),
        }
        Ok(())
    }
}
