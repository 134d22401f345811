//! Box-blur diffusion followed by decay.
//!
//! Each cell becomes the weighted mean of itself (weight 1) and its in-bounds
//! neighbours (weight `diffusion`), scaled by `decay_factor`. Normalising by
//! the in-bounds weight keeps a uniform field uniform up to the walls.

use glam::UVec3;

use super::StepParams;
use crate::field::FieldShape;

/// New value of cell `c`. `source(i)` returns the pre-diffusion value of
/// linear cell `i`.
pub fn diffuse_cell(shape: &FieldShape, c: UVec3, params: &StepParams, source: impl Fn(usize) -> f32) -> f32 {
    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    let z_radius: i32 = if shape.depth > 1 { 1 } else { 0 };

    for dz in -z_radius..=z_radius {
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let x = c.x as i32 + dx;
                let y = c.y as i32 + dy;
                let z = c.z as i32 + dz;
                if x < 0 || y < 0 || z < 0 || x >= shape.width as i32 || y >= shape.height as i32 || z >= shape.depth as i32 {
                    continue;
                }
                let w = if dx == 0 && dy == 0 && dz == 0 { 1.0 } else { params.diffusion };
                sum += w * source(shape.index(x as u32, y as u32, z as u32));
                weight_sum += w;
            }
        }
    }

    sum / weight_sum * params.decay_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimConfig, WorldConfig};

    fn params(shape: &FieldShape, decay: f32, diffusion: f32) -> StepParams {
        let world = if shape.depth > 1 {
            WorldConfig::three_d().with_extent(shape.width, shape.height, shape.depth)
        } else {
            WorldConfig::two_d().with_extent(shape.width, shape.height, 1)
        };
        let mut sim = SimConfig::default().with_decay(decay);
        sim.diffusion = diffusion;
        StepParams::new(&world, &sim, 0.0, 0)
    }

    #[test]
    fn test_uniform_field_stays_uniform_at_walls() {
        let shape = FieldShape::new(5, 4, 1);
        let p = params(&shape, 0.5, 1.0);
        for i in 0..shape.total_cells() {
            let v = diffuse_cell(&shape, shape.coords(i), &p, |_| 2.0);
            assert!((v - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_impulse_spreads_and_conserves_mass() {
        let shape = FieldShape::new(9, 9, 1);
        let p = params(&shape, 1.0, 1.0);
        let center = shape.index(4, 4, 0);
        let src = |i: usize| if i == center { 9.0 } else { 0.0 };
        let out: Vec<f32> = (0..shape.total_cells()).map(|i| diffuse_cell(&shape, shape.coords(i), &p, src)).collect();
        assert!((out[center] - 1.0).abs() < 1e-6);
        assert!((out[shape.index(3, 5, 0)] - 1.0).abs() < 1e-6);
        assert_eq!(out[shape.index(2, 4, 0)], 0.0);
        assert!((out.iter().sum::<f32>() - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_diffusion_is_pure_decay() {
        let shape = FieldShape::new(4, 4, 4);
        let p = params(&shape, 0.25, 0.0);
        let v = diffuse_cell(&shape, UVec3::new(1, 2, 3), &p, |i| i as f32);
        assert!((v - shape.index(1, 2, 3) as f32 * 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_volume_uses_27_taps() {
        let shape = FieldShape::new(3, 3, 3);
        let p = params(&shape, 1.0, 1.0);
        let center = shape.index(1, 1, 1);
        let v = diffuse_cell(&shape, UVec3::new(1, 1, 1), &p, |i| if i == center { 27.0 } else { 0.0 });
        assert!((v - 1.0).abs() < 1e-6);
    }
}
