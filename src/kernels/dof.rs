//! Depth-of-field compositing math.
//!
//! Samples are accumulated into a `u32` fixed-point image; one extra cell
//! tracks the running maximum so the final blit can normalise without a
//! separate reduction pass.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::config::DofConfig;

/// Fixed-point units per 1.0 of accumulated weight.
pub const ACCUM_SCALE: f32 = 256.0;

/// Lens radius in world units per unit of aperture, for ray-marched trails.
pub const LENS_RADIUS_PER_APERTURE: f32 = 10.0;

/// Uniform block for the compositor kernels. Matches WGSL `DofParams`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DofParams {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub aperture: f32,
    pub world_extent: [f32; 3],
    pub focal_distance: f32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub focal_depth: f32,
    pub sample_weight: f32,
    pub iterations: u32,
    pub break_distance: f32,
    pub mode: u32,
    pub frame_seed: u32,
    pub agent_count: u32,
    pub field_depth: u32,
    pub _pad: [u32; 2],
}

impl DofParams {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &DofConfig,
        view_proj: Mat4,
        camera_pos: Vec3,
        world_extent: Vec3,
        screen: (u32, u32),
        agent_count: u32,
        frame_seed: u32,
    ) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_pos: camera_pos.to_array(),
            aperture: config.aperture.max(0.0),
            world_extent: world_extent.to_array(),
            focal_distance: config.focal_distance,
            screen_width: screen.0.max(1),
            screen_height: screen.1.max(1),
            focal_depth: config.focal_depth.max(0.0),
            sample_weight: config.sample_weight.max(0.0),
            iterations: config.iterations.max(1),
            break_distance: config.break_distance.max(0.0),
            mode: config.mode.as_u32(),
            frame_seed,
            agent_count,
            field_depth: world_extent.z as u32,
            _pad: [0; 2],
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj)
    }

    pub fn inv_view_proj(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.inv_view_proj)
    }

    pub fn screen(&self) -> Vec2 {
        Vec2::new(self.screen_width as f32, self.screen_height as f32)
    }

    pub fn pixel_count(&self) -> usize {
        self.screen_width as usize * self.screen_height as usize
    }
}

/// Project a world point to pixel coordinates. `None` if behind the camera.
pub fn project(view_proj: Mat4, p: Vec3, screen: Vec2) -> Option<Vec2> {
    let clip = view_proj * p.extend(1.0);
    if clip.w <= 1.0e-6 {
        return None;
    }
    let ndc = clip.xy() / clip.w;
    Some(Vec2::new((ndc.x * 0.5 + 0.5) * screen.x, (0.5 - ndc.y * 0.5) * screen.y))
}

/// Circle of confusion radius in pixels for a point `depth` from the camera.
#[inline]
pub fn circle_of_confusion(depth: f32, params: &DofParams) -> f32 {
    ((depth - params.focal_distance).abs() - params.focal_depth).max(0.0) * params.aperture
}

/// Per-sample weight of a splat with the given circle of confusion.
#[inline]
pub fn splat_weight(coc: f32, params: &DofParams) -> f32 {
    params.sample_weight / (1.0 + coc * coc)
}

/// Weight of a ray-march sample at distance `t` along the ray.
#[inline]
pub fn focus_weight(t: f32, params: &DofParams) -> f32 {
    let outside = ((t - params.focal_distance).abs() - params.focal_depth).max(0.0);
    params.sample_weight / (1.0 + outside)
}

/// Convert an accumulated weight to fixed point.
#[inline]
pub fn to_fixed(weight: f32) -> u32 {
    (weight.max(0.0) * ACCUM_SCALE).round() as u32
}

/// Normalised brightness of a pixel. Empty images and empty pixels are 0.
#[inline]
pub fn normalize(value: u32, max: u32) -> f32 {
    if max == 0 || value == 0 {
        0.0
    } else {
        (value as f32 / max as f32).min(1.0)
    }
}

/// Entry and exit distance of a ray through an axis-aligned box. The entry
/// is clamped to 0; the ray misses when entry > exit.
pub fn intersect_box(origin: Vec3, dir: Vec3, box_min: Vec3, box_max: Vec3) -> (f32, f32) {
    let inv = dir.recip();
    let t1 = (box_min - origin) * inv;
    let t2 = (box_max - origin) * inv;
    let t_enter = t1.min(t2).max_element();
    let t_exit = t1.max(t2).min_element();
    (t_enter.max(0.0), t_exit)
}

/// World-space ray through the center of pixel `(x, y)`.
pub fn pixel_ray(inv_view_proj: Mat4, x: u32, y: u32, screen: Vec2) -> (Vec3, Vec3) {
    let ndc = Vec2::new(
        (x as f32 + 0.5) / screen.x * 2.0 - 1.0,
        1.0 - (y as f32 + 0.5) / screen.y * 2.0,
    );
    let near = inv_view_proj.project_point3(ndc.extend(0.0));
    let far = inv_view_proj.project_point3(ndc.extend(1.0));
    (near, (far - near).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DofParams {
        let config = DofConfig {
            focal_distance: 100.0,
            focal_depth: 10.0,
            aperture: 0.5,
            ..DofConfig::default()
        };
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 100.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), 1.0, 0.1, 1000.0);
        DofParams::new(&config, proj * view, Vec3::new(0.0, 0.0, 100.0), Vec3::splat(64.0), (64, 64), 0, 0)
    }

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<DofParams>() % 16, 0);
        assert_eq!(std::mem::size_of::<DofParams>(), 208);
    }

    #[test]
    fn test_in_focus_band_is_sharp() {
        let p = params();
        assert_eq!(circle_of_confusion(95.0, &p), 0.0);
        assert_eq!(circle_of_confusion(110.0, &p), 0.0);
        assert!((circle_of_confusion(130.0, &p) - 10.0).abs() < 1e-5);
        assert_eq!(splat_weight(0.0, &p), p.sample_weight);
        assert!(splat_weight(3.0, &p) < p.sample_weight);
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(0, 0), 0.0);
        assert_eq!(normalize(5, 0), 0.0);
        assert_eq!(normalize(0, 10), 0.0);
        assert_eq!(normalize(10, 10), 1.0);
        assert!((normalize(5, 10) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_project_center_and_behind() {
        let p = params();
        let center = project(p.view_proj(), Vec3::ZERO, p.screen()).unwrap();
        assert!((center - Vec2::splat(32.0)).length() < 1e-3);
        assert!(project(p.view_proj(), Vec3::new(0.0, 0.0, 200.0), p.screen()).is_none());
    }

    #[test]
    fn test_pixel_ray_points_into_scene() {
        let p = params();
        let (origin, dir) = pixel_ray(p.inv_view_proj(), 32, 32, p.screen());
        assert!(dir.z < -0.99);
        assert!((origin.z - 99.9).abs() < 0.05);
    }

    #[test]
    fn test_intersect_box() {
        let (t0, t1) = intersect_box(Vec3::new(-5.0, 0.5, 0.5), Vec3::X, Vec3::ZERO, Vec3::ONE);
        assert!((t0 - 5.0).abs() < 1e-6 && (t1 - 6.0).abs() < 1e-6);
        let (t0, t1) = intersect_box(Vec3::new(-5.0, 3.0, 0.5), Vec3::X, Vec3::ZERO, Vec3::ONE);
        assert!(t0 > t1);
    }
}
