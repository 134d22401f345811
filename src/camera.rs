//! Camera for the orbit and top-down views.
//!
//! Volumes are viewed with a perspective orbit camera around the world
//! center. Flat worlds use a fixed orthographic camera looking down -z that
//! frames the whole grid.

use glam::{Mat4, Vec2, Vec3};

/// Projection used by a [`Camera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians.
    Perspective { fov_y: f32 },
    /// Visible half-extent in world units.
    Orthographic { half_width: f32, half_height: f32 },
}

/// Orbit camera.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    pub projection: Projection,
    min_distance: f32,
    max_distance: f32,
}

impl Camera {
    /// Perspective camera orbiting the center of a `extent`-sized volume.
    pub fn orbit(extent: Vec3) -> Self {
        let size = extent.max_element().max(1.0);
        Self {
            yaw: 0.6,
            pitch: 0.3,
            distance: size * 1.6,
            target: extent * 0.5,
            projection: Projection::Perspective { fov_y: 45.0_f32.to_radians() },
            min_distance: size * 0.1,
            max_distance: size * 5.0,
        }
    }

    /// Orthographic camera framing a flat `width × height` grid.
    pub fn top_down(width: f32, height: f32) -> Self {
        let distance = width.max(height).max(1.0);
        Self {
            yaw: 0.0,
            pitch: std::f32::consts::FRAC_PI_2,
            distance,
            target: Vec3::new(width * 0.5, height * 0.5, 0.0),
            projection: Projection::Orthographic {
                half_width: width * 0.5,
                half_height: height * 0.5,
            },
            min_distance: distance,
            max_distance: distance,
        }
    }

    pub fn is_orbit(&self) -> bool {
        matches!(self.projection, Projection::Perspective { .. })
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        if !self.is_orbit() {
            return self.target + Vec3::Z * self.distance;
        }
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Unit vector from the camera toward its target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position()).normalize_or_zero()
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let far = self.distance + self.max_distance * 2.0;
        match self.projection {
            Projection::Perspective { fov_y } => Mat4::perspective_rh(fov_y, aspect.max(1e-3), 0.1, far),
            Projection::Orthographic { half_width, half_height } => {
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, 0.1, far)
            }
        }
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Rotate by a mouse drag in pixels. Ignored by the top-down camera.
    pub fn orbit_by(&mut self, drag: Vec2) {
        if !self.is_orbit() {
            return;
        }
        self.yaw -= drag.x * 0.005;
        self.pitch += drag.y * 0.005;
        self.pitch = self.pitch.clamp(-1.5, 1.5);
    }

    /// Move toward or away from the target by wheel lines.
    pub fn zoom_by(&mut self, scroll: f32) {
        if !self.is_orbit() {
            return;
        }
        let step = (self.max_distance - self.min_distance) * 0.02;
        self.distance = (self.distance - scroll * step).clamp(self.min_distance, self.max_distance);
    }

    /// Spin around the target at `speed` radians per second.
    pub fn auto_rotate(&mut self, dt: f32, speed: f32) {
        if self.is_orbit() {
            self.yaw = (self.yaw + dt * speed).rem_euclid(std::f32::consts::TAU);
        }
    }
}

/// Axis (0 = x, 1 = y, 2 = z) most parallel to `dir`.
pub fn dominant_axis(dir: Vec3) -> usize {
    let a = dir.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// Model matrix placing a stack of unit quads across a volume.
///
/// Quad-local `(a, b)` span the two axes other than `axis`; local `c` in
/// 0.0-1.0 selects the slice along `axis`.
pub fn slice_model(axis: usize, extent: Vec3) -> Mat4 {
    let x = Vec3::X * extent.x;
    let y = Vec3::Y * extent.y;
    let z = Vec3::Z * extent.z;
    let (a, b, c) = match axis {
        0 => (y, z, x),
        1 => (x, z, y),
        _ => (x, y, z),
    };
    Mat4::from_cols(a.extend(0.0), b.extend(0.0), c.extend(0.0), glam::Vec4::W)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_looks_at_center() {
        let cam = Camera::orbit(Vec3::splat(100.0));
        assert!((cam.position().distance(cam.target) - cam.distance).abs() < 1e-3);
        let clip = cam.view_proj(1.0).project_point3(cam.target);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn test_top_down_frames_grid() {
        let cam = Camera::top_down(1200.0, 800.0);
        let vp = cam.view_proj(1.5);
        let corner = vp.project_point3(Vec3::new(1200.0, 800.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-4 && (corner.y - 1.0).abs() < 1e-4);
        let origin = vp.project_point3(Vec3::ZERO);
        assert!((origin.x + 1.0).abs() < 1e-4 && (origin.y + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_zoom_clamps() {
        let mut cam = Camera::orbit(Vec3::splat(10.0));
        cam.zoom_by(1.0e6);
        assert!((cam.distance - 1.0).abs() < 1e-5);
        cam.zoom_by(-1.0e6);
        assert!((cam.distance - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_top_down_ignores_orbit() {
        let mut cam = Camera::top_down(10.0, 10.0);
        let before = cam.position();
        cam.orbit_by(Vec2::new(100.0, 100.0));
        cam.auto_rotate(1.0, 1.0);
        assert_eq!(cam.position(), before);
    }

    #[test]
    fn test_dominant_axis() {
        assert_eq!(dominant_axis(Vec3::new(-0.9, 0.1, 0.3)), 0);
        assert_eq!(dominant_axis(Vec3::new(0.2, 0.7, -0.5)), 1);
        assert_eq!(dominant_axis(Vec3::new(0.1, 0.1, -1.0)), 2);
    }

    #[test]
    fn test_slice_model_maps_unit_cube_to_world() {
        let extent = Vec3::new(10.0, 20.0, 30.0);
        for axis in 0..3 {
            let m = slice_model(axis, extent);
            assert_eq!(m.transform_point3(Vec3::ONE), extent);
            let slice = m.transform_point3(Vec3::new(0.0, 0.0, 0.5));
            assert_eq!(slice[axis], extent[axis] * 0.5);
        }
    }
}
