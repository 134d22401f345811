//! Color ramps for mapping trail intensity to color.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Five-stop color ramp sampled by the render shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Palette {
    /// Black to yellow through purple and orange.
    #[default]
    Inferno,
    /// Black to light yellow through pink.
    Magma,
    /// Purple to yellow through teal.
    Viridis,
    /// Deep blue to cyan.
    Ocean,
    /// Plain white ramp.
    Mono,
}

impl Palette {
    pub const ALL: [Palette; 5] = [Palette::Inferno, Palette::Magma, Palette::Viridis, Palette::Ocean, Palette::Mono];

    pub fn label(self) -> &'static str {
        match self {
            Palette::Inferno => "Inferno",
            Palette::Magma => "Magma",
            Palette::Viridis => "Viridis",
            Palette::Ocean => "Ocean",
            Palette::Mono => "Mono",
        }
    }

    pub fn colors(self) -> [Vec3; 5] {
        match self {
            Palette::Inferno => [
                Vec3::new(0.001, 0.0, 0.014),
                Vec3::new(0.341, 0.063, 0.429),
                Vec3::new(0.735, 0.216, 0.330),
                Vec3::new(0.988, 0.645, 0.198),
                Vec3::new(0.988, 1.0, 0.644),
            ],
            Palette::Magma => [
                Vec3::new(0.001, 0.0, 0.014),
                Vec3::new(0.329, 0.071, 0.435),
                Vec3::new(0.716, 0.215, 0.475),
                Vec3::new(0.994, 0.541, 0.380),
                Vec3::new(0.987, 0.991, 0.749),
            ],
            Palette::Viridis => [
                Vec3::new(0.267, 0.004, 0.329),
                Vec3::new(0.282, 0.140, 0.458),
                Vec3::new(0.127, 0.566, 0.551),
                Vec3::new(0.369, 0.789, 0.383),
                Vec3::new(0.993, 0.906, 0.144),
            ],
            Palette::Ocean => [
                Vec3::new(0.0, 0.05, 0.15),
                Vec3::new(0.0, 0.2, 0.4),
                Vec3::new(0.0, 0.4, 0.6),
                Vec3::new(0.2, 0.6, 0.8),
                Vec3::new(0.6, 0.9, 1.0),
            ],
            Palette::Mono => [
                Vec3::ZERO,
                Vec3::splat(0.25),
                Vec3::splat(0.5),
                Vec3::splat(0.75),
                Vec3::ONE,
            ],
        }
    }

    /// Stops padded to `vec4` for a uniform buffer.
    pub fn to_gpu(self) -> [[f32; 4]; 5] {
        self.colors().map(|c| c.extend(1.0).to_array())
    }

    /// Linear interpolation along the ramp, `t` in 0.0-1.0.
    pub fn sample(self, t: f32) -> Vec3 {
        let stops = self.colors();
        let x = t.clamp(0.0, 1.0) * 4.0;
        let i = (x.floor() as usize).min(3);
        stops[i].lerp(stops[i + 1], x - i as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_endpoints() {
        for p in Palette::ALL {
            assert_eq!(p.sample(0.0), p.colors()[0]);
            assert!((p.sample(1.0) - p.colors()[4]).length() < 1e-6);
        }
    }

    #[test]
    fn test_sample_midpoint() {
        assert!((Palette::Mono.sample(0.5) - Vec3::splat(0.5)).length() < 1e-6);
        assert!((Palette::Mono.sample(-3.0)).length() < 1e-6);
    }
}
