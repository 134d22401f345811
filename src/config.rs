//! Simulation settings.
//!
//! [`SimConfig`] holds the behaviour tunables every kernel reads each frame,
//! [`WorldConfig`] fixes the grid and agent population at startup, and
//! [`DofConfig`] drives the depth-of-field compositor. All three serialize
//! to JSON through [`Settings`].
//!
//! Every runtime tunable is also reachable through [`SimParam`], which gives
//! the UI and the external controller one shared list of ranges.

use std::f32::consts::PI;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::palette::Palette;

/// Largest number of workgroups a single dispatch dimension may use.
pub const MAX_WORKGROUPS: u32 = 65_535;

/// Threads per workgroup for every compute kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// Whether the field is a flat grid or a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimensionality {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl Dimensionality {
    pub fn is_3d(self) -> bool {
        matches!(self, Dimensionality::ThreeD)
    }
}

/// Grid shape and agent population, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub dimensionality: Dimensionality,
    pub width: u32,
    pub height: u32,
    /// Always 1 for a 2D world.
    pub depth: u32,
    pub agent_count: u32,
    /// Radius of the disk (2D) or ball (3D) agents are seeded in.
    pub spawn_radius: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::two_d()
    }
}

impl WorldConfig {
    /// The flat 1200x800 world with 50k agents.
    pub fn two_d() -> Self {
        Self {
            dimensionality: Dimensionality::TwoD,
            width: 1200,
            height: 800,
            depth: 1,
            agent_count: 50_000,
            spawn_radius: 200.0,
        }
    }

    /// A 160³ volume with 100k agents.
    pub fn three_d() -> Self {
        Self {
            dimensionality: Dimensionality::ThreeD,
            width: 160,
            height: 160,
            depth: 160,
            agent_count: 100_000,
            spawn_radius: 40.0,
        }
    }

    /// Set the agent count.
    pub fn with_agents(mut self, count: u32) -> Self {
        self.agent_count = count;
        self
    }

    /// Set the spawn radius.
    pub fn with_spawn_radius(mut self, radius: f32) -> Self {
        self.spawn_radius = radius;
        self
    }

    /// Set the grid extent. `depth` is ignored for 2D worlds.
    pub fn with_extent(mut self, width: u32, height: u32, depth: u32) -> Self {
        self.width = width;
        self.height = height;
        self.depth = if self.dimensionality.is_3d() { depth } else { 1 };
        self
    }

    /// World extent in cells.
    pub fn extent(&self) -> Vec3 {
        Vec3::new(self.width as f32, self.height as f32, self.depth as f32)
    }

    /// Midpoint of the world. In 2D the z component is 0.
    pub fn center(&self) -> Vec3 {
        let half = self.extent() * 0.5;
        if self.dimensionality.is_3d() {
            half
        } else {
            half.truncate().extend(0.0)
        }
    }

    /// Half the world diagonal, used to normalise distances to the center.
    pub fn radius(&self) -> f32 {
        let extent = if self.dimensionality.is_3d() {
            self.extent()
        } else {
            self.extent().truncate().extend(0.0)
        };
        (extent.length() * 0.5).max(1.0)
    }

    pub fn total_cells(&self) -> u32 {
        self.width * self.height * self.depth
    }

    /// Slider band for the spawn radius.
    pub fn spawn_radius_range(&self) -> (f32, f32) {
        let max = (self.height as f32 * 0.5).max(20.0);
        (20.0_f32.min(max), max)
    }

    /// Check the world can be addressed by a single dispatch grid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(ConfigError::Invalid(format!(
                "world extent must be non-zero, got {}x{}x{}",
                self.width, self.height, self.depth
            )));
        }
        if !self.dimensionality.is_3d() && self.depth != 1 {
            return Err(ConfigError::Invalid(format!(
                "a 2d world must have depth 1, got {}",
                self.depth
            )));
        }
        let limit = MAX_WORKGROUPS as u64 * WORKGROUP_SIZE as u64;
        let cells = self.width as u64 * self.height as u64 * self.depth as u64;
        if cells > limit {
            return Err(ConfigError::Invalid(format!(
                "world has {} cells, at most {} can be dispatched",
                cells, limit
            )));
        }
        if self.agent_count as u64 > limit {
            return Err(ConfigError::Invalid(format!(
                "{} agents requested, at most {} can be dispatched",
                self.agent_count, limit
            )));
        }
        if self.spawn_radius.is_nan() || self.spawn_radius < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "spawn radius must be non-negative, got {}",
                self.spawn_radius
            )));
        }
        Ok(())
    }
}

/// Per-frame behaviour tunables read by the agent and diffusion kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Angle between the side probes, in radians.
    pub sense_spread: f32,
    /// How far ahead agents sample the field.
    pub sense_distance: f32,
    /// Rotation applied when steering toward a better probe.
    pub turn_angle: f32,
    /// Distance moved per step.
    pub move_distance: f32,
    /// Trail intensity added by each successful move.
    pub deposit_value: f32,
    /// Multiplier applied to the field after diffusion.
    pub decay_factor: f32,
    /// Refuse moves into cells already at the occupancy threshold.
    pub collision: bool,
    /// Penalty on probe scores proportional to distance from the center.
    pub center_attraction: f32,
    /// Weight of each neighbour relative to the center cell when blurring.
    pub diffusion: f32,
    /// Random turn added every step, as a fraction of `turn_angle`.
    pub jitter: f32,
    /// Scales sense distance by the local trail density.
    pub sense_coupling: f32,
    /// Scales move distance by the local trail density.
    pub move_coupling: f32,
    /// Agents a cell accepts per step when collision is on.
    pub occupancy_threshold: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sense_spread: 0.22,
            sense_distance: 20.0,
            turn_angle: 0.41,
            move_distance: 1.0,
            deposit_value: 5.0,
            decay_factor: 0.32,
            collision: false,
            center_attraction: 0.5,
            diffusion: 1.0,
            jitter: 0.1,
            sense_coupling: 0.0,
            move_coupling: 0.0,
            occupancy_threshold: 1,
        }
    }
}

impl SimConfig {
    /// Set the decay factor (clamped to 0.0-1.0).
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay_factor = decay.clamp(0.0, 1.0);
        self
    }

    pub fn with_deposit(mut self, deposit: f32) -> Self {
        self.deposit_value = deposit;
        self
    }

    pub fn with_collision(mut self, enabled: bool) -> Self {
        self.collision = enabled;
        self
    }

    pub fn with_move_distance(mut self, distance: f32) -> Self {
        self.move_distance = distance;
        self
    }

    pub fn with_center_attraction(mut self, strength: f32) -> Self {
        self.center_attraction = strength;
        self
    }

    pub fn with_jitter(mut self, jitter: f32) -> Self {
        self.jitter = jitter;
        self
    }
}

/// One runtime-tunable float of [`SimConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimParam {
    SenseSpread,
    SenseDistance,
    TurnAngle,
    MoveDistance,
    DepositValue,
    DecayFactor,
    CenterAttraction,
    Diffusion,
    Jitter,
    SenseCoupling,
    MoveCoupling,
}

impl SimParam {
    pub const ALL: [SimParam; 11] = [
        SimParam::SenseSpread,
        SimParam::SenseDistance,
        SimParam::TurnAngle,
        SimParam::MoveDistance,
        SimParam::DepositValue,
        SimParam::DecayFactor,
        SimParam::CenterAttraction,
        SimParam::Diffusion,
        SimParam::Jitter,
        SimParam::SenseCoupling,
        SimParam::MoveCoupling,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SimParam::SenseSpread => "Sense Spread",
            SimParam::SenseDistance => "Sense Distance",
            SimParam::TurnAngle => "Turn Angle",
            SimParam::MoveDistance => "Move Distance",
            SimParam::DepositValue => "Deposit Value",
            SimParam::DecayFactor => "Decay Factor",
            SimParam::CenterAttraction => "Center Attraction",
            SimParam::Diffusion => "Diffusion",
            SimParam::Jitter => "Jitter",
            SimParam::SenseCoupling => "Sense Coupling",
            SimParam::MoveCoupling => "Move Coupling",
        }
    }

    /// Inclusive slider band `(min, max)`.
    pub fn range(self) -> (f32, f32) {
        match self {
            SimParam::SenseSpread => (0.0, PI),
            SimParam::SenseDistance => (0.0, 40.0),
            SimParam::TurnAngle => (0.0, PI),
            SimParam::MoveDistance => (0.0, 20.0),
            SimParam::DepositValue => (0.0, 5.0),
            SimParam::DecayFactor => (0.0, 1.0),
            SimParam::CenterAttraction => (0.0, 5.0),
            SimParam::Diffusion => (0.0, 2.0),
            SimParam::Jitter => (0.0, 1.0),
            SimParam::SenseCoupling => (-1.0, 1.0),
            SimParam::MoveCoupling => (-1.0, 1.0),
        }
    }

    pub fn get(self, config: &SimConfig) -> f32 {
        match self {
            SimParam::SenseSpread => config.sense_spread,
            SimParam::SenseDistance => config.sense_distance,
            SimParam::TurnAngle => config.turn_angle,
            SimParam::MoveDistance => config.move_distance,
            SimParam::DepositValue => config.deposit_value,
            SimParam::DecayFactor => config.decay_factor,
            SimParam::CenterAttraction => config.center_attraction,
            SimParam::Diffusion => config.diffusion,
            SimParam::Jitter => config.jitter,
            SimParam::SenseCoupling => config.sense_coupling,
            SimParam::MoveCoupling => config.move_coupling,
        }
    }

    /// Write a raw value. No clamping happens here; kernels clamp what they must.
    pub fn set(self, config: &mut SimConfig, value: f32) {
        *self.field(config) = value;
    }

    /// Map `t` in 0.0-1.0 linearly onto the parameter's range.
    pub fn set_normalized(self, config: &mut SimConfig, t: f32) {
        let (min, max) = self.range();
        self.set(config, min + t * (max - min));
    }

    /// Mutable access to the backing field, used by sliders.
    pub fn field(self, config: &mut SimConfig) -> &mut f32 {
        match self {
            SimParam::SenseSpread => &mut config.sense_spread,
            SimParam::SenseDistance => &mut config.sense_distance,
            SimParam::TurnAngle => &mut config.turn_angle,
            SimParam::MoveDistance => &mut config.move_distance,
            SimParam::DepositValue => &mut config.deposit_value,
            SimParam::DecayFactor => &mut config.decay_factor,
            SimParam::CenterAttraction => &mut config.center_attraction,
            SimParam::Diffusion => &mut config.diffusion,
            SimParam::Jitter => &mut config.jitter,
            SimParam::SenseCoupling => &mut config.sense_coupling,
            SimParam::MoveCoupling => &mut config.move_coupling,
        }
    }
}

/// Which render path the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    #[default]
    Standard,
    DepthOfField,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Standard => RenderMode::DepthOfField,
            RenderMode::DepthOfField => RenderMode::Standard,
        }
    }
}

/// What the depth-of-field compositor accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DofMode {
    /// Ray-march the trail field.
    Trail,
    /// Splat agents with a circle of confusion.
    #[default]
    Particles,
    /// Splat agents plus the segments joining paired agents.
    ParticlePairs,
}

impl DofMode {
    pub const ALL: [DofMode; 3] = [DofMode::Trail, DofMode::Particles, DofMode::ParticlePairs];

    pub fn label(self) -> &'static str {
        match self {
            DofMode::Trail => "Trail",
            DofMode::Particles => "Particles",
            DofMode::ParticlePairs => "Particle Pairs",
        }
    }

    pub(crate) fn as_u32(self) -> u32 {
        match self {
            DofMode::Trail => 0,
            DofMode::Particles => 1,
            DofMode::ParticlePairs => 2,
        }
    }
}

/// Depth-of-field compositor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DofConfig {
    pub mode: DofMode,
    /// Circle of confusion in pixels per world unit outside the focal band.
    pub aperture: f32,
    /// Distance from the camera that is perfectly sharp.
    pub focal_distance: f32,
    /// Half-width of the sharp band around `focal_distance`.
    pub focal_depth: f32,
    pub sample_weight: f32,
    /// Samples per agent, per pair segment or per ray.
    pub iterations: u32,
    /// Longest pair segment drawn, and the ray-march saturation level.
    pub break_distance: f32,
}

impl Default for DofConfig {
    fn default() -> Self {
        Self {
            mode: DofMode::Particles,
            aperture: 0.1,
            focal_distance: 250.0,
            focal_depth: 10.0,
            sample_weight: 1.0,
            iterations: 8,
            break_distance: 8.0,
        }
    }
}

/// How the standard view draws the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub palette: Palette,
    /// Brightness multiplier before tone mapping.
    pub intensity: f32,
    /// Stacked quads per axis when drawing a volume.
    pub slice_count: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            palette: Palette::Inferno,
            intensity: 0.2,
            slice_count: 128,
        }
    }
}

/// Everything loadable from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub world: WorldConfig,
    pub sim: SimConfig,
    pub dof: DofConfig,
    pub view: ViewConfig,
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.world.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let c = SimConfig::default();
        assert_eq!(c.sense_spread, 0.22);
        assert_eq!(c.sense_distance, 20.0);
        assert_eq!(c.turn_angle, 0.41);
        assert_eq!(c.move_distance, 1.0);
        assert_eq!(c.deposit_value, 5.0);
        assert_eq!(c.decay_factor, 0.32);
        assert!(!c.collision);
        assert_eq!(c.center_attraction, 0.5);
    }

    #[test]
    fn test_defaults_within_ranges() {
        let c = SimConfig::default();
        for param in SimParam::ALL {
            let (min, max) = param.range();
            let v = param.get(&c);
            assert!(v >= min && v <= max, "{:?} = {} outside {}..{}", param, v, min, max);
        }
    }

    #[test]
    fn test_set_normalized_spans_range() {
        let mut c = SimConfig::default();
        SimParam::DecayFactor.set_normalized(&mut c, 0.0);
        assert_eq!(c.decay_factor, 0.0);
        SimParam::DecayFactor.set_normalized(&mut c, 1.0);
        assert_eq!(c.decay_factor, 1.0);
        SimParam::SenseDistance.set_normalized(&mut c, 0.5);
        assert_eq!(c.sense_distance, 20.0);
    }

    #[test]
    fn test_with_decay_clamps() {
        assert_eq!(SimConfig::default().with_decay(1.5).decay_factor, 1.0);
        assert_eq!(SimConfig::default().with_decay(-0.5).decay_factor, 0.0);
    }

    #[test]
    fn test_world_center_2d_has_zero_z() {
        let w = WorldConfig::two_d().with_extent(800, 800, 9);
        assert_eq!(w.depth, 1);
        assert_eq!(w.center(), Vec3::new(400.0, 400.0, 0.0));
    }

    #[test]
    fn test_validate_rejects_bad_worlds() {
        let mut w = WorldConfig::two_d();
        w.depth = 4;
        assert!(w.validate().is_err());

        let w = WorldConfig::three_d().with_extent(0, 10, 10);
        assert!(w.validate().is_err());

        let w = WorldConfig::three_d().with_extent(256, 256, 256);
        assert!(w.validate().is_err());

        assert!(WorldConfig::two_d().validate().is_ok());
        assert!(WorldConfig::three_d().validate().is_ok());
    }

    #[test]
    fn test_settings_json_partial() {
        let json = r#"{ "world": { "dimensionality": "3d", "width": 64, "height": 64, "depth": 64 },
                        "sim": { "collision": true } }"#;
        let s = Settings::from_json_str(json).unwrap();
        assert!(s.world.dimensionality.is_3d());
        assert_eq!(s.world.depth, 64);
        assert!(s.sim.collision);
        assert_eq!(s.sim.decay_factor, 0.32);
        assert_eq!(s.dof, DofConfig::default());
    }

    #[test]
    fn test_settings_json_rejects_invalid_world() {
        let json = r#"{ "world": { "dimensionality": "2d", "depth": 3 } }"#;
        assert!(matches!(Settings::from_json_str(json), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_render_mode_toggle() {
        assert_eq!(RenderMode::Standard.toggled(), RenderMode::DepthOfField);
        assert_eq!(RenderMode::DepthOfField.toggled(), RenderMode::Standard);
    }
}
