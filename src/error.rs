//! Error types for the simulation.
//!
//! Startup failures (window, device, configuration) are fatal and surface
//! once through [`SimulationError`]. Per-frame failures are [`RenderError`]s
//! the window loop can recover from.

use std::fmt;

/// Failures while bringing up the compute device and window surface.
#[derive(Debug)]
pub enum GpuError {
    /// The window could not be wrapped in a presentable surface.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// None of the searched backends offered an adapter able to present to
    /// the simulation window.
    NoAdapter { backends: wgpu::Backends },
    /// The adapter turned down a device with default compute limits.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The surface lists no texture format to present the composite in.
    NoSurfaceFormat,
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Cannot attach a surface to the simulation window: {}", e),
            GpuError::NoAdapter { backends } => {
                write!(f, "No adapter among {:?} can run the agent kernels on this window", backends)
            }
            GpuError::DeviceCreation(e) => write!(f, "Adapter refused a compute device: {}", e),
            GpuError::NoSurfaceFormat => write!(f, "Window surface offers no format to present the composite in"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors raised while presenting a frame.
#[derive(Debug)]
pub enum RenderError {
    /// The swapchain texture could not be acquired.
    Surface(wgpu::SurfaceError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Surface(e) => write!(f, "Failed to acquire surface texture: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Surface(e) => Some(e),
        }
    }
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(e: wgpu::SurfaceError) -> Self {
        RenderError::Surface(e)
    }
}

/// Errors raised while loading or validating settings.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    Io(std::io::Error),
    /// The settings file is not valid JSON for [`Settings`](crate::config::Settings).
    Parse(serde_json::Error),
    /// A value is outside what the simulation can run with.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read settings file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse settings: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors that can occur when running a simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Settings could not be loaded.
    Config(ConfigError),
    /// The external controller device could not be opened.
    Controller(std::io::Error),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
            SimulationError::Config(e) => write!(f, "Configuration error: {}", e),
            SimulationError::Controller(e) => write!(f, "Failed to open controller: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
            SimulationError::Config(e) => Some(e),
            SimulationError::Controller(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_chains_source() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = SimulationError::from(ConfigError::from(parse));
        assert!(err.to_string().starts_with("Configuration error"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_gpu_error_messages() {
        let err = GpuError::NoAdapter {
            backends: wgpu::Backends::VULKAN,
        };
        let text = err.to_string();
        assert!(text.starts_with("No adapter among"));
        assert!(text.contains("VULKAN"));
        assert!(err.source().is_none());

        let err = SimulationError::from(GpuError::NoSurfaceFormat);
        assert_eq!(
            err.to_string(),
            "GPU error: Window surface offers no format to present the composite in"
        );
    }

    #[test]
    fn test_controller_error_chains_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
        let err = SimulationError::Controller(io);
        assert_eq!(err.to_string(), "Failed to open controller: no such device");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_has_no_source() {
        let err = ConfigError::Invalid("depth must be 1".into());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "Invalid settings: depth must be 1");
    }
}
