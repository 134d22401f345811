//! Window and event loop.
//!
//! The [`App`] creates the window and GPU backend on `resumed`, folds window
//! events into [`Input`], and drives one orchestrator tick per redraw.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::Settings;
use crate::error::{RenderError, SimulationError};
use crate::gpu::{GpuBackend, GraphicsSession};
use crate::input::{Input, KeyBindings};
use crate::midi::ExternalController;
use crate::orchestrator::Orchestrator;
use crate::time::FrameClock;

#[cfg(feature = "egui")]
use crate::gpu::egui_integration::EguiIntegration;

pub struct App {
    settings: Settings,
    seed: u64,
    controller: Option<ExternalController>,
    window: Option<Arc<Window>>,
    orchestrator: Option<Orchestrator<GpuBackend>>,
    input: Input,
    bindings: KeyBindings,
    clock: FrameClock,
    #[cfg(feature = "egui")]
    egui: Option<EguiIntegration>,
    error: Option<SimulationError>,
}

impl App {
    pub fn new(settings: Settings, seed: u64) -> Self {
        Self {
            settings,
            seed,
            controller: None,
            window: None,
            orchestrator: None,
            input: Input::new(),
            bindings: KeyBindings::default(),
            clock: FrameClock::new(),
            #[cfg(feature = "egui")]
            egui: None,
            error: None,
        }
    }

    /// Attach an external controller, handed to the orchestrator on startup.
    pub fn with_controller(mut self, controller: ExternalController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// The fatal error that ended the loop, if any.
    pub fn take_error(&mut self) -> Option<SimulationError> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: SimulationError) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SimulationError> {
        let window_attrs = Window::default_attributes()
            .with_title("Physarum")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let session = pollster::block_on(GraphicsSession::new(window.clone()))?;
        let backend = GpuBackend::new(session, &self.settings.world);

        let mut orchestrator = Orchestrator::new(backend, self.settings.clone(), self.seed)?;
        match self.controller.take() {
            Some(controller) => orchestrator = orchestrator.with_controller(controller),
            None => log::info!("no external controller attached"),
        }

        #[cfg(feature = "egui")]
        {
            self.egui = Some(EguiIntegration::new(&window));
        }

        self.window = Some(window);
        self.orchestrator = Some(orchestrator);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(orchestrator)) = (self.window.as_ref(), self.orchestrator.as_mut()) else {
            return;
        };

        let dt = self.clock.tick();
        if self.clock.frame() % 60 == 0 {
            log::debug!("{:.1} fps, {} steps", self.clock.fps(), orchestrator.steps());
        }
        #[allow(unused_mut)]
        let mut frame = self.input.frame_input(&self.bindings, dt);

        #[cfg(feature = "egui")]
        if let Some(egui) = self.egui.as_mut() {
            if orchestrator.show_ui() {
                let status = crate::ui::UiStatus {
                    fps: self.clock.fps(),
                    steps: orchestrator.steps(),
                    agents: orchestrator.agents().len(),
                    run_state: orchestrator.run_state(),
                    render_mode: orchestrator.render_mode(),
                    auto_rotate: orchestrator.auto_rotate(),
                    controller: orchestrator.has_controller(),
                };
                let output = egui.run(window, |ctx| {
                    let commands = crate::ui::control_panel(ctx, orchestrator.settings_mut(), &status);
                    frame.commands.extend(commands);
                });
                orchestrator.backend_mut().queue_overlay(output);
            }
        }

        match orchestrator.tick(frame) {
            Ok(_) => {}
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                orchestrator.backend_mut().reconfigure();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("surface out of memory");
                event_loop.exit();
            }
            Err(e) => log::warn!("{}", e),
        }

        self.input.end_frame();
        window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.start(event_loop) {
                self.fail(event_loop, e);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[allow(unused_mut)]
        let mut consumed = false;
        #[cfg(feature = "egui")]
        if let (Some(egui), Some(window)) = (self.egui.as_mut(), self.window.as_ref()) {
            let ui_visible = self.orchestrator.as_ref().is_some_and(|o| o.show_ui());
            consumed = egui.on_window_event(window, &event) && ui_visible;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { ref event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(orchestrator) = &mut self.orchestrator {
                    orchestrator
                        .backend_mut()
                        .resize(physical_size.width, physical_size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {
                if !consumed {
                    self.input.handle_event(&event);
                }
            }
        }
    }
}

/// Open a window and run until it closes.
pub fn run(settings: Settings, seed: u64) -> Result<(), SimulationError> {
    run_app(App::new(settings, seed))
}

/// Run a configured [`App`] until its window closes.
pub fn run_app(mut app: App) -> Result<(), SimulationError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut app)?;
    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
