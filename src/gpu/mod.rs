//! # GPU Backend
//!
//! wgpu implementation of [`ComputeBackend`]. Each simulation stage records
//! its own compute pass into one command encoder, so wgpu places a full
//! barrier between stages; the encoder is submitted once per step.
//!
//! Rendering acquires the surface texture, runs either the slice renderer or
//! the depth-of-field compositor, draws any queued UI overlay on top and
//! presents.

mod agents_gpu;
mod dof;
#[cfg(feature = "egui")]
pub mod egui_integration;
mod field_gpu;
mod render;
pub mod shaders;

use std::sync::Arc;

use glam::Vec3;
use winit::window::Window;

use crate::agents::Agent;
use crate::backend::{ComputeBackend, RenderRequest};
use crate::config::{RenderMode, WorldConfig};
use crate::error::{GpuError, RenderError};
use crate::field::{FieldShape, Parity};
use crate::kernels::dof::DofParams;
use crate::kernels::StepParams;

use agents_gpu::AgentsGpu;
use dof::DofCompositor;
use field_gpu::FieldGpu;
use render::SliceRenderer;

#[cfg(feature = "egui")]
use egui_integration::{EguiFrameOutput, EguiPainter};

/// Device, queue and a configured window surface.
pub struct GraphicsSession {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl GraphicsSession {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let backends = wgpu::Backends::PRIMARY;
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter { backends })?;

        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface. Zero-sized requests are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }
}

pub(crate) fn create_compute_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    entry_point: &str,
    label: &str,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None, // Auto layout
        module: shader,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn step_encoder<'a>(encoder: &'a mut Option<wgpu::CommandEncoder>, device: &wgpu::Device) -> &'a mut wgpu::CommandEncoder {
    encoder.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Step Encoder"),
        })
    })
}

/// Runs the simulation on the GPU and presents to a window.
pub struct GpuBackend {
    session: GraphicsSession,
    params_buffer: wgpu::Buffer,
    fields: FieldGpu,
    agents: AgentsGpu,
    slices: SliceRenderer,
    dof: DofCompositor,
    encoder: Option<wgpu::CommandEncoder>,
    #[cfg(feature = "egui")]
    painter: EguiPainter,
    #[cfg(feature = "egui")]
    overlay: Option<EguiFrameOutput>,
}

impl GpuBackend {
    /// Allocate every buffer and pipeline for `world`.
    pub fn new(session: GraphicsSession, world: &WorldConfig) -> Self {
        let device = &session.device;
        let shape = FieldShape::from_world(world);

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Step Params Buffer"),
            size: std::mem::size_of::<StepParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fields = FieldGpu::new(device, shape, &params_buffer);
        let agents = AgentsGpu::new(device, world.agent_count, &params_buffer, &fields);
        let slices = SliceRenderer::new(device, session.format(), &fields);
        let dof = DofCompositor::new(device, session.format(), session.size(), &agents, &fields);
        #[cfg(feature = "egui")]
        let painter = EguiPainter::new(device, session.format());

        log::debug!("gpu backend ready: surface {:?} {:?}", session.size(), session.format());

        Self {
            session,
            params_buffer,
            fields,
            agents,
            slices,
            dof,
            encoder: None,
            #[cfg(feature = "egui")]
            painter,
            #[cfg(feature = "egui")]
            overlay: None,
        }
    }

    pub fn session(&self) -> &GraphicsSession {
        &self.session
    }

    /// Follow a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.session.resize(width, height);
        self.dof
            .resize(&self.session.device, self.session.size(), &self.agents, &self.fields);
    }

    /// Reconfigure the surface at its current size, after it was lost.
    pub fn reconfigure(&mut self) {
        let (width, height) = self.session.size();
        self.resize(width, height);
    }

    /// UI to draw over the next rendered frame.
    #[cfg(feature = "egui")]
    pub fn queue_overlay(&mut self, output: EguiFrameOutput) {
        self.overlay = Some(output);
    }

    #[cfg(feature = "egui")]
    fn paint_overlay(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) -> Vec<wgpu::CommandBuffer> {
        match self.overlay.take() {
            Some(output) => self.painter.paint(
                &self.session.device,
                &self.session.queue,
                encoder,
                view,
                self.session.size(),
                &output,
            ),
            None => Vec::new(),
        }
    }

    #[cfg(not(feature = "egui"))]
    fn paint_overlay(&mut self, _encoder: &mut wgpu::CommandEncoder, _view: &wgpu::TextureView) -> Vec<wgpu::CommandBuffer> {
        Vec::new()
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn shape(&self) -> FieldShape {
        self.fields.shape()
    }

    fn parity(&self) -> Parity {
        self.fields.parity()
    }

    fn viewport(&self) -> (u32, u32) {
        self.session.size()
    }

    fn sync_agents(&mut self, agents: &[Agent]) {
        self.agents.upload(&self.session.queue, agents);
    }

    fn clear_fields(&mut self) {
        let mut encoder = self.session.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Clear Fields Encoder"),
        });
        self.fields.clear_all(&mut encoder);
        self.session.queue.submit(std::iter::once(encoder.finish()));
    }

    fn begin_step(&mut self, params: &StepParams) {
        if self.encoder.is_some() {
            log::warn!("step started before the previous one was submitted");
        }
        self.session
            .queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
        step_encoder(&mut self.encoder, &self.session.device);
    }

    fn clear_occupancy(&mut self) {
        let encoder = step_encoder(&mut self.encoder, &self.session.device);
        self.fields.clear_scratch(encoder);
    }

    fn update_agents(&mut self) {
        let encoder = step_encoder(&mut self.encoder, &self.session.device);
        self.agents.update(encoder, self.fields.parity());
    }

    fn pair_agents(&mut self) {
        let encoder = step_encoder(&mut self.encoder, &self.session.device);
        self.agents.pair(encoder);
    }

    fn diffuse(&mut self) {
        let encoder = step_encoder(&mut self.encoder, &self.session.device);
        self.fields.diffuse(encoder);
    }

    fn swap_fields(&mut self) {
        self.fields.swap();
    }

    fn end_step(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.session.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError> {
        let output = self.session.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.session.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let shape = self.fields.shape();
        let parity = self.fields.parity();
        match request.mode {
            RenderMode::Standard => {
                self.slices.prepare(&self.session.queue, request, shape);
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Slice Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.slices.draw(&mut pass, parity);
            }
            RenderMode::DepthOfField => {
                let extent = Vec3::new(shape.width as f32, shape.height as f32, shape.depth as f32);
                let params = DofParams::new(
                    &request.dof,
                    request.view_proj,
                    request.camera_position,
                    extent,
                    self.session.size(),
                    self.agents.count(),
                    request.frame_seed,
                );
                self.dof.encode(
                    &mut encoder,
                    &self.session.queue,
                    &view,
                    &params,
                    request.dof.mode,
                    parity,
                    request.view.palette,
                );
            }
        }

        let mut buffers = self.paint_overlay(&mut encoder, &view);
        buffers.push(encoder.finish());
        self.session.queue.submit(buffers);
        output.present();
        Ok(())
    }
}
