//! Depth-of-field compositor.
//!
//! Every frame the accumulator is zeroed, one compute pass scatters weight
//! into it (agent splats or trail rays), and a fullscreen blit divides by
//! the running maximum stored in the last cell.

use bytemuck::{Pod, Zeroable};

use crate::config::{DofMode, WORKGROUP_SIZE};
use crate::field::Parity;
use crate::kernels::dof::DofParams;
use crate::palette::Palette;

use super::agents_gpu::AgentsGpu;
use super::field_gpu::FieldGpu;
use super::{create_compute_pipeline, shaders};

const TRAIL_TILE: u32 = 16;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BlitParams {
    palette: [[f32; 4]; 5],
    screen_width: u32,
    screen_height: u32,
    exposure: f32,
    _pad: u32,
}

/// Bind groups that reference the accumulator and must follow its size.
struct AccumBindings {
    splat: wgpu::BindGroup,
    trail: [wgpu::BindGroup; 2],
    blit: wgpu::BindGroup,
}

pub struct DofCompositor {
    params_buffer: wgpu::Buffer,
    blit_buffer: wgpu::Buffer,
    accum: wgpu::Buffer,
    size: (u32, u32),
    splat_pipeline: wgpu::ComputePipeline,
    trail_pipeline: wgpu::ComputePipeline,
    blit_pipeline: wgpu::RenderPipeline,
    bindings: AccumBindings,
}

impl DofCompositor {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        size: (u32, u32),
        agents: &AgentsGpu,
        fields: &FieldGpu,
    ) -> Self {
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DoF Params Buffer"),
            size: std::mem::size_of::<DofParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let blit_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("DoF Blit Params Buffer"),
            size: std::mem::size_of::<BlitParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let splat_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DoF Splat Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::dof_splat().into()),
        });
        let trail_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DoF Trail Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::dof_trail().into()),
        });
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DoF Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::dof_blit().into()),
        });

        let splat_pipeline = create_compute_pipeline(device, &splat_shader, "main", "DoF Splat Pipeline");
        let trail_pipeline = create_compute_pipeline(device, &trail_shader, "main", "DoF Trail Pipeline");

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("DoF Blit Pipeline"),
            layout: None,
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let size = (size.0.max(1), size.1.max(1));
        let accum = create_accum(device, size);
        let bindings = create_bindings(
            device,
            &splat_pipeline,
            &trail_pipeline,
            &blit_pipeline,
            &params_buffer,
            &blit_buffer,
            &accum,
            agents,
            fields,
        );

        Self {
            params_buffer,
            blit_buffer,
            accum,
            size,
            splat_pipeline,
            trail_pipeline,
            blit_pipeline,
            bindings,
        }
    }

    /// Reallocate the accumulator for a new surface size.
    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32), agents: &AgentsGpu, fields: &FieldGpu) {
        let size = (size.0.max(1), size.1.max(1));
        if size == self.size {
            return;
        }
        self.size = size;
        self.accum = create_accum(device, size);
        self.bindings = create_bindings(
            device,
            &self.splat_pipeline,
            &self.trail_pipeline,
            &self.blit_pipeline,
            &self.params_buffer,
            &self.blit_buffer,
            &self.accum,
            agents,
            fields,
        );
        log::debug!("dof accumulator resized to {}x{}", size.0, size.1);
    }

    /// Accumulate and blit one frame into `target`.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        params: &DofParams,
        mode: DofMode,
        parity: Parity,
        palette: Palette,
    ) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
        let blit = BlitParams {
            palette: palette.to_gpu(),
            screen_width: self.size.0,
            screen_height: self.size.1,
            exposure: 1.0,
            _pad: 0,
        };
        queue.write_buffer(&self.blit_buffer, 0, bytemuck::bytes_of(&blit));

        encoder.clear_buffer(&self.accum, 0, None);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("DoF Accumulate Pass"),
                timestamp_writes: None,
            });
            match mode {
                DofMode::Trail => {
                    pass.set_pipeline(&self.trail_pipeline);
                    pass.set_bind_group(0, &self.bindings.trail[parity.index()], &[]);
                    pass.dispatch_workgroups(
                        (self.size.0 + TRAIL_TILE - 1) / TRAIL_TILE,
                        (self.size.1 + TRAIL_TILE - 1) / TRAIL_TILE,
                        1,
                    );
                }
                DofMode::Particles | DofMode::ParticlePairs => {
                    pass.set_pipeline(&self.splat_pipeline);
                    pass.set_bind_group(0, &self.bindings.splat, &[]);
                    pass.dispatch_workgroups((params.agent_count + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE, 1, 1);
                }
            }
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("DoF Blit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
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
        pass.set_pipeline(&self.blit_pipeline);
        pass.set_bind_group(0, &self.bindings.blit, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// One `u32` per pixel plus the running maximum.
fn create_accum(device: &wgpu::Device, size: (u32, u32)) -> wgpu::Buffer {
    let cells = size.0 as u64 * size.1 as u64 + 1;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("DoF Accumulation Buffer"),
        size: cells * std::mem::size_of::<u32>() as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[allow(clippy::too_many_arguments)]
fn create_bindings(
    device: &wgpu::Device,
    splat_pipeline: &wgpu::ComputePipeline,
    trail_pipeline: &wgpu::ComputePipeline,
    blit_pipeline: &wgpu::RenderPipeline,
    params: &wgpu::Buffer,
    blit_params: &wgpu::Buffer,
    accum: &wgpu::Buffer,
    agents: &AgentsGpu,
    fields: &FieldGpu,
) -> AccumBindings {
    let splat_layout = splat_pipeline.get_bind_group_layout(0);
    let splat = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("DoF Splat Bind Group"),
        layout: &splat_layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: agents.buffer().as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: accum.as_entire_binding() },
        ],
    });

    let trail_layout = trail_pipeline.get_bind_group_layout(0);
    let trail_bind_group = |parity: Parity| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("DoF Trail Bind Group"),
            layout: &trail_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: fields.buffer(parity).as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: accum.as_entire_binding() },
            ],
        })
    };
    let trail = [trail_bind_group(Parity::A), trail_bind_group(Parity::B)];

    let blit_layout = blit_pipeline.get_bind_group_layout(0);
    let blit = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("DoF Blit Bind Group"),
        layout: &blit_layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: blit_params.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: accum.as_entire_binding() },
        ],
    });

    AccumBindings { splat, trail, blit }
}
