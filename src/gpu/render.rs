//! Standard view: the trail field drawn as stacked, additively blended quads.
//!
//! A flat world is a single quad under the top-down camera. A volume is cut
//! into slices perpendicular to the axis the camera looks along most, so the
//! stack never degenerates to edge-on quads as the view orbits.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::backend::RenderRequest;
use crate::camera::{dominant_axis, slice_model};
use crate::field::{FieldShape, Parity};

use super::field_gpu::FieldGpu;
use super::shaders;

/// GPU parameters for slice rendering.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SliceParams {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    palette: [[f32; 4]; 5],
    extent: [f32; 3],
    intensity: f32,
    slice_count: u32,
    width: u32,
    height: u32,
    depth: u32,
    /// Per-slice brightness so a full stack stays in range.
    gain: f32,
    _pad: [u32; 3],
}

/// Slices drawn for a volume and the gain applied to each.
fn slice_layout(shape: FieldShape, axis: usize, requested: u32) -> (u32, f32) {
    if shape.depth <= 1 {
        return (1, 1.0);
    }
    let along = [shape.width, shape.height, shape.depth][axis];
    let count = requested.clamp(1, along.max(1));
    (count, (8.0 / count as f32).min(1.0))
}

pub struct SliceRenderer {
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    /// Indexed by the parity of the field slot drawn.
    bind_groups: [wgpu::BindGroup; 2],
    slice_count: u32,
}

impl SliceRenderer {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, fields: &FieldGpu) -> Self {
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Slice Params Buffer"),
            size: std::mem::size_of::<SliceParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Slice Render Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = |parity: Parity| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Slice Render Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: fields.buffer(parity).as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [bind_group(Parity::A), bind_group(Parity::B)];

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Slice Render Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::slice_render().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Slice Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Slice Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::One,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
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

        Self {
            pipeline,
            params_buffer,
            bind_groups,
            slice_count: 1,
        }
    }

    /// Upload the camera, palette and slice layout for this frame.
    pub fn prepare(&mut self, queue: &wgpu::Queue, request: &RenderRequest, shape: FieldShape) {
        let extent = Vec3::new(shape.width as f32, shape.height as f32, shape.depth as f32);
        let axis = if shape.depth <= 1 {
            2
        } else {
            dominant_axis(request.view_direction)
        };
        let (slice_count, gain) = slice_layout(shape, axis, request.view.slice_count);
        self.slice_count = slice_count;

        let params = SliceParams {
            view_proj: request.view_proj.to_cols_array_2d(),
            model: slice_model(axis, extent).to_cols_array_2d(),
            palette: request.view.palette.to_gpu(),
            extent: extent.to_array(),
            intensity: request.view.intensity.max(0.0),
            slice_count,
            width: shape.width,
            height: shape.height,
            depth: shape.depth,
            gain,
            _pad: [0; 3],
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Draw the slice stack over `parity`'s field slot.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, parity: Parity) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[parity.index()], &[]);
        pass.draw(0..6, 0..self.slice_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_params_size() {
        assert_eq!(std::mem::size_of::<SliceParams>(), 256);
    }

    #[test]
    fn test_flat_world_is_one_slice() {
        assert_eq!(slice_layout(FieldShape::new(1200, 800, 1), 2, 128), (1, 1.0));
    }

    #[test]
    fn test_volume_slices_limited_by_axis() {
        let shape = FieldShape::new(160, 40, 160);
        let (count, gain) = slice_layout(shape, 1, 128);
        assert_eq!(count, 40);
        assert!((gain - 0.2).abs() < 1e-6);
        assert_eq!(slice_layout(shape, 0, 4), (4, 1.0));
    }
}
