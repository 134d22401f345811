//! GPU field buffers and the diffusion pass.
//!
//! The two trail buffers form a [`PingPong`]: agents sense the read slot,
//! diffusion reads it plus the deposit grid and writes the other slot.
//! Occupancy, deposits and claims are scratch grids zeroed every step.

use crate::config::WORKGROUP_SIZE;
use crate::field::{FieldShape, Parity, PingPong};

use super::shaders;

/// Field storage and the blur/decay pipeline.
pub struct FieldGpu {
    shape: FieldShape,
    fields: PingPong<wgpu::Buffer>,
    deposits: wgpu::Buffer,
    occupancy: wgpu::Buffer,
    claims: wgpu::Buffer,
    diffuse_pipeline: wgpu::ComputePipeline,
    /// Indexed by the parity of the read slot.
    diffuse_bind_groups: [wgpu::BindGroup; 2],
}

impl FieldGpu {
    /// Allocate zeroed buffers for `shape`. `params` is the step uniform.
    pub fn new(device: &wgpu::Device, shape: FieldShape, params: &wgpu::Buffer) -> Self {
        let size = (shape.total_cells() * std::mem::size_of::<f32>()) as u64;

        let create = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let fields = PingPong::new([create("Field Buffer A"), create("Field Buffer B")]);
        let deposits = create("Deposit Buffer");
        let occupancy = create("Occupancy Buffer");
        let claims = create("Claim Buffer");

        let (diffuse_pipeline, layout) = create_diffuse_pipeline(device);

        let bind = |parity: Parity| {
            let src = fields.slot(parity.index());
            let dst = fields.slot(parity.flipped().index());
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Field Diffuse Bind Group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: deposits.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: dst.as_entire_binding(),
                    },
                ],
            })
        };
        let diffuse_bind_groups = [bind(Parity::A), bind(Parity::B)];

        log::debug!("field buffers: {} cells, {} bytes each", shape.total_cells(), size);

        Self {
            shape,
            fields,
            deposits,
            occupancy,
            claims,
            diffuse_pipeline,
            diffuse_bind_groups,
        }
    }

    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    pub fn parity(&self) -> Parity {
        self.fields.parity()
    }

    /// Buffer agents sense and renderers draw.
    pub fn read_buffer(&self) -> &wgpu::Buffer {
        self.fields.read()
    }

    /// Field slot `parity` reads from when it is current.
    pub fn buffer(&self, parity: Parity) -> &wgpu::Buffer {
        self.fields.slot(parity.index())
    }

    pub fn deposits(&self) -> &wgpu::Buffer {
        &self.deposits
    }

    pub fn occupancy(&self) -> &wgpu::Buffer {
        &self.occupancy
    }

    pub fn claims(&self) -> &wgpu::Buffer {
        &self.claims
    }

    /// Zero the per-step scratch grids.
    pub fn clear_scratch(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.occupancy, 0, None);
        encoder.clear_buffer(&self.deposits, 0, None);
        encoder.clear_buffer(&self.claims, 0, None);
    }

    /// Zero both trail slots and the scratch grids, and point back at slot A.
    pub fn clear_all(&mut self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(self.fields.slot(0), 0, None);
        encoder.clear_buffer(self.fields.slot(1), 0, None);
        self.clear_scratch(encoder);
        self.fields.reset();
    }

    /// Blur and decay the read slot plus deposits into the write slot.
    pub fn diffuse(&self, encoder: &mut wgpu::CommandEncoder) {
        let cells = self.shape.total_cells() as u32;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Field Diffuse Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.diffuse_pipeline);
        pass.set_bind_group(0, &self.diffuse_bind_groups[self.parity().index()], &[]);
        pass.dispatch_workgroups((cells + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE, 1, 1);
    }

    /// Make the freshly written slot current.
    pub fn swap(&mut self) {
        self.fields.swap();
    }
}

fn create_diffuse_pipeline(device: &wgpu::Device) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Field Diffuse Shader"),
        source: wgpu::ShaderSource::Wgsl(shaders::diffuse().into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Field Diffuse Bind Group Layout"),
        entries: &[
            // Step params
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Source field
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Deposits
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Destination field
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Field Diffuse Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Field Diffuse Pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    (pipeline, bind_group_layout)
}
