//! Agent buffer plus the update and pairing passes.

use crate::agents::Agent;
use crate::config::WORKGROUP_SIZE;
use crate::field::Parity;

use super::field_gpu::FieldGpu;
use super::{create_compute_pipeline, shaders};

pub struct AgentsGpu {
    buffer: wgpu::Buffer,
    count: u32,
    update_pipeline: wgpu::ComputePipeline,
    /// Indexed by the parity of the field slot agents sense.
    update_bind_groups: [wgpu::BindGroup; 2],
    pair_pipeline: wgpu::ComputePipeline,
    pair_bind_group: wgpu::BindGroup,
}

impl AgentsGpu {
    pub fn new(device: &wgpu::Device, count: u32, params: &wgpu::Buffer, fields: &FieldGpu) -> Self {
        let stride = std::mem::size_of::<Agent>() as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Buffer"),
            size: count.max(1) as u64 * stride,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let update_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Agent Update Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::agent_update().into()),
        });
        let pair_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Agent Pair Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::pair().into()),
        });

        let update_pipeline = create_compute_pipeline(device, &update_shader, "main", "Agent Update Pipeline");
        let pair_pipeline = create_compute_pipeline(device, &pair_shader, "main", "Agent Pair Pipeline");

        let update_layout = update_pipeline.get_bind_group_layout(0);
        let update_bind_group = |parity: Parity| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Agent Update Bind Group"),
                layout: &update_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: fields.buffer(parity).as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 3, resource: fields.occupancy().as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 4, resource: fields.deposits().as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 5, resource: fields.claims().as_entire_binding() },
                ],
            })
        };
        let update_bind_groups = [update_bind_group(Parity::A), update_bind_group(Parity::B)];

        let pair_layout = pair_pipeline.get_bind_group_layout(0);
        let pair_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Agent Pair Bind Group"),
            layout: &pair_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: fields.claims().as_entire_binding() },
            ],
        });

        Self {
            buffer,
            count,
            update_pipeline,
            update_bind_groups,
            pair_pipeline,
            pair_bind_group,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Overwrite the device copy. Extra records beyond the buffer are dropped.
    pub fn upload(&self, queue: &wgpu::Queue, agents: &[Agent]) {
        let n = agents.len().min(self.count as usize);
        if n < agents.len() {
            log::warn!("agent buffer holds {} records, {} supplied", self.count, agents.len());
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&agents[..n]));
    }

    fn workgroups(&self) -> u32 {
        (self.count + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
    }

    /// Sense, steer, move, claim and deposit. `parity` selects the field read.
    pub fn update(&self, encoder: &mut wgpu::CommandEncoder, parity: Parity) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Agent Update Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.update_pipeline);
        pass.set_bind_group(0, &self.update_bind_groups[parity.index()], &[]);
        pass.dispatch_workgroups(self.workgroups(), 1, 1);
    }

    /// Break stretched pairs and adopt cell claimants.
    pub fn pair(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Agent Pair Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pair_pipeline);
        pass.set_bind_group(0, &self.pair_bind_group, &[]);
        pass.dispatch_workgroups(self.workgroups(), 1, 1);
    }
}
