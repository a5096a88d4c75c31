//! Compute kernel compilation and dispatch.

use super::buffer::GpuBuffer;
use crate::error::{Error, Result};

/// Buffer binding class for one `@binding` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `var<storage, read>`
    StorageReadOnly,
    /// `var<storage, read_write>`
    Storage,
    /// `var<uniform>`
    Uniform,
}

impl BindingKind {
    fn binding_type(self) -> wgpu::BindingType {
        let ty = match self {
            BindingKind::StorageReadOnly => {
                wgpu::BufferBindingType::Storage { read_only: true }
            }
            BindingKind::Storage => wgpu::BufferBindingType::Storage { read_only: false },
            BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
        };
        wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    }
}

/// WGSL source plus its binding layout.
#[derive(Debug, Clone)]
pub struct KernelSpec<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub entry: &'a str,
    pub bindings: &'a [BindingKind],
}

/// Compiled compute pipeline ready for dispatch.
pub struct ComputeKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    label: String,
    binding_count: usize,
}

impl std::fmt::Debug for ComputeKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeKernel")
            .field("label", &self.label)
            .field("bindings", &self.binding_count)
            .finish()
    }
}

impl ComputeKernel {
    /// Compile WGSL into a compute pipeline with a layout derived from the
    /// binding list.
    pub fn compile(device: &wgpu::Device, spec: &KernelSpec<'_>) -> Result<Self> {
        if spec.bindings.is_empty() {
            return Err(Error::gpu(format!(
                "kernel '{}' declares no bindings",
                spec.label
            )));
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(spec.label),
            source: wgpu::ShaderSource::Wgsl(spec.source.into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = spec
            .bindings
            .iter()
            .enumerate()
            .map(|(i, kind)| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: kind.binding_type(),
                count: None,
            })
            .collect();

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(spec.label),
                entries: &entries,
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(spec.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(spec.label),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: spec.entry,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            label: spec.label.to_string(),
            binding_count: spec.bindings.len(),
        })
    }

    /// Bind buffers in `@binding` order.
    pub fn bind(&self, device: &wgpu::Device, buffers: &[&GpuBuffer]) -> Result<wgpu::BindGroup> {
        if buffers.len() != self.binding_count {
            return Err(Error::gpu(format!(
                "kernel '{}' expects {} bindings, got {}",
                self.label,
                self.binding_count,
                buffers.len()
            )));
        }

        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buffer.buffer().as_entire_binding(),
            })
            .collect();

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label.as_str()),
            layout: &self.bind_group_layout,
            entries: &entries,
        }))
    }

    /// Record one dispatch into `encoder`.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        workgroups: (u32, u32, u32),
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label.as_str()),
            timestamp_writes: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);

        let (x, y, z) = workgroups;
        pass.dispatch_workgroups(x, y, z);
    }

    /// Kernel label, for diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }
}
