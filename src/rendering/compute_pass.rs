use crate::error::FlockingError;
use crate::gpu::GpuContext;
use crate::rendering::state_store::{ParticleStateStore, StateSet};
use crate::simulation::types::PARAMS_BINDING;
use crate::simulation::{FlockingUniforms, ParameterError, SimulationParameters, StateChannel, WORKGROUP_SIZE};

/// What happened to the flock on one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Advanced,
    Paused,
    /// The parameters were rejected and the state was left untouched.
    Skipped(ParameterError),
}

/// The flocking compute stage: reads the latest state set, writes the next.
pub struct ComputePass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    last_rejection: Option<ParameterError>,
}

impl ComputePass {
    pub fn new(gpu: &GpuContext) -> Result<Self, FlockingError> {
        let shader_module = gpu.shader_module("Flocking Compute Shader", include_str!("../../shader/flocking.wgsl"))?;

        let mut entries = Vec::with_capacity(7);
        for channel in StateChannel::ALL {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: channel.input_binding(),
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        for channel in StateChannel::ALL {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: channel.output_binding(),
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba32Float,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            });
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: PARAMS_BINDING,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });

        let (bind_group_layout, pipeline) = gpu.validated("flocking compute pipeline", |device| {
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Flocking Bind Group Layout"),
                entries: &entries,
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Flocking Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Flocking Compute Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader_module,
                entry_point: Some("flocking_step"),
                compilation_options: Default::default(),
                cache: None,
            });
            (bind_group_layout, pipeline)
        })?;

        let params_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Flocking Params Buffer"),
            size: std::mem::size_of::<FlockingUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            params_buffer,
            last_rejection: None,
        })
    }

    /// Bind group `i` reads set `i` and writes set `1 - i`.
    pub fn create_bind_groups(&self, device: &wgpu::Device, sets: &[StateSet; 2]) -> [wgpu::BindGroup; 2] {
        [
            self.create_bind_group(device, &sets[0], &sets[1], "Flocking Bind Group 0"),
            self.create_bind_group(device, &sets[1], &sets[0], "Flocking Bind Group 1"),
        ]
    }

    fn create_bind_group(
        &self,
        device: &wgpu::Device,
        read: &StateSet,
        write: &StateSet,
        label: &str,
    ) -> wgpu::BindGroup {
        let mut entries = Vec::with_capacity(7);
        for channel in StateChannel::ALL {
            entries.push(wgpu::BindGroupEntry {
                binding: channel.input_binding(),
                resource: wgpu::BindingResource::TextureView(read.view(channel)),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: channel.output_binding(),
                resource: wgpu::BindingResource::TextureView(write.view(channel)),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: PARAMS_BINDING,
            resource: self.params_buffer.as_entire_binding(),
        });

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    /// Records one simulation step into `encoder` and swaps the store so the
    /// freshly written set becomes the latest state.
    ///
    /// Invalid parameters skip the step. A rejection is logged when it first
    /// appears, not on every frame it persists.
    pub fn encode(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        store: &mut ParticleStateStore,
        params: &SimulationParameters,
    ) -> StepOutcome {
        if let Err(error) = params.validate() {
            if is_new_rejection(&mut self.last_rejection, &error) {
                log::warn!("skipping simulation step: {error}");
            }
            return StepOutcome::Skipped(error);
        }
        self.last_rejection = None;

        let uniforms = params.to_uniforms(store.tex_size());
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&uniforms));

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Flocking Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, store.step_bind_group(), &[]);
            let groups = store.tex_size() / WORKGROUP_SIZE;
            compute_pass.dispatch_workgroups(groups, groups, 1);
        }

        store.swap();
        StepOutcome::Advanced
    }
}

// Records `error` as the latest rejection, reporting whether it differs from
// the one before.
fn is_new_rejection(last: &mut Option<ParameterError>, error: &ParameterError) -> bool {
    if last.as_ref() == Some(error) {
        return false;
    }
    *last = Some(error.clone());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection(params: SimulationParameters) -> ParameterError {
        params.validate().unwrap_err()
    }

    #[test]
    fn persistent_nan_rejection_is_reported_once() {
        let nan_step = SimulationParameters {
            time_step: f32::NAN,
            ..Default::default()
        };
        let mut last = None;
        assert!(is_new_rejection(&mut last, &rejection(nan_step)));
        for _ in 0..10 {
            assert!(!is_new_rejection(&mut last, &rejection(nan_step)));
        }
    }

    #[test]
    fn different_rejection_is_reported_again() {
        let mut last = None;
        let nan_step = SimulationParameters {
            time_step: f32::NAN,
            ..Default::default()
        };
        let no_speed = SimulationParameters {
            max_speed: 0.0,
            ..Default::default()
        };
        assert!(is_new_rejection(&mut last, &rejection(nan_step)));
        assert!(is_new_rejection(&mut last, &rejection(no_speed)));
        assert!(is_new_rejection(&mut last, &rejection(nan_step)));
    }
}
