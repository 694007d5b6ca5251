use crate::error::FlockingError;
use crate::gpu::GpuContext;
use crate::rendering::state_store::ParticleStateStore;
use crate::simulation::StateChannel;
use crate::simulation::types::TEXEL_SIZE;

/// Vertex buffers the display pass draws from, refreshed from the latest
/// state textures every frame.
pub struct RenderBuffers {
    pub position: wgpu::Buffer,
    pub color: wgpu::Buffer,
    num_particles: u32,
}

impl RenderBuffers {
    pub fn new(gpu: &GpuContext, num_particles: u32) -> Result<Self, FlockingError> {
        let size = num_particles as u64 * TEXEL_SIZE;
        let create = |device: &wgpu::Device, label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };

        let (position, color) = gpu.validated("particle vertex buffers", |device| {
            (
                create(device, "Particle Position Vertex Buffer"),
                create(device, "Particle Color Vertex Buffer"),
            )
        })?;
        Ok(Self {
            position,
            color,
            num_particles,
        })
    }

    pub fn num_particles(&self) -> u32 {
        self.num_particles
    }

    /// Records the texture to vertex buffer copies. Record after the compute
    /// step and before the display pass in the same encoder, so the drawn
    /// frame is the one just simulated.
    pub fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, store: &ParticleStateStore) {
        debug_assert_eq!(store.num_particles(), self.num_particles);
        store.encode_channel_copy(encoder, StateChannel::Position, &self.position);
        store.encode_channel_copy(encoder, StateChannel::Color, &self.color);
    }

    /// Reads both vertex buffers back. Blocks on the GPU.
    pub fn read_back(&self, gpu: &GpuContext) -> Result<(Vec<[f32; 4]>, Vec<[f32; 4]>), FlockingError> {
        let size = self.num_particles as u64 * TEXEL_SIZE;
        let staging = [
            self.staging_buffer(&gpu.device, "Position Vertex Readback", size),
            self.staging_buffer(&gpu.device, "Color Vertex Readback", size),
        ];

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Vertex Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.position, 0, &staging[0], 0, size);
        encoder.copy_buffer_to_buffer(&self.color, 0, &staging[1], 0, size);
        gpu.queue.submit([encoder.finish()]);

        Ok((gpu.read_buffer(&staging[0])?, gpu.read_buffer(&staging[1])?))
    }

    fn staging_buffer(&self, device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}
