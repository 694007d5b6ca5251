use crate::error::FlockingError;
use crate::gpu::GpuContext;
use crate::rendering::compute_pass::ComputePass;
use crate::simulation::grid::channel_bytes;
use crate::simulation::types::TEXEL_SIZE;
use crate::simulation::{GridError, ParticleGrid, StateChannel, WORKGROUP_SIZE};

/// Rejects a grid edge the device cannot hold: a state texture wider than
/// `max_texture_dimension_2d`, or a channel larger than `max_buffer_size`.
pub fn check_device_limits(tex_size: u32, limits: &wgpu::Limits) -> Result<(), GridError> {
    if tex_size > limits.max_texture_dimension_2d {
        return Err(GridError::TooLarge {
            tex_size,
            limit: limits.max_texture_dimension_2d,
        });
    }
    if channel_bytes(tex_size) > limits.max_buffer_size {
        let fitting = (limits.max_buffer_size / TEXEL_SIZE).isqrt();
        let limit = u32::try_from(fitting).unwrap_or(u32::MAX) / WORKGROUP_SIZE * WORKGROUP_SIZE;
        return Err(GridError::TooLarge { tex_size, limit });
    }
    Ok(())
}

/// One complete copy of the flock: a position, velocity and color texture.
pub struct StateSet {
    textures: [wgpu::Texture; 3],
    views: [wgpu::TextureView; 3],
}

impl StateSet {
    fn new(device: &wgpu::Device, tex_size: u32, set: usize) -> Self {
        let textures = StateChannel::ALL.map(|channel| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("Particle {} Texture {set}", channel.label())),
                size: texture_extent(tex_size),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        });
        let views = [0, 1, 2].map(|i| textures[i].create_view(&wgpu::TextureViewDescriptor::default()));
        Self { textures, views }
    }

    pub fn texture(&self, channel: StateChannel) -> &wgpu::Texture {
        &self.textures[channel.index()]
    }

    pub fn view(&self, channel: StateChannel) -> &wgpu::TextureView {
        &self.views[channel.index()]
    }
}

/// GPU-resident particle state, double buffered.
///
/// `current` names the set holding the latest state. A compute step reads it,
/// writes the other set and then [`swap`](Self::swap)s, so a pass never reads
/// what it is writing.
pub struct ParticleStateStore {
    tex_size: u32,
    sets: [StateSet; 2],
    bind_groups: [wgpu::BindGroup; 2], // bind_groups[i] reads set i, writes the other
    current: usize,
}

impl ParticleStateStore {
    pub fn new(gpu: &GpuContext, compute: &ComputePass, grid: &ParticleGrid) -> Result<Self, FlockingError> {
        let tex_size = grid.tex_size();
        check_device_limits(tex_size, &gpu.device.limits())?;

        let (sets, bind_groups) = gpu.validated("particle state textures", |device| {
            let sets = [StateSet::new(device, tex_size, 0), StateSet::new(device, tex_size, 1)];
            let bind_groups = compute.create_bind_groups(device, &sets);
            (sets, bind_groups)
        })?;

        let store = Self {
            tex_size,
            sets,
            bind_groups,
            current: 0,
        };
        store.upload(&gpu.queue, grid);
        log::info!(
            "allocated particle state for {} particles ({tex_size}x{tex_size})",
            store.num_particles()
        );
        Ok(store)
    }

    /// Overwrites the current set with `grid`, which must match the store size.
    pub fn upload(&self, queue: &wgpu::Queue, grid: &ParticleGrid) {
        debug_assert_eq!(grid.tex_size(), self.tex_size);
        let set = &self.sets[self.current];
        for channel in StateChannel::ALL {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: set.texture(channel),
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(grid.channel(channel)),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.bytes_per_row()),
                    rows_per_image: Some(self.tex_size),
                },
                texture_extent(self.tex_size),
            );
        }
    }

    pub fn tex_size(&self) -> u32 {
        self.tex_size
    }

    pub fn num_particles(&self) -> u32 {
        self.tex_size * self.tex_size
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.tex_size * TEXEL_SIZE as u32
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        texture_extent(self.tex_size)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// The set holding the latest state.
    pub fn latest(&self) -> &StateSet {
        &self.sets[self.current]
    }

    /// Bind group reading the latest state and writing the other set.
    pub fn step_bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_groups[self.current]
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Copies the latest state back to the host. Blocks on the GPU.
    pub fn read_back(&self, gpu: &GpuContext) -> Result<ParticleGrid, FlockingError> {
        let size = channel_bytes(self.tex_size);
        let staging = StateChannel::ALL.map(|channel| {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Particle {} Readback", channel.label())),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Readback Encoder"),
            });
        for channel in StateChannel::ALL {
            self.encode_channel_copy(&mut encoder, channel, &staging[channel.index()]);
        }
        gpu.queue.submit([encoder.finish()]);

        let [positions, velocities, colors] = [
            gpu.read_buffer(&staging[0])?,
            gpu.read_buffer(&staging[1])?,
            gpu.read_buffer(&staging[2])?,
        ];
        Ok(ParticleGrid::from_channels(self.tex_size, positions, velocities, colors)?)
    }

    /// Records a row-major copy of one channel of the latest state into `buffer`.
    pub fn encode_channel_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        channel: StateChannel,
        buffer: &wgpu::Buffer,
    ) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: self.latest().texture(channel),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.bytes_per_row()),
                    rows_per_image: Some(self.tex_size),
                },
            },
            self.extent(),
        );
    }
}

fn texture_extent(tex_size: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: tex_size,
        height: tex_size,
        depth_or_array_layers: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_accept_the_usual_sizes() {
        let limits = wgpu::Limits::default();
        for tex_size in [16, 64, 256, 4096] {
            assert_eq!(check_device_limits(tex_size, &limits), Ok(()));
        }
    }

    #[test]
    fn texture_wider_than_device_is_rejected() {
        let limits = wgpu::Limits::default();
        assert_eq!(
            check_device_limits(16384, &limits),
            Err(GridError::TooLarge {
                tex_size: 16384,
                limit: limits.max_texture_dimension_2d
            })
        );
    }

    #[test]
    fn channel_larger_than_buffer_limit_is_rejected() {
        let limits = wgpu::Limits {
            max_buffer_size: 64 * 64 * TEXEL_SIZE,
            ..wgpu::Limits::default()
        };
        assert_eq!(check_device_limits(64, &limits), Ok(()));
        assert_eq!(
            check_device_limits(80, &limits),
            Err(GridError::TooLarge {
                tex_size: 80,
                limit: 64
            })
        );
    }
}
