use crate::error::FlockingError;
use crate::gpu::GpuContext;
use crate::rendering::compute_pass::{ComputePass, StepOutcome};
use crate::rendering::state_store::ParticleStateStore;
use crate::rendering::transfer::RenderBuffers;
use crate::simulation::{ParticleGrid, SimulationParameters};

/// The simulation half of a frame: particle state, the compute stage and the
/// vertex buffers the display pass reads.
///
/// Frame ordering is fixed. [`encode_step`](Self::encode_step) records the
/// compute dispatch and then the texture to vertex buffer copy into the same
/// encoder; the caller records the display pass after it and submits once.
/// Commands in one submission run in recording order, so the display pass
/// always draws the state the compute pass just wrote.
pub struct FlockingPipeline {
    compute: ComputePass,
    store: ParticleStateStore,
    buffers: RenderBuffers,
}

impl FlockingPipeline {
    pub fn new(gpu: &GpuContext, grid: &ParticleGrid) -> Result<Self, FlockingError> {
        let compute = ComputePass::new(gpu)?;
        let store = ParticleStateStore::new(gpu, &compute, grid)?;
        let buffers = RenderBuffers::new(gpu, store.num_particles())?;
        Ok(Self {
            compute,
            store,
            buffers,
        })
    }

    /// Replaces the latest state with `grid`. A grid of a different size
    /// reallocates the textures and vertex buffers; on failure the previous
    /// state is kept.
    pub fn reinitialize(&mut self, gpu: &GpuContext, grid: &ParticleGrid) -> Result<(), FlockingError> {
        if grid.tex_size() == self.store.tex_size() {
            self.store.upload(&gpu.queue, grid);
        } else {
            let store = ParticleStateStore::new(gpu, &self.compute, grid)?;
            self.buffers = RenderBuffers::new(gpu, store.num_particles())?;
            self.store = store;
        }
        Ok(())
    }

    /// Records one frame's simulation work: the step (unless `advance` is
    /// false or the parameters are rejected) followed by the copy into the
    /// render buffers, which always runs so a paused flock is still drawn.
    pub fn encode_step(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        params: &SimulationParameters,
        advance: bool,
    ) -> StepOutcome {
        let outcome = if advance {
            self.compute.encode(&gpu.queue, encoder, &mut self.store, params)
        } else {
            StepOutcome::Paused
        };
        self.buffers.encode_copy(encoder, &self.store);
        outcome
    }

    /// Runs one step and submits it on its own, without presenting.
    pub fn step(&mut self, gpu: &GpuContext, params: &SimulationParameters) -> StepOutcome {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flocking Step Encoder"),
            });
        let outcome = self.encode_step(gpu, &mut encoder, params, true);
        gpu.queue.submit([encoder.finish()]);
        outcome
    }

    pub fn read_back(&self, gpu: &GpuContext) -> Result<ParticleGrid, FlockingError> {
        self.store.read_back(gpu)
    }

    /// Position and color records as the display pass would see them.
    pub fn read_render_buffers(&self, gpu: &GpuContext) -> Result<(Vec<[f32; 4]>, Vec<[f32; 4]>), FlockingError> {
        self.buffers.read_back(gpu)
    }

    pub fn render_buffers(&self) -> &RenderBuffers {
        &self.buffers
    }

    pub fn num_particles(&self) -> u32 {
        self.store.num_particles()
    }

    pub fn tex_size(&self) -> u32 {
        self.store.tex_size()
    }
}
