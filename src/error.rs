use thiserror::Error;

use crate::config::ConfigError;
use crate::simulation::GridError;

/// Everything that can abort startup or a blocking GPU operation.
///
/// Per-frame GPU problems never surface here: they are logged from the
/// device's uncaptured-error handler and the loop keeps going.
#[derive(Debug, Error)]
pub enum FlockingError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("adapter {adapter} cannot run the simulation: {reason}")]
    Unsupported { adapter: String, reason: String },

    #[error("building {stage} failed:\n{diagnostic}")]
    Shader { stage: String, diagnostic: String },

    #[error("reading particle state back from the GPU failed: {0}")]
    Readback(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),
}
