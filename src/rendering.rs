pub mod camera;
pub mod compute_pass;
pub mod display_pass;
pub mod grid_overlay;
pub mod pipeline;
pub(crate) mod render_pass;
pub mod state_store;
pub mod transfer;

pub use camera::{Camera, CameraPose, DragState};
pub use compute_pass::{ComputePass, StepOutcome};
pub use display_pass::DisplayPass;
pub use grid_overlay::GridOverlay;
pub use pipeline::FlockingPipeline;
pub use state_store::ParticleStateStore;
pub use transfer::RenderBuffers;
