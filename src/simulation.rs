pub mod flocking;
pub mod grid;
pub mod params;
pub mod types;

pub use grid::{GridError, MAX_TEX_SIZE, ParticleGrid};
pub use params::{BoundaryPolicy, ParameterError, ParameterKnob, SimulationParameters};
pub use types::{FlockingUniforms, StateChannel, WORKGROUP_SIZE};
