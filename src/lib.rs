//! Flocking particles simulated on the GPU.
//!
//! Particle state lives in ping-pong float textures advanced by a compute
//! shader, copied into vertex buffers and drawn as point sprites.

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod gpu;
pub mod rendering;
pub mod simulation;

pub use config::FlockingConfig;
pub use error::FlockingError;
