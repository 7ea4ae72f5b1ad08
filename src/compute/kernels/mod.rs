//! Kernel factories.
//!
//! A kernel owns its double-buffered state and hands out [`ComputeTask`]s
//! that operate on it: an init task run once by
//! [`ComputeRunner::initialize`](super::ComputeRunner::initialize) and an
//! update task registered for every frame.
//!
//! Each task follows the same shape:
//!
//! 1. read from [`PingPong::read`](super::PingPong::read)
//! 2. write into [`PingPong::write_mut`](super::PingPong::write_mut)
//! 3. swap, as the last step of the dispatch
//!
//! so that once a frame returns, `read` holds the frame's result.
//!
//! The bundled kernels carry CPU backends. A GPU pipeline with the same
//! workgroup shape can be swapped in with `update_task_on`.
//!
//! [`ComputeTask`]: super::ComputeTask

mod fluid;
mod particles;

pub use fluid::{FLUID_WORKGROUP_EDGE, FluidConfig, FluidKernel, FluidState};
pub use particles::{
    PARTICLE_WORKGROUP_SIZE, Particle, ParticleConfig, ParticleKernel, ParticleState,
};
