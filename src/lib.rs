//! # Studio Framegraph
//!
//! Per-frame orchestration core of the shader studio: decides which GPU work
//! runs each frame, in what order, and how persistent GPU resources are
//! allocated, resized and invalidated.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Framegraph`] - Named render passes, their ordering, viewport size and quality scale
//! - [`HistoryCache`] - Size-dependent persistent resources, rebuilt on resize
//! - [`ComputeRunner`] - One GPU submission per init and per frame, then render and post
//! - [`PingPong`] - Double-buffered kernel state swapped without copying
//! - [`compute::kernels`] - Particle and fluid kernel factories
//!
//! Dependency order, leaves first: history cache, framegraph, ping-pong
//! state, compute task, compute runner.
//!
//! ## Example
//!
//! ```ignore
//! use studio_framegraph::{ComputeRunner, CpuQueue, FixedCanvas, Framegraph, Pass};
//!
//! let mut graph = Framegraph::new(FixedCanvas::new(1280.0, 720.0), renderer);
//! graph.add_pass(Pass::from_fn("scene", |ctx| Ok(())));
//!
//! let mut runner = ComputeRunner::new(CpuQueue::new());
//! runner.initialize(vec![particles.init_task()], 0)?;
//! runner.register(particles.update_task());
//!
//! loop {
//!     runner.frame(timestamp)?;
//!     graph.tick_blocking()?;
//! }
//! ```

pub mod compute;
pub mod config;
pub mod error;
pub mod graph;
pub mod history;
pub mod post;
pub mod profiling;
pub mod size;
pub mod surface;

// Re-export main types for convenience
pub use compute::{
    ComputeBackend, ComputeQueue, ComputeRunner, ComputeTask, CpuQueue, DispatchContext,
    GpuKernel, PingPong, TaskId, WgpuQueue,
};
pub use config::{FramegraphConfig, RunnerConfig};
pub use error::{ComputeError, FramegraphError, PassError};
pub use graph::{
    Framegraph, OrderingMode, Pass, PassContext, PassHandle, PassOutput, RenderPass,
};
pub use history::{
    Disposable, HistoryCache, HistoryEntry, HistoryHandle, HistoryTextureDesc, SharedHistory,
    texture_factory,
};
pub use post::{FrameContext, PostChain, PostChainFn};
pub use size::{FramegraphSize, MAX_QUALITY_SCALE, MIN_QUALITY_SCALE};
pub use surface::{Canvas, FixedCanvas, Renderer, SurfaceRenderer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version. The library never installs a logger itself.
pub fn init() {
    log::info!("Studio framegraph v{} initialized", VERSION);
}
