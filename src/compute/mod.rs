//! Batched GPU compute.
//!
//! Kernels describe their work as [`ComputeTask`]s: a GPU-shaped dispatch
//! descriptor (workgroup size and count) plus a backend that either runs on
//! the CPU or dispatches a wgpu compute pipeline. The same kernel
//! definition can therefore be simulated on the CPU in tests and dispatched
//! for real on a device.
//!
//! # Module Contents
//!
//! - [`ComputeTask`] - Dispatch descriptor produced by kernel factories
//! - [`ComputeBackend`] - CPU closure or GPU pipeline
//! - [`PingPong`] - Double-buffered kernel state
//! - [`ComputeQueue`] - One-submission-per-batch backend ([`CpuQueue`], [`WgpuQueue`])
//! - [`ComputeRunner`] - Init/frame driver notifying the post chain
//! - [`kernels`] - Particle and fluid kernel factories

pub mod kernels;
mod ping_pong;
mod queue;
mod runner;

pub use ping_pong::PingPong;
pub use queue::{ComputeQueue, CpuQueue, WgpuQueue};
pub use runner::ComputeRunner;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ComputeError;

/// Identifier of a compute task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    /// Create an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timing handed to every dispatch of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DispatchContext {
    /// Frame timestamp in milliseconds (0 for the init submission).
    pub timestamp: f64,
    /// Milliseconds since the previous frame (0 on the first frame).
    pub delta_time: f64,
    /// Index of the frame being dispatched.
    pub frame_index: u64,
}

/// CPU execution of a task. Kernel state is captured by the closure.
pub type CpuKernel = Box<dyn FnMut(&DispatchContext) + Send>;

/// Supplies the bind groups of a GPU dispatch, in group-index order.
pub type BindGroupSource =
    Box<dyn FnMut(&DispatchContext) -> Vec<Arc<wgpu::BindGroup>> + Send>;

/// GPU execution of a task: a compute pipeline and its bind groups.
pub struct GpuKernel {
    pipeline: Arc<wgpu::ComputePipeline>,
    bind_groups: BindGroupSource,
}

impl GpuKernel {
    /// Create a kernel with a bind group source called once per dispatch.
    pub fn new(pipeline: Arc<wgpu::ComputePipeline>, bind_groups: BindGroupSource) -> Self {
        Self {
            pipeline,
            bind_groups,
        }
    }

    /// Kernel with a fixed set of bind groups.
    pub fn with_static_bind_groups(
        pipeline: Arc<wgpu::ComputePipeline>,
        bind_groups: Vec<Arc<wgpu::BindGroup>>,
    ) -> Self {
        Self::new(pipeline, Box::new(move |_| bind_groups.clone()))
    }

    /// Kernel alternating between two bind groups.
    ///
    /// Each dispatch binds the current read slot (which reads buffer A and
    /// writes buffer B) and then swaps, so the next frame reads what this
    /// one wrote.
    pub fn ping_pong(
        pipeline: Arc<wgpu::ComputePipeline>,
        bind_groups: Arc<Mutex<PingPong<Arc<wgpu::BindGroup>>>>,
    ) -> Self {
        Self::new(
            pipeline,
            Box::new(move |_| {
                let mut slots = bind_groups.lock();
                let current = Arc::clone(slots.read());
                slots.swap();
                vec![current]
            }),
        )
    }

    /// The compute pipeline.
    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    /// Resolve the bind groups for one dispatch.
    pub fn bind_groups(&mut self, ctx: &DispatchContext) -> Vec<Arc<wgpu::BindGroup>> {
        (self.bind_groups)(ctx)
    }
}

/// Backend a task executes on.
pub enum ComputeBackend {
    /// Run a closure on the CPU, in batch order.
    Cpu(CpuKernel),
    /// Record a compute pass into the batch command buffer.
    Gpu(GpuKernel),
}

impl ComputeBackend {
    /// Wrap a CPU closure.
    pub fn cpu<F>(kernel: F) -> Self
    where
        F: FnMut(&DispatchContext) + Send + 'static,
    {
        Self::Cpu(Box::new(kernel))
    }

    /// Short backend name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu(_) => "cpu",
            Self::Gpu(_) => "gpu",
        }
    }
}

impl fmt::Debug for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declarative compute dispatch produced by a kernel factory.
///
/// Built once with the `with_*` methods and immutable afterwards.
#[derive(Debug)]
pub struct ComputeTask {
    id: TaskId,
    label: String,
    workgroup_size: [u32; 3],
    workgroup_count: [u32; 3],
    backend: ComputeBackend,
}

impl ComputeTask {
    /// Create a task dispatching a single 1x1x1 workgroup.
    pub fn new(id: impl Into<TaskId>, backend: ComputeBackend) -> Self {
        let id = id.into();
        Self {
            label: id.as_str().to_string(),
            id,
            workgroup_size: [1, 1, 1],
            workgroup_count: [1, 1, 1],
            backend,
        }
    }

    /// Set the debug label. Defaults to the id.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the workgroup size declared by the kernel.
    pub fn with_workgroup_size(mut self, size: [u32; 3]) -> Self {
        self.workgroup_size = size;
        self
    }

    /// Set the number of workgroups dispatched.
    pub fn with_workgroup_count(mut self, count: [u32; 3]) -> Self {
        self.workgroup_count = count;
        self
    }

    /// Number of workgroups needed to cover `elements` items.
    pub fn workgroups_for(elements: u32, workgroup_size: u32) -> u32 {
        elements.div_ceil(workgroup_size.max(1))
    }

    /// Task id.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Workgroup size.
    pub fn workgroup_size(&self) -> [u32; 3] {
        self.workgroup_size
    }

    /// Workgroup count.
    pub fn workgroup_count(&self) -> [u32; 3] {
        self.workgroup_count
    }

    /// Total number of shader invocations of one dispatch.
    pub fn invocations(&self) -> u64 {
        self.workgroup_size
            .iter()
            .chain(self.workgroup_count.iter())
            .map(|&n| u64::from(n))
            .product()
    }

    /// The execution backend.
    pub fn backend(&self) -> &ComputeBackend {
        &self.backend
    }

    /// The execution backend, mutably. Used by queue implementations.
    pub fn backend_mut(&mut self) -> &mut ComputeBackend {
        &mut self.backend
    }

    /// Run a CPU task. Fails for GPU tasks.
    pub fn run_cpu(&mut self, ctx: &DispatchContext) -> Result<(), ComputeError> {
        if let ComputeBackend::Cpu(kernel) = &mut self.backend {
            kernel(ctx);
            return Ok(());
        }
        Err(self.unsupported())
    }

    pub(crate) fn unsupported(&self) -> ComputeError {
        ComputeError::UnsupportedBackend {
            task: self.id.to_string(),
            backend: self.backend.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_task_defaults_and_shape() {
        let task = ComputeTask::new("fluid.update", ComputeBackend::cpu(|_| {}))
            .with_workgroup_size([8, 8, 1])
            .with_workgroup_count([16, 8, 1]);
        assert_eq!(task.id().as_str(), "fluid.update");
        assert_eq!(task.label(), "fluid.update");
        assert_eq!(task.invocations(), 8 * 8 * 16 * 8);
        assert_eq!(task.backend().name(), "cpu");
    }

    #[test]
    fn test_workgroups_for() {
        assert_eq!(ComputeTask::workgroups_for(1000, 64), 16);
        assert_eq!(ComputeTask::workgroups_for(64, 64), 1);
        assert_eq!(ComputeTask::workgroups_for(0, 64), 0);
        assert_eq!(ComputeTask::workgroups_for(5, 0), 5);
    }

    #[test]
    fn test_run_cpu_passes_context() {
        let seen = Arc::new(AtomicU32::new(0));
        let sink = Arc::clone(&seen);
        let mut task = ComputeTask::new(
            "timing",
            ComputeBackend::cpu(move |ctx| {
                sink.store(ctx.frame_index as u32, Ordering::SeqCst);
            }),
        );
        let ctx = DispatchContext {
            timestamp: 16.0,
            delta_time: 16.0,
            frame_index: 7,
        };
        task.run_cpu(&ctx).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
