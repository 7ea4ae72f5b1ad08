//! Submission backends for compute batches.
//!
//! A [`ComputeQueue`] receives a whole batch of tasks and turns it into a
//! single submission. The runner never submits task by task.

use std::sync::Arc;

use crate::error::ComputeError;

use super::{ComputeBackend, ComputeTask, DispatchContext};

/// Backend turning a batch of compute tasks into one submission.
pub trait ComputeQueue {
    /// Execute `tasks` in order as one submission labeled `label`.
    fn submit(
        &mut self,
        label: &str,
        tasks: &mut [ComputeTask],
        ctx: &DispatchContext,
    ) -> Result<(), ComputeError>;
}

/// Queue executing CPU kernels in place.
///
/// Rejects the whole batch, before running anything, if it contains a GPU
/// kernel.
#[derive(Debug, Default)]
pub struct CpuQueue {
    submissions: u64,
}

impl CpuQueue {
    /// Create a queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches executed so far.
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }
}

impl ComputeQueue for CpuQueue {
    fn submit(
        &mut self,
        label: &str,
        tasks: &mut [ComputeTask],
        ctx: &DispatchContext,
    ) -> Result<(), ComputeError> {
        if let Some(task) = tasks
            .iter()
            .find(|task| matches!(task.backend(), ComputeBackend::Gpu(_)))
        {
            return Err(task.unsupported());
        }

        for task in tasks.iter_mut() {
            task.run_cpu(ctx)?;
        }
        self.submissions += 1;
        log::trace!("CPU submit '{}': {} tasks", label, tasks.len());
        Ok(())
    }
}

/// Queue recording a batch into one wgpu command buffer.
///
/// GPU kernels become one compute pass each inside a shared encoder, which
/// is submitted once per batch. CPU kernels run while the batch is recorded,
/// so they must all come before the first GPU kernel: a CPU kernel placed
/// after a GPU kernel would run before the GPU work it follows, and such a
/// batch is rejected before anything runs.
pub struct WgpuQueue {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    last_submission: Option<wgpu::SubmissionIndex>,
}

impl WgpuQueue {
    /// Create a queue for a device.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            last_submission: None,
        }
    }

    /// The device commands are recorded for.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The queue batches are submitted to.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Index of the most recent submission.
    pub fn last_submission(&self) -> Option<&wgpu::SubmissionIndex> {
        self.last_submission.as_ref()
    }
}

impl ComputeQueue for WgpuQueue {
    fn submit(
        &mut self,
        label: &str,
        tasks: &mut [ComputeTask],
        ctx: &DispatchContext,
    ) -> Result<(), ComputeError> {
        if let Some(task) = cpu_after_gpu(tasks) {
            log::warn!(
                "Batch '{}' rejected: CPU task '{}' follows a GPU task",
                label,
                task.id()
            );
            return Err(task.unsupported());
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

        let mut gpu_dispatches = 0usize;
        for task in tasks.iter_mut() {
            let task_label = task.label().to_string();
            let [x, y, z] = task.workgroup_count();
            match task.backend_mut() {
                ComputeBackend::Cpu(kernel) => kernel(ctx),
                ComputeBackend::Gpu(kernel) => {
                    let bind_groups = kernel.bind_groups(ctx);
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(&task_label),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(kernel.pipeline());
                    for (index, bind_group) in bind_groups.iter().enumerate() {
                        pass.set_bind_group(index as u32, bind_group.as_ref(), &[]);
                    }
                    pass.dispatch_workgroups(x, y, z);
                    gpu_dispatches += 1;
                }
            }
        }

        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.last_submission = Some(index);

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ComputeError::Submission(error.to_string()));
        }

        log::trace!(
            "GPU submit '{}': {} tasks, {} compute passes",
            label,
            tasks.len(),
            gpu_dispatches
        );
        Ok(())
    }
}

/// First CPU task that comes after a GPU task in `tasks`.
fn cpu_after_gpu(tasks: &[ComputeTask]) -> Option<&ComputeTask> {
    let first_gpu = tasks
        .iter()
        .position(|task| matches!(task.backend(), ComputeBackend::Gpu(_)))?;
    tasks[first_gpu..]
        .iter()
        .find(|task| matches!(task.backend(), ComputeBackend::Cpu(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cpu_queue_runs_in_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut tasks: Vec<ComputeTask> = ["a", "b", "c"]
            .into_iter()
            .map(|id| {
                let order = Arc::clone(&order);
                ComputeTask::new(id, ComputeBackend::cpu(move |_| order.lock().push(id)))
            })
            .collect();

        let mut queue = CpuQueue::new();
        queue
            .submit("batch", &mut tasks, &DispatchContext::default())
            .unwrap();

        assert_eq!(*order.lock(), ["a", "b", "c"]);
        assert_eq!(queue.submission_count(), 1);
    }

    #[test]
    fn test_cpu_queue_empty_batch_still_submits() {
        let mut queue = CpuQueue::new();
        queue
            .submit("empty", &mut [], &DispatchContext::default())
            .unwrap();
        assert_eq!(queue.submission_count(), 1);
    }

    #[test]
    fn test_cpu_only_batch_has_no_ordering_conflict() {
        let tasks = vec![
            ComputeTask::new("a", ComputeBackend::cpu(|_| {})),
            ComputeTask::new("b", ComputeBackend::cpu(|_| {})),
        ];
        assert!(cpu_after_gpu(&tasks).is_none());
        assert!(cpu_after_gpu(&[]).is_none());
    }

    #[test]
    fn test_cpu_queue_counts_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut tasks = vec![ComputeTask::new(
            "count",
            ComputeBackend::cpu(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )];
        let mut queue = CpuQueue::new();
        for _ in 0..3 {
            queue
                .submit("frame", &mut tasks, &DispatchContext::default())
                .unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
