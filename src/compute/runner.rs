//! Init/frame driver for compute tasks.
//!
//! # Frame Step
//!
//! | Step | Action |
//! |------|--------|
//! | 1 | Submit every registered task as one batch |
//! | 2 | Fire the `on_dispatch` hook with the dispatched ids |
//! | 3 | Invoke the render callback |
//! | 4 | Evaluate the post chain with `{timestamp, frame_index}` |
//! | 5 | Advance `frame_index` |
//!
//! Ping-pong kernels swap inside their own dispatch (step 1), so any
//! consumer in steps 3 and 4 already reads this frame's result.

use crate::config::RunnerConfig;
use crate::error::ComputeError;
use crate::post::{FrameContext, NoopPostChain, PostChain};

use super::{ComputeQueue, ComputeTask, DispatchContext, TaskId};

type RenderCallback = Box<dyn FnMut(&FrameContext)>;
type DispatchHook = Box<dyn FnMut(&[TaskId])>;

/// Batches compute tasks into one submission per init and per frame.
///
/// # Example
///
/// ```ignore
/// let mut runner = ComputeRunner::new(CpuQueue::new());
/// runner.initialize(vec![particles.init_task(), fluid.init_task()], 0)?;
/// runner.register(particles.update_task());
/// runner.register(fluid.update_task());
///
/// let frame = runner.frame(16.0)?;
/// assert_eq!(frame.frame_index, 0);
/// ```
pub struct ComputeRunner<Q: ComputeQueue> {
    queue: Q,
    config: RunnerConfig,
    /// Registration order is dispatch order.
    tasks: Vec<ComputeTask>,
    initialized: bool,
    frame_index: u64,
    last_timestamp: Option<f64>,
    render: Option<RenderCallback>,
    post_chain: Box<dyn PostChain>,
    on_dispatch: Option<DispatchHook>,
}

impl<Q: ComputeQueue> ComputeRunner<Q> {
    /// Create a runner with the default configuration.
    pub fn new(queue: Q) -> Self {
        Self::with_config(queue, RunnerConfig::default())
    }

    /// Create a runner with explicit submission labels.
    pub fn with_config(queue: Q, config: RunnerConfig) -> Self {
        Self {
            queue,
            config,
            tasks: Vec::new(),
            initialized: false,
            frame_index: 0,
            last_timestamp: None,
            render: None,
            post_chain: Box::new(NoopPostChain),
            on_dispatch: None,
        }
    }

    /// Set the callback run after each frame's compute submission.
    pub fn set_render_callback(&mut self, render: impl FnMut(&FrameContext) + 'static) {
        self.render = Some(Box::new(render));
    }

    /// Set the post chain evaluated at the end of each frame.
    pub fn set_post_chain(&mut self, post_chain: impl PostChain + 'static) {
        self.post_chain = Box::new(post_chain);
    }

    /// Set a hook fired once per submission with the dispatched task ids.
    pub fn set_on_dispatch(&mut self, hook: impl FnMut(&[TaskId]) + 'static) {
        self.on_dispatch = Some(Box::new(hook));
    }

    /// Run all init tasks, in order, as one submission.
    ///
    /// `start_frame_index` is the index reported for the first frame.
    pub fn initialize(
        &mut self,
        mut init_tasks: Vec<ComputeTask>,
        start_frame_index: u64,
    ) -> Result<(), ComputeError> {
        if self.initialized {
            return Err(ComputeError::AlreadyInitialized);
        }
        crate::profile_scope!("compute: initialize");

        let ctx = DispatchContext {
            timestamp: 0.0,
            delta_time: 0.0,
            frame_index: start_frame_index,
        };
        let label = self.config.init_label.clone();
        self.queue.submit(&label, &mut init_tasks, &ctx)?;
        self.notify_dispatch(&init_tasks);

        self.initialized = true;
        self.frame_index = start_frame_index;
        log::debug!(
            "Compute runner initialized: {} init tasks, first frame {}",
            init_tasks.len(),
            start_frame_index
        );
        Ok(())
    }

    /// Add a task to every subsequent frame.
    ///
    /// Returns `false`, leaving the existing task in place, if a task with
    /// the same id is already registered.
    pub fn register(&mut self, task: ComputeTask) -> bool {
        if self.tasks.iter().any(|t| t.id() == task.id()) {
            log::warn!("Compute task '{}' already registered, ignoring", task.id());
            return false;
        }
        log::debug!("Compute task '{}' registered ({:?})", task.id(), task.backend());
        self.tasks.push(task);
        true
    }

    /// Stop dispatching a task and hand it back.
    pub fn unregister(&mut self, id: &TaskId) -> Option<ComputeTask> {
        let index = self.tasks.iter().position(|t| t.id() == id)?;
        log::debug!("Compute task '{}' unregistered", id);
        Some(self.tasks.remove(index))
    }

    /// Whether a task with this id is registered.
    pub fn is_registered(&self, id: &TaskId) -> bool {
        self.tasks.iter().any(|t| t.id() == id)
    }

    /// Registered task ids, in dispatch order.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id().clone()).collect()
    }

    /// Run one frame: submit, render, then notify the post chain.
    ///
    /// Exactly one submission is made, even with no registered tasks. On a
    /// submission error the render callback and post chain are skipped and
    /// the frame index does not advance.
    pub fn frame(&mut self, timestamp: f64) -> Result<FrameContext, ComputeError> {
        if !self.initialized {
            return Err(ComputeError::NotInitialized);
        }
        crate::profile_scope!("compute: frame");

        let delta_time = self
            .last_timestamp
            .map_or(0.0, |last| (timestamp - last).max(0.0));
        let ctx = DispatchContext {
            timestamp,
            delta_time,
            frame_index: self.frame_index,
        };

        let label = self.config.frame_label.clone();
        if let Err(err) = self.queue.submit(&label, &mut self.tasks, &ctx) {
            log::error!("Compute frame {} failed: {}", self.frame_index, err);
            return Err(err);
        }
        crate::profile_plot!("compute: tasks", self.tasks.len());
        log::trace!(
            "Compute frame {}: {} tasks dispatched",
            self.frame_index,
            self.tasks.len()
        );
        let tasks = std::mem::take(&mut self.tasks);
        self.notify_dispatch(&tasks);
        self.tasks = tasks;

        let frame = FrameContext {
            timestamp,
            frame_index: self.frame_index,
        };
        if let Some(render) = self.render.as_mut() {
            render(&frame);
        }
        self.post_chain.evaluate(timestamp, &frame);

        self.last_timestamp = Some(timestamp);
        self.frame_index += 1;
        crate::frame_mark!();
        Ok(frame)
    }

    fn notify_dispatch(&mut self, tasks: &[ComputeTask]) {
        if let Some(hook) = self.on_dispatch.as_mut() {
            let ids: Vec<TaskId> = tasks.iter().map(|t| t.id().clone()).collect();
            hook(&ids);
        }
    }

    /// Index the next frame will report.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The submission backend.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// The submission backend, mutably.
    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }
}
