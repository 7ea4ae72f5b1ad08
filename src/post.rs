//! Downstream post-processing notification.
//!
//! The compute runner notifies a [`PostChain`] once per frame, after the
//! compute batch has been submitted and the render callback has run.

/// Frame timing handed to the post chain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameContext {
    /// Frame timestamp in milliseconds.
    pub timestamp: f64,
    /// Monotonic frame index, starting at the index given to
    /// [`ComputeRunner::initialize`](crate::compute::ComputeRunner::initialize).
    pub frame_index: u64,
}

/// Post-processing pipeline evaluated once per frame.
pub trait PostChain {
    /// Evaluate the chain for the frame at `timestamp`.
    fn evaluate(&mut self, timestamp: f64, frame: &FrameContext);
}

/// Post chain that does nothing. The runner's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPostChain;

impl PostChain for NoopPostChain {
    fn evaluate(&mut self, _timestamp: f64, _frame: &FrameContext) {}
}

/// Adapter turning a closure into a [`PostChain`].
///
/// # Example
///
/// ```ignore
/// runner.set_post_chain(PostChainFn(|timestamp, frame: &FrameContext| {
///     log::trace!("post {} @ {}", frame.frame_index, timestamp);
/// }));
/// ```
pub struct PostChainFn<F>(pub F);

impl<F> PostChain for PostChainFn<F>
where
    F: FnMut(f64, &FrameContext),
{
    fn evaluate(&mut self, timestamp: f64, frame: &FrameContext) {
        (self.0)(timestamp, frame)
    }
}
