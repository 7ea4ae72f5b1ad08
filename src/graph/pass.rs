//! Pass definitions for the framegraph.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::PassError;
use crate::history::{Disposable, SharedHistory};
use crate::size::FramegraphSize;

/// Future returned by a pass that waits on the GPU (e.g. a readback).
pub type PassFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PassError>> + 'a>>;

/// Result of starting a pass.
///
/// `Pending` suspends the tick at this pass boundary; the next pass starts
/// only after the future resolves.
pub enum PassOutput<'a> {
    /// The pass finished synchronously.
    Ready(Result<(), PassError>),
    /// The pass finishes when the future resolves.
    Pending(PassFuture<'a>),
}

impl<'a> PassOutput<'a> {
    /// Successful synchronous completion.
    pub fn done() -> Self {
        Self::Ready(Ok(()))
    }

    /// Wrap an asynchronous completion.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), PassError>> + 'a,
    {
        Self::Pending(Box::pin(future))
    }

    pub(crate) async fn finish(self) -> Result<(), PassError> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl From<Result<(), PassError>> for PassOutput<'_> {
    fn from(result: Result<(), PassError>) -> Self {
        Self::Ready(result)
    }
}

/// Context handed to a pass for one execution.
///
/// Gives access to the renderer, the current render size, and the history
/// cache. Passes may request history resources but never dispose them.
pub struct PassContext<'a, R, T: Disposable> {
    renderer: &'a mut R,
    size: FramegraphSize,
    history: &'a SharedHistory<T>,
}

impl<'a, R, T: Disposable> PassContext<'a, R, T> {
    pub(crate) fn new(
        renderer: &'a mut R,
        size: FramegraphSize,
        history: &'a SharedHistory<T>,
    ) -> Self {
        Self {
            renderer,
            size,
            history,
        }
    }

    /// The renderer being driven.
    pub fn renderer(&mut self) -> &mut R {
        self.renderer
    }

    /// Current render size.
    pub fn size(&self) -> FramegraphSize {
        self.size
    }

    /// Get the history resource stored under `key`, building it with
    /// `factory` if absent or built for another size.
    pub fn get_history_texture<F>(&self, key: &str, factory: F) -> Arc<T>
    where
        F: FnMut(FramegraphSize) -> T + Send + 'static,
    {
        self.history.lock().get(key, factory)
    }
}

/// Per-frame work unit executed by the framegraph.
///
/// Implement this for passes that need to suspend (GPU readbacks) or carry
/// state; use [`Pass::from_fn`] for plain synchronous closures.
pub trait RenderPass<R, T: Disposable> {
    /// Run the pass for the current frame.
    fn execute<'a>(&'a mut self, ctx: PassContext<'a, R, T>) -> PassOutput<'a>;
}

struct FnPass<F>(F);

impl<R, T, F> RenderPass<R, T> for FnPass<F>
where
    T: Disposable,
    F: for<'a> FnMut(PassContext<'a, R, T>) -> Result<(), PassError>,
{
    fn execute<'a>(&'a mut self, ctx: PassContext<'a, R, T>) -> PassOutput<'a> {
        PassOutput::Ready((self.0)(ctx))
    }
}

/// A named pass with optional ordering constraints.
///
/// # Example
///
/// ```ignore
/// let taa = Pass::from_fn("taa", |ctx| {
///     let history = ctx.get_history_texture("taa.history", factory);
///     // ... resolve into history ...
///     Ok(())
/// })
/// .with_after("scene");
/// framegraph.add_pass(taa);
/// ```
pub struct Pass<R, T: Disposable> {
    id: String,
    enabled: bool,
    before: Option<String>,
    after: Option<String>,
    runner: Box<dyn RenderPass<R, T>>,
}

impl<R, T: Disposable> Pass<R, T> {
    /// Create an enabled pass without ordering constraints.
    pub fn new(id: impl Into<String>, runner: impl RenderPass<R, T> + 'static) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            before: None,
            after: None,
            runner: Box::new(runner),
        }
    }

    /// Create a pass from a synchronous closure.
    pub fn from_fn<F>(id: impl Into<String>, execute: F) -> Self
    where
        R: 'static,
        T: 'static,
        F: for<'a> FnMut(PassContext<'a, R, T>) -> Result<(), PassError> + 'static,
    {
        Self::new(id, FnPass(execute))
    }

    /// Request that this pass runs immediately before `id`.
    pub fn with_before(mut self, id: impl Into<String>) -> Self {
        self.before = Some(id.into());
        self
    }

    /// Request that this pass runs immediately after `id`.
    pub fn with_after(mut self, id: impl Into<String>) -> Self {
        self.after = Some(id.into());
        self
    }

    /// Set whether the pass runs. Passes are enabled by default.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Unique pass id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the pass runs during `tick()`.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Id this pass should precede.
    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    /// Id this pass should follow.
    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn execute<'a>(&'a mut self, ctx: PassContext<'a, R, T>) -> PassOutput<'a> {
        self.runner.execute(ctx)
    }
}

impl<R, T: Disposable> fmt::Debug for Pass<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

/// Registration receipt returned by [`Framegraph::add_pass`](crate::Framegraph::add_pass).
///
/// Removing through the handle only succeeds while the registration it
/// came from is current; once another pass overwrote the id, the handle is
/// stale and removal is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PassHandle {
    id: String,
    generation: u64,
}

impl PassHandle {
    pub(crate) fn new(id: String, generation: u64) -> Self {
        Self { id, generation }
    }

    /// Id of the registered pass.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
