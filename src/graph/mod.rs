//! Framegraph controller.
//!
//! The framegraph owns the named passes of a frame, decides their order,
//! keeps the renderer sized to the canvas and quality scale, and owns the
//! history resource cache.
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | **Graph** | [`Framegraph`] | Pass registry, ordering, resize (this module) |
//! | Pass | [`Pass`], [`RenderPass`] | Single per-frame work unit |
//! | History | [`HistoryCache`](crate::HistoryCache) | Size-dependent persistent resources |
//! | Compute | [`ComputeRunner`](crate::ComputeRunner) | Batched GPU compute, driven separately |
//!
//! # Execution
//!
//! Each [`tick`](Framegraph::tick) computes the pass order, skips disabled
//! passes and runs the rest strictly one after another. A pass returning
//! [`PassOutput::Pending`] suspends the tick until its future resolves. The
//! first failing pass aborts the tick.
//!
//! # Example
//!
//! ```ignore
//! use studio_framegraph::{Framegraph, Pass, FixedCanvas};
//!
//! let mut graph = Framegraph::new(FixedCanvas::new(1280.0, 720.0), renderer);
//! let scene = graph.add_pass(Pass::from_fn("scene", |ctx| Ok(())));
//! graph.add_pass(Pass::from_fn("taa", |ctx| Ok(())).with_after("scene"));
//!
//! graph.tick_blocking()?;
//! graph.remove_pass(&scene);
//! ```

mod order;
mod pass;

pub use order::{OrderingMode, PassConstraint, splice_order, topological_order};
pub use pass::{Pass, PassContext, PassFuture, PassHandle, PassOutput, RenderPass};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::FramegraphConfig;
use crate::error::FramegraphError;
use crate::history::{Disposable, HistoryCache, HistoryHandle, SharedHistory};
use crate::size::{FramegraphSize, clamp_quality_scale};
use crate::surface::{Canvas, Renderer};

struct PassSlot<R, T: Disposable> {
    generation: u64,
    pass: Pass<R, T>,
}

/// Per-frame pass graph and resource lifecycle controller.
///
/// `R` is the renderer the passes drive, `T` the history resource type.
pub struct Framegraph<R: Renderer, T: Disposable> {
    canvas: Box<dyn Canvas>,
    renderer: R,
    /// Registration order; an overwritten id keeps its slot.
    passes: Vec<PassSlot<R, T>>,
    next_generation: u64,
    history: SharedHistory<T>,
    size: FramegraphSize,
    quality_scale: f32,
    ordering: OrderingMode,
}

impl<R: Renderer, T: Disposable + 'static> Framegraph<R, T> {
    /// Create a framegraph with the default configuration.
    ///
    /// The renderer is resized immediately.
    pub fn new(canvas: impl Canvas + 'static, renderer: R) -> Self {
        Self::with_config(canvas, renderer, FramegraphConfig::default())
    }

    /// Create a framegraph with an explicit configuration.
    pub fn with_config(
        canvas: impl Canvas + 'static,
        renderer: R,
        config: FramegraphConfig,
    ) -> Self {
        let quality_scale = clamp_quality_scale(config.initial_quality_scale);
        let size = FramegraphSize::from_canvas(&canvas, quality_scale);
        let mut graph = Self {
            canvas: Box::new(canvas),
            renderer,
            passes: Vec::new(),
            next_generation: 0,
            history: Arc::new(Mutex::new(HistoryCache::new(size))),
            size,
            quality_scale,
            ordering: config.ordering,
        };
        graph.resize();
        graph
    }

    /// Register a pass.
    ///
    /// A pass with the same id is replaced in place (keeping its position in
    /// registration order). The returned handle removes this registration.
    pub fn add_pass(&mut self, pass: Pass<R, T>) -> PassHandle {
        let generation = self.next_generation;
        self.next_generation += 1;
        let handle = PassHandle::new(pass.id().to_string(), generation);

        if let Some(slot) = self.passes.iter_mut().find(|slot| slot.pass.id() == pass.id()) {
            log::warn!("Pass '{}' registered twice, replacing previous pass", pass.id());
            *slot = PassSlot { generation, pass };
        } else {
            log::debug!("Pass '{}' registered", pass.id());
            self.passes.push(PassSlot { generation, pass });
        }
        handle
    }

    /// Remove the pass registered by `handle`.
    ///
    /// Returns `false` if the pass was already removed or replaced by a
    /// later registration with the same id.
    pub fn remove_pass(&mut self, handle: &PassHandle) -> bool {
        let Some(index) = self.passes.iter().position(|slot| {
            slot.generation == handle.generation() && slot.pass.id() == handle.id()
        }) else {
            return false;
        };
        self.passes.remove(index);
        log::debug!("Pass '{}' removed", handle.id());
        true
    }

    /// Remove whichever pass is currently registered under `id`.
    pub fn remove_pass_by_id(&mut self, id: &str) -> bool {
        let before = self.passes.len();
        self.passes.retain(|slot| slot.pass.id() != id);
        before != self.passes.len()
    }

    /// Enable or disable a registered pass. Returns `false` for unknown ids.
    pub fn set_pass_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.passes.iter_mut().find(|slot| slot.pass.id() == id) {
            Some(slot) => {
                slot.pass.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Check if a pass is registered under `id`.
    pub fn contains_pass(&self, id: &str) -> bool {
        self.passes.iter().any(|slot| slot.pass.id() == id)
    }

    /// Number of registered passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Registered pass ids in registration order.
    pub fn pass_ids(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|slot| slot.pass.id())
    }

    /// Current render size.
    pub fn size(&self) -> FramegraphSize {
        self.size
    }

    /// Current quality scale.
    pub fn quality_scale(&self) -> f32 {
        self.quality_scale
    }

    /// Set the quality scale, clamped to `[0.25, 1]`.
    ///
    /// Does nothing if the clamped value equals the current one; otherwise
    /// resizes the renderer and rebuilds every history resource.
    pub fn set_quality_scale(&mut self, scale: f32) {
        let scale = clamp_quality_scale(scale);
        if scale == self.quality_scale {
            return;
        }
        log::debug!("Quality scale {} -> {}", self.quality_scale, scale);
        self.quality_scale = scale;
        self.resize();
    }

    /// Re-read the canvas and resize unconditionally.
    pub fn refresh(&mut self) {
        self.resize();
    }

    /// Active ordering mode.
    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }

    /// Change how before/after constraints are resolved.
    pub fn set_ordering(&mut self, ordering: OrderingMode) {
        self.ordering = ordering;
    }

    /// The driven renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The driven renderer, mutably.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// The canvas sizes are read from.
    pub fn canvas(&self) -> &dyn Canvas {
        self.canvas.as_ref()
    }

    /// Shared access to the history cache.
    pub fn history(&self) -> SharedHistory<T> {
        Arc::clone(&self.history)
    }

    /// Create a handle to the history resource stored under `key`.
    ///
    /// The resource is built lazily on the first [`HistoryHandle::get`].
    pub fn history_handle<F>(&self, key: impl Into<String>, factory: F) -> HistoryHandle<T>
    where
        F: FnMut(FramegraphSize) -> T + Send + 'static,
    {
        HistoryHandle::new(key, factory, Arc::clone(&self.history))
    }

    /// Dispose and forget every history resource.
    pub fn invalidate_history(&mut self) {
        self.history.lock().invalidate();
    }

    /// Pass ids in the order the next tick would run them, disabled
    /// passes excluded.
    pub fn execution_order(&self) -> Result<Vec<&str>, FramegraphError> {
        Ok(self
            .ordered_indices()?
            .into_iter()
            .map(|index| &self.passes[index].pass)
            .filter(|pass| pass.is_enabled())
            .map(|pass| pass.id())
            .collect())
    }

    /// Run every enabled pass once, in order.
    ///
    /// Passes run strictly sequentially; a pending pass blocks the ones
    /// after it. The first error aborts the remaining passes of this tick.
    pub async fn tick(&mut self) -> Result<(), FramegraphError> {
        crate::profile_scope!("framegraph: tick");

        let order = self.ordered_indices()?;
        let size = self.size;
        crate::profile_plot!("framegraph: passes", order.len());

        for index in order {
            let slot = &mut self.passes[index];
            if !slot.pass.is_enabled() {
                continue;
            }
            crate::profile_scope_dynamic!(slot.pass.id());
            log::trace!("Executing pass '{}'", slot.pass.id());

            let ctx = PassContext::new(&mut self.renderer, size, &self.history);
            let result = slot.pass.execute(ctx).finish().await;
            if let Err(source) = result {
                log::error!("Pass '{}' failed: {}", slot.pass.id(), source);
                return Err(FramegraphError::PassFailed {
                    pass: slot.pass.id().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Run [`tick`](Self::tick) to completion on the current thread.
    pub fn tick_blocking(&mut self) -> Result<(), FramegraphError> {
        pollster::block_on(self.tick())
    }

    /// Tear down: dispose every history resource, then the renderer.
    pub fn dispose(mut self) {
        self.invalidate_history();
        self.renderer.dispose();
        log::debug!("Framegraph disposed");
    }

    fn ordered_indices(&self) -> Result<Vec<usize>, FramegraphError> {
        let constraints: Vec<PassConstraint<'_>> = self
            .passes
            .iter()
            .map(|slot| PassConstraint {
                id: slot.pass.id(),
                before: slot.pass.before(),
                after: slot.pass.after(),
            })
            .collect();

        match self.ordering {
            OrderingMode::Splice => Ok(splice_order(&constraints)),
            OrderingMode::Topological => topological_order(&constraints)
                .map_err(|passes| FramegraphError::CyclicDependency { passes }),
        }
    }

    fn resize(&mut self) {
        let size = FramegraphSize::from_canvas(self.canvas.as_ref(), self.quality_scale);
        self.size = size;
        self.renderer.set_size(size.width, size.height, false);
        self.renderer.set_pixel_ratio(size.pixel_ratio);
        self.history.lock().resize(size);
        log::debug!(
            "Framegraph resized to {}x{} (pixel ratio {}, scale {})",
            size.width,
            size.height,
            size.pixel_ratio,
            size.scale
        );
    }
}
