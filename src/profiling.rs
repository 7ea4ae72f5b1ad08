//! Tracy instrumentation for ticks and compute frames.
//!
//! Enabled with the `profiling` cargo feature:
//!
//! ```bash
//! cargo test --features profiling
//! ```
//!
//! Without the feature every macro expands to nothing (or to a plain
//! evaluation of its argument), so instrumented call sites cost nothing.
//!
//! | Macro | Used for |
//! |-------|----------|
//! | [`profile_scope!`] | Static span around `Framegraph::tick` and `ComputeRunner::frame` |
//! | [`profile_scope_dynamic!`] | Span named after a pass or task id |
//! | [`frame_mark!`] | End of a compute frame |
//! | [`profile_plot!`] | Per-frame counters (pass count, dispatched tasks) |

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Mark the end of a frame.
///
/// Called by [`ComputeRunner::frame`](crate::compute::ComputeRunner::frame)
/// after the post chain has been notified.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Open a span with a static name that ends with the enclosing scope.
///
/// ```ignore
/// fn tick(&mut self) {
///     profile_scope!("framegraph: tick");
///     // ...
/// }
/// ```
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a span (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Open a span whose name is only known at runtime, such as a pass id.
///
/// The name is heap-allocated by Tracy; prefer [`profile_scope!`] for
/// literals.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|c| c.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Open a dynamically named span (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

/// Plot a value over time.
///
/// ```ignore
/// profile_plot!("compute: tasks", self.tasks.len());
/// ```
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

pub use frame_mark;
pub use profile_plot;
pub use profile_scope;
pub use profile_scope_dynamic;
