//! Error types for the framegraph and the compute runner.

use std::fmt;

/// Boxed error type carried by [`PassError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error reported by a pass from its `execute` callback.
///
/// A failing pass aborts the remaining passes of the current tick; the
/// error reaches the caller of [`Framegraph::tick`](crate::Framegraph::tick)
/// wrapped in [`FramegraphError::PassFailed`].
pub struct PassError {
    source: BoxError,
}

impl PassError {
    /// Wrap any error type.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            source: source.into(),
        }
    }

    /// Create an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            source: message.into().into(),
        }
    }

    /// Borrow the underlying error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

impl fmt::Debug for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.source, f)
    }
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for PassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

/// Errors that can occur while ticking the framegraph.
#[derive(Debug, thiserror::Error)]
pub enum FramegraphError {
    /// A pass returned an error; the rest of the tick was skipped.
    #[error("pass '{pass}' failed: {source}")]
    PassFailed {
        /// Id of the failing pass.
        pass: String,
        /// Error reported by the pass.
        #[source]
        source: PassError,
    },

    /// Topological ordering found a before/after cycle.
    #[error("pass ordering contains a cycle through: {}", passes.join(", "))]
    CyclicDependency {
        /// Ids of the passes left unordered.
        passes: Vec<String>,
    },
}

/// Errors that can occur in the compute runner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    /// `frame()` was called before `initialize()`.
    #[error("compute runner used before initialize()")]
    NotInitialized,

    /// `initialize()` was called twice.
    #[error("compute runner is already initialized")]
    AlreadyInitialized,

    /// The queue cannot execute the task's backend.
    #[error("task '{task}' uses the {backend} backend, which this queue cannot dispatch")]
    UnsupportedBackend {
        /// Id of the rejected task.
        task: String,
        /// Backend name of the rejected task.
        backend: &'static str,
    },

    /// The GPU submission itself failed.
    #[error("compute submission failed: {0}")]
    Submission(String),
}
