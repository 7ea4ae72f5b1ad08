//! Configuration for the framegraph controller and the compute runner.

use crate::graph::OrderingMode;
use crate::size::clamp_quality_scale;

/// Configuration for creating a [`Framegraph`](crate::Framegraph).
///
/// # Example
///
/// ```
/// use studio_framegraph::{FramegraphConfig, OrderingMode};
///
/// let config = FramegraphConfig::new()
///     .with_quality_scale(0.5)
///     .with_ordering(OrderingMode::Topological);
/// assert_eq!(config.initial_quality_scale, 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramegraphConfig {
    /// Quality scale applied before the first resize (clamped).
    pub initial_quality_scale: f32,
    /// How before/after constraints are resolved each tick.
    pub ordering: OrderingMode,
}

impl Default for FramegraphConfig {
    fn default() -> Self {
        Self {
            initial_quality_scale: 1.0,
            ordering: OrderingMode::Splice,
        }
    }
}

impl FramegraphConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial quality scale. The value is clamped to `[0.25, 1]`.
    pub fn with_quality_scale(mut self, scale: f32) -> Self {
        self.initial_quality_scale = clamp_quality_scale(scale);
        self
    }

    /// Set the pass ordering mode.
    pub fn with_ordering(mut self, ordering: OrderingMode) -> Self {
        self.ordering = ordering;
        self
    }
}

/// Configuration for creating a [`ComputeRunner`](crate::ComputeRunner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Label of the one-time init submission.
    pub init_label: String,
    /// Label of the per-frame update submission.
    pub frame_label: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            init_label: "compute.init".to_string(),
            frame_label: "compute.frame".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Create a configuration with default labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the init submission label.
    pub fn with_init_label(mut self, label: impl Into<String>) -> Self {
        self.init_label = label.into();
        self
    }

    /// Set the per-frame submission label.
    pub fn with_frame_label(mut self, label: impl Into<String>) -> Self {
        self.frame_label = label.into();
        self
    }
}
