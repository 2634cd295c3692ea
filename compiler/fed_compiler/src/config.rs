//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Tunables of the compiler pipeline.
///
/// Part of the pipeline fingerprint: artifacts compiled under different
/// configurations never share a cache entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cap on full pipeline iterations before giving up on a fixed point.
    pub max_iterations: usize,
    /// A binding whose value performs a call is inlined only when it is
    /// referenced at most this many times.
    pub inline_fan_out: usize,
    /// Whether to fuse compiled leaves connected by struct/selection glue.
    pub merge_leaves: bool,
}

impl PipelineConfig {
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_inline_fan_out(mut self, inline_fan_out: usize) -> Self {
        self.inline_fan_out = inline_fan_out;
        self
    }

    #[must_use]
    pub fn with_merge_leaves(mut self, merge_leaves: bool) -> Self {
        self.merge_leaves = merge_leaves;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            inline_fan_out: 1,
            merge_leaves: true,
        }
    }
}
