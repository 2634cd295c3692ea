//! Execution context configuration.

use std::time::Duration;

use fed_compiler::PipelineConfig;
use serde::{Deserialize, Serialize};

/// How an invocation reaches the backend.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DispatchMode {
    /// One backend call running the whole computation.
    Single,
    /// Split into client, merge and server pieces, running the client piece
    /// once per partition of at most `partitions` groups. Computations
    /// without CLIENTS-placed input run as [`DispatchMode::Single`].
    Mergeable { partitions: usize },
}

/// Retry schedule for transient backend failures.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// `max_retries` immediate retries.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// The backoff following `current`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub dispatch: DispatchMode,
    pub retry: RetryPolicy,
    /// Per-attempt wait bound. Running out is a transient failure.
    pub invoke_timeout: Option<Duration>,
    pub pipeline: PipelineConfig,
}

impl ContextConfig {
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Single,
            retry: RetryPolicy::default(),
            invoke_timeout: None,
            pipeline: PipelineConfig::default(),
        }
    }
}
