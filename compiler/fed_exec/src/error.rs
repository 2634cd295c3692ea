//! Execution errors.

use std::fmt;
use std::time::Duration;

use fed_compiler::CompilerError;
use fed_split::UnsplittableComputationError;
use fed_types::TypeError;

use crate::InvocationState;

/// How a backend failure should be treated by the dispatcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BackendErrorKind {
    /// Retried up to the configured bound.
    Transient,
    /// Surfaced immediately.
    Permanent,
    /// The invocation observed its cancel token.
    Cancelled,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendErrorKind::Transient => "transient",
            BackendErrorKind::Permanent => "permanent",
            BackendErrorKind::Cancelled => "cancelled",
        })
    }
}

/// A failed backend or leaf invocation.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind} backend failure: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: BackendErrorKind::Cancelled,
            message: "invocation cancelled".to_owned(),
        }
    }

    /// A result that did not arrive in time. Timeouts are transient.
    pub fn timed_out(after: Duration) -> Self {
        Self::transient(format!("no result after {after:?}"))
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }
}

/// Which artifact a backend invocation runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    /// The whole computation, unsplit.
    Single,
    /// The client piece on one partition.
    Client,
    /// The merge step on two partials.
    Merge,
    /// The server piece on the merged partials.
    Server,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Single => "single",
            Phase::Client => "client",
            Phase::Merge => "merge",
            Phase::Server => "server",
        })
    }
}

/// Every way an invocation can fail.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error(transparent)]
    Unsplittable(#[from] UnsplittableComputationError),

    #[error("{phase} invocation (shard {shard}) failed: {source}")]
    Backend {
        phase: Phase,
        shard: usize,
        #[source]
        source: BackendError,
    },

    #[error("{phase} invocation (shard {shard}) failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        phase: Phase,
        shard: usize,
        attempts: u32,
        #[source]
        last: BackendError,
    },

    #[error("invocation cancelled while {state}")]
    Cancelled { state: InvocationState },

    #[error("{path} has {found} CLIENTS members, expected {expected}")]
    CardinalityMismatch {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("{path} is per-participant CLIENTS but no argument value fixes the client count")]
    UnknownCardinality { path: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invocation worker disconnected before reporting a result")]
    Disconnected,
}

impl ExecError {
    /// Whether retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExecError::Backend { source, .. } if source.is_transient())
    }
}
