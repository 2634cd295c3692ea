//! The backend boundary.
//!
//! A [`Backend`] runs one compiled artifact on one argument and answers
//! through a [`PendingResult`], a one-shot channel the dispatcher waits on.
//! Transport is opaque beyond this contract.

mod local;


pub use local::LocalBackend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use fed_compiler::Artifact;

use crate::{BackendError, Cardinalities, Phase, Value};

pub trait Backend: Send + Sync {
    /// Start running `invocation`. Must not block on the computation.
    fn invoke(&self, invocation: Invocation) -> PendingResult;
}

/// One backend call.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub artifact: Arc<Artifact>,
    pub argument: Option<Value>,
    pub cardinalities: Cardinalities,
    pub phase: Phase,
    /// Partition index for client pieces; for merges, the partition whose
    /// partial is being folded in. 0 otherwise.
    pub shard: usize,
    /// 1 for the first attempt.
    pub attempt: u32,
    pub cancel: CancelToken,
}

/// Shared cancellation flag. Backends should check it before and, where
/// possible, during work; honoring it is best-effort.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How often a waiting dispatcher re-checks its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(5);

/// The eventual result of a backend call.
#[derive(Debug)]
pub struct PendingResult {
    rx: Receiver<Result<Value, BackendError>>,
}

/// Completes the [`PendingResult`] it was created with.
#[derive(Debug)]
pub struct Completer {
    tx: Sender<Result<Value, BackendError>>,
}

impl Completer {
    pub fn complete(self, result: Result<Value, BackendError>) {
        // The waiter may have given up (timeout or cancellation).
        let _ = self.tx.send(result);
    }
}

impl PendingResult {
    pub fn channel() -> (Completer, PendingResult) {
        let (tx, rx) = channel::bounded(1);
        (Completer { tx }, PendingResult { rx })
    }

    /// A result that is already known.
    pub fn ready(result: Result<Value, BackendError>) -> Self {
        let (completer, pending) = Self::channel();
        completer.complete(result);
        pending
    }

    /// Block until the result arrives, `timeout` passes, or `cancel` is
    /// set. A timeout is a transient failure; a dropped completer is a
    /// permanent one.
    pub fn wait(
        self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<Value, BackendError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if cancel.is_cancelled() {
                return Err(BackendError::cancelled());
            }
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(BackendError::timed_out(timeout.unwrap_or_default()));
                    }
                    left.min(CANCEL_POLL)
                }
                None => CANCEL_POLL,
            };
            match self.rx.recv_timeout(slice) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BackendError::permanent(
                        "backend dropped the invocation without a result",
                    ));
                }
            }
        }
    }
}
