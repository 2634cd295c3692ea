//! Invocation state machine and handles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::Mutex;

use crate::backend::CancelToken;
use crate::{ExecError, Value};

/// Where an invocation is. States only move forward.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum InvocationState {
    Idle,
    Compiling,
    ResolvingCardinalities,
    /// Splitting and issuing backend calls.
    Dispatching,
    AwaitingResults,
    /// Folding partials and running the server piece.
    Merging,
    Done,
    Failed,
}

impl InvocationState {
    pub fn is_finished(self) -> bool {
        matches!(self, InvocationState::Done | InvocationState::Failed)
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvocationState::Idle => "idle",
            InvocationState::Compiling => "compiling",
            InvocationState::ResolvingCardinalities => "resolving cardinalities",
            InvocationState::Dispatching => "dispatching",
            InvocationState::AwaitingResults => "awaiting results",
            InvocationState::Merging => "merging",
            InvocationState::Done => "done",
            InvocationState::Failed => "failed",
        })
    }
}

/// What [`InvocationControl::cancel`] achieved.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CancelOutcome {
    /// Nothing had been dispatched; the invocation fails without side
    /// effects.
    Clean,
    /// Backend calls were in flight. They were signalled but may still
    /// consume backend resources; the invocation fails with
    /// [`ExecError::Cancelled`].
    BestEffort,
    AlreadyFinished,
}

/// State shared between a running invocation and its handles.
#[derive(Debug)]
pub(crate) struct Progress {
    state: Mutex<InvocationState>,
    cancel: CancelToken,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            state: Mutex::new(InvocationState::Idle),
            cancel: CancelToken::new(),
        }
    }
}

impl Progress {
    pub(crate) fn state(&self) -> InvocationState {
        *self.state.lock()
    }

    pub(crate) fn token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Move to `next`, unless cancellation was requested.
    pub(crate) fn enter(&self, next: InvocationState) -> Result<(), ExecError> {
        let mut state = self.state.lock();
        if self.cancel.is_cancelled() {
            let at = *state;
            *state = InvocationState::Failed;
            tracing::debug!(%at, "invocation cancelled");
            return Err(ExecError::Cancelled { state: at });
        }
        let from = *state;
        tracing::debug!(%from, to = %next, "invocation state");
        *state = next;
        Ok(())
    }

    pub(crate) fn finish(&self, result: &Result<Value, ExecError>) {
        let mut state = self.state.lock();
        let next = if result.is_ok() {
            InvocationState::Done
        } else {
            InvocationState::Failed
        };
        let from = *state;
        if from != next {
            tracing::debug!(%from, to = %next, "invocation state");
        }
        *state = next;
    }

    /// Flag cancellation. Decided under the state lock, so an invocation
    /// seen before [`InvocationState::Dispatching`] observes the flag
    /// before issuing any backend call.
    pub(crate) fn cancel(&self) -> CancelOutcome {
        let state = self.state.lock();
        if state.is_finished() {
            return CancelOutcome::AlreadyFinished;
        }
        self.cancel.cancel();
        if *state < InvocationState::Dispatching {
            CancelOutcome::Clean
        } else {
            CancelOutcome::BestEffort
        }
    }
}

/// Observes and cancels a running invocation.
#[derive(Clone, Debug)]
pub struct InvocationControl {
    pub(crate) progress: Arc<Progress>,
}

impl InvocationControl {
    pub fn state(&self) -> InvocationState {
        self.progress.state()
    }

    pub fn cancel(&self) -> CancelOutcome {
        self.progress.cancel()
    }
}

/// An asynchronous invocation and its eventual result.
#[derive(Debug)]
pub struct InvocationHandle {
    control: InvocationControl,
    rx: Receiver<Result<Value, ExecError>>,
    outcome: Option<Result<Value, ExecError>>,
}

impl InvocationHandle {
    pub(crate) fn new(control: InvocationControl, rx: Receiver<Result<Value, ExecError>>) -> Self {
        Self {
            control,
            rx,
            outcome: None,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.control.state()
    }

    pub fn cancel(&self) -> CancelOutcome {
        self.control.cancel()
    }

    pub fn control(&self) -> &InvocationControl {
        &self.control
    }

    /// The result, if the invocation has finished.
    pub fn poll(&mut self) -> Option<Result<Value, ExecError>> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(result) => self.outcome = Some(result),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.outcome = Some(Err(ExecError::Disconnected)),
            }
        }
        self.outcome.clone()
    }

    /// Block until the invocation finishes.
    pub fn wait(self) -> Result<Value, ExecError> {
        match self.outcome {
            Some(outcome) => outcome,
            None => self.rx.recv().unwrap_or(Err(ExecError::Disconnected)),
        }
    }

    /// Block for at most `timeout`; `None` if still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<Value, ExecError>> {
        if self.outcome.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(result) => self.outcome = Some(result),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => self.outcome = Some(Err(ExecError::Disconnected)),
            }
        }
        self.outcome.clone()
    }
}
