//! Execution context: compile, dispatch, retry, merge.
//!
//! An [`ExecutionContext`] owns the compiler pipeline, the mergeable
//! splitter and a [`Backend`]. Each invocation walks the
//! [`InvocationState`] machine:
//!
//! ```text
//! Idle -> Compiling -> ResolvingCardinalities -> Dispatching
//!      -> AwaitingResults [-> Merging] -> Done | Failed
//! ```
//!
//! In mergeable mode the client piece runs once per partition on scoped
//! threads, the partials are folded with the merge piece in partition
//! order, and the server piece runs last. A transient backend failure
//! retries only the failed call.

mod config;
mod state;

#[cfg(test)]
mod tests;

pub use config::{ContextConfig, DispatchMode, RetryPolicy};
pub use state::{CancelOutcome, InvocationControl, InvocationHandle, InvocationState};

use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use fed_compiler::{Artifact, Pipeline};
use fed_ir::{Arena, IntrinsicRegistry, NodeId};
use fed_split::MergeableCompiler;
use fed_types::TypeFlags;

use crate::backend::{Backend, Invocation};
use crate::cardinality::{
    infer_cardinalities, partition_ranges, slice_clients, strip_clients, Cardinalities,
};
use crate::value::conform;
use crate::{BackendErrorKind, ExecError, Phase, Value};
use state::Progress;

/// A computation ready to be invoked: an arena and the root of the tree.
#[derive(Clone)]
pub struct Computation {
    arena: Arc<Arena>,
    root: NodeId,
}

impl Computation {
    pub fn new(arena: Arena, root: NodeId) -> Self {
        Self::shared(Arc::new(arena), root)
    }

    pub fn shared(arena: Arc<Arena>, root: NodeId) -> Self {
        Self { arena, root }
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn root(&self) -> NodeId {
        self.root
    }
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Computation")
            .field(&self.arena.render_short(self.root))
            .finish()
    }
}

pub struct ExecutionContext {
    pipeline: Pipeline,
    splitter: MergeableCompiler,
    backend: Arc<dyn Backend>,
    config: ContextConfig,
}

impl ExecutionContext {
    pub fn new(
        registry: Arc<IntrinsicRegistry>,
        backend: Arc<dyn Backend>,
        config: ContextConfig,
    ) -> Self {
        Self {
            pipeline: Pipeline::new(config.pipeline),
            splitter: MergeableCompiler::new(registry, config.pipeline),
            backend,
            config,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn splitter(&self) -> &MergeableCompiler {
        &self.splitter
    }

    /// Run `computation` on `argument` and block for the result.
    pub fn invoke(
        &self,
        computation: &Computation,
        argument: Option<Value>,
    ) -> Result<Value, ExecError> {
        let progress = Progress::default();
        let result = self.run(&progress, computation, argument);
        progress.finish(&result);
        result
    }

    /// Start `computation` on a worker thread.
    pub fn invoke_async(
        self: &Arc<Self>,
        computation: Computation,
        argument: Option<Value>,
    ) -> InvocationHandle {
        let (tx, rx) = channel::bounded(1);
        let control = self.spawn(computation, argument, move |result| {
            // The handle may already be gone.
            let _ = tx.send(result);
        });
        InvocationHandle::new(control, rx)
    }

    /// Start `computation` on a worker thread and hand the result to
    /// `callback` on that thread.
    pub fn invoke_with_callback<F>(
        self: &Arc<Self>,
        computation: Computation,
        argument: Option<Value>,
        callback: F,
    ) -> InvocationControl
    where
        F: FnOnce(Result<Value, ExecError>) + Send + 'static,
    {
        self.spawn(computation, argument, callback)
    }

    fn spawn<F>(
        self: &Arc<Self>,
        computation: Computation,
        argument: Option<Value>,
        done: F,
    ) -> InvocationControl
    where
        F: FnOnce(Result<Value, ExecError>) + Send + 'static,
    {
        let progress = Arc::new(Progress::default());
        let control = InvocationControl {
            progress: Arc::clone(&progress),
        };
        let context = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("fed-invoke".to_owned())
            .spawn(move || {
                let result = context.run(&progress, &computation, argument);
                progress.finish(&result);
                done(result);
            });
        if let Err(err) = spawned {
            tracing::error!(%err, "failed to spawn invocation worker");
            control.progress.finish(&Err(ExecError::Disconnected));
        }
        control
    }

    #[tracing::instrument(level = "debug", skip_all, fields(root = ?computation))]
    fn run(
        &self,
        progress: &Progress,
        computation: &Computation,
        argument: Option<Value>,
    ) -> Result<Value, ExecError> {
        progress.enter(InvocationState::Compiling)?;
        let artifact = self.pipeline.compile(&computation.arena, computation.root)?;

        progress.enter(InvocationState::ResolvingCardinalities)?;
        let argument = bind_argument(&artifact, argument)?;
        let cardinalities = match (&argument, artifact.param_type()) {
            (Some(value), Some(ty)) => infer_cardinalities(artifact.arena().types(), ty, value)?,
            _ => Cardinalities::default(),
        };
        tracing::debug!(clients = cardinalities.clients, "resolved cardinalities");

        progress.enter(InvocationState::Dispatching)?;
        match self.config.dispatch {
            DispatchMode::Mergeable { partitions } if takes_clients(&artifact) => {
                self.run_mergeable(progress, &artifact, argument, cardinalities, partitions)
            }
            _ => {
                progress.enter(InvocationState::AwaitingResults)?;
                self.call(progress, Phase::Single, 0, &artifact, argument, cardinalities)
            }
        }
    }

    fn run_mergeable(
        &self,
        progress: &Progress,
        artifact: &Arc<Artifact>,
        argument: Option<Value>,
        cardinalities: Cardinalities,
        partitions: usize,
    ) -> Result<Value, ExecError> {
        let form = self.splitter.split(artifact)?;
        let argument = argument.ok_or_else(|| {
            ExecError::InvalidArgument("computation expects an argument".to_owned())
        })?;
        let ranges = partition_ranges(cardinalities.clients, partitions);
        tracing::debug!(partitions = ranges.len(), "dispatching client pieces");

        let (partials, awaiting) = thread::scope(|scope| {
            let workers: Vec<_> = ranges
                .iter()
                .enumerate()
                .map(|(shard, range)| {
                    let slice = slice_clients(&argument, range);
                    let shard_cardinalities = Cardinalities {
                        clients: range.len(),
                    };
                    let client = &form.client;
                    scope.spawn(move || {
                        self.call(
                            progress,
                            Phase::Client,
                            shard,
                            client,
                            Some(slice),
                            shard_cardinalities,
                        )
                    })
                })
                .collect();
            let awaiting = progress.enter(InvocationState::AwaitingResults);
            let partials: Vec<_> = workers
                .into_iter()
                .map(|worker| worker.join().unwrap_or(Err(ExecError::Disconnected)))
                .collect();
            (partials, awaiting)
        });
        awaiting?;
        let partials = partials.into_iter().collect::<Result<Vec<_>, _>>()?;

        progress.enter(InvocationState::Merging)?;
        let mut partials = partials.into_iter();
        let Some(mut merged) = partials.next() else {
            return Err(ExecError::Disconnected);
        };
        for (step, partial) in partials.enumerate() {
            merged = self.call(
                progress,
                Phase::Merge,
                step + 1,
                &form.merge,
                Some(Value::tuple([merged, partial])),
                Cardinalities::default(),
            )?;
        }

        let state = match artifact.param_type() {
            Some(ty) => strip_clients(artifact.arena().types(), ty, &argument),
            None => argument,
        };
        self.call(
            progress,
            Phase::Server,
            0,
            &form.server,
            Some(Value::tuple([state, merged])),
            cardinalities,
        )
    }

    /// One backend call with retries.
    fn call(
        &self,
        progress: &Progress,
        phase: Phase,
        shard: usize,
        artifact: &Arc<Artifact>,
        argument: Option<Value>,
        cardinalities: Cardinalities,
    ) -> Result<Value, ExecError> {
        let retry = &self.config.retry;
        let mut backoff = retry.initial_backoff;
        let mut attempt = 1;
        loop {
            let token = progress.token();
            let pending = self.backend.invoke(Invocation {
                artifact: Arc::clone(artifact),
                argument: argument.clone(),
                cardinalities,
                phase,
                shard,
                attempt,
                cancel: token.clone(),
            });
            let error = match pending.wait(self.config.invoke_timeout, token) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            match error.kind {
                BackendErrorKind::Cancelled => {
                    return Err(ExecError::Cancelled {
                        state: progress.state(),
                    });
                }
                BackendErrorKind::Permanent => {
                    return Err(ExecError::Backend {
                        phase,
                        shard,
                        source: error,
                    });
                }
                BackendErrorKind::Transient if attempt > retry.max_retries => {
                    return Err(ExecError::RetriesExhausted {
                        phase,
                        shard,
                        attempts: attempt,
                        last: error,
                    });
                }
                BackendErrorKind::Transient => {
                    tracing::warn!(%phase, shard, attempt, %error, "retrying backend call");
                    thread::sleep(backoff);
                    backoff = retry.next_backoff(backoff);
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("config", &self.config)
            .field("compiled", &self.pipeline.cache_len())
            .field("split", &self.splitter.cache_len())
            .finish_non_exhaustive()
    }
}

/// Check the argument against the artifact's parameter, binding struct
/// fields by position.
fn bind_argument(
    artifact: &Artifact,
    argument: Option<Value>,
) -> Result<Option<Value>, ExecError> {
    let types = artifact.arena().types();
    match (artifact.param_type(), argument) {
        (Some(ty), Some(value)) => conform(types, ty, value)
            .map(Some)
            .map_err(|err| ExecError::InvalidArgument(err.to_string())),
        (Some(ty), None) => Err(ExecError::InvalidArgument(format!(
            "computation expects an argument of type `{}`",
            types.format(ty)
        ))),
        (None, Some(_)) if artifact.is_function() => Err(ExecError::InvalidArgument(
            "computation takes no argument".to_owned(),
        )),
        (None, Some(_)) => Err(ExecError::InvalidArgument(
            "computation is not a function".to_owned(),
        )),
        (None, None) => Ok(None),
    }
}

fn takes_clients(artifact: &Artifact) -> bool {
    artifact
        .param_type()
        .is_some_and(|ty| artifact.arena().types().flags(ty).contains(TypeFlags::AT_CLIENTS))
}
