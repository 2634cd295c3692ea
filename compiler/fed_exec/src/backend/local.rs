//! In-process reference backend.

use std::sync::Arc;

use fed_ir::{Arena, NodeId};
use rustc_hash::FxHashMap;

use super::{Backend, Invocation, PendingResult};
use crate::eval::Evaluator;
use crate::leaf::{LeafExecutor, NoLeaves};
use crate::{BackendError, Cardinalities, Value};

/// Evaluates artifacts with the reference [`Evaluator`] on the rayon pool.
///
/// `Data` nodes resolve through URIs registered with
/// [`with_data`](LocalBackend::with_data); inline data holds a
/// bincode-encoded [`Value`].
#[derive(Clone)]
pub struct LocalBackend {
    leaves: Arc<dyn LeafExecutor>,
    data: Arc<FxHashMap<String, Value>>,
}

impl LocalBackend {
    pub fn new(leaves: Arc<dyn LeafExecutor>) -> Self {
        Self {
            leaves,
            data: Arc::default(),
        }
    }

    /// A backend for computations without compiled leaves.
    pub fn without_leaves() -> Self {
        Self::new(Arc::new(NoLeaves))
    }

    #[must_use]
    pub fn with_data(mut self, uri: impl Into<String>, value: Value) -> Self {
        Arc::make_mut(&mut self.data).insert(uri.into(), value);
        self
    }

    /// Evaluate `root` of `arena` on the calling thread.
    pub fn evaluate(
        &self,
        arena: &Arena,
        root: NodeId,
        arg: Option<Value>,
        cardinalities: Cardinalities,
    ) -> Result<Value, BackendError> {
        Evaluator::new(arena, self.leaves.as_ref(), &self.data, cardinalities).run(root, arg)
    }
}

impl Backend for LocalBackend {
    fn invoke(&self, invocation: Invocation) -> PendingResult {
        let (completer, pending) = PendingResult::channel();
        let backend = self.clone();
        rayon::spawn(move || {
            let result = if invocation.cancel.is_cancelled() {
                Err(BackendError::cancelled())
            } else {
                let artifact = &invocation.artifact;
                backend.evaluate(
                    artifact.arena(),
                    artifact.root(),
                    invocation.argument,
                    invocation.cardinalities,
                )
            };
            completer.complete(result);
        });
        pending
    }
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("data", &self.data.len())
            .finish_non_exhaustive()
    }
}
