//! Compiled artifacts.

use std::sync::Arc;

use fed_ir::{Arena, NodeId};
use fed_types::TypeId;

/// An immutable compiled computation in canonical form.
///
/// The arena holds only the artifact's tree, so artifacts are cheap to share
/// across threads and to serialize.
#[derive(Clone, Debug)]
pub struct Artifact {
    arena: Arc<Arena>,
    root: NodeId,
    source_hash: u64,
    pipeline: u64,
}

impl Artifact {
    pub(crate) fn new(arena: Arena, root: NodeId, source_hash: u64, pipeline: u64) -> Self {
        Self {
            arena: Arc::new(arena),
            root,
            source_hash,
            pipeline,
        }
    }

    #[inline]
    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn ty(&self) -> TypeId {
        self.arena.ty(self.root)
    }

    /// Parameter type when the artifact is a function taking one.
    pub fn param_type(&self) -> Option<TypeId> {
        self.arena.types().function_parts(self.ty())?.0
    }

    /// Result type when the artifact is a function, otherwise its own type.
    pub fn result_type(&self) -> TypeId {
        match self.arena.types().function_parts(self.ty()) {
            Some((_, result)) => result,
            None => self.ty(),
        }
    }

    pub fn is_function(&self) -> bool {
        self.arena.types().function_parts(self.ty()).is_some()
    }

    /// Content hash of the uniquified source this was compiled from.
    pub fn source_hash(&self) -> u64 {
        self.source_hash
    }

    /// Fingerprint of the pipeline that produced it.
    pub fn pipeline_fingerprint(&self) -> u64 {
        self.pipeline
    }

    pub fn content_hash(&self) -> u64 {
        self.arena.content_hash(self.root)
    }

    pub fn render(&self) -> String {
        self.arena.render(self.root)
    }

    pub fn format_type(&self) -> String {
        self.arena.types().format(self.ty())
    }
}
