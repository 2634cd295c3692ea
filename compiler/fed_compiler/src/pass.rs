//! The pass interface.

use fed_ir::{Arena, NodeId};

use crate::{CompilerError, PipelineConfig};

/// Read-only context shared by every pass of one compilation.
#[derive(Copy, Clone, Debug)]
pub struct PassContext<'a> {
    pub config: &'a PipelineConfig,
}

/// A semantics-preserving tree rewrite.
///
/// Passes are pure functions of the tree: they hold no mutable state and
/// build their output in the arena they are given. Because the arena
/// hash-conses, a pass changed the tree iff the returned root differs from
/// the input root.
pub trait Pass: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(
        &self,
        cx: &PassContext<'_>,
        arena: &mut Arena,
        root: NodeId,
    ) -> Result<NodeId, CompilerError>;
}
