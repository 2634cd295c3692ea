//! Pass 3: drop block bindings nothing reads.

use fed_ir::{transform, Arena, NodeId, NodeKind, Order};
use fed_types::{Name, TypeError};
use rustc_hash::FxHashSet;

use crate::analysis::has_observable_call;
use crate::{CompilerError, Pass, PassContext};

/// Removes bindings whose name is unreferenced in its scope, unless the
/// bound value contains an observable intrinsic call. A block left without
/// bindings collapses to its result.
#[derive(Copy, Clone, Debug, Default)]
pub struct RemoveUnusedBindings;

impl Pass for RemoveUnusedBindings {
    fn name(&self) -> &'static str {
        "remove_unused_bindings"
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn run(
        &self,
        _cx: &PassContext<'_>,
        arena: &mut Arena,
        root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        let rewritten = transform(arena, root, Order::Post, |arena: &mut Arena, id| {
            prune(arena, id).map_err(CompilerError::from)
        })?;
        Ok(rewritten.root)
    }
}

fn prune(arena: &mut Arena, id: NodeId) -> Result<Option<NodeId>, TypeError> {
    let NodeKind::Block { locals, result } = arena.kind(id).clone() else {
        return Ok(None);
    };

    // Walk back from the result, tracking which names are still read.
    let mut needed: FxHashSet<Name> = arena.free_names(result).iter().map(|&(n, _)| n).collect();
    let mut kept: Vec<(Name, NodeId)> = Vec::with_capacity(locals.len());
    for &(name, value) in locals.iter().rev() {
        let used = needed.remove(&name);
        if used || has_observable_call(arena, value) {
            needed.extend(arena.free_names(value).iter().map(|&(n, _)| n));
            kept.push((name, value));
        }
    }
    if kept.len() == locals.len() {
        return Ok(None);
    }
    if kept.is_empty() {
        return Ok(Some(result));
    }
    kept.reverse();
    Ok(Some(arena.block(kept, result)?))
}
