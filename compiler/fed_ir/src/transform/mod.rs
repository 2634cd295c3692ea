//! Tree transformation engine.
//!
//! Rewrites are expressed as visitors returning `Some(replacement)` or
//! `None`. Only the path from a changed node to the root is rebuilt;
//! unchanged subtrees keep their ids. Because the arena hash-conses, a
//! rewrite changed the tree iff the root id changed.
//!
//! # Traversal orders
//!
//! - [`Order::Pre`]: visit a node before its children. A replaced node is
//!   not descended into.
//! - [`Order::Post`]: rebuild children first, then visit the rebuilt node.

mod names;
mod substitute;

#[cfg(test)]
mod tests;

use fed_types::TypeError;
use rustc_hash::FxHashMap;

use crate::stack::ensure_sufficient_stack;
use crate::{Arena, NodeId};

pub use names::{collect_names, NameGenerator};
pub use substitute::{contains_reference, count_references, rename, substitute};

/// Traversal order of [`transform`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Order {
    Pre,
    Post,
}

/// Result of a transformation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rewritten {
    pub root: NodeId,
    pub changed: bool,
}

impl Rewritten {
    pub fn unchanged(root: NodeId) -> Self {
        Self {
            root,
            changed: false,
        }
    }
}

/// Apply `visit` across the tree at `root`.
///
/// Results are memoized per node id within one call, so shared subtrees are
/// rewritten once. The visitor must therefore depend only on the node it is
/// given, not on where it occurs.
pub fn transform<E, V>(
    arena: &mut Arena,
    root: NodeId,
    order: Order,
    mut visit: V,
) -> Result<Rewritten, E>
where
    E: From<TypeError>,
    V: FnMut(&mut Arena, NodeId) -> Result<Option<NodeId>, E>,
{
    let mut memo = FxHashMap::default();
    let new_root = walk(arena, root, order, &mut visit, &mut memo)?;
    Ok(Rewritten {
        root: new_root,
        changed: new_root != root,
    })
}

fn walk<E, V>(
    arena: &mut Arena,
    id: NodeId,
    order: Order,
    visit: &mut V,
    memo: &mut FxHashMap<NodeId, NodeId>,
) -> Result<NodeId, E>
where
    E: From<TypeError>,
    V: FnMut(&mut Arena, NodeId) -> Result<Option<NodeId>, E>,
{
    if let Some(&done) = memo.get(&id) {
        return Ok(done);
    }
    let result = ensure_sufficient_stack(|| match order {
        Order::Pre => {
            if let Some(new) = visit(arena, id)? {
                if new != id {
                    return Ok(new);
                }
            }
            arena.map_children(id, |arena, child| walk(arena, child, order, visit, memo))
        }
        Order::Post => {
            let rebuilt =
                arena.map_children(id, |arena, child| walk(arena, child, order, visit, memo))?;
            Ok(visit(arena, rebuilt)?.unwrap_or(rebuilt))
        }
    })?;
    memo.insert(id, result);
    Ok(result)
}

/// Replace specific nodes, wherever they occur, by their mapped ids.
///
/// Replacement nodes are not descended into.
pub fn replace_nodes(
    arena: &mut Arena,
    root: NodeId,
    map: &FxHashMap<NodeId, NodeId>,
) -> Result<NodeId, TypeError> {
    let rewritten = transform(
        arena,
        root,
        Order::Pre,
        |_: &mut Arena, id: NodeId| -> Result<Option<NodeId>, TypeError> {
            Ok(map.get(&id).copied())
        },
    )?;
    Ok(rewritten.root)
}
