//! Tree queries shared by the passes.

use fed_ir::{ensure_sufficient_stack, Arena, NodeFlags, NodeId, NodeKind};
use fed_types::Name;

/// Whether evaluating `node` performs a call. Calls under a lambda only
/// happen when the lambda is applied, so a lambda performs none.
pub fn performs_call(arena: &Arena, node: NodeId) -> bool {
    if !arena.flags(node).contains(NodeFlags::HAS_CALL) {
        return false;
    }
    ensure_sufficient_stack(|| match arena.kind(node) {
        NodeKind::Call { .. } => true,
        NodeKind::Lambda { .. } => false,
        _ => arena
            .children(node)
            .into_iter()
            .any(|child| performs_call(arena, child)),
    })
}

/// Whether `node` contains a call of an intrinsic registered as observable.
pub fn has_observable_call(arena: &Arena, node: NodeId) -> bool {
    let flags = arena.flags(node);
    if !flags.contains(NodeFlags::HAS_CALL | NodeFlags::HAS_INTRINSIC) {
        return false;
    }
    let registry = arena.registry();
    arena.postorder(node).into_iter().any(|id| {
        arena
            .intrinsic_call(id)
            .and_then(|(name, _)| registry.get(name))
            .is_some_and(|def| def.observable)
    })
}

/// Whether a free occurrence of `name` in `node` sits under a lambda.
pub fn used_under_lambda(arena: &Arena, node: NodeId, name: Name) -> bool {
    fn walk(arena: &Arena, node: NodeId, name: Name, under: bool) -> bool {
        if !arena.is_free_in(node, name) {
            return false;
        }
        ensure_sufficient_stack(|| match arena.kind(node) {
            NodeKind::Reference(_) => under,
            NodeKind::Lambda { body, .. } => walk(arena, *body, name, true),
            NodeKind::Block { locals, result } => {
                for &(binder, value) in locals.iter() {
                    if walk(arena, value, name, under) {
                        return true;
                    }
                    if binder == name {
                        return false;
                    }
                }
                walk(arena, *result, name, under)
            }
            _ => arena
                .children(node)
                .into_iter()
                .any(|child| walk(arena, child, name, under)),
        })
    }
    walk(arena, node, name, false)
}

/// Every binder name in the tree at `root`, one entry per distinct binding
/// node occurrence.
pub fn binders(arena: &Arena, root: NodeId) -> Vec<Name> {
    let mut out = Vec::new();
    for id in arena.postorder(root) {
        match arena.kind(id) {
            NodeKind::Lambda {
                param: Some(param), ..
            } => out.push(param.name),
            NodeKind::Block { locals, .. } => out.extend(locals.iter().map(|&(n, _)| n)),
            _ => {}
        }
    }
    out
}
