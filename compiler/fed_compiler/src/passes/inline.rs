//! Pass 2: inline references and reduce administrative redexes.
//!
//! Local rewrites, applied bottom-up:
//!
//! - `(x -> b)(a)` becomes `let x=a in b`; `(-> b)()` becomes `b`
//! - a block binding is substituted into its scope when its value performs
//!   no call, or when it is referenced at most `inline_fan_out` times and
//!   never from under a lambda
//! - nested blocks are flattened
//! - `<e_0, ..., e_n>[i]` becomes `e_i` when the dropped elements have no
//!   observable effect
//! - `let in r` becomes `r`

use fed_ir::{count_references, substitute, transform, Arena, NodeId, NodeKind, Order};
use fed_types::{Name, TypeError};

use crate::analysis::{has_observable_call, performs_call, used_under_lambda};
use crate::{CompilerError, Pass, PassContext};

#[derive(Copy, Clone, Debug, Default)]
pub struct InlineReferences;

impl Pass for InlineReferences {
    fn name(&self) -> &'static str {
        "inline_references"
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn run(
        &self,
        cx: &PassContext<'_>,
        arena: &mut Arena,
        root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        let fan_out = cx.config.inline_fan_out;
        let rewritten = transform(arena, root, Order::Post, |arena: &mut Arena, id| {
            reduce(arena, id, fan_out).map_err(CompilerError::from)
        })?;
        Ok(rewritten.root)
    }
}

fn reduce(arena: &mut Arena, id: NodeId, fan_out: usize) -> Result<Option<NodeId>, TypeError> {
    match arena.kind(id).clone() {
        NodeKind::Call { .. } => beta(arena, id),
        NodeKind::Selection { source, index } => Ok(fold_selection(arena, source, index)),
        NodeKind::Block { locals, result } => {
            let reduced = reduce_block(arena, &locals, result, fan_out)?;
            Ok((reduced != id).then_some(reduced))
        }
        _ => Ok(None),
    }
}

fn beta(arena: &mut Arena, id: NodeId) -> Result<Option<NodeId>, TypeError> {
    if !is_redex(arena, id) {
        return Ok(None);
    }
    let NodeKind::Call { function, arg } = *arena.kind(id) else {
        return Ok(None);
    };
    let NodeKind::Lambda { param, body } = *arena.kind(function) else {
        return Ok(None);
    };
    match (param, arg) {
        (Some(param), Some(arg)) => Ok(Some(arena.block(vec![(param.name, arg)], body)?)),
        _ => Ok(Some(body)),
    }
}

/// Whether `id` is a call the pass would beta-reduce. An argument merely
/// assignable to the parameter is left alone: binding it would retype the
/// parameter's uses.
pub(crate) fn is_redex(arena: &Arena, id: NodeId) -> bool {
    let NodeKind::Call { function, arg } = *arena.kind(id) else {
        return false;
    };
    let NodeKind::Lambda { param, .. } = *arena.kind(function) else {
        return false;
    };
    match (param, arg) {
        (Some(param), Some(arg)) => arena.types().is_equivalent(arena.ty(arg), param.ty),
        (None, None) => true,
        _ => false,
    }
}

pub(crate) fn fold_selection(arena: &Arena, source: NodeId, index: u32) -> Option<NodeId> {
    let NodeKind::Struct(elements) = arena.kind(source) else {
        return None;
    };
    let index = index as usize;
    let droppable = elements
        .iter()
        .enumerate()
        .all(|(i, &(_, e))| i == index || !has_observable_call(arena, e));
    if droppable {
        elements.get(index).map(|&(_, e)| e)
    } else {
        None
    }
}

fn reduce_block(
    arena: &mut Arena,
    locals: &[(Name, NodeId)],
    result: NodeId,
    fan_out: usize,
) -> Result<NodeId, TypeError> {
    let mut pending: Vec<(Name, NodeId)> = flatten_values(arena, locals, result);
    let mut result = result;

    // A block result that is itself a block continues the same scope.
    while let NodeKind::Block {
        locals: inner,
        result: inner_result,
    } = arena.kind(result).clone()
    {
        pending.extend(inner.iter().copied());
        result = inner_result;
    }

    let mut kept: Vec<(Name, NodeId)> = Vec::with_capacity(pending.len());
    let mut i = 0;
    while i < pending.len() {
        let (name, value) = pending[i];
        let later = &pending[i + 1..];
        if should_inline(arena, name, value, later, result, fan_out) {
            let (rest, new_result) = substitute_in_scope(arena, later, result, name, value)?;
            pending.truncate(i + 1);
            pending.extend(rest);
            result = new_result;
        } else {
            kept.push((name, value));
        }
        i += 1;
    }

    if kept.is_empty() {
        return Ok(result);
    }
    arena.block(kept, result)
}

/// Hoist the bindings of block-valued bindings into the enclosing block
/// when no hoisted name is visible to the rest of the block.
fn flatten_values(
    arena: &Arena,
    locals: &[(Name, NodeId)],
    result: NodeId,
) -> Vec<(Name, NodeId)> {
    let mut out = Vec::with_capacity(locals.len());
    for (i, &(name, value)) in locals.iter().enumerate() {
        if let NodeKind::Block {
            locals: inner,
            result: inner_result,
        } = arena.kind(value)
        {
            let rest = &locals[i + 1..];
            let hidden = inner.iter().all(|&(n, _)| {
                !arena.is_free_in(result, n)
                    && !rest.iter().any(|&(m, v)| m == n || arena.is_free_in(v, n))
                    && !out.iter().any(|&(m, _): &(Name, NodeId)| m == n)
            });
            if hidden {
                out.extend(inner.iter().copied());
                out.push((name, *inner_result));
                continue;
            }
        }
        out.push((name, value));
    }
    out
}

fn should_inline(
    arena: &Arena,
    name: Name,
    value: NodeId,
    later: &[(Name, NodeId)],
    result: NodeId,
    fan_out: usize,
) -> bool {
    // A later binder shadowing a free name of `value` would capture it.
    let capturing = later
        .iter()
        .take_while(|&&(n, _)| n != name)
        .any(|&(n, _)| arena.is_free_in(value, n));
    if capturing {
        return false;
    }

    // Uses typed with different field names would change their parents' types.
    let value_ty = arena.ty(value);
    let retyped = |node: NodeId| arena.free_type(node, name).is_some_and(|ty| ty != value_ty);

    let mut uses = 0;
    let mut under_lambda = false;
    let mut shadowed = false;
    for &(n, v) in later {
        if retyped(v) {
            return false;
        }
        uses += count_references(arena, v, name);
        under_lambda |= used_under_lambda(arena, v, name);
        if n == name {
            shadowed = true;
            break;
        }
    }
    if !shadowed {
        if retyped(result) {
            return false;
        }
        uses += count_references(arena, result, name);
        under_lambda |= used_under_lambda(arena, result, name);
    }

    // Unused bindings are left for `RemoveUnusedBindings`.
    if uses == 0 {
        return false;
    }
    !performs_call(arena, value) || (uses <= fan_out && !under_lambda)
}

/// Substitute `name := value` through later bindings and the result, up to
/// and including the value of the next rebinding of `name`.
fn substitute_in_scope(
    arena: &mut Arena,
    later: &[(Name, NodeId)],
    result: NodeId,
    name: Name,
    value: NodeId,
) -> Result<(Vec<(Name, NodeId)>, NodeId), TypeError> {
    let mut out = Vec::with_capacity(later.len());
    let mut active = true;
    for &(n, v) in later {
        if active {
            out.push((n, substitute(arena, v, name, value)?));
            active = n != name;
        } else {
            out.push((n, v));
        }
    }
    let result = if active {
        substitute(arena, result, name, value)?
    } else {
        result
    };
    Ok((out, result))
}
