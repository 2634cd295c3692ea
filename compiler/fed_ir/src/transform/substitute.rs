//! Capture-avoiding substitution and reference counting.

use fed_types::{Name, TypeError};
use rustc_hash::FxHashMap;

use super::NameGenerator;
use crate::stack::ensure_sufficient_stack;
use crate::{Arena, NodeId, NodeKind, Param};

#[derive(Copy, Clone)]
enum Replacement {
    /// Replace free references by this node.
    Node(NodeId),
    /// Rename free references, keeping each reference's own type.
    Rename(Name),
}

/// Replace free references to `name` in `node` by `replacement`.
///
/// A binder on the way that would capture a free name of `replacement` is
/// renamed first.
pub fn substitute(
    arena: &mut Arena,
    node: NodeId,
    name: Name,
    replacement: NodeId,
) -> Result<NodeId, TypeError> {
    let names = NameGenerator::avoiding(arena, &[node, replacement]);
    Substituter::new(name, Replacement::Node(replacement), names).run(arena, node)
}

/// Rename free references to `from` in `node` to `to`.
///
/// `to` must not be bound anywhere inside `node`.
pub fn rename(arena: &mut Arena, node: NodeId, from: Name, to: Name) -> Result<NodeId, TypeError> {
    Substituter::new(from, Replacement::Rename(to), NameGenerator::default()).run(arena, node)
}

struct Substituter {
    name: Name,
    replacement: Replacement,
    names: NameGenerator,
    memo: FxHashMap<NodeId, NodeId>,
}

impl Substituter {
    fn new(name: Name, replacement: Replacement, names: NameGenerator) -> Self {
        Self {
            name,
            replacement,
            names,
            memo: FxHashMap::default(),
        }
    }

    /// Whether binding `binder` around the replacement would capture it.
    fn captures(&self, arena: &Arena, binder: Name) -> bool {
        match self.replacement {
            Replacement::Node(node) => arena.is_free_in(node, binder),
            Replacement::Rename(to) => binder == to,
        }
    }

    fn run(&mut self, arena: &mut Arena, id: NodeId) -> Result<NodeId, TypeError> {
        if !arena.is_free_in(id, self.name) {
            return Ok(id);
        }
        if let Some(&done) = self.memo.get(&id) {
            return Ok(done);
        }
        let result = ensure_sufficient_stack(|| self.rewrite(arena, id))?;
        self.memo.insert(id, result);
        Ok(result)
    }

    fn rewrite(&mut self, arena: &mut Arena, id: NodeId) -> Result<NodeId, TypeError> {
        match arena.kind(id).clone() {
            // The only free name of a reference is its own.
            NodeKind::Reference(_) => Ok(match self.replacement {
                Replacement::Node(node) => node,
                Replacement::Rename(to) => {
                    let ty = arena.ty(id);
                    arena.reference(to, ty)
                }
            }),
            NodeKind::Lambda {
                param: Some(param),
                body,
            } => {
                let (param, body) = if self.captures(arena, param.name) {
                    let fresh = self.names.fresh(arena);
                    let body = rename(arena, body, param.name, fresh)?;
                    (
                        Param {
                            name: fresh,
                            ty: param.ty,
                        },
                        body,
                    )
                } else {
                    (param, body)
                };
                let body = self.run(arena, body)?;
                arena.lambda(Some(param), body)
            }
            NodeKind::Block { locals, result } => self.rewrite_block(arena, &locals, result),
            _ => arena.map_children(id, |arena, child| self.run(arena, child)),
        }
    }

    fn rewrite_block(
        &mut self,
        arena: &mut Arena,
        locals: &[(Name, NodeId)],
        result: NodeId,
    ) -> Result<NodeId, TypeError> {
        let mut rest: Vec<(Name, NodeId)> = locals.to_vec();
        let mut result = result;
        let mut out = Vec::with_capacity(rest.len());
        let mut active = true;

        for i in 0..rest.len() {
            let (binder, value) = rest[i];
            let value = if active { self.run(arena, value)? } else { value };
            if active && binder == self.name {
                // Shadowed from here on.
                active = false;
                out.push((binder, value));
            } else if active && self.captures(arena, binder) {
                let fresh = self.names.fresh(arena);
                rename_in_scope(arena, &mut rest[i + 1..], &mut result, binder, fresh)?;
                out.push((fresh, value));
            } else {
                out.push((binder, value));
            }
        }
        if active {
            result = self.run(arena, result)?;
        }
        arena.block(out, result)
    }
}

/// Rename `from` to `to` in later bindings and the result, stopping after
/// the value of the next binding that rebinds `from`.
fn rename_in_scope(
    arena: &mut Arena,
    later: &mut [(Name, NodeId)],
    result: &mut NodeId,
    from: Name,
    to: Name,
) -> Result<(), TypeError> {
    for (binder, value) in later.iter_mut() {
        *value = rename(arena, *value, from, to)?;
        if *binder == from {
            return Ok(());
        }
    }
    *result = rename(arena, *result, from, to)?;
    Ok(())
}

/// Number of free occurrences of `name` in `node`, counting shared subtrees
/// once per use.
pub fn count_references(arena: &Arena, node: NodeId, name: Name) -> usize {
    if !arena.is_free_in(node, name) {
        return 0;
    }
    ensure_sufficient_stack(|| match arena.kind(node) {
        NodeKind::Reference(_) => 1,
        NodeKind::Block { locals, result } => {
            let mut total = 0;
            for &(binder, value) in locals.iter() {
                total += count_references(arena, value, name);
                if binder == name {
                    return total;
                }
            }
            total + count_references(arena, *result, name)
        }
        _ => arena
            .children(node)
            .into_iter()
            .map(|child| count_references(arena, child, name))
            .sum(),
    })
}

/// Whether `name` occurs free in `node`.
pub fn contains_reference(arena: &Arena, node: NodeId, name: Name) -> bool {
    arena.is_free_in(node, name)
}
