//! Type re-derivation.
//!
//! [`infer_type`] recomputes every node's type from its children's types and
//! compares it with the type recorded at construction. Construction already
//! enforces this, so a failure here means a tree was assembled outside the
//! validating constructors (for example by a faulty decoder).

use std::sync::Arc;

use fed_types::{Field, TypeError, TypeFlags, TypeId};
use rustc_hash::FxHashSet;

use crate::stack::ensure_sufficient_stack;
use crate::{Arena, NodeId, NodeKind};

/// Re-derive the type of `root`, checking every node beneath it.
pub fn infer_type(arena: &mut Arena, root: NodeId) -> Result<TypeId, TypeError> {
    let mut checked = FxHashSet::default();
    check(arena, root, &mut checked)
}

fn check(
    arena: &mut Arena,
    id: NodeId,
    checked: &mut FxHashSet<NodeId>,
) -> Result<TypeId, TypeError> {
    if checked.contains(&id) {
        return Ok(arena.ty(id));
    }
    ensure_sufficient_stack(|| -> Result<(), TypeError> {
        for child in arena.children(id) {
            check(arena, child, checked)?;
        }
        Ok(())
    })?;

    let derived = derive(arena, id)?;
    let recorded = arena.ty(id);
    if derived != recorded {
        return Err(TypeError::Mismatch {
            context: format!("recorded type of {}", arena.render_short(id)),
            expected: arena.types().format(derived),
            found: arena.types().format(recorded),
        });
    }
    checked.insert(id);
    Ok(recorded)
}

/// The type `id` should have, given its children's types.
fn derive(arena: &mut Arena, id: NodeId) -> Result<TypeId, TypeError> {
    match arena.kind(id).clone() {
        NodeKind::Reference(_) | NodeKind::Data(_) => Ok(arena.ty(id)),
        NodeKind::Lambda { param, body } => {
            if let Some(param) = param {
                if let Some(used) = arena.free_type(body, param.name) {
                    if !arena.types().is_equivalent(used, param.ty) {
                        return Err(TypeError::Mismatch {
                            context: format!(
                                "reference `{}` bound by lambda",
                                arena.name_str(param.name)
                            ),
                            expected: arena.types().format(param.ty),
                            found: arena.types().format(used),
                        });
                    }
                }
            }
            let body_ty = arena.ty(body);
            Ok(arena.types_mut().function(param.map(|p| p.ty), body_ty))
        }
        NodeKind::Call { function, arg } => {
            let fn_ty = arena.ty(function);
            let Some((param, result)) = arena.types().function_parts(fn_ty) else {
                return Err(TypeError::UnexpectedKind {
                    context: format!("call of {}", arena.render_short(function)),
                    expected: "a function",
                    found: arena.types().format(fn_ty),
                });
            };
            match (param, arg) {
                (None, None) => {}
                (Some(_), None) => {
                    return Err(TypeError::MissingArgument {
                        function: arena.render_short(function),
                    })
                }
                (None, Some(arg)) => {
                    return Err(TypeError::UnexpectedArgument {
                        function: arena.render_short(function),
                        found: arena.types().format(arena.ty(arg)),
                    })
                }
                (Some(param), Some(arg)) => arena.types().check_assignable(
                    arena.ty(arg),
                    param,
                    &format!("argument of {}", arena.render_short(function)),
                )?,
            }
            Ok(result)
        }
        NodeKind::Block { locals, result } => {
            for (i, &(name, value)) in locals.iter().enumerate() {
                let bound = arena.ty(value);
                // Scopes up to and including the value of the next rebinding.
                let mut later = Vec::new();
                let mut shadowed = false;
                for &(other, v) in &locals[i + 1..] {
                    later.push(v);
                    if other == name {
                        shadowed = true;
                        break;
                    }
                }
                if !shadowed {
                    later.push(result);
                }
                for scope in later {
                    if let Some(used) = arena.free_type(scope, name) {
                        if !arena.types().is_equivalent(used, bound) {
                            return Err(TypeError::Mismatch {
                                context: format!(
                                    "reference `{}` bound by block binding",
                                    arena.name_str(name)
                                ),
                                expected: arena.types().format(bound),
                                found: arena.types().format(used),
                            });
                        }
                    }
                }
            }
            Ok(arena.ty(result))
        }
        NodeKind::Struct(elements) => {
            let fields = elements
                .iter()
                .map(|&(name, e)| Field {
                    name,
                    ty: arena.ty(e),
                })
                .collect();
            Ok(arena.types_mut().structure_of(fields))
        }
        NodeKind::Selection { source, index } => {
            let source_ty = arena.ty(source);
            let Some(fields) = arena.types().struct_fields(source_ty) else {
                return Err(TypeError::UnexpectedKind {
                    context: format!("selection from {}", arena.render_short(source)),
                    expected: "a struct",
                    found: arena.types().format(source_ty),
                });
            };
            fields
                .get(index as usize)
                .map(|f| f.ty)
                .ok_or_else(|| TypeError::IndexOutOfRange {
                    index: index as usize,
                    len: fields.len(),
                    source_type: arena.types().format(source_ty),
                })
        }
        NodeKind::Compiled(_) => {
            let ty = arena.ty(id);
            let placed = match arena.types().function_parts(ty) {
                Some((param, result)) => param
                    .into_iter()
                    .chain([result])
                    .any(|t| arena.types().flags(t).contains(TypeFlags::HAS_FEDERATED)),
                None => true,
            };
            if placed {
                return Err(TypeError::Incompatible {
                    requirement: "a leaf computation type",
                    found: arena.types().format(ty),
                    reason: "leaf computations operate on unplaced values".to_owned(),
                });
            }
            Ok(ty)
        }
        NodeKind::Intrinsic(name) => {
            let ty = arena.ty(id);
            let registry = Arc::clone(arena.registry());
            let def = registry.lookup(arena.name_str(name))?;
            def.check_type(arena.types_mut(), ty)?;
            Ok(ty)
        }
    }
}
