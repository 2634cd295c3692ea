//! Pass 1: give every binder a unique name.

use fed_ir::{ensure_sufficient_stack, Arena, NameGenerator, NodeFlags, NodeId, NodeKind, Param};
use fed_types::{Name, TypeError};

use crate::{CompilerError, Pass, PassContext};

/// Renames every lambda and block binder to `_varN`, numbering binders in
/// preorder and skipping the root's free names.
///
/// Numbering depends only on the tree's shape, so alpha-equivalent inputs
/// produce identical outputs and the pass is idempotent.
#[derive(Copy, Clone, Debug, Default)]
pub struct UniquifyNames;

impl Pass for UniquifyNames {
    fn name(&self) -> &'static str {
        "uniquify_names"
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn run(
        &self,
        _cx: &PassContext<'_>,
        arena: &mut Arena,
        root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        Ok(uniquify(arena, root)?)
    }
}

/// Apply [`UniquifyNames`] outside a pipeline.
pub fn uniquify(arena: &mut Arena, root: NodeId) -> Result<NodeId, TypeError> {
    let mut names = NameGenerator::new(NameGenerator::DEFAULT_PREFIX);
    let free: Vec<String> = arena
        .free_names(root)
        .iter()
        .map(|&(n, _)| arena.name_str(n).to_owned())
        .collect();
    for name in &free {
        names.reserve(name);
    }
    let mut renamer = Renamer {
        names,
        scope: Vec::new(),
    };
    renamer.rename(arena, root)
}

struct Renamer {
    names: NameGenerator,
    /// `(original, renamed)`, innermost last.
    scope: Vec<(Name, Name)>,
}

impl Renamer {
    fn lookup(&self, name: Name) -> Option<Name> {
        self.scope
            .iter()
            .rev()
            .find(|&&(from, _)| from == name)
            .map(|&(_, to)| to)
    }

    /// Nothing below `id` is bound or renamed.
    fn untouched(&self, arena: &Arena, id: NodeId) -> bool {
        !arena
            .flags(id)
            .intersects(NodeFlags::HAS_LAMBDA | NodeFlags::HAS_BLOCK)
            && arena
                .free_names(id)
                .iter()
                .all(|&(n, _)| self.lookup(n).is_none())
    }

    fn rename(&mut self, arena: &mut Arena, id: NodeId) -> Result<NodeId, TypeError> {
        if self.untouched(arena, id) {
            return Ok(id);
        }
        ensure_sufficient_stack(|| match arena.kind(id).clone() {
            NodeKind::Reference(name) => Ok(match self.lookup(name) {
                Some(to) => {
                    let ty = arena.ty(id);
                    arena.reference(to, ty)
                }
                None => id,
            }),
            NodeKind::Lambda { param, body } => match param {
                Some(param) => {
                    let fresh = self.names.fresh(arena);
                    self.scope.push((param.name, fresh));
                    let body = self.rename(arena, body);
                    self.scope.pop();
                    arena.lambda(
                        Some(Param {
                            name: fresh,
                            ty: param.ty,
                        }),
                        body?,
                    )
                }
                None => {
                    let body = self.rename(arena, body)?;
                    arena.lambda(None, body)
                }
            },
            NodeKind::Block { locals, result } => {
                let depth = self.scope.len();
                let renamed = self.rename_block(arena, &locals, result);
                self.scope.truncate(depth);
                let (locals, result) = renamed?;
                arena.block(locals, result)
            }
            _ => arena.map_children(id, |arena, child| self.rename(arena, child)),
        })
    }

    /// Leaves the block's bindings on the scope stack; the caller pops them.
    fn rename_block(
        &mut self,
        arena: &mut Arena,
        locals: &[(Name, NodeId)],
        result: NodeId,
    ) -> Result<(Vec<(Name, NodeId)>, NodeId), TypeError> {
        let mut out = Vec::with_capacity(locals.len());
        for &(name, value) in locals {
            let value = self.rename(arena, value)?;
            let fresh = self.names.fresh(arena);
            self.scope.push((name, fresh));
            out.push((fresh, value));
        }
        let result = self.rename(arena, result)?;
        Ok((out, result))
    }
}
