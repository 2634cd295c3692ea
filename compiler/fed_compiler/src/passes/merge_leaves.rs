//! Pass 4: fuse compiled leaves connected by struct/selection glue.
//!
//! A glue region is a maximal tree of unplaced `Struct` and `Selection`
//! nodes and compiled-leaf calls. When it contains two or more distinct
//! leaf calls it becomes a single call of a [`LeafProgram::Fused`] leaf
//! whose argument is the tuple of the region's distinct external inputs.

use fed_ir::{
    transform, Arena, FusedProgram, FusedStage, GlueExpr, LeafProgram, NodeFlags, NodeId,
    NodeKind, Order,
};
use fed_types::{TypeError, TypeFlags};
use rustc_hash::FxHashMap;

use crate::{CompilerError, Pass, PassContext};

#[derive(Copy, Clone, Debug, Default)]
pub struct MergeCompiledLeaves;

impl Pass for MergeCompiledLeaves {
    fn name(&self) -> &'static str {
        "merge_compiled_leaves"
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn run(
        &self,
        cx: &PassContext<'_>,
        arena: &mut Arena,
        root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        if !cx.config.merge_leaves || !arena.flags(root).contains(NodeFlags::HAS_COMPILED) {
            return Ok(root);
        }
        let rewritten = transform(arena, root, Order::Pre, |arena: &mut Arena, id| {
            fuse(arena, id).map_err(CompilerError::from)
        })?;
        Ok(rewritten.root)
    }
}

/// The glue region rooted at `id`, if `id` can root one.
pub(crate) fn region(arena: &Arena, id: NodeId) -> Option<Region> {
    if !arena.flags(id).contains(NodeFlags::HAS_COMPILED) || !is_glue_type(arena, id) {
        return None;
    }
    let rooted = match arena.kind(id) {
        NodeKind::Struct(_) | NodeKind::Selection { .. } => true,
        NodeKind::Call { function, .. } => matches!(arena.kind(*function), NodeKind::Compiled(_)),
        _ => false,
    };
    if !rooted {
        return None;
    }
    let mut region = Region::default();
    let output = region.collect(arena, id)?;
    region.output = Some(output);
    Some(region)
}

fn fuse(arena: &mut Arena, id: NodeId) -> Result<Option<NodeId>, TypeError> {
    let Some(region) = region(arena, id) else {
        return Ok(None);
    };
    if region.stages.len() < 2 {
        return Ok(None);
    }
    let Region {
        stages,
        externals,
        output,
        ..
    } = region;
    let Some(output) = output else {
        return Ok(None);
    };

    let result_ty = arena.ty(id);
    let (param_ty, arg) = if externals.is_empty() {
        (None, None)
    } else {
        let tys: Vec<_> = externals.iter().map(|&e| arena.ty(e)).collect();
        let param_ty = arena.types_mut().tuple(&tys);
        (Some(param_ty), Some(arena.tuple(&externals)?))
    };
    let fn_ty = arena.types_mut().function(param_ty, result_ty);
    let program = LeafProgram::Fused(FusedProgram { stages, output });
    let leaf = arena.compiled(program, fn_ty)?;
    tracing::trace!(leaves = leaf_count(arena, leaf), "fused compiled leaves");
    Ok(Some(arena.call(leaf, arg)?))
}

fn leaf_count(arena: &Arena, leaf: NodeId) -> usize {
    match arena.kind(leaf) {
        NodeKind::Compiled(id) => arena.leaf(*id).leaf_count(),
        _ => 0,
    }
}

/// Values flowing through glue must be plain data.
fn is_glue_type(arena: &Arena, id: NodeId) -> bool {
    !arena
        .types()
        .flags(arena.ty(id))
        .intersects(TypeFlags::HAS_FEDERATED | TypeFlags::HAS_FUNCTION)
}

#[derive(Default)]
pub(crate) struct Region {
    pub(crate) stages: Vec<FusedStage>,
    stage_ids: FxHashMap<NodeId, u32>,
    externals: Vec<NodeId>,
    external_ids: FxHashMap<NodeId, u32>,
    output: Option<GlueExpr>,
}

impl Region {
    /// Glue for `id`. `None` when the region reaches a value a leaf
    /// cannot receive.
    fn collect(&mut self, arena: &Arena, id: NodeId) -> Option<GlueExpr> {
        if let Some(&k) = self.stage_ids.get(&id) {
            return Some(GlueExpr::Stage(k));
        }
        match arena.kind(id) {
            NodeKind::Call { function, arg } => {
                if let NodeKind::Compiled(leaf) = arena.kind(*function) {
                    // Inputs first, so a stage only reads earlier stages.
                    let input = match arg {
                        Some(arg) => Some(self.collect(arena, *arg)?),
                        None => None,
                    };
                    let k = u32::try_from(self.stages.len()).ok()?;
                    self.stages.push(FusedStage {
                        program: arena.leaf(*leaf).clone(),
                        input,
                    });
                    self.stage_ids.insert(id, k);
                    return Some(GlueExpr::Stage(k));
                }
            }
            NodeKind::Struct(elements)
                if arena.flags(id).contains(NodeFlags::HAS_COMPILED) && is_glue_type(arena, id) =>
            {
                let mut glue = Vec::with_capacity(elements.len());
                for &(name, element) in elements.iter() {
                    let name = name.map(|n| arena.name_str(n).to_owned());
                    glue.push((name, self.collect(arena, element)?));
                }
                return Some(GlueExpr::Struct(glue));
            }
            NodeKind::Selection { source, index }
                if arena.flags(*source).contains(NodeFlags::HAS_COMPILED)
                    && is_glue_type(arena, *source) =>
            {
                let source = self.collect(arena, *source)?;
                return Some(GlueExpr::Select(Box::new(source), *index));
            }
            _ => {}
        }
        self.external(arena, id)
    }

    fn external(&mut self, arena: &Arena, id: NodeId) -> Option<GlueExpr> {
        if !is_glue_type(arena, id) {
            return None;
        }
        let j = match self.external_ids.get(&id) {
            Some(&j) => j,
            None => {
                let j = u32::try_from(self.externals.len()).ok()?;
                self.externals.push(id);
                self.external_ids.insert(id, j);
                j
            }
        };
        Some(GlueExpr::Select(Box::new(GlueExpr::Param), j))
    }
}
