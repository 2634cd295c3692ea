//! Canonical-form verification.
//!
//! Run once on the fixed point. A violation means the passes disagree with
//! each other about what canonical means, never that the input was bad.

use fed_ir::{Arena, NodeId, NodeKind};
use fed_types::Name;
use rustc_hash::FxHashSet;

use crate::analysis::binders;
use crate::passes::{fold_selection, is_redex, region, unzipped};
use crate::{CompilerError, PipelineConfig};

const PASS: &str = "validate_canonical";

/// Check that `root` is in the canonical form the pipeline promises.
pub fn validate_canonical(
    arena: &Arena,
    root: NodeId,
    config: &PipelineConfig,
) -> Result<(), CompilerError> {
    let violation = |message: &str, at: NodeId| CompilerError::InvariantViolated {
        pass: PASS,
        message: message.to_owned(),
        subtree: arena.render_short(at),
    };

    let mut seen: FxHashSet<Name> = arena.free_names(root).iter().map(|&(n, _)| n).collect();
    for name in binders(arena, root) {
        if !seen.insert(name) {
            let message = format!("binder `{}` is not unique", arena.name_str(name));
            return Err(violation(&message, root));
        }
    }

    for id in arena.postorder(root) {
        match arena.kind(id) {
            NodeKind::Call { .. } if is_redex(arena, id) => {
                return Err(violation("beta-redex left unreduced", id));
            }
            NodeKind::Block { locals, .. } if locals.is_empty() => {
                return Err(violation("empty block", id));
            }
            NodeKind::Selection { source, index }
                if fold_selection(arena, *source, *index).is_some() =>
            {
                return Err(violation("selection from a struct literal", id));
            }
            _ => {}
        }
        if unzipped(arena, id).is_some() {
            return Err(violation("intrinsic argument is not zipped", id));
        }
        if config.merge_leaves && region(arena, id).is_some_and(|r| r.stages.len() >= 2) {
            return Err(violation("compiled leaves left unfused", id));
        }
    }
    Ok(())
}
