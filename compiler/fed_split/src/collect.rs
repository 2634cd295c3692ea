//! Finding the aggregation sites of a computation body.

use fed_ir::{ensure_sufficient_stack, Arena, MergeSpec, NodeId, NodeKind};
use fed_types::Name;
use rustc_hash::FxHashSet;

use crate::{UnsplittableComputationError, UnsplittableReason};

/// An aggregation call whose input becomes part of the client piece.
#[derive(Clone, Debug)]
pub(crate) struct Site {
    /// The aggregation call node.
    pub node: NodeId,
    /// Its argument.
    pub input: NodeId,
    pub intrinsic: String,
    pub merge: MergeSpec,
}

/// Every aggregation call in `body`, in first-encounter preorder, checked
/// for splittability. `param` is the only name a client input may read.
pub(crate) fn collect_sites(
    arena: &Arena,
    param: Name,
    body: NodeId,
) -> Result<Vec<Site>, UnsplittableComputationError> {
    let mut collector = Collector {
        arena,
        param,
        seen: FxHashSet::default(),
        site_ids: FxHashSet::default(),
        sites: Vec::new(),
    };
    collector.visit(body, false)?;
    Ok(collector.sites)
}

struct Collector<'a> {
    arena: &'a Arena,
    param: Name,
    seen: FxHashSet<(NodeId, bool)>,
    site_ids: FxHashSet<NodeId>,
    sites: Vec<Site>,
}

impl Collector<'_> {
    fn fail(&self, reason: UnsplittableReason, at: NodeId) -> UnsplittableComputationError {
        UnsplittableComputationError::new(reason, self.arena.render_short(at))
    }

    fn visit(&mut self, id: NodeId, under_lambda: bool) -> Result<(), UnsplittableComputationError> {
        if !self.seen.insert((id, under_lambda)) {
            return Ok(());
        }
        let arena = self.arena;
        ensure_sufficient_stack(|| -> Result<(), UnsplittableComputationError> {
            match arena.kind(id) {
                NodeKind::Call { function, arg } if arena.intrinsic_name(*function).is_some() => {
                    if let Some((name, Some(input))) = arena.intrinsic_call(id) {
                        self.site(id, name, input, under_lambda)?;
                    }
                    match arg {
                        Some(arg) => self.visit(*arg, under_lambda),
                        None => Ok(()),
                    }
                }
                NodeKind::Intrinsic(name) => Err(self.fail(
                    UnsplittableReason::IntrinsicAsValue {
                        intrinsic: arena.name_str(*name).to_owned(),
                    },
                    id,
                )),
                NodeKind::Lambda { body, .. } => self.visit(*body, true),
                _ => {
                    for child in arena.children(id) {
                        self.visit(child, under_lambda)?;
                    }
                    Ok(())
                }
            }
        })
    }

    /// Record `id` if it calls an aggregation.
    fn site(
        &mut self,
        id: NodeId,
        name: &str,
        input: NodeId,
        under_lambda: bool,
    ) -> Result<(), UnsplittableComputationError> {
        let arena = self.arena;
        let Some(def) = arena.registry().get(name) else {
            return Ok(());
        };
        if !def.is_aggregation() {
            return Ok(());
        }
        let intrinsic = name.to_owned();
        let Some(merge) = def.merge_spec() else {
            return Err(self.fail(UnsplittableReason::NonMergeableAggregation { intrinsic }, id));
        };
        if under_lambda {
            return Err(self.fail(UnsplittableReason::AggregationUnderLambda { intrinsic }, id));
        }
        if self.contains_aggregation(input) {
            return Err(self.fail(UnsplittableReason::DependentAggregation { intrinsic }, id));
        }
        let captured = arena
            .free_names(input)
            .iter()
            .find(|&&(n, _)| n != self.param);
        if let Some(&(captured, _)) = captured {
            let name = arena.name_str(captured).to_owned();
            return Err(self.fail(UnsplittableReason::CapturedBinding { intrinsic, name }, id));
        }
        if self.site_ids.insert(id) {
            self.sites.push(Site {
                node: id,
                input,
                intrinsic,
                merge: merge.clone(),
            });
        }
        Ok(())
    }

    fn contains_aggregation(&self, node: NodeId) -> bool {
        let registry = self.arena.registry();
        self.arena.postorder(node).into_iter().any(|id| {
            self.arena
                .intrinsic_call(id)
                .and_then(|(name, _)| registry.get(name))
                .is_some_and(fed_ir::IntrinsicDef::is_aggregation)
        })
    }
}
