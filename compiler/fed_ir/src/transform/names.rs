//! Fresh name generation.

use fed_types::Name;
use rustc_hash::FxHashSet;

use crate::{Arena, NodeId, NodeKind};

/// Every binder and reference name occurring in the tree at `root`.
pub fn collect_names(arena: &Arena, root: NodeId) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    for id in arena.postorder(root) {
        match arena.kind(id) {
            NodeKind::Reference(name) => {
                out.insert(arena.name_str(*name).to_owned());
            }
            NodeKind::Lambda {
                param: Some(param), ..
            } => {
                out.insert(arena.name_str(param.name).to_owned());
            }
            NodeKind::Block { locals, .. } => {
                out.extend(locals.iter().map(|&(n, _)| arena.name_str(n).to_owned()));
            }
            _ => {}
        }
    }
    out
}

/// Deterministic fresh names `{prefix}1`, `{prefix}2`, ... skipping a
/// reserved set.
#[derive(Clone, Debug)]
pub struct NameGenerator {
    prefix: String,
    next: u32,
    reserved: FxHashSet<String>,
}

impl NameGenerator {
    pub const DEFAULT_PREFIX: &'static str = "_var";

    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            next: 0,
            reserved: FxHashSet::default(),
        }
    }

    /// Generator avoiding every name occurring in the given trees.
    pub fn avoiding(arena: &Arena, roots: &[NodeId]) -> Self {
        let mut generator = Self::new(Self::DEFAULT_PREFIX);
        for &root in roots {
            generator.reserved.extend(collect_names(arena, root));
        }
        generator
    }

    pub fn reserve(&mut self, name: &str) {
        self.reserved.insert(name.to_owned());
    }

    /// Next unreserved name, interned in `arena`.
    pub fn fresh(&mut self, arena: &mut Arena) -> Name {
        loop {
            self.next += 1;
            let candidate = format!("{}{}", self.prefix, self.next);
            if self.reserved.insert(candidate.clone()) {
                return arena.name(&candidate);
            }
        }
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}
