//! Copying trees between arenas.

use fed_types::TypeError;
use rustc_hash::FxHashMap;

use super::Arena;
use crate::{NodeId, NodeKind, Param};

impl Arena {
    /// Deep-copy the tree at `root` from `source` into this arena.
    ///
    /// Names and types are re-interned by content and every node is rebuilt
    /// through the validating constructors, so intrinsics are checked against
    /// this arena's registry.
    pub fn import(&mut self, source: &Arena, root: NodeId) -> Result<NodeId, TypeError> {
        let mut memo: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut imported = root;
        for id in source.postorder(root) {
            imported = self.import_node(source, id, &memo)?;
            memo.insert(id, imported);
        }
        Ok(imported)
    }

    fn import_node(
        &mut self,
        source: &Arena,
        id: NodeId,
        memo: &FxHashMap<NodeId, NodeId>,
    ) -> Result<NodeId, TypeError> {
        let ty = self.types.import(&source.types, source.ty(id));
        let get = |child: NodeId| memo.get(&child).copied().unwrap_or(child);
        match source.kind(id) {
            NodeKind::Reference(name) => {
                let name = self.name(source.name_str(*name));
                Ok(self.reference(name, ty))
            }
            NodeKind::Lambda { param, body } => {
                let param = param.map(|p| Param {
                    name: self.name(source.name_str(p.name)),
                    ty: self.types.import(&source.types, p.ty),
                });
                self.lambda(param, get(*body))
            }
            NodeKind::Call { function, arg } => self.call(get(*function), arg.map(get)),
            NodeKind::Block { locals, result } => {
                let locals = locals
                    .iter()
                    .map(|&(name, value)| (self.name(source.name_str(name)), get(value)))
                    .collect();
                self.block(locals, get(*result))
            }
            NodeKind::Struct(elements) => {
                let elements = elements
                    .iter()
                    .map(|&(name, e)| (name.map(|n| self.name(source.name_str(n))), get(e)))
                    .collect();
                self.structure(elements)
            }
            NodeKind::Selection { source: s, index } => self.select(get(*s), *index as usize),
            NodeKind::Data(data) => Ok(self.data(source.data_source(*data).clone(), ty)),
            NodeKind::Compiled(leaf) => self.compiled(source.leaf(*leaf).clone(), ty),
            NodeKind::Intrinsic(name) => self.intrinsic(source.name_str(*name), ty),
        }
    }
}
