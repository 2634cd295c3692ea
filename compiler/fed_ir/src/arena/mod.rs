//! Hash-consing arena for building-block trees.
//!
//! Every node is stored once: constructing a node identical in kind,
//! children and type to an existing node returns the existing [`NodeId`].
//! Per-node metadata is computed at construction and never re-derived:
//!
//! - **Type**: validated against the children (fail-fast)
//! - **Flags**: [`NodeFlags`] summarizing the whole subtree
//! - **Free references**: sorted `(name, type)` set
//! - **Node count**: size of the subtree, counting shared children per use
//! - **Content hash**: structural hash, stable across arenas
//!
//! The arena owns the [`TypePool`] its nodes are typed in and a shared
//! handle to the [`IntrinsicRegistry`] intrinsic nodes are checked against.

mod construct;
mod import;


use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use fed_types::{Name, TypeError, TypeFlags, TypeId, TypePool};
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::{
    DataId, DataSource, IntrinsicRegistry, LeafId, LeafProgram, NodeFlags, NodeId, NodeKind,
};

/// Sorted set of free references of a subtree.
pub type FreeVars = Arc<[(Name, TypeId)]>;

/// Child list of a node, in evaluation order.
pub type Children = SmallVec<[NodeId; 4]>;

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    ty: TypeId,
    flags: NodeFlags,
    free: FreeVars,
    size: u32,
    hash: u64,
}

/// Arena of hash-consed, typed building-block nodes.
#[derive(Clone)]
pub struct Arena {
    types: TypePool,
    registry: Arc<IntrinsicRegistry>,
    nodes: Vec<NodeData>,
    lookup: FxHashMap<(NodeKind, TypeId), NodeId>,
    data: Vec<DataSource>,
    data_lookup: FxHashMap<DataSource, DataId>,
    leaves: Vec<LeafProgram>,
    leaf_lookup: FxHashMap<LeafProgram, LeafId>,
    no_free: FreeVars,
}

impl Arena {
    pub fn new(registry: Arc<IntrinsicRegistry>) -> Self {
        Self {
            types: TypePool::new(),
            registry,
            nodes: Vec::with_capacity(64),
            lookup: FxHashMap::default(),
            data: Vec::new(),
            data_lookup: FxHashMap::default(),
            leaves: Vec::new(),
            leaf_lookup: FxHashMap::default(),
            no_free: Arc::from(Vec::new()),
        }
    }

    /// Arena checking intrinsics against [`IntrinsicRegistry::standard`].
    pub fn with_standard_registry() -> Self {
        Self::new(Arc::new(IntrinsicRegistry::standard()))
    }

    // === Accessors ===

    #[inline]
    pub fn types(&self) -> &TypePool {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypePool {
        &mut self.types
    }

    #[inline]
    pub fn registry(&self) -> &Arc<IntrinsicRegistry> {
        &self.registry
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn ty(&self, id: NodeId) -> TypeId {
        self.nodes[id.index()].ty
    }

    #[inline]
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.nodes[id.index()].flags
    }

    /// Free references of the subtree, sorted by name.
    #[inline]
    pub fn free_names(&self, id: NodeId) -> &[(Name, TypeId)] {
        &self.nodes[id.index()].free
    }

    /// Type of the free reference `name`, if it occurs free.
    pub fn free_type(&self, id: NodeId, name: Name) -> Option<TypeId> {
        let free = self.free_names(id);
        free.binary_search_by_key(&name, |&(n, _)| n)
            .ok()
            .map(|i| free[i].1)
    }

    #[inline]
    pub fn is_free_in(&self, id: NodeId, name: Name) -> bool {
        self.free_type(id, name).is_some()
    }

    /// Number of nodes in the subtree.
    #[inline]
    pub fn node_count(&self, id: NodeId) -> u32 {
        self.nodes[id.index()].size
    }

    /// Structural hash of the subtree, stable across arenas.
    #[inline]
    pub fn content_hash(&self, id: NodeId) -> u64 {
        self.nodes[id.index()].hash
    }

    pub fn data_source(&self, id: DataId) -> &DataSource {
        &self.data[id.0 as usize]
    }

    pub fn leaf(&self, id: LeafId) -> &LeafProgram {
        &self.leaves[id.0 as usize]
    }

    /// Number of distinct nodes stored.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn name(&mut self, s: &str) -> Name {
        self.types.intern_name(s)
    }

    pub fn name_str(&self, name: Name) -> &str {
        self.types.name_str(name)
    }

    /// Children in evaluation order.
    pub fn children(&self, id: NodeId) -> Children {
        self.children_of(self.kind(id))
    }

    /// The intrinsic name if `id` is an intrinsic node.
    pub fn intrinsic_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Intrinsic(name) => Some(self.name_str(*name)),
            _ => None,
        }
    }

    /// `(intrinsic name, argument)` if `id` is a call of an intrinsic.
    pub fn intrinsic_call(&self, id: NodeId) -> Option<(&str, Option<NodeId>)> {
        match *self.kind(id) {
            NodeKind::Call { function, arg } => Some((self.intrinsic_name(function)?, arg)),
            _ => None,
        }
    }

    /// Every distinct node reachable from `root`, children before parents.
    pub fn postorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.push((id, true));
            for child in self.children(id).into_iter().rev() {
                if !seen.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        out
    }

    // === Interning ===

    fn existing(&self, kind: &NodeKind, ty: TypeId) -> Option<NodeId> {
        self.lookup.get(&(kind.clone(), ty)).copied()
    }

    fn intern_data(&mut self, source: DataSource) -> DataId {
        if let Some(&id) = self.data_lookup.get(&source) {
            return id;
        }
        let id = DataId(u32::try_from(self.data.len()).unwrap_or(u32::MAX));
        self.data.push(source.clone());
        self.data_lookup.insert(source, id);
        id
    }

    fn intern_leaf(&mut self, program: LeafProgram) -> LeafId {
        if let Some(&id) = self.leaf_lookup.get(&program) {
            return id;
        }
        let id = LeafId(u32::try_from(self.leaves.len()).unwrap_or(u32::MAX));
        self.leaves.push(program.clone());
        self.leaf_lookup.insert(program, id);
        id
    }

    /// Store a validated node. The caller has already checked the type and
    /// computed the free set.
    fn push(&mut self, kind: NodeKind, ty: TypeId, free: FreeVars) -> NodeId {
        if let Some(id) = self.existing(&kind, ty) {
            return id;
        }

        let children = self.children_of(&kind);
        let mut flags = kind_flag(&kind);
        let mut size: u32 = 1;
        for &child in &children {
            flags |= self.flags(child);
            size = size.saturating_add(self.node_count(child));
        }
        let type_flags = self.types.flags(ty);
        if type_flags.contains(TypeFlags::HAS_FEDERATED) {
            flags |= NodeFlags::HAS_FEDERATED;
        }
        if type_flags.contains(TypeFlags::AT_CLIENTS) {
            flags |= NodeFlags::HAS_CLIENTS;
        }
        let hash = self.compute_hash(&kind, ty);

        let id = NodeId::from_raw(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeData {
            kind: kind.clone(),
            ty,
            flags,
            free,
            size,
            hash,
        });
        self.lookup.insert((kind, ty), id);
        id
    }

    fn children_of(&self, kind: &NodeKind) -> Children {
        let mut out = Children::new();
        match kind {
            NodeKind::Reference(_)
            | NodeKind::Data(_)
            | NodeKind::Compiled(_)
            | NodeKind::Intrinsic(_) => {}
            NodeKind::Lambda { body, .. } => out.push(*body),
            NodeKind::Call { function, arg } => {
                out.push(*function);
                out.extend(*arg);
            }
            NodeKind::Block { locals, result } => {
                out.extend(locals.iter().map(|&(_, value)| value));
                out.push(*result);
            }
            NodeKind::Struct(elements) => out.extend(elements.iter().map(|&(_, e)| e)),
            NodeKind::Selection { source, .. } => out.push(*source),
        }
        out
    }

    /// Hash of variant, type content, non-child data (names by string) and
    /// child content hashes. Node ids are never hashed.
    fn compute_hash(&self, kind: &NodeKind, ty: TypeId) -> u64 {
        let mut state = FxHasher::default();
        mem::discriminant(kind).hash(&mut state);
        self.types.content_hash(ty).hash(&mut state);
        match kind {
            NodeKind::Reference(name) | NodeKind::Intrinsic(name) => {
                self.name_str(*name).hash(&mut state);
            }
            NodeKind::Lambda { param, body } => {
                if let Some(param) = param {
                    self.name_str(param.name).hash(&mut state);
                    self.types.content_hash(param.ty).hash(&mut state);
                }
                self.content_hash(*body).hash(&mut state);
            }
            NodeKind::Call { function, arg } => {
                self.content_hash(*function).hash(&mut state);
                arg.map(|a| self.content_hash(a)).hash(&mut state);
            }
            NodeKind::Block { locals, result } => {
                locals.len().hash(&mut state);
                for &(name, value) in locals.iter() {
                    self.name_str(name).hash(&mut state);
                    self.content_hash(value).hash(&mut state);
                }
                self.content_hash(*result).hash(&mut state);
            }
            NodeKind::Struct(elements) => {
                elements.len().hash(&mut state);
                for &(name, element) in elements.iter() {
                    name.map(|n| self.name_str(n)).hash(&mut state);
                    self.content_hash(element).hash(&mut state);
                }
            }
            NodeKind::Selection { source, index } => {
                index.hash(&mut state);
                self.content_hash(*source).hash(&mut state);
            }
            NodeKind::Data(id) => self.data_source(*id).hash(&mut state),
            NodeKind::Compiled(id) => self.leaf(*id).hash(&mut state),
        }
        state.finish()
    }

    // === Free references ===

    fn free_arc(&self, id: NodeId) -> FreeVars {
        Arc::clone(&self.nodes[id.index()].free)
    }

    /// Union of free sets; a name occurring at inequivalent types is an error.
    fn merge_free(&self, sets: &[&[(Name, TypeId)]]) -> Result<FreeVars, TypeError> {
        let mut non_empty = sets.iter().filter(|s| !s.is_empty());
        let Some(first) = non_empty.next() else {
            return Ok(Arc::clone(&self.no_free));
        };
        if non_empty.next().is_none() {
            return Ok(Arc::from(first.to_vec()));
        }

        let mut all: Vec<(Name, TypeId)> = sets.iter().flat_map(|s| s.iter().copied()).collect();
        all.sort_by_key(|&(name, _)| name);
        let mut merged: Vec<(Name, TypeId)> = Vec::with_capacity(all.len());
        for (name, ty) in all {
            match merged.last() {
                Some(&(last, last_ty)) if last == name => {
                    if !self.types.is_equivalent(last_ty, ty) {
                        return Err(TypeError::ConflictingReference {
                            name: self.name_str(name).to_owned(),
                            first: self.types.format(last_ty),
                            second: self.types.format(ty),
                        });
                    }
                }
                _ => merged.push((name, ty)),
            }
        }
        Ok(Arc::from(merged))
    }

    /// Remove `name` from a free set, checking its uses against the binder.
    fn unbind(
        &self,
        free: &[(Name, TypeId)],
        name: Name,
        bound_ty: TypeId,
        binder: &str,
    ) -> Result<Vec<(Name, TypeId)>, TypeError> {
        let mut out = Vec::with_capacity(free.len());
        for &(n, ty) in free {
            if n != name {
                out.push((n, ty));
            } else if !self.types.is_equivalent(ty, bound_ty) {
                return Err(TypeError::Mismatch {
                    context: format!("reference `{}` bound by {binder}", self.name_str(name)),
                    expected: self.types.format(bound_ty),
                    found: self.types.format(ty),
                });
            }
        }
        Ok(out)
    }
}

fn kind_flag(kind: &NodeKind) -> NodeFlags {
    match kind {
        NodeKind::Reference(_) => NodeFlags::HAS_REFERENCE,
        NodeKind::Lambda { .. } => NodeFlags::HAS_LAMBDA,
        NodeKind::Call { .. } => NodeFlags::HAS_CALL,
        NodeKind::Block { .. } => NodeFlags::HAS_BLOCK,
        NodeKind::Struct(_) => NodeFlags::HAS_STRUCT,
        NodeKind::Selection { .. } => NodeFlags::HAS_SELECTION,
        NodeKind::Data(_) => NodeFlags::HAS_DATA,
        NodeKind::Compiled(_) => NodeFlags::HAS_COMPILED,
        NodeKind::Intrinsic(_) => NodeFlags::HAS_INTRINSIC,
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::with_standard_registry()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("nodes", &self.nodes.len())
            .field("types", &self.types.len())
            .field("leaves", &self.leaves.len())
            .finish_non_exhaustive()
    }
}
