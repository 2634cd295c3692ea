//! Type pool: interned storage for every type in a computation.
//!
//! Types are deduplicated on insertion. A [`TypeKind`] refers to its children
//! by [`TypeId`], so a structural comparison of two handles from the same
//! pool is a single integer comparison.

mod format;

#[cfg(test)]
mod tests;

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};

use crate::{DType, Name, NameTable, Placement, Shape, TypeError, TypeFlags, TypeId};

/// One element of a struct type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Field {
    pub name: Option<Name>,
    pub ty: TypeId,
}

/// The shape of one interned type.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeKind {
    Tensor {
        dtype: DType,
        shape: Shape,
    },
    Struct(Box<[Field]>),
    Function {
        param: Option<TypeId>,
        result: TypeId,
    },
    Federated {
        member: TypeId,
        placement: Placement,
        all_equal: bool,
    },
    Placement,
}

/// Interned type storage.
///
/// Parallel arrays indexed by [`TypeId`]: kind, flags and structural content
/// hash. The content hash resolves field names to their strings so it is
/// stable across pools.
#[derive(Clone)]
pub struct TypePool {
    kinds: Vec<TypeKind>,
    flags: Vec<TypeFlags>,
    hashes: Vec<u64>,
    lookup: FxHashMap<TypeKind, TypeId>,
    names: NameTable,
}

impl TypePool {
    /// Create a pool with the unit and placement types pre-interned.
    pub fn new() -> Self {
        let mut pool = Self {
            kinds: Vec::with_capacity(64),
            flags: Vec::with_capacity(64),
            hashes: Vec::with_capacity(64),
            lookup: FxHashMap::default(),
            names: NameTable::new(),
        };
        let unit = pool.intern(TypeKind::Struct(Box::new([])));
        let placement = pool.intern(TypeKind::Placement);
        debug_assert_eq!(unit, TypeId::UNIT);
        debug_assert_eq!(placement, TypeId::PLACEMENT);
        pool
    }

    // === Interning ===

    /// Intern a type kind, returning the existing handle if already present.
    ///
    /// Children must already belong to this pool.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let flags = self.compute_flags(&kind);
        let hash = self.compute_hash(&kind);
        let id = TypeId::from_raw(u32::try_from(self.kinds.len()).unwrap_or(u32::MAX));
        self.kinds.push(kind.clone());
        self.flags.push(flags);
        self.hashes.push(hash);
        self.lookup.insert(kind, id);
        id
    }

    fn compute_flags(&self, kind: &TypeKind) -> TypeFlags {
        match kind {
            TypeKind::Tensor { shape, .. } => {
                let mut flags = TypeFlags::IS_TENSOR | TypeFlags::HAS_TENSOR;
                if !shape.is_fully_defined() {
                    flags |= TypeFlags::HAS_UNKNOWN_SHAPE;
                }
                flags
            }
            TypeKind::Struct(fields) => fields
                .iter()
                .fold(TypeFlags::IS_STRUCT, |acc, f| acc | self.flags(f.ty).propagated()),
            TypeKind::Function { param, result } => {
                let mut flags = TypeFlags::IS_FUNCTION
                    | TypeFlags::HAS_FUNCTION
                    | self.flags(*result).propagated();
                if let Some(param) = param {
                    flags |= self.flags(*param).propagated();
                }
                flags
            }
            TypeKind::Federated {
                member, placement, ..
            } => {
                TypeFlags::IS_FEDERATED
                    | TypeFlags::HAS_FEDERATED
                    | TypeFlags::at(*placement)
                    | self.flags(*member).propagated()
            }
            TypeKind::Placement => TypeFlags::IS_PLACEMENT | TypeFlags::HAS_PLACEMENT,
        }
    }

    fn compute_hash(&self, kind: &TypeKind) -> u64 {
        let mut hasher = FxHasher::default();
        std::mem::discriminant(kind).hash(&mut hasher);
        match kind {
            TypeKind::Tensor { dtype, shape } => {
                dtype.hash(&mut hasher);
                shape.hash(&mut hasher);
            }
            TypeKind::Struct(fields) => {
                fields.len().hash(&mut hasher);
                for field in fields.iter() {
                    field.name.map(|n| self.names.lookup(n)).hash(&mut hasher);
                    self.content_hash(field.ty).hash(&mut hasher);
                }
            }
            TypeKind::Function { param, result } => {
                param.map(|p| self.content_hash(p)).hash(&mut hasher);
                self.content_hash(*result).hash(&mut hasher);
            }
            TypeKind::Federated {
                member,
                placement,
                all_equal,
            } => {
                self.content_hash(*member).hash(&mut hasher);
                placement.hash(&mut hasher);
                all_equal.hash(&mut hasher);
            }
            TypeKind::Placement => {}
        }
        hasher.finish()
    }

    // === Accessors ===

    #[inline]
    pub fn kind(&self, ty: TypeId) -> &TypeKind {
        &self.kinds[ty.index()]
    }

    #[inline]
    pub fn flags(&self, ty: TypeId) -> TypeFlags {
        self.flags[ty.index()]
    }

    /// Structural hash, comparable across pools.
    #[inline]
    pub fn content_hash(&self, ty: TypeId) -> u64 {
        self.hashes[ty.index()]
    }

    /// Number of interned types.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false: unit and placement are pre-interned.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn intern_name(&mut self, s: &str) -> Name {
        self.names.intern(s)
    }

    pub fn name_str(&self, name: Name) -> &str {
        self.names.lookup(name)
    }

    pub fn struct_fields(&self, ty: TypeId) -> Option<&[Field]> {
        match self.kind(ty) {
            TypeKind::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// `(param, result)` of a function type.
    pub fn function_parts(&self, ty: TypeId) -> Option<(Option<TypeId>, TypeId)> {
        match *self.kind(ty) {
            TypeKind::Function { param, result } => Some((param, result)),
            _ => None,
        }
    }

    /// `(member, placement, all_equal)` of a federated type.
    pub fn federated_parts(&self, ty: TypeId) -> Option<(TypeId, Placement, bool)> {
        match *self.kind(ty) {
            TypeKind::Federated {
                member,
                placement,
                all_equal,
            } => Some((member, placement, all_equal)),
            _ => None,
        }
    }

    pub fn tensor_parts(&self, ty: TypeId) -> Option<(DType, &Shape)> {
        match self.kind(ty) {
            TypeKind::Tensor { dtype, shape } => Some((*dtype, shape)),
            _ => None,
        }
    }

    /// Position of the field named `name` in a struct type.
    pub fn field_index(&self, ty: TypeId, name: &str) -> Option<usize> {
        let name = self.names.get(name)?;
        self.struct_fields(ty)?
            .iter()
            .position(|f| f.name == Some(name))
    }

    // === Constructors ===

    pub fn tensor(&mut self, dtype: DType, shape: Shape) -> TypeId {
        self.intern(TypeKind::Tensor { dtype, shape })
    }

    /// Rank-0 tensor.
    pub fn scalar(&mut self, dtype: DType) -> TypeId {
        self.tensor(dtype, Shape::scalar())
    }

    /// Struct from `(optional name, type)` pairs.
    pub fn structure<'a>(
        &mut self,
        fields: impl IntoIterator<Item = (Option<&'a str>, TypeId)>,
    ) -> TypeId {
        let fields: Vec<Field> = fields
            .into_iter()
            .map(|(name, ty)| Field {
                name: name.map(|n| self.names.intern(n)),
                ty,
            })
            .collect();
        self.intern(TypeKind::Struct(fields.into_boxed_slice()))
    }

    /// Struct from already interned fields.
    pub fn structure_of(&mut self, fields: Vec<Field>) -> TypeId {
        self.intern(TypeKind::Struct(fields.into_boxed_slice()))
    }

    /// Unnamed struct of the given element types.
    pub fn tuple(&mut self, elements: &[TypeId]) -> TypeId {
        let fields = elements
            .iter()
            .map(|&ty| Field { name: None, ty })
            .collect();
        self.structure_of(fields)
    }

    pub fn function(&mut self, param: Option<TypeId>, result: TypeId) -> TypeId {
        self.intern(TypeKind::Function { param, result })
    }

    /// Federated type; the member may not contain federated or function types.
    pub fn federated(
        &mut self,
        member: TypeId,
        placement: Placement,
        all_equal: bool,
    ) -> Result<TypeId, TypeError> {
        if self
            .flags(member)
            .intersects(TypeFlags::HAS_FEDERATED | TypeFlags::HAS_FUNCTION)
        {
            return Err(TypeError::InvalidFederatedMember {
                member: self.format(member),
            });
        }
        Ok(self.intern(TypeKind::Federated {
            member,
            placement,
            all_equal,
        }))
    }

    /// `T@SERVER`.
    pub fn at_server(&mut self, member: TypeId) -> Result<TypeId, TypeError> {
        self.federated(member, Placement::Server, true)
    }

    /// `{T}@CLIENTS`, or `T@CLIENTS` when `all_equal`.
    pub fn at_clients(&mut self, member: TypeId, all_equal: bool) -> Result<TypeId, TypeError> {
        self.federated(member, Placement::Clients, all_equal)
    }

    // === Cross-pool ===

    /// Copy a type from another pool into this one.
    pub fn import(&mut self, other: &TypePool, ty: TypeId) -> TypeId {
        let kind = match other.kind(ty) {
            TypeKind::Tensor { dtype, shape } => TypeKind::Tensor {
                dtype: *dtype,
                shape: shape.clone(),
            },
            TypeKind::Struct(fields) => {
                let fields: Vec<Field> = fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.map(|n| self.names.intern(other.name_str(n))),
                        ty: self.import(other, f.ty),
                    })
                    .collect();
                TypeKind::Struct(fields.into_boxed_slice())
            }
            TypeKind::Function { param, result } => TypeKind::Function {
                param: param.map(|p| self.import(other, p)),
                result: self.import(other, *result),
            },
            TypeKind::Federated {
                member,
                placement,
                all_equal,
            } => TypeKind::Federated {
                member: self.import(other, *member),
                placement: *placement,
                all_equal: *all_equal,
            },
            TypeKind::Placement => TypeKind::Placement,
        };
        self.intern(kind)
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypePool")
            .field("types", &self.kinds.len())
            .field("names", &self.names.len())
            .finish()
    }
}
