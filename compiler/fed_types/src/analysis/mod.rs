//! Type analysis: walks and compatibility predicates used by aggregation
//! signatures.

#[cfg(test)]
mod tests;

use crate::{Field, Placement, TypeError, TypeFlags, TypeId, TypeKind, TypePool};

/// Every type reachable from `ty`, parents before children.
pub fn preorder(pool: &TypePool, ty: TypeId) -> Vec<TypeId> {
    let mut out = Vec::new();
    let mut stack = vec![ty];
    while let Some(ty) = stack.pop() {
        out.push(ty);
        match pool.kind(ty) {
            TypeKind::Tensor { .. } | TypeKind::Placement => {}
            TypeKind::Struct(fields) => stack.extend(fields.iter().rev().map(|f| f.ty)),
            TypeKind::Function { param, result } => {
                stack.push(*result);
                if let Some(param) = param {
                    stack.push(*param);
                }
            }
            TypeKind::Federated { member, .. } => stack.push(*member),
        }
    }
    out
}

/// Whether any federated type inside `ty` is placed at `placement`.
pub fn contains_placement(pool: &TypePool, ty: TypeId, placement: Placement) -> bool {
    pool.flags(ty).contains(TypeFlags::at(placement))
}

pub fn contains_federated(pool: &TypePool, ty: TypeId) -> bool {
    pool.flags(ty).contains(TypeFlags::HAS_FEDERATED)
}

pub fn contains_function(pool: &TypePool, ty: TypeId) -> bool {
    pool.flags(ty).contains(TypeFlags::HAS_FUNCTION)
}

/// A per-participant CLIENTS type: `{T}@CLIENTS`.
pub fn is_per_client(pool: &TypePool, ty: TypeId) -> bool {
    matches!(
        pool.federated_parts(ty),
        Some((_, Placement::Clients, false))
    )
}

/// Whether a per-participant CLIENTS type occurs anywhere in `ty`.
pub fn contains_per_client(pool: &TypePool, ty: TypeId) -> bool {
    contains_placement(pool, ty, Placement::Clients)
        && preorder(pool, ty).into_iter().any(|ty| is_per_client(pool, ty))
}

/// `ty` with every per-participant CLIENTS component replaced by `<>`.
///
/// Struct positions and names are kept, so selections into the remaining
/// components stay valid. Functions are left as they are.
pub fn without_per_client(pool: &mut TypePool, ty: TypeId) -> TypeId {
    if is_per_client(pool, ty) {
        return pool.tuple(&[]);
    }
    let Some(fields) = pool.struct_fields(ty) else {
        return ty;
    };
    if !contains_placement(pool, ty, Placement::Clients) {
        return ty;
    }
    let fields = fields.to_vec();
    let stripped = fields
        .into_iter()
        .map(|field| Field {
            name: field.name,
            ty: without_per_client(pool, field.ty),
        })
        .collect();
    pool.structure_of(stripped)
}

/// Check that every tensor in `ty` is numeric with a fully defined shape.
///
/// Federated types are checked through their member; functions and
/// placements are never summable.
pub fn check_sum_compatible(pool: &TypePool, ty: TypeId) -> Result<(), TypeError> {
    check_tensors(pool, ty, "summable", |dtype, shape| {
        if !dtype.is_numeric() {
            Some(format!("`{dtype}` is not numeric"))
        } else if !shape.is_fully_defined() {
            Some(format!("shape `{shape}` is not fully defined"))
        } else {
            None
        }
    })
}

/// Every tensor in `ty` has a floating-point dtype.
pub fn is_average_compatible(pool: &TypePool, ty: TypeId) -> bool {
    check_tensors(pool, ty, "averageable", |dtype, _| {
        (!dtype.is_floating()).then(|| format!("`{dtype}` is not floating point"))
    })
    .is_ok()
}

/// Every tensor in `ty` has an integer or floating-point dtype.
pub fn is_min_max_compatible(pool: &TypePool, ty: TypeId) -> bool {
    check_tensors(pool, ty, "orderable", |dtype, _| {
        (!dtype.is_numeric()).then(|| format!("`{dtype}` is not numeric"))
    })
    .is_ok()
}

fn check_tensors(
    pool: &TypePool,
    ty: TypeId,
    requirement: &'static str,
    reject: impl Fn(crate::DType, &crate::Shape) -> Option<String> + Copy,
) -> Result<(), TypeError> {
    let incompatible = |reason: String| TypeError::Incompatible {
        requirement,
        found: pool.format(ty),
        reason,
    };
    match pool.kind(ty) {
        TypeKind::Tensor { dtype, shape } => match reject(*dtype, shape) {
            Some(reason) => Err(incompatible(reason)),
            None => Ok(()),
        },
        TypeKind::Struct(fields) => fields
            .iter()
            .try_for_each(|f| check_tensors(pool, f.ty, requirement, reject)),
        TypeKind::Federated { member, .. } => check_tensors(pool, *member, requirement, reject),
        TypeKind::Function { .. } => Err(incompatible("functions carry no data".to_owned())),
        TypeKind::Placement => Err(incompatible("placements carry no data".to_owned())),
    }
}

/// Tensor statistics of a type.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TensorCount {
    /// Number of tensor types.
    pub tensors: usize,
    /// Total element count over tensors with fully defined shapes.
    pub elements: u64,
    /// Tensors whose shape is not fully defined.
    pub unknown_size: usize,
}

/// Count tensors reachable from `ty`, including those inside federated types.
pub fn count_tensors(pool: &TypePool, ty: TypeId) -> TensorCount {
    preorder(pool, ty)
        .into_iter()
        .filter_map(|ty| pool.tensor_parts(ty))
        .fold(TensorCount::default(), |mut acc, (_, shape)| {
            acc.tensors += 1;
            match shape.num_elements() {
                Some(n) => acc.elements = acc.elements.saturating_add(n),
                None => acc.unknown_size += 1,
            }
            acc
        })
}
