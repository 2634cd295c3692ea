//! Type relations: assignability, equivalence and identity.


use crate::{Shape, TypeError, TypeId, TypeKind, TypePool};

impl TypePool {
    /// Whether a value of type `source` may be used where `target` is expected.
    ///
    /// - Tensors: same dtype; a target of unknown rank accepts any shape;
    ///   otherwise ranks match and each known target dimension matches.
    /// - Structs: same length, elementwise assignable; a named source element
    ///   must carry the target's name, an unnamed one satisfies any name.
    /// - Functions: contravariant parameter, covariant result.
    /// - Federated: same placement, assignable members, and an `all_equal`
    ///   target accepts only `all_equal` sources.
    pub fn is_assignable(&self, source: TypeId, target: TypeId) -> bool {
        if source == target {
            return true;
        }
        match (self.kind(source), self.kind(target)) {
            (
                TypeKind::Tensor {
                    dtype: source_dtype,
                    shape: source_shape,
                },
                TypeKind::Tensor {
                    dtype: target_dtype,
                    shape: target_shape,
                },
            ) => source_dtype == target_dtype && shape_assignable(source_shape, target_shape),
            (TypeKind::Struct(source_fields), TypeKind::Struct(target_fields)) => {
                source_fields.len() == target_fields.len()
                    && source_fields.iter().zip(target_fields.iter()).all(|(s, t)| {
                        (s.name.is_none() || s.name == t.name) && self.is_assignable(s.ty, t.ty)
                    })
            }
            (
                TypeKind::Function {
                    param: source_param,
                    result: source_result,
                },
                TypeKind::Function {
                    param: target_param,
                    result: target_result,
                },
            ) => {
                let params_ok = match (source_param, target_param) {
                    (None, None) => true,
                    (Some(s), Some(t)) => self.is_assignable(*t, *s),
                    _ => false,
                };
                params_ok && self.is_assignable(*source_result, *target_result)
            }
            (
                TypeKind::Federated {
                    member: source_member,
                    placement: source_placement,
                    all_equal: source_all_equal,
                },
                TypeKind::Federated {
                    member: target_member,
                    placement: target_placement,
                    all_equal: target_all_equal,
                },
            ) => {
                source_placement == target_placement
                    && (*source_all_equal || !*target_all_equal)
                    && self.is_assignable(*source_member, *target_member)
            }
            (TypeKind::Placement, TypeKind::Placement) => true,
            _ => false,
        }
    }

    /// [`is_assignable`](Self::is_assignable) as a `Result`, rendering both
    /// types on failure.
    pub fn check_assignable(
        &self,
        source: TypeId,
        target: TypeId,
        context: &str,
    ) -> Result<(), TypeError> {
        if self.is_assignable(source, target) {
            Ok(())
        } else {
            Err(TypeError::Mismatch {
                context: context.to_owned(),
                expected: self.format(target),
                found: self.format(source),
            })
        }
    }

    /// Structural equality ignoring struct element names.
    pub fn is_equivalent(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (
                TypeKind::Tensor {
                    dtype: da,
                    shape: sa,
                },
                TypeKind::Tensor {
                    dtype: db,
                    shape: sb,
                },
            ) => da == db && sa == sb,
            (TypeKind::Struct(fa), TypeKind::Struct(fb)) => {
                fa.len() == fb.len()
                    && fa
                        .iter()
                        .zip(fb.iter())
                        .all(|(x, y)| self.is_equivalent(x.ty, y.ty))
            }
            (
                TypeKind::Function {
                    param: pa,
                    result: ra,
                },
                TypeKind::Function {
                    param: pb,
                    result: rb,
                },
            ) => {
                let params = match (pa, pb) {
                    (None, None) => true,
                    (Some(x), Some(y)) => self.is_equivalent(*x, *y),
                    _ => false,
                };
                params && self.is_equivalent(*ra, *rb)
            }
            (
                TypeKind::Federated {
                    member: ma,
                    placement: pa,
                    all_equal: ea,
                },
                TypeKind::Federated {
                    member: mb,
                    placement: pb,
                    all_equal: eb,
                },
            ) => pa == pb && ea == eb && self.is_equivalent(*ma, *mb),
            (TypeKind::Placement, TypeKind::Placement) => true,
            _ => false,
        }
    }

    /// Equality including element names: handle comparison.
    #[inline]
    pub fn is_identical(&self, a: TypeId, b: TypeId) -> bool {
        a == b
    }
}

fn shape_assignable(source: &Shape, target: &Shape) -> bool {
    match (source.dims(), target.dims()) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(s), Some(t)) => {
            s.len() == t.len()
                && s.iter()
                    .zip(t.iter())
                    .all(|(sd, td)| td.is_none() || sd == td)
        }
    }
}
