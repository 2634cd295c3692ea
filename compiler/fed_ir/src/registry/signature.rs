//! Intrinsic type-signature schemas.
//!
//! A [`Signature`] computes an intrinsic's result type from its argument
//! type, so the same schema checks declared intrinsic types and builds the
//! type of `call_intrinsic` applications.

use fed_types::{
    check_sum_compatible, is_average_compatible, is_min_max_compatible, preorder, DType, Field,
    Placement, TypeError, TypeFlags, TypeId, TypePool,
};

/// Aggregation operator of an [`Signature::Aggregate`] intrinsic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AggregateOp {
    Sum,
    SecureSum,
    Mean,
    /// Weighted partial of a mean: `<total=T,count=int64>`.
    MeanPartial,
    Max,
    Min,
}

impl AggregateOp {
    /// Check the member type of the aggregated value.
    fn check_member(self, pool: &TypePool, member: TypeId) -> Result<(), String> {
        check_sum_compatible(pool, member).map_err(|e| e.to_string())?;
        match self {
            AggregateOp::Sum => Ok(()),
            AggregateOp::SecureSum => {
                let all_integer = preorder(pool, member)
                    .into_iter()
                    .filter_map(|ty| pool.tensor_parts(ty))
                    .all(|(dtype, _)| dtype.is_integer());
                if all_integer {
                    Ok(())
                } else {
                    Err("secure summation requires integer tensors".to_owned())
                }
            }
            AggregateOp::Mean | AggregateOp::MeanPartial => {
                if is_average_compatible(pool, member) {
                    Ok(())
                } else {
                    Err("averaging requires floating-point tensors".to_owned())
                }
            }
            AggregateOp::Max | AggregateOp::Min => {
                if is_min_max_compatible(pool, member) {
                    Ok(())
                } else {
                    Err("ordering requires numeric tensors".to_owned())
                }
            }
        }
    }

    /// Member type of the aggregate's server-placed result.
    pub fn result_member(self, pool: &mut TypePool, member: TypeId) -> TypeId {
        match self {
            AggregateOp::MeanPartial => mean_partial_type(pool, member),
            _ => member,
        }
    }
}

/// `<total=T,count=int64>`
pub fn mean_partial_type(pool: &mut TypePool, member: TypeId) -> TypeId {
    let count = pool.scalar(DType::Int64);
    pool.structure([(Some("total"), member), (Some("count"), count)])
}

/// Type-signature schema of an intrinsic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Signature {
    /// `T -> T@P`, all-equal.
    Place { placement: Placement },
    /// `T@SERVER -> T@CLIENTS`, all-equal.
    Broadcast,
    /// `<(T -> U), {T}@P> -> {U}@P`, preserving `all_equal`.
    Map { placement: Placement },
    /// `<{A}@P, {B}@P, ...> -> {<A,B,...>}@P`.
    Zip { placement: Placement },
    /// `{T}@CLIENTS -> T'@SERVER` where `T'` depends on the operator.
    Aggregate { op: AggregateOp },
    /// `<{T}@CLIENTS, U, (<U,T> -> U), (<U,U> -> U), (U -> R)> -> R@SERVER`.
    Fold,
    /// `<P@SERVER, P@SERVER> -> P@SERVER`.
    MergePartials { op: AggregateOp },
    /// `<total=T,count=int64>@SERVER -> T@SERVER`.
    FinalizeMean,
}

impl Signature {
    /// The placement whose values this intrinsic consumes, if fixed.
    pub fn input_placement(self) -> Option<Placement> {
        match self {
            Signature::Place { .. } => None,
            Signature::Broadcast | Signature::MergePartials { .. } | Signature::FinalizeMean => {
                Some(Placement::Server)
            }
            Signature::Map { placement } | Signature::Zip { placement } => Some(placement),
            Signature::Aggregate { .. } | Signature::Fold => Some(Placement::Clients),
        }
    }

    /// Result type of applying the intrinsic `name` to a value of type `arg`.
    pub fn instantiate(
        self,
        name: &str,
        pool: &mut TypePool,
        arg: TypeId,
        accepts_unzipped: bool,
    ) -> Result<TypeId, TypeError> {
        let fail = |pool: &TypePool, reason: &str| TypeError::IntrinsicSignature {
            name: name.to_owned(),
            found: pool.format(arg),
            reason: reason.to_owned(),
        };

        match self {
            Signature::Place { placement } => {
                if pool
                    .flags(arg)
                    .intersects(TypeFlags::HAS_FEDERATED | TypeFlags::HAS_FUNCTION)
                {
                    return Err(fail(pool, "placed value must be unplaced data"));
                }
                pool.federated(arg, placement, true)
            }
            Signature::Broadcast => match pool.federated_parts(arg) {
                Some((member, Placement::Server, _)) => pool.at_clients(member, true),
                _ => Err(fail(pool, "expected a SERVER-placed value")),
            },
            Signature::Map { placement } => {
                let Some(&[func, value]) = pool.struct_fields(arg) else {
                    return Err(fail(pool, "expected <function, federated value>"));
                };
                let Some((Some(param), result)) = pool.function_parts(func.ty) else {
                    return Err(fail(pool, "first element must be a one-argument function"));
                };
                let zipped = if accepts_unzipped {
                    zipped_member(pool, value.ty, placement)
                } else {
                    federated_member(pool, value.ty, placement)
                };
                let Some((member, all_equal)) = zipped else {
                    return Err(fail(pool, "second element must be placed at the map's placement"));
                };
                if !pool.is_assignable(member, param) {
                    return Err(fail(pool, "mapped function cannot accept the member type"));
                }
                let all_equal = all_equal || placement == Placement::Server;
                pool.federated(result, placement, all_equal)
                    .map_err(|_| fail(pool, "mapped function must return unplaced data"))
            }
            Signature::Zip { placement } => {
                if !matches!(pool.struct_fields(arg), Some(fields) if !fields.is_empty()) {
                    return Err(fail(pool, "expected a non-empty struct of federated values"));
                }
                let Some((member, all_equal)) = zipped_member(pool, arg, placement) else {
                    return Err(fail(pool, "every element must be placed at the zip's placement"));
                };
                pool.federated(member, placement, all_equal || placement == Placement::Server)
            }
            Signature::Aggregate { op } => {
                let zipped = if accepts_unzipped {
                    zipped_member(pool, arg, Placement::Clients)
                } else {
                    federated_member(pool, arg, Placement::Clients)
                };
                let Some((member, _)) = zipped else {
                    return Err(fail(pool, "expected a CLIENTS-placed value"));
                };
                op.check_member(pool, member).map_err(|reason| fail(pool, &reason))?;
                let result = op.result_member(pool, member);
                pool.at_server(result)
            }
            Signature::Fold => instantiate_fold(pool, arg).map_err(|reason| fail(pool, reason)),
            Signature::MergePartials { op } => {
                let Some(&[a, b]) = pool.struct_fields(arg) else {
                    return Err(fail(pool, "expected a pair of partials"));
                };
                if !pool.is_equivalent(a.ty, b.ty) {
                    return Err(fail(pool, "partials must have the same type"));
                }
                let Some((member, Placement::Server, _)) = pool.federated_parts(a.ty) else {
                    return Err(fail(pool, "partials must be SERVER-placed"));
                };
                if op == AggregateOp::Mean && mean_total(pool, member).is_none() {
                    return Err(fail(pool, "mean partials must be <total,count>"));
                }
                Ok(a.ty)
            }
            Signature::FinalizeMean => {
                let total = match pool.federated_parts(arg) {
                    Some((member, Placement::Server, _)) => mean_total(pool, member),
                    _ => None,
                };
                let Some(total) = total else {
                    return Err(fail(pool, "expected a SERVER-placed <total,count> partial"));
                };
                pool.at_server(total)
            }
        }
    }
}

/// `(member, all_equal)` of a federated value at `placement`.
fn federated_member(pool: &TypePool, ty: TypeId, placement: Placement) -> Option<(TypeId, bool)> {
    match pool.federated_parts(ty) {
        Some((member, p, all_equal)) if p == placement => Some((member, all_equal)),
        _ => None,
    }
}

/// Like [`federated_member`], but a struct of federated values at
/// `placement` is treated as its zipped form.
pub fn zipped_member(
    pool: &mut TypePool,
    ty: TypeId,
    placement: Placement,
) -> Option<(TypeId, bool)> {
    if let Some(found) = federated_member(pool, ty, placement) {
        return Some(found);
    }
    let fields = pool.struct_fields(ty)?.to_vec();
    if fields.is_empty() {
        return None;
    }
    let mut members = Vec::with_capacity(fields.len());
    let mut all_equal = true;
    for field in fields {
        let (member, equal) = federated_member(pool, field.ty, placement)?;
        all_equal &= equal;
        members.push(Field {
            name: field.name,
            ty: member,
        });
    }
    Some((pool.structure_of(members), all_equal))
}

/// `T` of a `<total=T,count=int64>` partial.
fn mean_total(pool: &TypePool, partial: TypeId) -> Option<TypeId> {
    let [total, count] = pool.struct_fields(partial)? else {
        return None;
    };
    let (dtype, shape) = pool.tensor_parts(count.ty)?;
    (dtype == DType::Int64 && shape.is_scalar()).then_some(total.ty)
}

fn instantiate_fold(pool: &mut TypePool, arg: TypeId) -> Result<TypeId, &'static str> {
    let Some(&[value, zero, accumulate, merge, report]) = pool.struct_fields(arg) else {
        return Err("expected <value, zero, accumulate, merge, report>");
    };
    let (member, _) =
        federated_member(pool, value.ty, Placement::Clients).ok_or("value must be CLIENTS-placed")?;
    let accumulator = zero.ty;
    if pool.flags(accumulator).contains(TypeFlags::HAS_FEDERATED) {
        return Err("zero must be unplaced");
    }

    let binary_ok = |pool: &TypePool, func: TypeId, second: TypeId| -> bool {
        let Some((Some(param), result)) = pool.function_parts(func) else {
            return false;
        };
        match pool.struct_fields(param) {
            Some([a, b]) => {
                pool.is_assignable(accumulator, a.ty)
                    && pool.is_assignable(second, b.ty)
                    && pool.is_assignable(result, accumulator)
            }
            _ => false,
        }
    };
    if !binary_ok(pool, accumulate.ty, member) {
        return Err("accumulate must have type (<U,T> -> U)");
    }
    if !binary_ok(pool, merge.ty, accumulator) {
        return Err("merge must have type (<U,U> -> U)");
    }
    let Some((Some(report_param), report_result)) = pool.function_parts(report.ty) else {
        return Err("report must be a one-argument function");
    };
    if !pool.is_assignable(accumulator, report_param) {
        return Err("report must accept the accumulator");
    }
    pool.at_server(report_result)
        .map_err(|_| "report must return unplaced data")
}
