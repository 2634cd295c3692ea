//! Native realization of intrinsics, driven by their registry signatures.

use fed_ir::{AggregateOp, Signature};
use fed_types::{Placement, TypeId};

use super::{errors, Evaluator};
use crate::value::{add, divide, identity_for, maximum, minimum, zeros, FederatedValue};
use crate::{BackendError, Value};

impl Evaluator<'_> {
    pub(super) fn apply_intrinsic(
        &self,
        name: &str,
        fn_ty: TypeId,
        arg: Option<Value>,
    ) -> Result<Value, BackendError> {
        let registry = self.arena.registry();
        let def = registry
            .get(name)
            .ok_or_else(|| errors::unknown_intrinsic(name))?;
        let arg = arg.ok_or_else(errors::missing_argument)?;
        tracing::trace!(intrinsic = name, "apply intrinsic");

        match def.signature {
            Signature::Place { placement } => Ok(Value::Federated(FederatedValue {
                placement,
                all_equal: true,
                members: vec![arg],
            })),
            Signature::Broadcast => {
                let member = placed_member(name, Placement::Server, &arg)?;
                Ok(Value::all_clients(member.clone()))
            }
            Signature::Map { placement } => {
                let [function, value] = pair(name, &arg)?;
                let (members, all_equal) = if def.accepts_unzipped {
                    self.zip(name, placement, value)?
                } else {
                    members_at(name, placement, value)?
                };
                let mut mapped = Vec::with_capacity(members.len());
                for member in members {
                    mapped.push(self.call(function, Some(member))?);
                }
                Ok(Value::Federated(FederatedValue {
                    placement,
                    all_equal: all_equal || placement == Placement::Server,
                    members: mapped,
                }))
            }
            Signature::Zip { placement } => {
                let (members, all_equal) = self.zip(name, placement, &arg)?;
                Ok(Value::Federated(FederatedValue {
                    placement,
                    all_equal: all_equal || placement == Placement::Server,
                    members,
                }))
            }
            Signature::Aggregate { op } => {
                let (members, all_equal) = if def.accepts_unzipped {
                    self.zip(name, Placement::Clients, &arg)?
                } else {
                    members_at(name, Placement::Clients, &arg)?
                };
                let members = self.per_client(members, all_equal);
                let member_ty = self.server_member_type(fn_ty);
                self.aggregate(op, member_ty, &members).map(Value::at_server)
            }
            Signature::Fold => {
                let [value, zero, accumulate, _merge, report] = fields::<5>(name, &arg)?;
                let (members, all_equal) = members_at(name, Placement::Clients, value)?;
                let mut acc = zero.clone();
                for member in self.per_client(members, all_equal) {
                    acc = self.call(accumulate, Some(Value::tuple([acc, member])))?;
                }
                self.call(report, Some(acc)).map(Value::at_server)
            }
            Signature::MergePartials { op } => {
                let [a, b] = pair(name, &arg)?;
                let a = placed_member(name, Placement::Server, a)?;
                let b = placed_member(name, Placement::Server, b)?;
                let merged = match op {
                    AggregateOp::Max => maximum(a, b)?,
                    AggregateOp::Min => minimum(a, b)?,
                    // Sums, and mean partials field by field.
                    AggregateOp::Sum
                    | AggregateOp::SecureSum
                    | AggregateOp::Mean
                    | AggregateOp::MeanPartial => add(a, b)?,
                };
                Ok(Value::at_server(merged))
            }
            Signature::FinalizeMean => {
                let partial = placed_member(name, Placement::Server, &arg)?;
                let [total, count] = pair(name, partial)?;
                let count = count
                    .as_int()
                    .ok_or_else(|| errors::malformed_intrinsic_argument(name, &arg))?;
                divide(total, count).map(Value::at_server)
            }
        }
    }

    fn aggregate(
        &self,
        op: AggregateOp,
        member_ty: TypeId,
        members: &[Value],
    ) -> Result<Value, BackendError> {
        let types = self.arena.types();
        let count = i64::try_from(members.len()).unwrap_or(i64::MAX);
        match op {
            AggregateOp::Sum | AggregateOp::SecureSum => sum(zeros(types, member_ty)?, members),
            AggregateOp::Max => fold(identity_for(types, member_ty, op)?, members, maximum),
            AggregateOp::Min => fold(identity_for(types, member_ty, op)?, members, minimum),
            AggregateOp::Mean => divide(&sum(zeros(types, member_ty)?, members)?, count),
            AggregateOp::MeanPartial => {
                let total_ty = types
                    .struct_fields(member_ty)
                    .and_then(|fields| fields.first())
                    .map_or(member_ty, |field| field.ty);
                let total = sum(zeros(types, total_ty)?, members)?;
                Ok(Value::named([("total", total), ("count", Value::int64(count))]))
            }
        }
    }

    /// Members of the zip of `value` at `placement`: either one federated
    /// value or a struct of them.
    fn zip(
        &self,
        name: &str,
        placement: Placement,
        value: &Value,
    ) -> Result<(Vec<Value>, bool), BackendError> {
        if let Value::Federated(_) = value {
            return members_at(name, placement, value);
        }
        let Value::Struct(elements) = value else {
            return Err(errors::malformed_intrinsic_argument(name, value));
        };
        let mut columns = Vec::with_capacity(elements.len());
        let mut participants: Option<usize> = None;
        for (field, element) in elements {
            let (members, all_equal) = members_at(name, placement, element)?;
            if !all_equal {
                match participants {
                    Some(n) if n != members.len() => {
                        return Err(errors::cardinality(n, members.len()));
                    }
                    _ => participants = Some(members.len()),
                }
            }
            columns.push((field.clone(), members, all_equal));
        }

        let Some(n) = participants else {
            let row = columns
                .into_iter()
                .map(|(field, mut members, _)| (field, members.swap_remove(0)))
                .collect();
            return Ok((vec![Value::Struct(row)], true));
        };
        let mut rows: Vec<Vec<(Option<String>, Value)>> =
            (0..n).map(|_| Vec::with_capacity(columns.len())).collect();
        for (field, members, all_equal) in columns {
            for (i, row) in rows.iter_mut().enumerate() {
                let member = if all_equal { &members[0] } else { &members[i] };
                row.push((field.clone(), member.clone()));
            }
        }
        Ok((rows.into_iter().map(Value::Struct).collect(), false))
    }

    /// One member per client, repeating an all-equal member.
    fn per_client(&self, members: Vec<Value>, all_equal: bool) -> Vec<Value> {
        match (all_equal, members.first()) {
            (true, Some(member)) => vec![member.clone(); self.cardinalities.clients],
            _ => members,
        }
    }

    /// `T` of an intrinsic of type `(A -> T@SERVER)`.
    fn server_member_type(&self, fn_ty: TypeId) -> TypeId {
        let types = self.arena.types();
        let result = self.result_type(fn_ty);
        types
            .federated_parts(result)
            .map_or(result, |(member, _, _)| member)
    }
}

fn sum(zero: Value, members: &[Value]) -> Result<Value, BackendError> {
    fold(zero, members, add)
}

fn fold(
    init: Value,
    members: &[Value],
    op: fn(&Value, &Value) -> Result<Value, BackendError>,
) -> Result<Value, BackendError> {
    members.iter().try_fold(init, |acc, m| op(&acc, m))
}

/// Members and all-equal flag of a federated `value` at `placement`.
/// An all-equal value always has exactly one member.
fn members_at(
    name: &str,
    placement: Placement,
    value: &Value,
) -> Result<(Vec<Value>, bool), BackendError> {
    match value {
        Value::Federated(fed)
            if fed.placement == placement && (!fed.all_equal || fed.members.len() == 1) =>
        {
            Ok((fed.members.clone(), fed.all_equal))
        }
        _ => Err(errors::malformed_intrinsic_argument(name, value)),
    }
}

fn placed_member<'v>(
    name: &str,
    placement: Placement,
    value: &'v Value,
) -> Result<&'v Value, BackendError> {
    match value {
        Value::Federated(fed) if fed.placement == placement && fed.all_equal => fed
            .members
            .first()
            .ok_or_else(|| errors::malformed_intrinsic_argument(name, value)),
        _ => Err(errors::malformed_intrinsic_argument(name, value)),
    }
}

fn fields<'v, const N: usize>(name: &str, value: &'v Value) -> Result<[&'v Value; N], BackendError> {
    let elements = value
        .fields()
        .filter(|elements| elements.len() == N)
        .ok_or_else(|| errors::malformed_intrinsic_argument(name, value))?;
    Ok(std::array::from_fn(|i| &elements[i].1))
}

fn pair<'v>(name: &str, value: &'v Value) -> Result<[&'v Value; 2], BackendError> {
    fields::<2>(name, value)
}
