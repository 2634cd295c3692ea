//! Participant counts of one invocation.

use std::ops::Range;

use fed_types::{Placement, TypeId, TypeKind, TypePool};
use serde::{Deserialize, Serialize};

use crate::value::FederatedValue;
use crate::{ExecError, Value};

/// Number of participants per placement for one invocation.
///
/// There is always exactly one server.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Cardinalities {
    pub clients: usize,
}

/// Infer cardinalities from a conformed argument of type `ty`.
///
/// Every per-participant CLIENTS value in the argument must have the same
/// number of members. An argument whose type has no per-participant CLIENTS
/// component has no clients; one whose per-participant components were all
/// given as all-equal values has no count at all and is rejected.
pub fn infer_cardinalities(
    pool: &TypePool,
    ty: TypeId,
    value: &Value,
) -> Result<Cardinalities, ExecError> {
    let mut census = Census::default();
    walk(pool, ty, value, &mut String::from("arg"), &mut census)?;
    match (census.found, census.uncounted) {
        (Some((clients, _)), _) => Ok(Cardinalities { clients }),
        (None, Some(path)) => Err(ExecError::UnknownCardinality { path }),
        (None, None) => Ok(Cardinalities { clients: 0 }),
    }
}

#[derive(Default)]
struct Census {
    /// Member count and the path it was first seen at.
    found: Option<(usize, String)>,
    /// First per-participant slot filled by an all-equal value.
    uncounted: Option<String>,
}

fn walk(
    pool: &TypePool,
    ty: TypeId,
    value: &Value,
    path: &mut String,
    census: &mut Census,
) -> Result<(), ExecError> {
    match (pool.kind(ty), value) {
        (
            TypeKind::Federated {
                placement: Placement::Clients,
                all_equal: false,
                ..
            },
            Value::Federated(FederatedValue { all_equal: true, .. }),
        ) => {
            census.uncounted.get_or_insert_with(|| path.clone());
            Ok(())
        }
        (
            TypeKind::Federated {
                placement: Placement::Clients,
                ..
            },
            Value::Federated(FederatedValue {
                all_equal: false,
                members,
                ..
            }),
        ) => match &census.found {
            Some((expected, first)) if *expected != members.len() => {
                Err(ExecError::CardinalityMismatch {
                    path: format!("{path} (first counted at {first})"),
                    expected: *expected,
                    found: members.len(),
                })
            }
            Some(_) => Ok(()),
            None => {
                census.found = Some((members.len(), path.clone()));
                Ok(())
            }
        },
        (TypeKind::Struct(fields), Value::Struct(elements)) => {
            for (i, (field, (_, element))) in fields.iter().zip(elements).enumerate() {
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                walk(pool, field.ty, element, path, census)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// `min(partitions, clients)` contiguous ranges covering `0..clients`,
/// sizes differing by at most one. No clients gives one empty range.
pub(crate) fn partition_ranges(clients: usize, partitions: usize) -> Vec<Range<usize>> {
    let groups = partitions.min(clients).max(1);
    let base = clients / groups;
    let extra = clients % groups;
    let mut ranges = Vec::with_capacity(groups);
    let mut start = 0;
    for g in 0..groups {
        let len = base + usize::from(g < extra);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// `value` with every per-participant CLIENTS value cut down to `range`.
pub(crate) fn slice_clients(value: &Value, range: &Range<usize>) -> Value {
    match value {
        Value::Federated(fed) if fed.placement == Placement::Clients && !fed.all_equal => {
            Value::Federated(FederatedValue {
                placement: fed.placement,
                all_equal: false,
                members: fed.members[range.clone()].to_vec(),
            })
        }
        Value::Struct(fields) => Value::Struct(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), slice_clients(v, range)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `value` of type `ty` with every per-participant CLIENTS component
/// replaced by `<>`, matching the server piece's view of the argument.
pub(crate) fn strip_clients(pool: &TypePool, ty: TypeId, value: &Value) -> Value {
    match (pool.kind(ty), value) {
        (
            TypeKind::Federated {
                placement: Placement::Clients,
                all_equal: false,
                ..
            },
            _,
        ) => Value::Struct(Vec::new()),
        (TypeKind::Struct(fields), Value::Struct(elements)) => Value::Struct(
            fields
                .iter()
                .zip(elements)
                .map(|(field, (name, element))| {
                    (name.clone(), strip_clients(pool, field.ty, element))
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}
