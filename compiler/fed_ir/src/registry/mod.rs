//! Intrinsic registry: the table of named distributed operators.
//!
//! The registry is immutable configuration. It is built once, shared via
//! `Arc`, and consulted by node construction, the compiler passes, the
//! splitter and the reference backend. Nothing in the core hardcodes which
//! intrinsics are mergeable; that comes from [`Aggregation::merge`].

mod signature;

#[cfg(test)]
mod tests;

use std::hash::{Hash, Hasher};

use fed_types::{Placement, TypeError, TypeId, TypePool};
use rustc_hash::{FxHashMap, FxHasher};

pub use signature::{mean_partial_type, zipped_member, AggregateOp, Signature};

/// Names of the intrinsics in [`IntrinsicRegistry::standard`].
pub mod names {
    pub const FEDERATED_VALUE_AT_SERVER: &str = "federated_value_at_server";
    pub const FEDERATED_VALUE_AT_CLIENTS: &str = "federated_value_at_clients";
    pub const FEDERATED_BROADCAST: &str = "federated_broadcast";
    pub const FEDERATED_MAP: &str = "federated_map";
    pub const FEDERATED_APPLY: &str = "federated_apply";
    pub const FEDERATED_ZIP_AT_CLIENTS: &str = "federated_zip_at_clients";
    pub const FEDERATED_ZIP_AT_SERVER: &str = "federated_zip_at_server";
    pub const FEDERATED_SUM: &str = "federated_sum";
    pub const FEDERATED_SECURE_SUM: &str = "federated_secure_sum";
    pub const FEDERATED_MEAN: &str = "federated_mean";
    pub const FEDERATED_MAX: &str = "federated_max";
    pub const FEDERATED_MIN: &str = "federated_min";
    pub const FEDERATED_AGGREGATE: &str = "federated_aggregate";
    pub const FEDERATED_MEAN_PARTIAL: &str = "federated_mean_partial";
    pub const MERGE_SUM: &str = "merge_sum";
    pub const MERGE_MEAN: &str = "merge_mean";
    pub const MERGE_MAX: &str = "merge_max";
    pub const MERGE_MIN: &str = "merge_min";
    pub const FINALIZE_MEAN: &str = "finalize_mean";
}

/// How a mergeable aggregation splits into partial, merge and finalize steps.
///
/// Applying `partial` to disjoint client subsets and folding the results
/// with `merge` must equal applying the aggregation to the union, after
/// `finalize` when present. `merge` must be associative and commutative.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MergeSpec {
    pub partial: String,
    pub merge: String,
    pub finalize: Option<String>,
}

/// Marks an intrinsic as consuming CLIENTS values into a SERVER value.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Aggregation {
    /// `None` means the aggregation cannot be split.
    pub merge: Option<MergeSpec>,
}

/// One registry entry.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct IntrinsicDef {
    pub name: String,
    pub signature: Signature,
    pub aggregation: Option<Aggregation>,
    /// Calls have effects beyond their value and must never be dropped.
    pub observable: bool,
    /// Accepts a struct of federated values in place of their zip.
    pub accepts_unzipped: bool,
}

impl IntrinsicDef {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            signature,
            aggregation: None,
            observable: false,
            accepts_unzipped: false,
        }
    }

    /// Mark as an aggregation, mergeable iff `merge` is given.
    #[must_use]
    pub fn aggregating(mut self, merge: Option<MergeSpec>) -> Self {
        self.aggregation = Some(Aggregation { merge });
        self
    }

    #[must_use]
    pub fn observable(mut self) -> Self {
        self.observable = true;
        self
    }

    #[must_use]
    pub fn accepting_unzipped(mut self) -> Self {
        self.accepts_unzipped = true;
        self
    }

    pub fn is_aggregation(&self) -> bool {
        self.aggregation.is_some()
    }

    pub fn merge_spec(&self) -> Option<&MergeSpec> {
        self.aggregation.as_ref()?.merge.as_ref()
    }

    /// Result type of this intrinsic applied to `arg`.
    pub fn instantiate(&self, pool: &mut TypePool, arg: TypeId) -> Result<TypeId, TypeError> {
        self.signature
            .instantiate(&self.name, pool, arg, self.accepts_unzipped)
    }

    /// Full function type of this intrinsic applied to `arg`.
    pub fn function_type(&self, pool: &mut TypePool, arg: TypeId) -> Result<TypeId, TypeError> {
        let result = self.instantiate(pool, arg)?;
        Ok(pool.function(Some(arg), result))
    }

    /// Check a declared intrinsic type against the signature.
    pub fn check_type(&self, pool: &mut TypePool, ty: TypeId) -> Result<(), TypeError> {
        let Some((Some(param), declared)) = pool.function_parts(ty) else {
            return Err(TypeError::UnexpectedKind {
                context: format!("intrinsic `{}`", self.name),
                expected: "a one-argument function type",
                found: pool.format(ty),
            });
        };
        let result = self.instantiate(pool, param)?;
        pool.check_assignable(result, declared, &format!("result of intrinsic `{}`", self.name))
    }
}

/// Immutable name → definition table.
#[derive(Clone, Debug)]
pub struct IntrinsicRegistry {
    defs: FxHashMap<String, IntrinsicDef>,
    fingerprint: u64,
}

impl IntrinsicRegistry {
    pub fn empty() -> Self {
        Self {
            defs: FxHashMap::default(),
            fingerprint: 0,
        }
    }

    /// The standard federated intrinsics.
    pub fn standard() -> Self {
        use names::*;

        let merge = |partial: &str, merge: &str, finalize: Option<&str>| {
            Some(MergeSpec {
                partial: partial.to_owned(),
                merge: merge.to_owned(),
                finalize: finalize.map(str::to_owned),
            })
        };
        let aggregate = |op| Signature::Aggregate { op };
        let merge_partials = |op| Signature::MergePartials { op };

        Self::empty()
            .with(IntrinsicDef::new(
                FEDERATED_VALUE_AT_SERVER,
                Signature::Place {
                    placement: Placement::Server,
                },
            ))
            .with(IntrinsicDef::new(
                FEDERATED_VALUE_AT_CLIENTS,
                Signature::Place {
                    placement: Placement::Clients,
                },
            ))
            .with(IntrinsicDef::new(FEDERATED_BROADCAST, Signature::Broadcast))
            .with(IntrinsicDef::new(
                FEDERATED_MAP,
                Signature::Map {
                    placement: Placement::Clients,
                },
            ))
            .with(IntrinsicDef::new(
                FEDERATED_APPLY,
                Signature::Map {
                    placement: Placement::Server,
                },
            ))
            .with(IntrinsicDef::new(
                FEDERATED_ZIP_AT_CLIENTS,
                Signature::Zip {
                    placement: Placement::Clients,
                },
            ))
            .with(IntrinsicDef::new(
                FEDERATED_ZIP_AT_SERVER,
                Signature::Zip {
                    placement: Placement::Server,
                },
            ))
            .with(
                IntrinsicDef::new(FEDERATED_SUM, aggregate(AggregateOp::Sum))
                    .aggregating(merge(FEDERATED_SUM, MERGE_SUM, None))
                    .accepting_unzipped(),
            )
            .with(
                IntrinsicDef::new(FEDERATED_SECURE_SUM, aggregate(AggregateOp::SecureSum))
                    .aggregating(merge(FEDERATED_SECURE_SUM, MERGE_SUM, None))
                    .accepting_unzipped()
                    .observable(),
            )
            .with(
                IntrinsicDef::new(FEDERATED_MEAN, aggregate(AggregateOp::Mean))
                    .aggregating(merge(
                        FEDERATED_MEAN_PARTIAL,
                        MERGE_MEAN,
                        Some(FINALIZE_MEAN),
                    ))
                    .accepting_unzipped(),
            )
            .with(
                IntrinsicDef::new(FEDERATED_MAX, aggregate(AggregateOp::Max))
                    .aggregating(merge(FEDERATED_MAX, MERGE_MAX, None))
                    .accepting_unzipped(),
            )
            .with(
                IntrinsicDef::new(FEDERATED_MIN, aggregate(AggregateOp::Min))
                    .aggregating(merge(FEDERATED_MIN, MERGE_MIN, None))
                    .accepting_unzipped(),
            )
            .with(IntrinsicDef::new(FEDERATED_AGGREGATE, Signature::Fold).aggregating(None))
            .with(
                IntrinsicDef::new(FEDERATED_MEAN_PARTIAL, aggregate(AggregateOp::MeanPartial))
                    .aggregating(merge(FEDERATED_MEAN_PARTIAL, MERGE_MEAN, None)),
            )
            .with(IntrinsicDef::new(MERGE_SUM, merge_partials(AggregateOp::Sum)))
            .with(IntrinsicDef::new(MERGE_MEAN, merge_partials(AggregateOp::Mean)))
            .with(IntrinsicDef::new(MERGE_MAX, merge_partials(AggregateOp::Max)))
            .with(IntrinsicDef::new(MERGE_MIN, merge_partials(AggregateOp::Min)))
            .with(IntrinsicDef::new(FINALIZE_MEAN, Signature::FinalizeMean))
    }

    /// Add or replace a definition.
    #[must_use]
    pub fn with(mut self, def: IntrinsicDef) -> Self {
        self.defs.insert(def.name.clone(), def);
        self.fingerprint = self.compute_fingerprint();
        self
    }

    pub fn get(&self, name: &str) -> Option<&IntrinsicDef> {
        self.defs.get(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&IntrinsicDef, TypeError> {
        self.get(name).ok_or_else(|| TypeError::UnknownIntrinsic {
            name: name.to_owned(),
        })
    }

    /// Definitions sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &IntrinsicDef> {
        let mut defs: Vec<&IntrinsicDef> = self.defs.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs.into_iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// The zip intrinsic for a placement, if one is registered.
    pub fn zip_for(&self, placement: Placement) -> Option<&IntrinsicDef> {
        self.iter()
            .find(|def| def.signature == Signature::Zip { placement })
    }

    /// Order-independent content hash of every definition.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    fn compute_fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for def in self.iter() {
            def.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl Default for IntrinsicRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
