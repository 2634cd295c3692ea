//! The result of a split.

use std::sync::Arc;

use fed_compiler::Artifact;

/// One aggregation site of the split computation, in partial-tuple order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregationSite {
    /// The aggregation intrinsic found in the computation.
    pub intrinsic: String,
    /// Applied per client partition.
    pub partial: String,
    /// Folds two partials into one.
    pub merge: String,
    /// Turns the merged partial into the aggregation's result.
    pub finalize: Option<String>,
}

/// A computation `p -> r` split into three compiled pieces:
///
/// - `client`: `p -> <P_1, ..., P_n>`, run once per disjoint client
///   partition, yielding one partial per aggregation
/// - `merge`: `<<P_1, ..., P_n>, <P_1, ..., P_n>> -> <P_1, ..., P_n>`,
///   associative and commutative
/// - `server`: `<p', <P_1, ..., P_n>> -> r`, run once on the merged
///   partials, where `p'` is `p` with every per-participant CLIENTS
///   component replaced by `<>`
///
/// Running `client` on every partition, folding the partials with `merge`
/// and applying `server` equals running the original on all clients.
#[derive(Clone, Debug)]
pub struct MergeableForm {
    pub client: Arc<Artifact>,
    pub merge: Arc<Artifact>,
    pub server: Arc<Artifact>,
    pub aggregations: Vec<AggregationSite>,
}

impl MergeableForm {
    pub fn aggregation_count(&self) -> usize {
        self.aggregations.len()
    }
}
