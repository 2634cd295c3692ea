//! Split failures.

use fed_compiler::CompilerError;

/// Why a computation has no mergeable split.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UnsplittableReason {
    #[error("computation is not a one-parameter function")]
    NotAFunction,

    #[error("parameter carries no CLIENTS-placed value")]
    NoClientsParameter,

    #[error("aggregation `{intrinsic}` has no registered merge")]
    NonMergeableAggregation { intrinsic: String },

    #[error("aggregation `{intrinsic}` occurs under a lambda")]
    AggregationUnderLambda { intrinsic: String },

    #[error("input of aggregation `{intrinsic}` depends on another aggregation")]
    DependentAggregation { intrinsic: String },

    #[error("input of aggregation `{intrinsic}` reads `{name}`, bound outside the client piece")]
    CapturedBinding { intrinsic: String, name: String },

    #[error("intrinsic `{intrinsic}` is used as a value")]
    IntrinsicAsValue { intrinsic: String },

    #[error("result is CLIENTS-placed")]
    ClientsPlacedResult,

    #[error("CLIENTS-placed computation outside any aggregation")]
    ClientsComputationOutsideAggregation,

    #[error("piece failed to compile: {0}")]
    Compilation(#[source] CompilerError),
}

/// A computation the mergeable compiler cannot split.
///
/// Always permanent: the computation must be restructured or run unsplit.
#[derive(Clone, Debug, thiserror::Error)]
#[error("unsplittable computation: {reason} at {subtree}")]
pub struct UnsplittableComputationError {
    #[source]
    pub reason: UnsplittableReason,
    pub subtree: String,
}

impl UnsplittableComputationError {
    pub fn new(reason: UnsplittableReason, subtree: impl Into<String>) -> Self {
        Self {
            reason,
            subtree: subtree.into(),
        }
    }
}
