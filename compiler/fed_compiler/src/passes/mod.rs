//! The standard passes, in pipeline order.

mod canonicalize;
mod inline;
mod merge_leaves;
mod uniquify;
mod unused;


use std::sync::Arc;

use crate::Pass;

pub use canonicalize::CanonicalizeIntrinsics;
pub use inline::InlineReferences;
pub use merge_leaves::MergeCompiledLeaves;
pub use uniquify::{uniquify, UniquifyNames};
pub use unused::RemoveUnusedBindings;

pub(crate) use canonicalize::unzipped;
pub(crate) use inline::{fold_selection, is_redex};
pub(crate) use merge_leaves::region;

/// The five standard passes, iterated to a fixed point by the pipeline.
pub fn standard_passes() -> Vec<Arc<dyn Pass>> {
    vec![
        Arc::new(UniquifyNames),
        Arc::new(InlineReferences),
        Arc::new(RemoveUnusedBindings),
        Arc::new(MergeCompiledLeaves),
        Arc::new(CanonicalizeIntrinsics),
    ]
}
