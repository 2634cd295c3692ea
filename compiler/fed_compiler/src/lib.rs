//! Compiler pipeline for federated computations.
//!
//! A [`Pipeline`] rewrites a building-block tree into canonical form by
//! iterating five semantics-preserving passes to a fixed point:
//!
//! 1. [`UniquifyNames`]: every binder gets a unique, deterministic name
//! 2. [`InlineReferences`]: beta-reduction, block inlining and flattening,
//!    selection folding
//! 3. [`RemoveUnusedBindings`]: dead bindings without observable effects
//! 4. [`MergeCompiledLeaves`]: compiled leaves joined by glue are fused
//! 5. [`CanonicalizeIntrinsics`]: unzipped intrinsic arguments are zipped
//!
//! Results are cached as immutable [`Artifact`]s.

mod analysis;
mod artifact;
mod config;
mod error;
mod pass;
mod passes;
mod pipeline;
mod validate;

pub use analysis::{binders, has_observable_call, performs_call, used_under_lambda};
pub use artifact::Artifact;
pub use config::PipelineConfig;
pub use error::CompilerError;
pub use pass::{Pass, PassContext};
pub use passes::{
    standard_passes, uniquify, CanonicalizeIntrinsics, InlineReferences, MergeCompiledLeaves,
    RemoveUnusedBindings, UniquifyNames,
};
pub use pipeline::Pipeline;
pub use validate::validate_canonical;
