//! Mergeable-computation compiler.
//!
//! Splits a computation `p -> r` whose CLIENTS data only reaches the result
//! through mergeable aggregations into:
//!
//! - a **client piece** computing one partial aggregate per aggregation,
//!   runnable on any disjoint subset of the clients
//! - a **merge** step folding two partial tuples into one
//! - a **server piece** finishing the computation from the merged partials
//!
//! Which aggregations can be split, and how, comes entirely from the
//! [`fed_ir::IntrinsicRegistry`]: an aggregation is mergeable iff the
//! registry gives it a [`fed_ir::MergeSpec`].

mod collect;
mod error;
mod form;
mod pieces;
mod splitter;

pub use error::{UnsplittableComputationError, UnsplittableReason};
pub use form::{AggregationSite, MergeableForm};
pub use splitter::MergeableCompiler;
