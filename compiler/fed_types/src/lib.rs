//! Type system for federated computations.
//!
//! Every value flowing through a computation has one of five kinds of type:
//!
//! - **Tensor**: a dtype plus a (possibly partially known) shape
//! - **Struct**: an ordered list of optionally named elements
//! - **Function**: a single (optional) parameter and a result
//! - **Federated**: a member type placed at `SERVER` or `CLIENTS`, with an
//!   `all_equal` bit recording whether every copy is guaranteed identical
//! - **Placement**: the type of placement literals
//!
//! # Design
//!
//! - **Intern Everything**: types live in a [`TypePool`] and are referenced by
//!   a 32-bit [`TypeId`]; identity is O(1) handle comparison
//! - **Precompute**: [`TypeFlags`] and a structural content hash are computed
//!   once at interning time and never re-derived
//! - **Names are metadata**: [`TypePool::is_equivalent`] ignores struct field
//!   names, [`TypePool::is_identical`] does not
//!
//! Assignability follows the federated rules: an `all_equal` value may stand
//! in for a per-participant one, never the reverse, and placements must match.

mod analysis;
mod assign;
mod dtype;
mod error;
mod flags;
mod name;
mod placement;
mod pool;
mod type_id;

pub use analysis::{
    check_sum_compatible, contains_federated, contains_function, contains_per_client,
    contains_placement, count_tensors, is_average_compatible, is_min_max_compatible,
    is_per_client, preorder, without_per_client, TensorCount,
};
pub use dtype::{DType, Shape};
pub use error::TypeError;
pub use flags::TypeFlags;
pub use name::{Name, NameTable};
pub use placement::Placement;
pub use pool::{Field, TypeKind, TypePool};
pub use type_id::TypeId;
