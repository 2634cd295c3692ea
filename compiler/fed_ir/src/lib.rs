//! Building-block IR for federated computations.
//!
//! A computation is a typed tree of building blocks (references, lambdas,
//! calls, blocks, structs, selections, data, compiled leaves and intrinsics)
//! stored in a hash-consing [`Arena`].
//!
//! # Design
//!
//! - **Fail-fast typing**: every constructor validates the node's type, so an
//!   ill-typed tree is never built
//! - **Immutable nodes**: transformations produce new nodes and share
//!   unchanged subtrees; node identity is an O(1) handle comparison
//! - **Registry-driven intrinsics**: nothing here hardcodes which intrinsics
//!   exist; signatures and merge behavior come from [`IntrinsicRegistry`]

mod alpha;
mod arena;
mod flags;
mod infer;
mod node;
mod registry;
mod render;
mod serialize;
mod stack;
mod transform;

pub use alpha::alpha_eq;
pub use arena::{Arena, Children, FreeVars};
pub use flags::NodeFlags;
pub use infer::infer_type;
pub use node::{
    DataId, DataSource, FusedProgram, FusedStage, GlueExpr, LeafId, LeafProgram, NodeId,
    NodeKind, Param,
};
pub use registry::{
    mean_partial_type, names, zipped_member, AggregateOp, Aggregation, IntrinsicDef,
    IntrinsicRegistry, MergeSpec, Signature,
};
pub use serialize::{decode, encode, WireError, WIRE_VERSION};
pub use stack::ensure_sufficient_stack;
pub use transform::{
    collect_names, contains_reference, count_references, rename, replace_nodes, substitute,
    transform, NameGenerator, Order, Rewritten,
};
