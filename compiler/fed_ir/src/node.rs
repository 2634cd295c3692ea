//! Building-block node kinds and leaf payloads.

use std::fmt;

use fed_types::{Name, TypeId};
use serde::{Deserialize, Serialize};

/// Handle to a node in an [`Arena`](crate::Arena).
///
/// The arena hash-conses nodes, so within one arena two handles are equal
/// iff the subtrees are identical in kind, children and type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Handle to a deduplicated [`DataSource`] payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DataId(pub(crate) u32);

/// Handle to a deduplicated [`LeafProgram`] payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LeafId(pub(crate) u32);

/// Lambda parameter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Param {
    pub name: Name,
    pub ty: TypeId,
}

/// The kind of a building-block node. Children are referenced by id.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// Lookup of a lexically bound name.
    Reference(Name),
    /// Single-parameter (or nullary) function.
    Lambda { param: Option<Param>, body: NodeId },
    /// Application; the argument is absent iff the function takes none.
    Call { function: NodeId, arg: Option<NodeId> },
    /// Sequential let-bindings, each visible to later bindings and the result.
    Block {
        locals: Box<[(Name, NodeId)]>,
        result: NodeId,
    },
    /// Tuple or record construction.
    Struct(Box<[(Option<Name>, NodeId)]>),
    /// Positional projection out of a struct.
    Selection { source: NodeId, index: u32 },
    /// External or inline data.
    Data(DataId),
    /// An opaque leaf computation.
    Compiled(LeafId),
    /// A named distributed operator from the intrinsic registry.
    Intrinsic(Name),
}

impl NodeKind {
    /// Short kind name used in diagnostics and the wire format.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Reference(_) => "reference",
            NodeKind::Lambda { .. } => "lambda",
            NodeKind::Call { .. } => "call",
            NodeKind::Block { .. } => "block",
            NodeKind::Struct(_) => "struct",
            NodeKind::Selection { .. } => "selection",
            NodeKind::Data(_) => "data",
            NodeKind::Compiled(_) => "compiled",
            NodeKind::Intrinsic(_) => "intrinsic",
        }
    }
}

/// Where the value of a `Data` node comes from.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    Uri(String),
    Inline(Vec<u8>),
}

/// Payload of a compiled leaf computation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LeafProgram {
    /// Serialized kernel program, never inspected by the core.
    Opaque { format: String, bytes: Vec<u8> },
    /// Several leaf programs composed with struct/selection glue.
    Fused(FusedProgram),
}

impl LeafProgram {
    pub fn opaque(format: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        LeafProgram::Opaque {
            format: format.into(),
            bytes: bytes.into(),
        }
    }

    /// Number of opaque programs inside, counting through fused stages.
    pub fn leaf_count(&self) -> usize {
        match self {
            LeafProgram::Opaque { .. } => 1,
            LeafProgram::Fused(fused) => fused.stages.iter().map(|s| s.program.leaf_count()).sum(),
        }
    }
}

/// A composition of leaf programs.
///
/// Stages run in order; stage `k` may read the fused program's parameter and
/// the results of stages `< k`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FusedProgram {
    pub stages: Vec<FusedStage>,
    pub output: GlueExpr,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FusedStage {
    pub program: LeafProgram,
    /// `None` for a stage that takes no argument.
    pub input: Option<GlueExpr>,
}

/// Pure struct/selection glue between fused stages.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum GlueExpr {
    /// The fused program's parameter.
    Param,
    /// Result of an earlier stage.
    Stage(u32),
    Struct(Vec<(Option<String>, GlueExpr)>),
    Select(Box<GlueExpr>, u32),
}
