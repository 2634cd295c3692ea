//! Static type and placement errors.
//!
//! Types and nodes are rendered into the error at the point of failure so
//! the error outlives the pool that produced it.

/// A static type or placement mismatch.
///
/// Always permanent: raised when an ill-typed node is constructed and never
/// deferred to execution.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("type mismatch in {context}: expected `{expected}`, found `{found}`")]
    Mismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("{context}: expected {expected}, found `{found}`")]
    UnexpectedKind {
        context: String,
        expected: &'static str,
        found: String,
    },

    #[error("index {index} out of range for `{source_type}` with {len} elements")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        source_type: String,
    },

    #[error("no element named `{name}` in `{source_type}`")]
    UnknownField { name: String, source_type: String },

    #[error("federated member `{member}` may not contain federated or function types")]
    InvalidFederatedMember { member: String },

    #[error("reference `{name}` is used at conflicting types `{first}` and `{second}`")]
    ConflictingReference {
        name: String,
        first: String,
        second: String,
    },

    #[error("call of `{function}` is missing its argument")]
    MissingArgument { function: String },

    #[error("`{function}` takes no argument, found `{found}`")]
    UnexpectedArgument { function: String, found: String },

    #[error("unknown intrinsic `{name}`")]
    UnknownIntrinsic { name: String },

    #[error("intrinsic `{name}` cannot be applied to `{found}`: {reason}")]
    IntrinsicSignature {
        name: String,
        found: String,
        reason: String,
    },

    #[error("`{found}` is not {requirement}: {reason}")]
    Incompatible {
        requirement: &'static str,
        found: String,
        reason: String,
    },
}

impl TypeError {
    /// Short machine-readable name of the variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeError::Mismatch { .. } => "mismatch",
            TypeError::UnexpectedKind { .. } => "unexpected-kind",
            TypeError::IndexOutOfRange { .. } => "index-out-of-range",
            TypeError::UnknownField { .. } => "unknown-field",
            TypeError::InvalidFederatedMember { .. } => "invalid-federated-member",
            TypeError::ConflictingReference { .. } => "conflicting-reference",
            TypeError::MissingArgument { .. } => "missing-argument",
            TypeError::UnexpectedArgument { .. } => "unexpected-argument",
            TypeError::UnknownIntrinsic { .. } => "unknown-intrinsic",
            TypeError::IntrinsicSignature { .. } => "intrinsic-signature",
            TypeError::Incompatible { .. } => "incompatible",
        }
    }
}
