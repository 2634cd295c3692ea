//! Compiler errors.

use fed_types::TypeError;

/// A compilation failure. No artifact is produced or cached.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CompilerError {
    /// The input tree is ill-typed.
    #[error("ill-typed computation: {0}")]
    Type(#[from] TypeError),

    /// A pass produced an ill-typed rewrite.
    #[error("pass `{pass}` failed at {subtree}: {source}")]
    PassFailed {
        pass: &'static str,
        subtree: String,
        #[source]
        source: TypeError,
    },

    /// The tree left by the passes is not in canonical form.
    #[error("canonical form violated after `{pass}`: {message} at {subtree}")]
    InvariantViolated {
        pass: &'static str,
        message: String,
        subtree: String,
    },

    #[error("no fixed point after {iterations} pipeline iterations: {subtree}")]
    FixedPointNotReached { iterations: usize, subtree: String },
}

impl CompilerError {
    /// Attribute a bare type error to `pass`, rendering the subtree it ran on.
    pub(crate) fn in_pass(self, pass: &'static str, subtree: impl FnOnce() -> String) -> Self {
        match self {
            CompilerError::Type(source) => CompilerError::PassFailed {
                pass,
                subtree: subtree(),
                source,
            },
            other => other,
        }
    }
}
