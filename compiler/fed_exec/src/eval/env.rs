//! Lexical bindings of one evaluation.

use std::fmt;
use std::sync::Arc;

use fed_types::Name;

use crate::Value;

/// Immutable, persistent binding chain. Binding returns a new environment
/// sharing its parent, so closures capture by cloning an `Arc`.
#[derive(Clone, Default)]
pub struct Env(Option<Arc<Frame>>);

struct Frame {
    name: Name,
    value: Value,
    parent: Env,
}

impl Env {
    pub fn bind(&self, name: Name, value: Value) -> Env {
        Env(Some(Arc::new(Frame {
            name,
            value,
            parent: self.clone(),
        })))
    }

    /// The innermost binding of `name`.
    pub fn lookup(&self, name: Name) -> Option<&Value> {
        let mut frame = self.0.as_deref();
        while let Some(f) = frame {
            if f.name == name {
                return Some(&f.value);
            }
            frame = f.parent.0.as_deref();
        }
        None
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.0.as_deref();
        while let Some(f) = frame {
            depth += 1;
            frame = f.parent.0.as_deref();
        }
        depth
    }
}

/// Environments compare by identity.
impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env").field("depth", &self.depth()).finish()
    }
}
