//! Constructors for evaluation failures.
//!
//! Evaluation failures are permanent: the same tree and argument fail the
//! same way on every attempt.

use crate::value::{ConformError, Value};
use crate::BackendError;

pub(crate) fn unbound_reference(name: &str) -> BackendError {
    BackendError::permanent(format!("reference to unbound name `{name}`"))
}

pub(crate) fn not_callable(value: &Value) -> BackendError {
    BackendError::permanent(format!("cannot call {value}"))
}

pub(crate) fn missing_argument() -> BackendError {
    BackendError::permanent("function called without its argument")
}

pub(crate) fn unexpected_argument() -> BackendError {
    BackendError::permanent("argument supplied to a computation that takes none")
}

pub(crate) fn not_a_struct(value: &Value) -> BackendError {
    BackendError::permanent(format!("expected a struct, found {value}"))
}

pub(crate) fn index_out_of_bounds(index: usize, len: usize) -> BackendError {
    BackendError::permanent(format!("selection of element {index} from a struct of {len}"))
}

pub(crate) fn mismatched_operands(op: &str, value: &Value) -> BackendError {
    BackendError::permanent(format!("{op} on incompatible operands at {value}"))
}

pub(crate) fn no_identity(ty: &str) -> BackendError {
    BackendError::permanent(format!("no identity element for `{ty}`"))
}

pub(crate) fn unknown_data(uri: &str) -> BackendError {
    BackendError::permanent(format!("no data registered for `{uri}`"))
}

pub(crate) fn malformed_inline_data(err: &bincode::Error) -> BackendError {
    BackendError::permanent(format!("inline data does not decode: {err}"))
}

pub(crate) fn ill_typed(what: &str, err: &ConformError) -> BackendError {
    BackendError::permanent(format!("{what} is ill-typed: {err}"))
}

pub(crate) fn malformed_intrinsic_argument(name: &str, value: &Value) -> BackendError {
    BackendError::permanent(format!("`{name}` cannot take {value}"))
}

pub(crate) fn unknown_intrinsic(name: &str) -> BackendError {
    BackendError::permanent(format!("intrinsic `{name}` is not registered"))
}

pub(crate) fn cardinality(expected: usize, found: usize) -> BackendError {
    BackendError::permanent(format!(
        "zipped CLIENTS values have {found} members, expected {expected}"
    ))
}
