//! Checking a value against a type.

use fed_types::{TypeId, TypeKind, TypePool};

use super::{FederatedValue, Value};

/// A value that does not inhabit the expected type.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{path}: expected `{expected}`, found {found}")]
pub struct ConformError {
    /// Where in the value, e.g. `arg[1]{3}` for member 3 of element 1.
    pub path: String,
    pub expected: String,
    pub found: String,
}

/// Check `value` against `ty`, returning it with struct fields named as in
/// `ty`.
///
/// Struct fields bind by position; the value's own field names are
/// ignored. A per-participant type accepts an all-equal value.
pub fn conform(pool: &TypePool, ty: TypeId, value: Value) -> Result<Value, ConformError> {
    Conformer { pool }.conform(ty, value, &mut String::from("arg"))
}

struct Conformer<'a> {
    pool: &'a TypePool,
}

impl Conformer<'_> {
    fn fail(&self, ty: TypeId, path: &str, found: impl Into<String>) -> ConformError {
        ConformError {
            path: path.to_owned(),
            expected: self.pool.format(ty),
            found: found.into(),
        }
    }

    fn conform(&self, ty: TypeId, value: Value, path: &mut String) -> Result<Value, ConformError> {
        match (self.pool.kind(ty), value) {
            (TypeKind::Tensor { dtype, shape }, Value::Tensor(t)) => {
                if t.dtype != *dtype || !t.data.holds(*dtype) {
                    return Err(self.fail(ty, path, format!("a {} tensor", t.dtype)));
                }
                let expected_len = t.shape.iter().product::<u64>();
                if usize::try_from(expected_len).ok() != Some(t.data.len()) {
                    return Err(self.fail(ty, path, "a tensor whose data does not fill its shape"));
                }
                if let Some(dims) = shape.dims() {
                    let matches = dims.len() == t.shape.len()
                        && dims
                            .iter()
                            .zip(&t.shape)
                            .all(|(want, &have)| want.is_none_or(|want| want == have));
                    if !matches {
                        return Err(self.fail(ty, path, format!("shape {:?}", t.shape)));
                    }
                }
                Ok(Value::Tensor(t))
            }
            (TypeKind::Struct(fields), Value::Struct(elements)) => {
                if fields.len() != elements.len() {
                    return Err(self.fail(
                        ty,
                        path,
                        format!("a struct of {} elements", elements.len()),
                    ));
                }
                let mut out = Vec::with_capacity(fields.len());
                for (i, (field, (_, element))) in fields.iter().zip(elements).enumerate() {
                    let len = path.len();
                    path.push_str(&format!("[{i}]"));
                    let element = self.conform(field.ty, element, path)?;
                    path.truncate(len);
                    let name = field.name.map(|n| self.pool.name_str(n).to_owned());
                    out.push((name, element));
                }
                Ok(Value::Struct(out))
            }
            (
                TypeKind::Federated {
                    member,
                    placement,
                    all_equal,
                },
                Value::Federated(fed),
            ) => {
                if fed.placement != *placement {
                    return Err(self.fail(ty, path, format!("a value at {}", fed.placement)));
                }
                if fed.all_equal && fed.members.len() != 1 {
                    return Err(self.fail(
                        ty,
                        path,
                        format!("an all-equal value with {} members", fed.members.len()),
                    ));
                }
                if *all_equal && !fed.all_equal {
                    return Err(self.fail(ty, path, "a per-participant value"));
                }
                let mut members = Vec::with_capacity(fed.members.len());
                for (i, m) in fed.members.into_iter().enumerate() {
                    let len = path.len();
                    path.push_str(&format!("{{{i}}}"));
                    members.push(self.conform(*member, m, path)?);
                    path.truncate(len);
                }
                Ok(Value::Federated(FederatedValue {
                    placement: fed.placement,
                    all_equal: fed.all_equal,
                    members,
                }))
            }
            (_, value) => Err(self.fail(ty, path, describe(&value))),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Tensor(t) => format!("a {} tensor", t.dtype),
        Value::Struct(fields) => format!("a struct of {} elements", fields.len()),
        Value::Federated(fed) => format!("a value at {}", fed.placement),
        Value::Function(_) => "a function".to_owned(),
    }
}
