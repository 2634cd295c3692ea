//! Runtime values.
//!
//! A [`Value`] is what arguments, partial aggregates and results look like
//! at the backend boundary: tensors, structs and federated values. Function
//! values only exist inside one evaluation and are never returned to
//! callers.

mod conform;
mod ops;

#[cfg(test)]
mod tests;

pub use conform::{conform, ConformError};
pub(crate) use ops::{add, divide, identity_for, maximum, minimum, zeros};

use std::fmt;

use fed_ir::{LeafId, NodeId};
use fed_types::{DType, Placement, TypeId};
use serde::{Deserialize, Serialize};

use crate::eval::Env;

/// Flat element storage of a tensor, row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    Bool(Vec<bool>),
    /// Both integer dtypes.
    Int(Vec<i64>),
    /// Both floating-point dtypes.
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::Bool(v) => v.len(),
            TensorData::Int(v) => v.len(),
            TensorData::Float(v) => v.len(),
            TensorData::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this storage can hold elements of `dtype`.
    pub fn holds(&self, dtype: DType) -> bool {
        match self {
            TensorData::Bool(_) => dtype == DType::Bool,
            TensorData::Int(_) => dtype.is_integer(),
            TensorData::Float(_) => dtype.is_floating(),
            TensorData::Str(_) => dtype == DType::Str,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub dtype: DType,
    /// Fully known dimensions; empty for a scalar.
    pub shape: Vec<u64>,
    pub data: TensorData,
}

impl Tensor {
    pub fn scalar_int(dtype: DType, value: i64) -> Self {
        Self {
            dtype,
            shape: Vec::new(),
            data: TensorData::Int(vec![value]),
        }
    }

    pub fn scalar_float(dtype: DType, value: f64) -> Self {
        Self {
            dtype,
            shape: Vec::new(),
            data: TensorData::Float(vec![value]),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }
}

/// Members of a value placed at `placement`.
///
/// An all-equal value holds exactly one member, however many participants
/// the placement has.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FederatedValue {
    pub placement: Placement,
    pub all_equal: bool,
    pub members: Vec<Value>,
}

/// A callable value inside one evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionValue {
    /// A lambda together with the bindings visible at its definition.
    Closure { lambda: NodeId, env: Env },
    /// A compiled leaf of function type `ty`.
    Leaf { leaf: LeafId, ty: TypeId },
    /// An intrinsic of function type `ty`.
    Intrinsic { name: String, ty: TypeId },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Tensor(Tensor),
    Struct(Vec<(Option<String>, Value)>),
    Federated(FederatedValue),
    #[serde(skip)]
    Function(FunctionValue),
}

impl Value {
    pub fn int32(value: i32) -> Self {
        Value::Tensor(Tensor::scalar_int(DType::Int32, i64::from(value)))
    }

    pub fn int64(value: i64) -> Self {
        Value::Tensor(Tensor::scalar_int(DType::Int64, value))
    }

    pub fn float32(value: f32) -> Self {
        Value::Tensor(Tensor::scalar_float(DType::Float32, f64::from(value)))
    }

    pub fn float64(value: f64) -> Self {
        Value::Tensor(Tensor::scalar_float(DType::Float64, value))
    }

    pub fn boolean(value: bool) -> Self {
        Value::Tensor(Tensor {
            dtype: DType::Bool,
            shape: Vec::new(),
            data: TensorData::Bool(vec![value]),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::Tensor(Tensor {
            dtype: DType::Str,
            shape: Vec::new(),
            data: TensorData::Str(vec![value.into()]),
        })
    }

    /// An unnamed struct.
    pub fn tuple(elements: impl IntoIterator<Item = Value>) -> Self {
        Value::Struct(elements.into_iter().map(|v| (None, v)).collect())
    }

    pub fn named<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Value::Struct(
            fields
                .into_iter()
                .map(|(name, v)| (Some(name.to_owned()), v))
                .collect(),
        )
    }

    pub fn at_server(member: Value) -> Self {
        Value::Federated(FederatedValue {
            placement: Placement::Server,
            all_equal: true,
            members: vec![member],
        })
    }

    /// One member per client.
    pub fn at_clients(members: Vec<Value>) -> Self {
        Value::Federated(FederatedValue {
            placement: Placement::Clients,
            all_equal: false,
            members,
        })
    }

    /// The same member at every client.
    pub fn all_clients(member: Value) -> Self {
        Value::Federated(FederatedValue {
            placement: Placement::Clients,
            all_equal: true,
            members: vec![member],
        })
    }

    /// The element of an integer scalar.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Tensor(Tensor {
                shape,
                data: TensorData::Int(v),
                ..
            }) if shape.is_empty() => v.first().copied(),
            _ => None,
        }
    }

    /// The element of a floating-point scalar.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Tensor(Tensor {
                shape,
                data: TensorData::Float(v),
                ..
            }) if shape.is_empty() => v.first().copied(),
            _ => None,
        }
    }

    pub fn fields(&self) -> Option<&[(Option<String>, Value)]> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn federated(&self) -> Option<&FederatedValue> {
        match self {
            Value::Federated(fed) => Some(fed),
            _ => None,
        }
    }

    /// The single member of an all-equal federated value.
    pub fn unplaced(&self) -> Option<&Value> {
        match self {
            Value::Federated(FederatedValue {
                all_equal: true,
                members,
                ..
            }) => members.first(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Tensor(t) => {
                let elements = match &t.data {
                    TensorData::Bool(v) => v.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    TensorData::Int(v) => v.iter().map(ToString::to_string).collect(),
                    TensorData::Float(v) => v.iter().map(ToString::to_string).collect(),
                    TensorData::Str(v) => v.iter().map(|s| format!("{s:?}")).collect(),
                };
                if t.is_scalar() && elements.len() == 1 {
                    f.write_str(&elements[0])
                } else {
                    write!(f, "[{}]", elements.join(","))
                }
            }
            Value::Struct(fields) => {
                f.write_str("<")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if let Some(name) = name {
                        write!(f, "{name}=")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(">")
            }
            Value::Federated(fed) => {
                if fed.all_equal {
                    if let Some(member) = fed.members.first() {
                        write!(f, "{member}")?;
                    }
                } else {
                    f.write_str("{")?;
                    for (i, member) in fed.members.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{member}")?;
                    }
                    f.write_str("}")?;
                }
                write!(f, "@{}", fed.placement)
            }
            Value::Function(_) => f.write_str("<function>"),
        }
    }
}
