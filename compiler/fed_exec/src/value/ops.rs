//! Elementwise arithmetic used to realize aggregations.

use fed_ir::AggregateOp;
use fed_types::{DType, TypeId, TypeKind, TypePool};

use super::{Tensor, TensorData, Value};
use crate::eval::errors::{mismatched_operands, no_identity};
use crate::BackendError;

/// `a + b`, elementwise through structs.
///
/// Integer sums wrap at the width of their dtype.
pub(crate) fn add(a: &Value, b: &Value) -> Result<Value, BackendError> {
    zip_with(a, b, &wrapping_add, &|x: f64, y: f64| x + y)
}

pub(crate) fn maximum(a: &Value, b: &Value) -> Result<Value, BackendError> {
    zip_with(a, b, &|_: DType, x: i64, y: i64| x.max(y), &f64::max)
}

pub(crate) fn minimum(a: &Value, b: &Value) -> Result<Value, BackendError> {
    zip_with(a, b, &|_: DType, x: i64, y: i64| x.min(y), &f64::min)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "int32 addition wraps at 32 bits"
)]
fn wrapping_add(dtype: DType, x: i64, y: i64) -> i64 {
    match dtype {
        DType::Int32 => i64::from((x as i32).wrapping_add(y as i32)),
        _ => x.wrapping_add(y),
    }
}

/// `total / count` for every floating-point tensor of `total`.
///
/// A zero count yields NaN.
#[expect(
    clippy::cast_precision_loss,
    reason = "client counts are far below 2^52"
)]
pub(crate) fn divide(total: &Value, count: i64) -> Result<Value, BackendError> {
    let count = count as f64;
    map_tensors(total, &|t: &Tensor| match &t.data {
        TensorData::Float(v) => Ok(Tensor {
            data: TensorData::Float(v.iter().map(|x| x / count).collect()),
            ..t.clone()
        }),
        _ => Err(mismatched_operands("division", &Value::Tensor(t.clone()))),
    })
}

/// The zero of `ty`: the sum over no clients.
pub(crate) fn zeros(pool: &TypePool, ty: TypeId) -> Result<Value, BackendError> {
    fill(pool, ty, &|dtype: DType| match dtype {
        DType::Int32 | DType::Int64 => Some(Fill::Int(0)),
        DType::Float32 | DType::Float64 => Some(Fill::Float(0.0)),
        DType::Bool | DType::Str => None,
    })
}

/// The identity of `op` over `ty`: the max or min over no clients.
pub(crate) fn identity_for(
    pool: &TypePool,
    ty: TypeId,
    op: AggregateOp,
) -> Result<Value, BackendError> {
    let lowest = matches!(op, AggregateOp::Max);
    fill(pool, ty, &|dtype: DType| match (dtype, lowest) {
        (DType::Int32, true) => Some(Fill::Int(i32::MIN.into())),
        (DType::Int32, false) => Some(Fill::Int(i32::MAX.into())),
        (DType::Int64, true) => Some(Fill::Int(i64::MIN)),
        (DType::Int64, false) => Some(Fill::Int(i64::MAX)),
        (DType::Float32 | DType::Float64, true) => Some(Fill::Float(f64::NEG_INFINITY)),
        (DType::Float32 | DType::Float64, false) => Some(Fill::Float(f64::INFINITY)),
        (DType::Bool | DType::Str, _) => None,
    })
}

#[derive(Copy, Clone)]
enum Fill {
    Int(i64),
    Float(f64),
}

fn fill(
    pool: &TypePool,
    ty: TypeId,
    element: &dyn Fn(DType) -> Option<Fill>,
) -> Result<Value, BackendError> {
    match pool.kind(ty) {
        TypeKind::Tensor { dtype, shape } => {
            let dims = shape.dims().ok_or_else(|| no_identity(&pool.format(ty)))?;
            let mut shape = Vec::with_capacity(dims.len());
            for dim in dims {
                shape.push(dim.ok_or_else(|| no_identity(&pool.format(ty)))?);
            }
            let len = shape.iter().product::<u64>();
            let len = usize::try_from(len).map_err(|_| no_identity(&pool.format(ty)))?;
            let data = match element(*dtype).ok_or_else(|| no_identity(&pool.format(ty)))? {
                Fill::Int(x) => TensorData::Int(vec![x; len]),
                Fill::Float(x) => TensorData::Float(vec![x; len]),
            };
            Ok(Value::Tensor(Tensor {
                dtype: *dtype,
                shape,
                data,
            }))
        }
        TypeKind::Struct(fields) => {
            let mut out = Vec::with_capacity(fields.len());
            for field in fields.iter() {
                let name = field.name.map(|n| pool.name_str(n).to_owned());
                out.push((name, fill(pool, field.ty, element)?));
            }
            Ok(Value::Struct(out))
        }
        _ => Err(no_identity(&pool.format(ty))),
    }
}

fn zip_with(
    a: &Value,
    b: &Value,
    int: &dyn Fn(DType, i64, i64) -> i64,
    float: &dyn Fn(f64, f64) -> f64,
) -> Result<Value, BackendError> {
    match (a, b) {
        (Value::Tensor(x), Value::Tensor(y)) if x.dtype == y.dtype && x.shape == y.shape => {
            let data = match (&x.data, &y.data) {
                (TensorData::Int(p), TensorData::Int(q)) if p.len() == q.len() => {
                    TensorData::Int(p.iter().zip(q).map(|(&p, &q)| int(x.dtype, p, q)).collect())
                }
                (TensorData::Float(p), TensorData::Float(q)) if p.len() == q.len() => {
                    TensorData::Float(p.iter().zip(q).map(|(&p, &q)| float(p, q)).collect())
                }
                _ => return Err(mismatched_operands("arithmetic", a)),
            };
            Ok(Value::Tensor(Tensor { data, ..x.clone() }))
        }
        (Value::Struct(xs), Value::Struct(ys)) if xs.len() == ys.len() => {
            let mut out = Vec::with_capacity(xs.len());
            for ((name, x), (_, y)) in xs.iter().zip(ys) {
                out.push((name.clone(), zip_with(x, y, int, float)?));
            }
            Ok(Value::Struct(out))
        }
        _ => Err(mismatched_operands("arithmetic", a)),
    }
}

fn map_tensors(
    value: &Value,
    f: &dyn Fn(&Tensor) -> Result<Tensor, BackendError>,
) -> Result<Value, BackendError> {
    match value {
        Value::Tensor(t) => Ok(Value::Tensor(f(t)?)),
        Value::Struct(fields) => {
            let mut out = Vec::with_capacity(fields.len());
            for (name, v) in fields {
                out.push((name.clone(), map_tensors(v, f)?));
            }
            Ok(Value::Struct(out))
        }
        _ => Err(mismatched_operands("arithmetic", value)),
    }
}
