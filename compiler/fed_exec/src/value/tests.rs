#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use fed_types::{DType, Shape, TypePool};
use pretty_assertions::assert_eq;

use super::*;

fn vector(values: &[f64]) -> Value {
    Value::Tensor(Tensor {
        dtype: DType::Float32,
        shape: vec![values.len() as u64],
        data: TensorData::Float(values.to_vec()),
    })
}

#[test]
fn struct_fields_bind_by_position_and_take_the_type_names() {
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let float = pool.scalar(DType::Float32);
    let ty = pool.structure([(Some("a"), int), (Some("b"), float)]);

    let value = Value::named([("x", Value::int32(1)), ("y", Value::float32(2.5))]);
    let bound = conform(&pool, ty, value).unwrap();
    assert_eq!(
        bound,
        Value::named([("a", Value::int32(1)), ("b", Value::float32(2.5))])
    );
}

#[test]
fn dtype_and_arity_must_match() {
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let pair = pool.tuple(&[int, int]);

    let err = conform(&pool, pair, Value::tuple([Value::int32(1), Value::float32(1.0)])).unwrap_err();
    assert_eq!(err.path, "arg[1]");
    assert_eq!(err.expected, "int32");

    let err = conform(&pool, pair, Value::tuple([Value::int32(1)])).unwrap_err();
    assert_eq!(err.path, "arg");
    assert_eq!(err.found, "a struct of 1 elements");
}

#[test]
fn unknown_dimensions_accept_any_extent() {
    let mut pool = TypePool::new();
    let open = pool.tensor(DType::Float32, Shape::Known(vec![None]));
    let fixed = pool.tensor(DType::Float32, Shape::of(&[2]));

    assert!(conform(&pool, open, vector(&[1.0, 2.0, 3.0])).is_ok());
    assert!(conform(&pool, fixed, vector(&[1.0, 2.0])).is_ok());
    let err = conform(&pool, fixed, vector(&[1.0, 2.0, 3.0])).unwrap_err();
    assert_eq!(err.found, "shape [3]");
}

#[test]
fn data_must_fill_the_shape() {
    let mut pool = TypePool::new();
    let ty = pool.tensor(DType::Int64, Shape::of(&[2, 2]));
    let short = Value::Tensor(Tensor {
        dtype: DType::Int64,
        shape: vec![2, 2],
        data: TensorData::Int(vec![1, 2, 3]),
    });
    assert!(conform(&pool, ty, short).is_err());
}

#[test]
fn all_equal_rules() {
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let each = pool.at_clients(int, false).unwrap();
    let same = pool.at_clients(int, true).unwrap();
    let server = pool.at_server(int).unwrap();

    // A per-participant type accepts one member for everyone.
    assert!(conform(&pool, each, Value::all_clients(Value::int32(3))).is_ok());
    assert!(conform(&pool, same, Value::all_clients(Value::int32(3))).is_ok());

    let err = conform(&pool, same, Value::at_clients(vec![Value::int32(1)])).unwrap_err();
    assert_eq!(err.found, "a per-participant value");

    let err = conform(&pool, server, Value::at_clients(vec![Value::int32(1)])).unwrap_err();
    assert_eq!(err.found, "a value at CLIENTS");

    let broken = Value::Federated(FederatedValue {
        placement: Placement::Clients,
        all_equal: true,
        members: vec![Value::int32(1), Value::int32(2)],
    });
    assert!(conform(&pool, each, broken).is_err());
}

#[test]
fn member_errors_name_the_member() {
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let each = pool.at_clients(int, false).unwrap();
    let value = Value::at_clients(vec![Value::int32(1), Value::int32(2), Value::float64(3.0)]);
    assert_eq!(conform(&pool, each, value).unwrap_err().path, "arg{2}");
}

#[test]
fn display() {
    let value = Value::tuple([
        Value::at_server(Value::named([("n", Value::int64(4))])),
        Value::at_clients(vec![Value::int32(1), Value::int32(2)]),
        vector(&[0.5, 1.5]),
        Value::string("hi"),
    ]);
    assert_eq!(
        value.to_string(),
        r#"<<n=4>@SERVER,{1,2}@CLIENTS,[0.5,1.5],"hi">"#
    );
    assert_eq!(Value::all_clients(Value::boolean(true)).to_string(), "true@CLIENTS");
}

#[test]
fn sums_go_through_structs() {
    let a = Value::named([("total", vector(&[1.0, 2.0])), ("count", Value::int64(2))]);
    let b = Value::named([("total", vector(&[3.0, 4.0])), ("count", Value::int64(5))]);
    assert_eq!(
        add(&a, &b).unwrap(),
        Value::named([("total", vector(&[4.0, 6.0])), ("count", Value::int64(7))])
    );
    assert!(add(&Value::int32(1), &Value::float32(1.0)).is_err());
}

#[test]
fn integer_sums_wrap_at_their_width() {
    let top = Value::int32(i32::MAX);
    let sum = add(&top, &top).unwrap();
    assert_eq!(sum, Value::int32(-2));
    assert_eq!(sum.as_int(), Some(-2));

    let wide = Value::int64(i64::from(i32::MAX));
    assert_eq!(add(&wide, &wide).unwrap(), Value::int64(4_294_967_294));
    assert_eq!(
        add(&Value::int64(i64::MAX), &Value::int64(1)).unwrap(),
        Value::int64(i64::MIN)
    );
}

#[test]
fn identities_of_max_and_min() {
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let float = pool.tensor(DType::Float64, Shape::of(&[2]));
    let pair = pool.tuple(&[int, float]);

    let lowest = identity_for(&pool, pair, fed_ir::AggregateOp::Max).unwrap();
    let fields = lowest.fields().unwrap();
    assert_eq!(fields[0].1.as_int(), Some(i64::from(i32::MIN)));
    assert_eq!(
        fields[1].1,
        Value::Tensor(Tensor {
            dtype: DType::Float64,
            shape: vec![2],
            data: TensorData::Float(vec![f64::NEG_INFINITY; 2]),
        })
    );

    let unknown = pool.tensor(DType::Float32, Shape::Unknown);
    assert!(zeros(&pool, unknown).is_err());
}

#[test]
fn mean_of_nothing_is_nan() {
    let mean = divide(&Value::float32(0.0), 0).unwrap();
    assert!(mean.as_float().unwrap().is_nan());
}
