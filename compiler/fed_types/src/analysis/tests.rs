#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use pretty_assertions::assert_eq;

use super::*;
use crate::{DType, Shape};

#[test]
fn preorder_visits_parents_first() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Int32);
    let f = pool.scalar(DType::Float32);
    let s = pool.structure([(None, i), (None, f)]);
    let fed = pool.at_clients(s, false).unwrap();

    assert_eq!(preorder(&pool, fed), vec![fed, s, i, f]);
}

#[test]
fn placement_queries_use_flags() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Int32);
    let at_clients = pool.at_clients(i, false).unwrap();
    let func = pool.function(Some(at_clients), i);

    assert!(contains_placement(&pool, func, Placement::Clients));
    assert!(!contains_placement(&pool, func, Placement::Server));
    assert!(contains_federated(&pool, func));
    assert!(contains_function(&pool, func));
    assert!(!contains_federated(&pool, i));
}

#[test]
fn sum_compatibility() {
    let mut pool = TypePool::new();
    let vec3 = pool.tensor(DType::Float32, Shape::of(&[3]));
    let partial = pool.tensor(DType::Float32, Shape::Known(vec![None]));
    let text = pool.scalar(DType::Str);
    let good = pool.structure([(Some("w"), vec3)]);
    let fed = pool.at_clients(good, false).unwrap();

    assert!(check_sum_compatible(&pool, fed).is_ok());
    assert!(check_sum_compatible(&pool, partial).is_err());
    let err = check_sum_compatible(&pool, text).unwrap_err();
    assert!(matches!(
        err,
        TypeError::Incompatible {
            requirement: "summable",
            ..
        }
    ));
    assert!(check_sum_compatible(&pool, TypeId::PLACEMENT).is_err());
    assert!(check_sum_compatible(&pool, TypeId::UNIT).is_ok());
}

#[test]
fn average_and_min_max_compatibility() {
    let mut pool = TypePool::new();
    let f = pool.scalar(DType::Float64);
    let i = pool.scalar(DType::Int64);
    let b = pool.scalar(DType::Bool);

    assert!(is_average_compatible(&pool, f));
    assert!(!is_average_compatible(&pool, i));
    assert!(is_min_max_compatible(&pool, i));
    assert!(is_min_max_compatible(&pool, f));
    assert!(!is_min_max_compatible(&pool, b));
}

#[test]
fn count_tensors_statistics() {
    let mut pool = TypePool::new();
    let m = pool.tensor(DType::Float32, Shape::of(&[2, 5]));
    let v = pool.tensor(DType::Float32, Shape::Known(vec![None]));
    let s = pool.scalar(DType::Int32);
    let t = pool.structure([(None, m), (None, v), (None, s)]);
    let fed = pool.at_server(t).unwrap();

    assert_eq!(
        count_tensors(&pool, fed),
        TensorCount {
            tensors: 3,
            elements: 11,
            unknown_size: 1,
        }
    );
}

#[test]
fn per_client_components_are_replaced_by_empty_tuples() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Int32);
    let per_client = pool.at_clients(i, false).unwrap();
    let all_equal = pool.at_clients(i, true).unwrap();
    let at_server = pool.at_server(i).unwrap();
    let p = pool.structure([
        (Some("state"), at_server),
        (Some("data"), per_client),
        (Some("weight"), all_equal),
    ]);

    assert!(contains_per_client(&pool, p));
    assert!(!contains_per_client(&pool, all_equal));

    let stripped = without_per_client(&mut pool, p);
    assert_eq!(
        pool.format(stripped),
        "<state=int32@SERVER,data=<>,weight=int32@CLIENTS>"
    );
    assert!(!contains_per_client(&pool, stripped));
    assert_eq!(without_per_client(&mut pool, at_server), at_server);
}
