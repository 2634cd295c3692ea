//! Property-based tests for dispatch.
//!
//! 1. Mergeable dispatch gives the single-dispatch result for any client
//!    values and partition count, including partitions that outnumber the
//!    clients
//! 2. Compilation preserves what the reference evaluator computes

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use fed_compiler::Pipeline;
use fed_exec::{
    Cardinalities, Computation, ContextConfig, DispatchMode, ExecutionContext, LocalBackend, Value,
};
use fed_ir::{names, Arena, IntrinsicRegistry, NodeId};
use fed_types::DType;
use proptest::prelude::*;

/// `x -> name(x)` over `{dtype}@CLIENTS`.
fn aggregation(name: &str, dtype: DType) -> Computation {
    let mut arena = Arena::with_standard_registry();
    let member = arena.types_mut().scalar(dtype);
    let ct = arena.types_mut().at_clients(member, false).unwrap();
    let x = arena.reference_named("x", ct);
    let body = arena.call_intrinsic(name, x).unwrap();
    let root = arena.lambda_named("x", ct, body).unwrap();
    Computation::new(arena, root)
}

/// `x -> let s = federated_sum(x), m = federated_min(x) in <m, s, federated_broadcast(s)>`
fn sum_and_min(arena: &mut Arena) -> NodeId {
    let int = arena.types_mut().scalar(DType::Int64);
    let ct = arena.types_mut().at_clients(int, false).unwrap();
    let st = arena.types_mut().at_server(int).unwrap();
    let x = arena.reference_named("x", ct);
    let sum = arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap();
    let min = arena.call_intrinsic(names::FEDERATED_MIN, x).unwrap();
    let s = arena.reference_named("s", st);
    let m = arena.reference_named("m", st);
    let everywhere = arena.call_intrinsic(names::FEDERATED_BROADCAST, s).unwrap();
    let result = arena.tuple(&[m, s, everywhere]).unwrap();
    let s_name = arena.name("s");
    let m_name = arena.name("m");
    let block = arena.block(vec![(s_name, sum), (m_name, min)], result).unwrap();
    arena.lambda_named("x", ct, block).unwrap()
}

fn run(computation: &Computation, dispatch: DispatchMode, argument: Value) -> Value {
    let ctx = ExecutionContext::new(
        Arc::new(IntrinsicRegistry::standard()),
        Arc::new(LocalBackend::without_leaves()),
        ContextConfig::default().with_dispatch(dispatch),
    );
    ctx.invoke(computation, Some(argument)).unwrap()
}

fn int_clients(values: &[i32]) -> Value {
    Value::at_clients(values.iter().copied().map(Value::int32).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn mergeable_integer_aggregations_match_single(
        values in prop::collection::vec(-1000i32..1000, 0..24),
        partitions in 1usize..6,
    ) {
        for name in [names::FEDERATED_SUM, names::FEDERATED_MAX, names::FEDERATED_MIN] {
            let computation = aggregation(name, DType::Int32);
            let single = run(&computation, DispatchMode::Single, int_clients(&values));
            let split = run(
                &computation,
                DispatchMode::Mergeable { partitions },
                int_clients(&values),
            );
            prop_assert_eq!(split, single, "{}", name);
        }
    }

    #[test]
    fn mergeable_mean_matches_single(
        values in prop::collection::vec(-64i32..64, 1..24),
        partitions in 1usize..6,
    ) {
        // Small integers keep every partial sum exact.
        let argument = Value::at_clients(
            values.iter().map(|&v| Value::float64(f64::from(v))).collect(),
        );
        let computation = aggregation(names::FEDERATED_MEAN, DType::Float64);
        let single = run(&computation, DispatchMode::Single, argument.clone());
        let split = run(&computation, DispatchMode::Mergeable { partitions }, argument);
        prop_assert_eq!(split, single);
    }

    #[test]
    fn compilation_preserves_evaluation(
        values in prop::collection::vec(-1000i64..1000, 1..12),
    ) {
        let mut arena = Arena::with_standard_registry();
        let root = sum_and_min(&mut arena);
        let artifact = Pipeline::default().compile(&arena, root).unwrap();

        let backend = LocalBackend::without_leaves();
        let argument = Value::at_clients(values.iter().copied().map(Value::int64).collect());
        let cardinalities = Cardinalities { clients: values.len() };
        let before = backend
            .evaluate(&arena, root, Some(argument.clone()), cardinalities)
            .unwrap();
        let after = backend
            .evaluate(artifact.arena(), artifact.root(), Some(argument), cardinalities)
            .unwrap();
        prop_assert_eq!(after, before);
    }
}

#[test]
fn more_partitions_than_clients() {
    let computation = aggregation(names::FEDERATED_SUM, DType::Int32);
    let split = run(
        &computation,
        DispatchMode::Mergeable { partitions: 16 },
        int_clients(&[5, 6]),
    );
    assert_eq!(split, Value::at_server(Value::int32(11)));
}

#[test]
fn no_clients_at_all() {
    let computation = aggregation(names::FEDERATED_MAX, DType::Int32);
    let split = run(
        &computation,
        DispatchMode::Mergeable { partitions: 3 },
        int_clients(&[]),
    );
    assert_eq!(split, Value::at_server(Value::int32(i32::MIN)));
}
