#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::sync::Arc;

use fed_compiler::{Artifact, Pipeline, PipelineConfig};
use fed_ir::{names, AggregateOp, Arena, DataSource, IntrinsicDef, IntrinsicRegistry, NodeId, Signature};
use fed_types::{DType, TypeId};
use pretty_assertions::assert_eq;

use super::*;

fn clients_of(arena: &mut Arena, dtype: DType) -> TypeId {
    let member = arena.types_mut().scalar(dtype);
    arena.types_mut().at_clients(member, false).unwrap()
}

/// `x -> body(x)` over `{dtype}@CLIENTS`.
fn over_clients(
    arena: &mut Arena,
    dtype: DType,
    body: impl FnOnce(&mut Arena, NodeId) -> NodeId,
) -> NodeId {
    let ct = clients_of(arena, dtype);
    let x = arena.reference_named("x", ct);
    let body = body(arena, x);
    arena.lambda_named("x", ct, body).unwrap()
}

fn compile(arena: &Arena, root: NodeId) -> Arc<Artifact> {
    Pipeline::default().compile(arena, root).unwrap()
}

fn splitter() -> MergeableCompiler {
    MergeableCompiler::new(
        Arc::new(IntrinsicRegistry::standard()),
        PipelineConfig::default(),
    )
}

fn reason(arena: &Arena, root: NodeId) -> UnsplittableReason {
    splitter().split(&compile(arena, root)).unwrap_err().reason
}

#[test]
fn sum_splits_into_partial_merge_and_server() {
    let mut arena = Arena::with_standard_registry();
    let root = over_clients(&mut arena, DType::Int32, |arena, x| {
        arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap()
    });

    let form = splitter().split(&compile(&arena, root)).unwrap();
    assert_eq!(form.client.render(), "(_var1 -> <federated_sum(_var1)>)");
    assert_eq!(
        form.client.format_type(),
        "({int32}@CLIENTS -> <int32@SERVER>)"
    );
    assert_eq!(
        form.merge.render(),
        "(_var1 -> <merge_sum(<_var1[0][0],_var1[1][0]>)>)"
    );
    assert_eq!(form.server.render(), "(_var1 -> _var1[1][0])");
    assert_eq!(
        form.server.format_type(),
        "(<<>,<int32@SERVER>> -> int32@SERVER)"
    );
    assert_eq!(
        form.aggregations,
        vec![AggregationSite {
            intrinsic: names::FEDERATED_SUM.to_owned(),
            partial: names::FEDERATED_SUM.to_owned(),
            merge: names::MERGE_SUM.to_owned(),
            finalize: None,
        }]
    );
}

#[test]
fn mean_is_finalized_on_the_server() {
    let mut arena = Arena::with_standard_registry();
    let root = over_clients(&mut arena, DType::Float32, |arena, x| {
        arena.call_intrinsic(names::FEDERATED_MEAN, x).unwrap()
    });

    let form = splitter().split(&compile(&arena, root)).unwrap();
    assert_eq!(
        form.client.render(),
        "(_var1 -> <federated_mean_partial(_var1)>)"
    );
    assert!(form.merge.render().contains("merge_mean"), "{}", form.merge.render());
    assert_eq!(form.server.render(), "(_var1 -> finalize_mean(_var1[1][0]))");
    assert_eq!(form.server.format_type().rsplit(" -> ").next(), Some("float32@SERVER)"));
    assert_eq!(form.aggregations[0].finalize.as_deref(), Some(names::FINALIZE_MEAN));
}

#[test]
fn each_aggregation_gets_a_partial_slot() {
    let mut arena = Arena::with_standard_registry();
    let root = over_clients(&mut arena, DType::Int32, |arena, x| {
        let sum = arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap();
        let max = arena.call_intrinsic(names::FEDERATED_MAX, x).unwrap();
        arena.tuple(&[sum, max]).unwrap()
    });

    let form = splitter().split(&compile(&arena, root)).unwrap();
    assert_eq!(form.aggregation_count(), 2);
    assert_eq!(
        form.client.render(),
        "(_var1 -> <federated_sum(_var1),federated_max(_var1)>)"
    );
    assert_eq!(form.server.render(), "(_var1 -> <_var1[1][0],_var1[1][1]>)");
    let merges: Vec<_> = form.aggregations.iter().map(|a| a.merge.as_str()).collect();
    assert_eq!(merges, vec![names::MERGE_SUM, names::MERGE_MAX]);
}

#[test]
fn server_state_flows_through_the_parameter() {
    let mut arena = Arena::with_standard_registry();
    let ct = clients_of(&mut arena, DType::Int32);
    let int = arena.types_mut().scalar(DType::Int32);
    let st = arena.types_mut().at_server(int).unwrap();
    let param_ty = arena.types_mut().tuple(&[ct, st]);
    let p = arena.reference_named("p", param_ty);
    let clients = arena.select(p, 0).unwrap();
    let state = arena.select(p, 1).unwrap();
    let sum = arena.call_intrinsic(names::FEDERATED_SUM, clients).unwrap();
    let pair = arena.tuple(&[sum, state]).unwrap();
    let zipped = arena
        .call_intrinsic(names::FEDERATED_ZIP_AT_SERVER, pair)
        .unwrap();
    let root = arena.lambda_named("p", param_ty, zipped).unwrap();

    let form = splitter().split(&compile(&arena, root)).unwrap();
    assert_eq!(
        form.client.render(),
        "(_var1 -> <federated_sum(_var1[0])>)"
    );
    assert_eq!(
        form.server.render(),
        "(_var1 -> federated_zip_at_server(<_var1[1][0],_var1[0][1]>))"
    );
    let server_param = form.server.param_type().unwrap();
    let types = form.server.arena().types();
    assert!(!types.flags(server_param).contains(TypeFlags::AT_CLIENTS));
    assert_eq!(
        types.format(types.struct_fields(server_param).unwrap()[0].ty),
        "<<>,int32@SERVER>"
    );
}

#[test]
fn server_piece_never_receives_client_values() {
    let mut arena = Arena::with_standard_registry();
    let ct = clients_of(&mut arena, DType::Float32);
    let weights = clients_of(&mut arena, DType::Int32);
    let param_ty = arena.types_mut().structure([(Some("v"), ct), (Some("n"), weights)]);
    let p = arena.reference_named("p", param_ty);
    let values = arena.select(p, 0).unwrap();
    let counts = arena.select(p, 1).unwrap();
    let mean = arena.call_intrinsic(names::FEDERATED_MEAN, values).unwrap();
    let total = arena.call_intrinsic(names::FEDERATED_SUM, counts).unwrap();
    let pair = arena.tuple(&[mean, total]).unwrap();
    let root = arena.lambda_named("p", param_ty, pair).unwrap();

    let form = splitter().split(&compile(&arena, root)).unwrap();
    let server_param = form.server.param_type().unwrap();
    let types = form.server.arena().types();
    assert!(!types.flags(server_param).contains(TypeFlags::AT_CLIENTS));
    assert_eq!(
        types.format(types.struct_fields(server_param).unwrap()[0].ty),
        "<v=<>,n=<>>"
    );
    assert_eq!(
        form.server.render(),
        "(_var1 -> <finalize_mean(_var1[1][0]),_var1[1][1]>)"
    );
}

#[test]
fn aggregation_without_merge_is_rejected() {
    let registry = IntrinsicRegistry::standard().with(
        IntrinsicDef::new("opaque_sum", Signature::Aggregate { op: AggregateOp::Sum })
            .aggregating(None),
    );
    let registry = Arc::new(registry);
    let mut arena = Arena::new(Arc::clone(&registry));
    let root = over_clients(&mut arena, DType::Int32, |arena, x| {
        arena.call_intrinsic("opaque_sum", x).unwrap()
    });

    let splitter = MergeableCompiler::new(registry, PipelineConfig::default());
    let err = splitter.split(&compile(&arena, root)).unwrap_err();
    assert!(
        matches!(
            &err.reason,
            UnsplittableReason::NonMergeableAggregation { intrinsic } if intrinsic == "opaque_sum"
        ),
        "{err}"
    );
    assert!(err.subtree.contains("opaque_sum"), "{}", err.subtree);
}

#[test]
fn aggregation_under_lambda_is_rejected() {
    let mut arena = Arena::with_standard_registry();
    let root = over_clients(&mut arena, DType::Int32, |arena, x| {
        let sum = arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap();
        arena.lambda(None, sum).unwrap()
    });
    assert!(matches!(
        reason(&arena, root),
        UnsplittableReason::AggregationUnderLambda { .. }
    ));
}

#[test]
fn dependent_aggregation_is_rejected() {
    let mut arena = Arena::with_standard_registry();
    let root = over_clients(&mut arena, DType::Int32, |arena, x| {
        let inner = arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap();
        let back = arena
            .call_intrinsic(names::FEDERATED_BROADCAST, inner)
            .unwrap();
        arena.call_intrinsic(names::FEDERATED_SUM, back).unwrap()
    });
    assert!(matches!(
        reason(&arena, root),
        UnsplittableReason::DependentAggregation { .. }
    ));
}

#[test]
fn shape_errors() {
    let mut arena = Arena::with_standard_registry();
    let int = arena.types_mut().scalar(DType::Int32);

    let data = arena.data(DataSource::Uri("mem://d".to_owned()), int);
    assert!(matches!(reason(&arena, data), UnsplittableReason::NotAFunction));

    let st = arena.types_mut().at_server(int).unwrap();
    let y = arena.reference_named("y", st);
    let server_only = arena.lambda_named("y", st, y).unwrap();
    assert!(matches!(
        reason(&arena, server_only),
        UnsplittableReason::NoClientsParameter
    ));

    let identity = over_clients(&mut arena, DType::Int32, |_, x| x);
    assert!(matches!(
        reason(&arena, identity),
        UnsplittableReason::ClientsPlacedResult
    ));
}

#[test]
fn splits_are_cached() {
    let mut arena = Arena::with_standard_registry();
    let root = over_clients(&mut arena, DType::Int32, |arena, x| {
        arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap()
    });
    let artifact = compile(&arena, root);

    let splitter = splitter();
    let first = splitter.split(&artifact).unwrap();
    let second = splitter.split(&artifact).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(splitter.cache_len(), 1);
}
