#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::sync::Arc;

use fed_ir::{names, Arena, NodeId};
use fed_types::{DType, TypeError};
use pretty_assertions::assert_eq;

use super::*;

/// `(x -> (y -> federated_sum(y))(x))` over `{int32}@CLIENTS`, with the
/// binder names given.
fn sum_through_lambda(arena: &mut Arena, outer: &str, inner: &str) -> NodeId {
    let member = arena.types_mut().scalar(DType::Int32);
    let ct = arena.types_mut().at_clients(member, false).unwrap();
    let y = arena.reference_named(inner, ct);
    let sum = arena.call_intrinsic(names::FEDERATED_SUM, y).unwrap();
    let lam = arena.lambda_named(inner, ct, sum).unwrap();
    let x = arena.reference_named(outer, ct);
    let call = arena.call(lam, Some(x)).unwrap();
    arena.lambda_named(outer, ct, call).unwrap()
}

#[test]
fn compile_reaches_canonical_form() {
    let mut arena = Arena::with_standard_registry();
    let root = sum_through_lambda(&mut arena, "x", "y");

    let pipeline = Pipeline::default();
    let artifact = pipeline.compile(&arena, root).unwrap();
    assert_eq!(artifact.render(), "(_var1 -> federated_sum(_var1))");
    assert_eq!(artifact.format_type(), "({int32}@CLIENTS -> int32@SERVER)");
    assert!(artifact.is_function());
    assert_eq!(
        artifact.arena().types().format(artifact.result_type()),
        "int32@SERVER"
    );
    // The compacted arena keeps only the artifact's nodes.
    assert_eq!(
        artifact.arena().len(),
        artifact.arena().postorder(artifact.root()).len()
    );
}

#[test]
fn alpha_equivalent_sources_share_a_cache_entry() {
    let mut arena = Arena::with_standard_registry();
    let a = sum_through_lambda(&mut arena, "x", "y");
    let b = sum_through_lambda(&mut arena, "p", "q");

    let pipeline = Pipeline::default();
    let first = pipeline.compile(&arena, a).unwrap();
    let second = pipeline.compile(&arena, b).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(pipeline.cache_len(), 1);

    pipeline.clear_cache();
    assert_eq!(pipeline.cache_len(), 0);
    let third = pipeline.compile(&arena, a).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(first.content_hash(), third.content_hash());
}

#[test]
fn fingerprint_covers_configuration_and_registry() {
    let registry = fed_ir::IntrinsicRegistry::standard();
    let base = Pipeline::default();
    let other = Pipeline::new(PipelineConfig::default().with_inline_fan_out(3));
    assert_ne!(base.fingerprint(&registry), other.fingerprint(&registry));
    assert_ne!(
        base.fingerprint(&registry),
        base.fingerprint(&fed_ir::IntrinsicRegistry::empty())
    );
    assert_eq!(
        base.fingerprint(&registry),
        Pipeline::default().fingerprint(&registry)
    );
}

#[test]
fn iteration_cap_is_enforced() {
    let mut arena = Arena::with_standard_registry();
    let root = sum_through_lambda(&mut arena, "x", "y");

    let pipeline = Pipeline::new(PipelineConfig::default().with_max_iterations(1));
    let err = pipeline.compile(&arena, root).unwrap_err();
    assert!(
        matches!(err, CompilerError::FixedPointNotReached { iterations: 1, .. }),
        "{err}"
    );
    assert_eq!(pipeline.cache_len(), 0);
}

struct Failing;

impl Pass for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn run(
        &self,
        _cx: &PassContext<'_>,
        _arena: &mut Arena,
        _root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        Err(TypeError::UnknownIntrinsic {
            name: "nope".to_owned(),
        }
        .into())
    }
}

#[test]
fn pass_failures_name_the_pass() {
    let mut arena = Arena::with_standard_registry();
    let root = sum_through_lambda(&mut arena, "x", "y");

    let pipeline = Pipeline::with_passes(vec![Arc::new(Failing)], PipelineConfig::default());
    let err = pipeline.compile(&arena, root).unwrap_err();
    let CompilerError::PassFailed { pass, subtree, .. } = err else {
        panic!("expected PassFailed, got {err}");
    };
    assert_eq!(pass, "failing");
    assert!(subtree.contains("federated_sum"), "{subtree}");
    assert_eq!(pipeline.cache_len(), 0);
}

#[test]
fn standard_pass_order() {
    assert_eq!(
        Pipeline::default().pass_names(),
        vec![
            "uniquify_names",
            "inline_references",
            "remove_unused_bindings",
            "merge_compiled_leaves",
            "canonicalize_intrinsics",
        ]
    );
}
