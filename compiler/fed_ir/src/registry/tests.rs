#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use fed_types::{DType, Shape};
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn standard_registry_contents() {
    let registry = IntrinsicRegistry::standard();
    let sum = registry.get(names::FEDERATED_SUM).unwrap();
    assert!(sum.is_aggregation());
    assert_eq!(
        sum.merge_spec(),
        Some(&MergeSpec {
            partial: names::FEDERATED_SUM.to_owned(),
            merge: names::MERGE_SUM.to_owned(),
            finalize: None,
        })
    );

    let mean = registry.get(names::FEDERATED_MEAN).unwrap();
    let spec = mean.merge_spec().unwrap();
    assert_eq!(spec.partial, names::FEDERATED_MEAN_PARTIAL);
    assert_eq!(spec.finalize.as_deref(), Some(names::FINALIZE_MEAN));

    let fold = registry.get(names::FEDERATED_AGGREGATE).unwrap();
    assert!(fold.is_aggregation());
    assert!(fold.merge_spec().is_none());

    assert!(registry.get(names::FEDERATED_SECURE_SUM).unwrap().observable);
    assert!(!registry.get(names::FEDERATED_MAP).unwrap().is_aggregation());
}

#[test]
fn every_merge_spec_resolves() {
    let registry = IntrinsicRegistry::standard();
    for def in registry.iter() {
        if let Some(spec) = def.merge_spec() {
            assert!(registry.get(&spec.partial).is_some(), "{}", def.name);
            assert!(registry.get(&spec.merge).is_some(), "{}", def.name);
            if let Some(finalize) = &spec.finalize {
                assert!(registry.get(finalize).is_some(), "{}", def.name);
            }
        }
    }
}

#[test]
fn lookup_unknown() {
    let registry = IntrinsicRegistry::standard();
    assert_eq!(
        registry.lookup("federated_teleport").unwrap_err(),
        TypeError::UnknownIntrinsic {
            name: "federated_teleport".to_owned()
        }
    );
}

#[test]
fn fingerprint_tracks_contents() {
    let a = IntrinsicRegistry::standard();
    let b = IntrinsicRegistry::standard();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let c = IntrinsicRegistry::standard().with(
        IntrinsicDef::new("federated_count", Signature::Aggregate { op: AggregateOp::Sum })
            .aggregating(None),
    );
    assert_ne!(a.fingerprint(), c.fingerprint());
    assert_eq!(c.len(), a.len() + 1);
}

#[test]
fn zip_for_placement() {
    let registry = IntrinsicRegistry::standard();
    assert_eq!(
        registry.zip_for(Placement::Clients).unwrap().name,
        names::FEDERATED_ZIP_AT_CLIENTS
    );
    assert_eq!(
        registry.zip_for(Placement::Server).unwrap().name,
        names::FEDERATED_ZIP_AT_SERVER
    );
    assert!(IntrinsicRegistry::empty().zip_for(Placement::Server).is_none());
}

// === Signatures ===

#[test]
fn sum_instantiates_at_server() {
    let registry = IntrinsicRegistry::standard();
    let mut pool = TypePool::new();
    let float = pool.scalar(DType::Float32);
    let clients = pool.at_clients(float, false).unwrap();
    let result = registry
        .get(names::FEDERATED_SUM)
        .unwrap()
        .instantiate(&mut pool, clients)
        .unwrap();
    assert_eq!(pool.format(result), "float32@SERVER");
}

#[test]
fn sum_accepts_unzipped_struct() {
    let registry = IntrinsicRegistry::standard();
    let mut pool = TypePool::new();
    let float = pool.scalar(DType::Float32);
    let int = pool.scalar(DType::Int32);
    let a = pool.at_clients(float, false).unwrap();
    let b = pool.at_clients(int, false).unwrap();
    let pair = pool.structure([(Some("a"), a), (Some("b"), b)]);
    let result = registry
        .get(names::FEDERATED_SUM)
        .unwrap()
        .instantiate(&mut pool, pair)
        .unwrap();
    assert_eq!(pool.format(result), "<a=float32,b=int32>@SERVER");
}

#[test]
fn sum_rejects_strings_and_unknown_shapes() {
    let registry = IntrinsicRegistry::standard();
    let sum = registry.get(names::FEDERATED_SUM).unwrap();
    let mut pool = TypePool::new();

    let text = pool.scalar(DType::Str);
    let text = pool.at_clients(text, false).unwrap();
    assert!(matches!(
        sum.instantiate(&mut pool, text),
        Err(TypeError::IntrinsicSignature { .. })
    ));

    let ragged = pool.tensor(DType::Float32, Shape::Known(vec![None]));
    let ragged = pool.at_clients(ragged, false).unwrap();
    assert!(sum.instantiate(&mut pool, ragged).is_err());
}

#[test]
fn secure_sum_requires_integers() {
    let registry = IntrinsicRegistry::standard();
    let secure = registry.get(names::FEDERATED_SECURE_SUM).unwrap();
    let mut pool = TypePool::new();
    let float = pool.scalar(DType::Float32);
    let float = pool.at_clients(float, false).unwrap();
    assert!(secure.instantiate(&mut pool, float).is_err());

    let int = pool.scalar(DType::Int64);
    let int = pool.at_clients(int, false).unwrap();
    assert!(secure.instantiate(&mut pool, int).is_ok());
}

#[test]
fn mean_partial_and_finalize() {
    let registry = IntrinsicRegistry::standard();
    let mut pool = TypePool::new();
    let float = pool.scalar(DType::Float64);
    let clients = pool.at_clients(float, false).unwrap();

    let partial = registry
        .get(names::FEDERATED_MEAN_PARTIAL)
        .unwrap()
        .instantiate(&mut pool, clients)
        .unwrap();
    assert_eq!(pool.format(partial), "<total=float64,count=int64>@SERVER");

    let pair = pool.tuple(&[partial, partial]);
    let merged = registry
        .get(names::MERGE_MEAN)
        .unwrap()
        .instantiate(&mut pool, pair)
        .unwrap();
    assert_eq!(merged, partial);

    let finalized = registry
        .get(names::FINALIZE_MEAN)
        .unwrap()
        .instantiate(&mut pool, merged)
        .unwrap();
    assert_eq!(pool.format(finalized), "float64@SERVER");
}

#[test]
fn map_preserves_all_equal() {
    let registry = IntrinsicRegistry::standard();
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let float = pool.scalar(DType::Float32);
    let func = pool.function(Some(int), float);

    let equal = pool.at_clients(int, true).unwrap();
    let arg = pool.tuple(&[func, equal]);
    let map = registry.get(names::FEDERATED_MAP).unwrap();
    let result = map.instantiate(&mut pool, arg).unwrap();
    assert_eq!(pool.format(result), "float32@CLIENTS");

    let apply = registry.get(names::FEDERATED_APPLY).unwrap();
    let server = pool.at_server(int).unwrap();
    let arg = pool.tuple(&[func, server]);
    let result = apply.instantiate(&mut pool, arg).unwrap();
    assert_eq!(pool.format(result), "float32@SERVER");

    // Wrong placement.
    let arg = pool.tuple(&[func, server]);
    assert!(map.instantiate(&mut pool, arg).is_err());
}

#[test]
fn zip_requires_common_placement() {
    let registry = IntrinsicRegistry::standard();
    let zip = registry.get(names::FEDERATED_ZIP_AT_CLIENTS).unwrap();
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let a = pool.at_clients(int, false).unwrap();
    let b = pool.at_clients(int, true).unwrap();
    let s = pool.at_server(int).unwrap();

    let ok = pool.tuple(&[a, b]);
    let zipped = zip.instantiate(&mut pool, ok).unwrap();
    assert_eq!(pool.format(zipped), "{<int32,int32>}@CLIENTS");

    let mixed = pool.tuple(&[a, s]);
    assert!(zip.instantiate(&mut pool, mixed).is_err());
    assert!(zip.instantiate(&mut pool, TypeId::UNIT).is_err());
}

#[test]
fn fold_signature() {
    let registry = IntrinsicRegistry::standard();
    let fold = registry.get(names::FEDERATED_AGGREGATE).unwrap();
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let float = pool.scalar(DType::Float32);
    let value = pool.at_clients(int, false).unwrap();
    let acc_pair = pool.tuple(&[float, int]);
    let accumulate = pool.function(Some(acc_pair), float);
    let merge_pair = pool.tuple(&[float, float]);
    let merge = pool.function(Some(merge_pair), float);
    let report = pool.function(Some(float), int);

    let arg = pool.tuple(&[value, float, accumulate, merge, report]);
    let result = fold.instantiate(&mut pool, arg).unwrap();
    assert_eq!(pool.format(result), "int32@SERVER");

    let bad = pool.tuple(&[value, float, merge, merge, report]);
    assert!(fold.instantiate(&mut pool, bad).is_err());
}

#[test]
fn check_type_compares_declared_result() {
    let registry = IntrinsicRegistry::standard();
    let broadcast = registry.get(names::FEDERATED_BROADCAST).unwrap();
    let mut pool = TypePool::new();
    let int = pool.scalar(DType::Int32);
    let server = pool.at_server(int).unwrap();
    let clients_equal = pool.at_clients(int, true).unwrap();
    let clients_any = pool.at_clients(int, false).unwrap();

    let exact = pool.function(Some(server), clients_equal);
    assert!(broadcast.check_type(&mut pool, exact).is_ok());

    // An all-equal result may be declared per-client.
    let widened = pool.function(Some(server), clients_any);
    assert!(broadcast.check_type(&mut pool, widened).is_ok());

    let wrong = pool.function(Some(server), server);
    assert!(broadcast.check_type(&mut pool, wrong).is_err());
    assert!(broadcast.check_type(&mut pool, int).is_err());
}
