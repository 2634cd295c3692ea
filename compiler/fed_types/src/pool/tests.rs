#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn pre_interned_handles() {
    let pool = TypePool::new();
    assert_eq!(pool.kind(TypeId::UNIT), &TypeKind::Struct(Box::new([])));
    assert_eq!(pool.kind(TypeId::PLACEMENT), &TypeKind::Placement);
    assert_eq!(pool.len(), 2);
}

#[test]
fn interning_deduplicates() {
    let mut pool = TypePool::new();
    let a = pool.scalar(DType::Int32);
    let b = pool.tensor(DType::Int32, Shape::scalar());
    assert_eq!(a, b);

    let s1 = pool.structure([(Some("x"), a), (None, a)]);
    let s2 = pool.structure([(Some("x"), b), (None, b)]);
    assert_eq!(s1, s2);

    let empty = pool.structure(std::iter::empty());
    assert_eq!(empty, TypeId::UNIT);
}

#[test]
fn field_names_distinguish_handles() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Int32);
    let named = pool.structure([(Some("a"), i)]);
    let unnamed = pool.structure([(None, i)]);
    assert_ne!(named, unnamed);
    assert_ne!(pool.content_hash(named), pool.content_hash(unnamed));
}

#[test]
fn flags_propagate_from_members() {
    let mut pool = TypePool::new();
    let f = pool.tensor(DType::Float32, Shape::Known(vec![None]));
    let clients = pool.at_clients(f, false).unwrap();
    let s = pool.structure([(None, clients)]);

    let flags = pool.flags(s);
    assert!(flags.contains(TypeFlags::IS_STRUCT));
    assert!(flags.contains(TypeFlags::HAS_FEDERATED | TypeFlags::AT_CLIENTS));
    assert!(flags.contains(TypeFlags::HAS_UNKNOWN_SHAPE));
    assert!(!flags.contains(TypeFlags::IS_FEDERATED));
    assert!(!flags.contains(TypeFlags::AT_SERVER));
}

#[test]
fn federated_member_rejects_nested_placement() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Int32);
    let inner = pool.at_server(i).unwrap();
    let err = pool.at_clients(inner, false).unwrap_err();
    assert!(matches!(err, TypeError::InvalidFederatedMember { .. }));

    let f = pool.function(Some(i), i);
    assert!(pool.at_server(f).is_err());
}

#[test]
fn field_index_by_name() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Int32);
    let s = pool.structure([(Some("a"), i), (Some("b"), i)]);
    assert_eq!(pool.field_index(s, "b"), Some(1));
    assert_eq!(pool.field_index(s, "c"), None);
    assert_eq!(pool.field_index(i, "a"), None);
}

#[test]
fn import_preserves_structure_and_hash() {
    let mut source = TypePool::new();
    let i = source.scalar(DType::Int64);
    let s = source.structure([(Some("count"), i)]);
    let fed = source.at_clients(s, false).unwrap();
    let func = source.function(Some(fed), i);

    let mut target = TypePool::new();
    target.intern_name("unrelated");
    let imported = target.import(&source, func);

    assert_eq!(target.format(imported), source.format(func));
    assert_eq!(target.content_hash(imported), source.content_hash(func));
}

#[test]
fn accessors_reject_other_kinds() {
    let mut pool = TypePool::new();
    let i = pool.scalar(DType::Bool);
    assert!(pool.struct_fields(i).is_none());
    assert!(pool.function_parts(i).is_none());
    assert!(pool.federated_parts(i).is_none());
    assert_eq!(pool.tensor_parts(i), Some((DType::Bool, &Shape::scalar())));
}
