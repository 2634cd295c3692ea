#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use fed_types::{DType, TypeId};
use pretty_assertions::assert_eq;

use super::*;
use crate::{alpha_eq, NodeKind};

fn int(arena: &mut Arena) -> TypeId {
    arena.types_mut().scalar(DType::Int32)
}

#[test]
fn no_op_visitor_keeps_root() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x = arena.reference_named("x", t);
    let s = arena.tuple(&[x, x]).unwrap();
    let lam = arena.lambda_named("x", t, s).unwrap();

    for order in [Order::Pre, Order::Post] {
        let out = transform(&mut arena, lam, order, |_: &mut Arena, _| {
            Ok::<_, TypeError>(None)
        })
        .unwrap();
        assert_eq!(out, Rewritten::unchanged(lam));
    }
}

#[test]
fn postorder_rewrites_leaves_and_rebuilds_path() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x = arena.reference_named("x", t);
    let y = arena.reference_named("y", t);
    let s = arena.tuple(&[x, y]).unwrap();
    let outer = arena.tuple(&[s, y]).unwrap();

    let x_name = arena.name("x");
    let out = transform(&mut arena, outer, Order::Post, |arena: &mut Arena, id| {
        Ok::<_, TypeError>(match arena.kind(id) {
            NodeKind::Reference(n) if *n == x_name => {
                let ty = arena.ty(id);
                Some(arena.reference_named("renamed", ty))
            }
            _ => None,
        })
    })
    .unwrap();
    assert!(out.changed);
    assert_eq!(arena.render(out.root), "<<renamed,y>,y>");
    // The untouched `y` is shared, not copied.
    assert_eq!(arena.children(out.root)[1], y);
}

#[test]
fn preorder_does_not_descend_into_replacement() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x = arena.reference_named("x", t);
    let inner = arena.tuple(&[x]).unwrap();
    let outer = arena.tuple(&[inner]).unwrap();
    // Replacing `inner` by a struct that itself contains `inner` must not
    // loop.
    let wrapped = arena.tuple(&[inner, x]).unwrap();

    let mut visits = 0;
    let out = transform(&mut arena, outer, Order::Pre, |_: &mut Arena, id| {
        visits += 1;
        Ok::<_, TypeError>((id == inner).then_some(wrapped))
    })
    .unwrap();
    assert_eq!(arena.render(out.root), "<<<x>,x>>");
    assert_eq!(visits, 2);
}

#[test]
fn shared_subtrees_are_visited_once() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x = arena.reference_named("x", t);
    let s = arena.tuple(&[x]).unwrap();
    let pair = arena.tuple(&[s, s]).unwrap();

    let mut seen_s = 0;
    transform(&mut arena, pair, Order::Post, |_: &mut Arena, id| {
        if id == s {
            seen_s += 1;
        }
        Ok::<_, TypeError>(None)
    })
    .unwrap();
    assert_eq!(seen_s, 1);
}

#[test]
fn visitor_errors_propagate() {
    #[derive(Debug)]
    struct Stop;
    impl From<TypeError> for Stop {
        fn from(_: TypeError) -> Self {
            Stop
        }
    }

    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x = arena.reference_named("x", t);
    let s = arena.tuple(&[x]).unwrap();
    let result = transform(&mut arena, s, Order::Post, |_: &mut Arena, id| {
        if id == x {
            Err(Stop)
        } else {
            Ok(None)
        }
    });
    assert!(result.is_err());
}

#[test]
fn ill_typed_replacement_is_rejected() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let f = arena.types_mut().scalar(DType::Float32);
    let x = arena.reference_named("x", t);
    let lam = arena.lambda_named("x", t, x).unwrap();
    let y = arena.reference_named("y", t);
    let call = arena.call(lam, Some(y)).unwrap();

    let z = arena.reference_named("z", f);
    let mut map = rustc_hash::FxHashMap::default();
    map.insert(y, z);
    assert!(replace_nodes(&mut arena, call, &map).is_err());
}

// === Names ===

#[test]
fn fresh_names_skip_reserved() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let taken = arena.reference_named("_var1", t);
    let mut names = NameGenerator::avoiding(&arena, &[taken]);
    names.reserve("_var2");
    let a = names.fresh(&mut arena);
    let b = names.fresh(&mut arena);
    assert_eq!(arena.name_str(a), "_var3");
    assert_eq!(arena.name_str(b), "_var4");
}

// === Substitution ===

#[test]
fn substitute_replaces_free_occurrences_only() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x = arena.reference_named("x", t);
    let bound = arena.lambda_named("x", t, x).unwrap();
    let body = arena.tuple(&[x, bound]).unwrap();
    let value = arena.reference_named("v", t);

    let x_name = arena.name("x");
    let out = substitute(&mut arena, body, x_name, value).unwrap();
    assert_eq!(arena.render(out), "<v,(x -> x)>");
}

#[test]
fn substitute_avoids_capture() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    // (y -> <x, y>)[x := y] must not capture the substituted `y`.
    let x = arena.reference_named("x", t);
    let y = arena.reference_named("y", t);
    let pair = arena.tuple(&[x, y]).unwrap();
    let lam = arena.lambda_named("y", t, pair).unwrap();

    let x_name = arena.name("x");
    let out = substitute(&mut arena, lam, x_name, y).unwrap();
    assert_eq!(arena.render(out), "(_var1 -> <y,_var1>)");

    let mut expected = Arena::with_standard_registry();
    let t2 = int(&mut expected);
    let outer_y = expected.reference_named("y", t2);
    let inner = expected.reference_named("w", t2);
    let pair = expected.tuple(&[outer_y, inner]).unwrap();
    let lam = expected.lambda_named("w", t2, pair).unwrap();
    assert!(alpha_eq((&arena, out), (&expected, lam)));
}

#[test]
fn substitute_respects_block_shadowing() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x_name = arena.name("x");
    let x = arena.reference(x_name, t);
    let one = arena.reference_named("one", t);
    // let a=x, x=one in <a, x>
    let a_name = arena.name("a");
    let a = arena.reference(a_name, t);
    let result = arena.tuple(&[a, x]).unwrap();
    let block = arena.block(vec![(a_name, x), (x_name, one)], result).unwrap();

    let v = arena.reference_named("v", t);
    let out = substitute(&mut arena, block, x_name, v).unwrap();
    assert_eq!(arena.render(out), "(let a=v,x=one in <a,x>)");
}

#[test]
fn substitute_renames_capturing_block_binder() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x_name = arena.name("x");
    let v_name = arena.name("v");
    let x = arena.reference(x_name, t);
    let v = arena.reference(v_name, t);
    let zero = arena.reference_named("zero", t);
    // let v=zero in <v, x>, then x := v
    let result = arena.tuple(&[v, x]).unwrap();
    let block = arena.block(vec![(v_name, zero)], result).unwrap();

    let out = substitute(&mut arena, block, x_name, v).unwrap();
    assert_eq!(arena.render(out), "(let _var1=zero in <_var1,v>)");
    let free: Vec<&str> = arena
        .free_names(out)
        .iter()
        .map(|&(n, _)| arena.name_str(n))
        .collect();
    assert!(free.contains(&"v"));
    assert!(free.contains(&"zero"));
}

#[test]
fn count_references_respects_scope() {
    let mut arena = Arena::with_standard_registry();
    let t = int(&mut arena);
    let x_name = arena.name("x");
    let x = arena.reference(x_name, t);
    let pair = arena.tuple(&[x, x]).unwrap();
    assert_eq!(count_references(&arena, pair, x_name), 2);

    let lam = arena.lambda_named("x", t, pair).unwrap();
    let outer = arena.tuple(&[x, lam]).unwrap();
    assert_eq!(count_references(&arena, outer, x_name), 1);
    assert!(contains_reference(&arena, outer, x_name));
    assert!(!contains_reference(&arena, lam, x_name));

    // let y=x, x=y in <x, x>
    let y_name = arena.name("y");
    let y = arena.reference(y_name, t);
    let block = arena.block(vec![(y_name, x), (x_name, y)], pair).unwrap();
    assert_eq!(count_references(&arena, block, x_name), 1);
}
