//! Building the client, merge and server pieces.

use fed_compiler::CompilerError;
use fed_ir::{replace_nodes, Arena, NameGenerator, NodeId, NodeKind, Param};
use fed_types::{contains_per_client, without_per_client, Name, TypeError, TypeFlags};
use rustc_hash::FxHashMap;

use crate::collect::Site;
use crate::{UnsplittableComputationError, UnsplittableReason};

/// Roots of the three uncompiled pieces, all in the working arena.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Pieces {
    pub client: NodeId,
    pub merge: NodeId,
    pub server: NodeId,
}

pub(crate) fn build_pieces(
    arena: &mut Arena,
    root: NodeId,
    param: Param,
    body: NodeId,
    sites: &[Site],
) -> Result<Pieces, UnsplittableComputationError> {
    let ill_typed = |e: TypeError| {
        UnsplittableComputationError::new(
            UnsplittableReason::Compilation(CompilerError::from(e)),
            "<split pieces>",
        )
    };
    let mut names = NameGenerator::avoiding(arena, &[root]);

    // p -> <partial_1(input_1), ...>
    let mut partials = Vec::with_capacity(sites.len());
    for site in sites {
        partials.push(
            arena
                .call_intrinsic(&site.merge.partial, site.input)
                .map_err(ill_typed)?,
        );
    }
    let partial_types: Vec<_> = partials.iter().map(|&p| arena.ty(p)).collect();
    let client_body = arena.tuple(&partials).map_err(ill_typed)?;
    let client = arena.lambda(Some(param), client_body).map_err(ill_typed)?;

    let partials_ty = arena.types_mut().tuple(&partial_types);
    let merge = build_merge(arena, &mut names, partials_ty, sites).map_err(ill_typed)?;

    // <p', merged> -> body[aggregation_i := finalize_i(merged[i]), p.. := s[0]..]
    // where p' is p with its per-participant CLIENTS components emptied.
    let state_ty = without_per_client(arena.types_mut(), param.ty);
    let server_ty = arena.types_mut().tuple(&[state_ty, partials_ty]);
    let s = names.fresh(arena);
    let s_ref = arena.reference(s, server_ty);
    let state = arena.select(s_ref, 0).map_err(ill_typed)?;
    let merged = arena.select(s_ref, 1).map_err(ill_typed)?;
    let mut replacements = FxHashMap::default();
    for (i, site) in sites.iter().enumerate() {
        let mut value = arena.select(merged, i).map_err(ill_typed)?;
        if let Some(finalize) = &site.merge.finalize {
            value = arena.call_intrinsic(finalize, value).map_err(ill_typed)?;
        }
        replacements.insert(site.node, value);
    }
    let replaced = replace_nodes(arena, body, &replacements).map_err(ill_typed)?;
    let server_body = rebase_on_state(arena, replaced, param.name, state).map_err(ill_typed)?;
    check_server_only(arena, server_body, param.name)?;
    let server = arena
        .lambda(Some(Param { name: s, ty: server_ty }), server_body)
        .map_err(ill_typed)?;

    Ok(Pieces {
        client,
        merge,
        server,
    })
}

/// `m -> <merge_1(<m[0][0], m[1][0]>), ...>`
fn build_merge(
    arena: &mut Arena,
    names: &mut NameGenerator,
    partials_ty: fed_types::TypeId,
    sites: &[Site],
) -> Result<NodeId, TypeError> {
    let pair_ty = arena.types_mut().tuple(&[partials_ty, partials_ty]);
    let m = names.fresh(arena);
    let m_ref = arena.reference(m, pair_ty);
    let left = arena.select(m_ref, 0)?;
    let right = arena.select(m_ref, 1)?;
    let mut merged = Vec::with_capacity(sites.len());
    for (i, site) in sites.iter().enumerate() {
        let a = arena.select(left, i)?;
        let b = arena.select(right, i)?;
        let pair = arena.tuple(&[a, b])?;
        merged.push(arena.call_intrinsic(&site.merge.merge, pair)?);
    }
    let body = arena.tuple(&merged)?;
    arena.lambda(Some(Param { name: m, ty: pair_ty }), body)
}

/// Point every access `p[i][j]..` that carries no per-participant CLIENTS
/// value at the same path under `state`.
fn rebase_on_state(
    arena: &mut Arena,
    body: NodeId,
    param: Name,
    state: NodeId,
) -> Result<NodeId, TypeError> {
    let mut replacements = FxHashMap::default();
    for id in arena.postorder(body) {
        let Some(path) = param_path(arena, id, param) else {
            continue;
        };
        if contains_per_client(arena.types(), arena.ty(id)) {
            continue;
        }
        let mut rebased = state;
        for index in path {
            rebased = arena.select(rebased, index)?;
        }
        replacements.insert(id, rebased);
    }
    replace_nodes(arena, body, &replacements)
}

/// Selection indices from `param` down to `id`, if `id` is such a chain.
fn param_path(arena: &Arena, mut id: NodeId, param: Name) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    loop {
        match *arena.kind(id) {
            NodeKind::Selection { source, index } => {
                path.push(index as usize);
                id = source;
            }
            NodeKind::Reference(name) if name == param => {
                path.reverse();
                return Some(path);
            }
            _ => return None,
        }
    }
}

/// The server piece sees no per-participant CLIENTS value: every remaining
/// use of the original parameter and every call touching CLIENTS is
/// rejected.
fn check_server_only(
    arena: &Arena,
    body: NodeId,
    param: Name,
) -> Result<(), UnsplittableComputationError> {
    let outside = |id: NodeId| {
        UnsplittableComputationError::new(
            UnsplittableReason::ClientsComputationOutsideAggregation,
            arena.render_short(id),
        )
    };
    let touches_clients = |id: NodeId| {
        arena
            .types()
            .flags(arena.ty(id))
            .contains(TypeFlags::AT_CLIENTS)
    };
    for id in arena.postorder(body) {
        match *arena.kind(id) {
            NodeKind::Reference(name) if name == param => return Err(outside(id)),
            NodeKind::Call { arg, .. } if touches_clients(id) || arg.is_some_and(touches_clients) => {
                return Err(outside(id));
            }
            _ => {}
        }
    }
    Ok(())
}
