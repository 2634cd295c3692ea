//! Pass 5: rewrite unzipped intrinsic arguments into their zipped form.
//!
//! `federated_sum(<a, b>)` with `a: {T}@CLIENTS, b: {U}@CLIENTS` becomes
//! `federated_sum(federated_zip_at_clients(<a, b>))`; for a map the value
//! operand is zipped instead.

use fed_ir::{transform, Arena, NameGenerator, NodeFlags, NodeId, NodeKind, Order, Signature};
use fed_types::{Placement, TypeError};

use crate::analysis::performs_call;
use crate::{CompilerError, Pass, PassContext};

#[derive(Copy, Clone, Debug, Default)]
pub struct CanonicalizeIntrinsics;

impl Pass for CanonicalizeIntrinsics {
    fn name(&self) -> &'static str {
        "canonicalize_intrinsics"
    }

    #[tracing::instrument(level = "trace", skip_all)]
    fn run(
        &self,
        _cx: &PassContext<'_>,
        arena: &mut Arena,
        root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        if !arena.flags(root).contains(NodeFlags::HAS_INTRINSIC) {
            return Ok(root);
        }
        let rewritten = transform(
            arena,
            root,
            Order::Post,
            |arena: &mut Arena, id| -> Result<Option<NodeId>, CompilerError> {
                match unzipped(arena, id) {
                    Some(call) => Ok(Some(zip_argument(arena, &call)?)),
                    None => Ok(None),
                }
            },
        )?;
        Ok(rewritten.root)
    }
}

/// Which operand of an intrinsic call is unzipped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Operand {
    /// The whole argument, as for aggregations.
    Whole,
    /// Element 1 of a `<function, value>` argument, as for maps.
    MapValue,
}

/// An intrinsic call taking a struct of federated values where its
/// canonical form takes their zip.
#[derive(Clone, Debug)]
pub(crate) struct UnzippedCall {
    pub(crate) intrinsic: String,
    pub(crate) zip: String,
    pub(crate) arg: NodeId,
    pub(crate) operand: Operand,
}

pub(crate) fn unzipped(arena: &Arena, id: NodeId) -> Option<UnzippedCall> {
    let (name, arg) = arena.intrinsic_call(id)?;
    let arg = arg?;
    let registry = arena.registry();
    let def = registry.get(name)?;
    if !def.accepts_unzipped {
        return None;
    }
    let types = arena.types();
    let (placement, operand, operand_ty) = match def.signature {
        Signature::Aggregate { .. } => (Placement::Clients, Operand::Whole, arena.ty(arg)),
        Signature::Map { placement } => {
            let fields = types.struct_fields(arena.ty(arg))?;
            (placement, Operand::MapValue, fields.get(1)?.ty)
        }
        _ => return None,
    };
    let is_struct = types.struct_fields(operand_ty).is_some();
    if !is_struct || types.federated_parts(operand_ty).is_some() {
        return None;
    }
    let zip = registry.zip_for(placement)?;
    Some(UnzippedCall {
        intrinsic: name.to_owned(),
        zip: zip.name.clone(),
        arg,
        operand,
    })
}

fn zip_argument(arena: &mut Arena, call: &UnzippedCall) -> Result<NodeId, TypeError> {
    match call.operand {
        Operand::Whole => {
            let zipped = arena.call_intrinsic(&call.zip, call.arg)?;
            arena.call_intrinsic(&call.intrinsic, zipped)
        }
        Operand::MapValue => {
            if let NodeKind::Struct(elements) = arena.kind(call.arg).clone() {
                let (name, value) = elements[1];
                let zipped = arena.call_intrinsic(&call.zip, value)?;
                let mut elements = elements.into_vec();
                elements[1] = (name, zipped);
                let arg = arena.structure(elements)?;
                return arena.call_intrinsic(&call.intrinsic, arg);
            }
            if !performs_call(arena, call.arg) {
                return zip_map_value(arena, call, call.arg);
            }
            // Bind the argument once so it is not evaluated twice. The
            // block result mentions no other name, so any binder is safe.
            let binder = NameGenerator::default().fresh(arena);
            let ty = arena.ty(call.arg);
            let reference = arena.reference(binder, ty);
            let body = zip_map_value(arena, call, reference)?;
            arena.block(vec![(binder, call.arg)], body)
        }
    }
}

/// `intrinsic(<arg[0], zip(arg[1])>)`
fn zip_map_value(arena: &mut Arena, call: &UnzippedCall, arg: NodeId) -> Result<NodeId, TypeError> {
    let function = arena.select(arg, 0)?;
    let value = arena.select(arg, 1)?;
    let zipped = arena.call_intrinsic(&call.zip, value)?;
    let arg = arena.tuple(&[function, zipped])?;
    arena.call_intrinsic(&call.intrinsic, arg)
}
