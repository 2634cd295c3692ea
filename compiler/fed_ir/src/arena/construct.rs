//! Validating node constructors.
//!
//! Every constructor checks the node's type against its children before the
//! node exists, so an ill-typed tree can never be built. Constructors return
//! the existing id when an identical node is already stored.

use std::sync::Arc;

use fed_types::{Field, Name, TypeError, TypeFlags, TypeId};

use super::{Arena, Children};
use crate::{DataSource, LeafProgram, NodeId, NodeKind, Param};

impl Arena {
    /// `name`, a reference of type `ty`.
    pub fn reference(&mut self, name: Name, ty: TypeId) -> NodeId {
        let kind = NodeKind::Reference(name);
        if let Some(id) = self.existing(&kind, ty) {
            return id;
        }
        self.push(kind, ty, Arc::from(vec![(name, ty)]))
    }

    /// Reference by string name.
    pub fn reference_named(&mut self, name: &str, ty: TypeId) -> NodeId {
        let name = self.name(name);
        self.reference(name, ty)
    }

    /// `(param -> body)`, or `( -> body)` without a parameter.
    ///
    /// Every free use of the parameter name in `body` must have a type
    /// equivalent to the parameter's.
    pub fn lambda(&mut self, param: Option<Param>, body: NodeId) -> Result<NodeId, TypeError> {
        let body_ty = self.ty(body);
        let ty = self.types.function(param.map(|p| p.ty), body_ty);
        let kind = NodeKind::Lambda { param, body };
        if let Some(id) = self.existing(&kind, ty) {
            return Ok(id);
        }
        let free = match param {
            Some(p) => Arc::from(self.unbind(self.free_names(body), p.name, p.ty, "lambda")?),
            None => self.free_arc(body),
        };
        Ok(self.push(kind, ty, free))
    }

    /// Lambda with a parameter given by string name.
    pub fn lambda_named(
        &mut self,
        param: &str,
        param_ty: TypeId,
        body: NodeId,
    ) -> Result<NodeId, TypeError> {
        let name = self.name(param);
        self.lambda(Some(Param { name, ty: param_ty }), body)
    }

    /// `function(arg)`.
    pub fn call(&mut self, function: NodeId, arg: Option<NodeId>) -> Result<NodeId, TypeError> {
        let fn_ty = self.ty(function);
        let Some((param, result)) = self.types.function_parts(fn_ty) else {
            return Err(TypeError::UnexpectedKind {
                context: format!("call of {}", self.render_short(function)),
                expected: "a function",
                found: self.types.format(fn_ty),
            });
        };
        match (param, arg) {
            (None, None) => {}
            (Some(_), None) => {
                return Err(TypeError::MissingArgument {
                    function: self.render_short(function),
                });
            }
            (None, Some(arg)) => {
                return Err(TypeError::UnexpectedArgument {
                    function: self.render_short(function),
                    found: self.types.format(self.ty(arg)),
                });
            }
            (Some(param), Some(arg)) => {
                self.types.check_assignable(
                    self.ty(arg),
                    param,
                    &format!("argument of {}", self.render_short(function)),
                )?;
            }
        }

        let kind = NodeKind::Call { function, arg };
        if let Some(id) = self.existing(&kind, result) {
            return Ok(id);
        }
        let free = match arg {
            Some(arg) => self.merge_free(&[self.free_names(function), self.free_names(arg)])?,
            None => self.free_arc(function),
        };
        Ok(self.push(kind, result, free))
    }

    /// `let name_1=value_1, ..., name_n=value_n in result`.
    pub fn block(
        &mut self,
        locals: Vec<(Name, NodeId)>,
        result: NodeId,
    ) -> Result<NodeId, TypeError> {
        let ty = self.ty(result);
        let locals = locals.into_boxed_slice();
        let kind = NodeKind::Block {
            locals: locals.clone(),
            result,
        };
        if let Some(id) = self.existing(&kind, ty) {
            return Ok(id);
        }

        // Later bindings shadow earlier ones, so unbind from the result back.
        let mut free: Vec<(Name, TypeId)> = self.free_names(result).to_vec();
        for &(name, value) in locals.iter().rev() {
            free = self.unbind(&free, name, self.ty(value), "block binding")?;
            free = self
                .merge_free(&[free.as_slice(), self.free_names(value)])?
                .to_vec();
        }
        Ok(self.push(kind, ty, Arc::from(free)))
    }

    /// `<name_1=e_1, ..., e_n>`.
    pub fn structure(&mut self, elements: Vec<(Option<Name>, NodeId)>) -> Result<NodeId, TypeError> {
        let fields = elements
            .iter()
            .map(|&(name, element)| Field {
                name,
                ty: self.ty(element),
            })
            .collect();
        let ty = self.types.structure_of(fields);
        let elements = elements.into_boxed_slice();
        let kind = NodeKind::Struct(elements.clone());
        if let Some(id) = self.existing(&kind, ty) {
            return Ok(id);
        }
        let sets: Vec<&[(Name, TypeId)]> =
            elements.iter().map(|&(_, e)| self.free_names(e)).collect();
        let free = self.merge_free(&sets)?;
        Ok(self.push(kind, ty, free))
    }

    /// Unnamed struct of `elements`.
    pub fn tuple(&mut self, elements: &[NodeId]) -> Result<NodeId, TypeError> {
        self.structure(elements.iter().map(|&e| (None, e)).collect())
    }

    /// `source[index]`.
    pub fn select(&mut self, source: NodeId, index: usize) -> Result<NodeId, TypeError> {
        let source_ty = self.ty(source);
        let Some(fields) = self.types.struct_fields(source_ty) else {
            return Err(TypeError::UnexpectedKind {
                context: format!("selection from {}", self.render_short(source)),
                expected: "a struct",
                found: self.types.format(source_ty),
            });
        };
        let Some(field) = fields.get(index) else {
            return Err(TypeError::IndexOutOfRange {
                index,
                len: fields.len(),
                source_type: self.types.format(source_ty),
            });
        };
        let ty = field.ty;
        let kind = NodeKind::Selection {
            source,
            index: u32::try_from(index).unwrap_or(u32::MAX),
        };
        let free = self.free_arc(source);
        Ok(self.push(kind, ty, free))
    }

    /// `source.name`, resolved to a positional selection.
    pub fn select_named(&mut self, source: NodeId, name: &str) -> Result<NodeId, TypeError> {
        let source_ty = self.ty(source);
        match self.types.field_index(source_ty, name) {
            Some(index) => self.select(source, index),
            None => Err(TypeError::UnknownField {
                name: name.to_owned(),
                source_type: self.types.format(source_ty),
            }),
        }
    }

    /// External or inline data of the declared type.
    pub fn data(&mut self, source: DataSource, ty: TypeId) -> NodeId {
        let id = self.intern_data(source);
        let free = Arc::clone(&self.no_free);
        self.push(NodeKind::Data(id), ty, free)
    }

    /// A leaf computation. Its type must be a function whose parameter and
    /// result carry no federated types.
    pub fn compiled(&mut self, program: LeafProgram, ty: TypeId) -> Result<NodeId, TypeError> {
        let Some((param, result)) = self.types.function_parts(ty) else {
            return Err(TypeError::UnexpectedKind {
                context: "compiled computation".to_owned(),
                expected: "a function type",
                found: self.types.format(ty),
            });
        };
        let placed = param
            .into_iter()
            .chain([result])
            .any(|t| self.types.flags(t).contains(TypeFlags::HAS_FEDERATED));
        if placed {
            return Err(TypeError::Incompatible {
                requirement: "a leaf computation type",
                found: self.types.format(ty),
                reason: "leaf computations operate on unplaced values".to_owned(),
            });
        }
        let id = self.intern_leaf(program);
        let free = Arc::clone(&self.no_free);
        Ok(self.push(NodeKind::Compiled(id), ty, free))
    }

    /// The intrinsic `name` at the declared type, checked against the registry.
    pub fn intrinsic(&mut self, name: &str, ty: TypeId) -> Result<NodeId, TypeError> {
        let registry = Arc::clone(&self.registry);
        let def = registry.lookup(name)?;
        def.check_type(&mut self.types, ty)?;
        let name = self.name(name);
        let free = Arc::clone(&self.no_free);
        Ok(self.push(NodeKind::Intrinsic(name), ty, free))
    }

    /// `name(arg)` with the intrinsic's type instantiated from `arg`.
    pub fn call_intrinsic(&mut self, name: &str, arg: NodeId) -> Result<NodeId, TypeError> {
        let registry = Arc::clone(&self.registry);
        let def = registry.lookup(name)?;
        let arg_ty = self.ty(arg);
        let fn_ty = def.function_type(&mut self.types, arg_ty)?;
        let name = self.name(name);
        let free = Arc::clone(&self.no_free);
        let function = self.push(NodeKind::Intrinsic(name), fn_ty, free);
        self.call(function, Some(arg))
    }

    // === Rebuilding ===

    /// Rebuild `id` with `children` in place of its current children,
    /// re-validating types. `children` follows [`Arena::children`] order.
    pub fn with_children(&mut self, id: NodeId, children: &[NodeId]) -> Result<NodeId, TypeError> {
        if self.children(id).as_slice() == children {
            return Ok(id);
        }
        let expected = self.children(id).len();
        if children.len() != expected {
            return Err(TypeError::Mismatch {
                context: format!("rebuild of {}", self.render_short(id)),
                expected: format!("{expected} children"),
                found: format!("{} children", children.len()),
            });
        }
        match self.kind(id).clone() {
            NodeKind::Reference(_)
            | NodeKind::Data(_)
            | NodeKind::Compiled(_)
            | NodeKind::Intrinsic(_) => Ok(id),
            NodeKind::Lambda { param, .. } => self.lambda(param, children[0]),
            NodeKind::Call { arg, .. } => {
                self.call(children[0], arg.map(|_| children[1]))
            }
            NodeKind::Block { locals, .. } => {
                let n = locals.len();
                let locals = locals
                    .iter()
                    .zip(&children[..n])
                    .map(|(&(name, _), &value)| (name, value))
                    .collect();
                self.block(locals, children[n])
            }
            NodeKind::Struct(elements) => {
                let elements = elements
                    .iter()
                    .zip(children)
                    .map(|(&(name, _), &e)| (name, e))
                    .collect();
                self.structure(elements)
            }
            NodeKind::Selection { index, .. } => self.select(children[0], index as usize),
        }
    }

    /// Rebuild `id` with each child replaced by `f(child)`.
    ///
    /// Returns `id` itself when no child changed.
    pub fn map_children<E>(
        &mut self,
        id: NodeId,
        mut f: impl FnMut(&mut Arena, NodeId) -> Result<NodeId, E>,
    ) -> Result<NodeId, E>
    where
        E: From<TypeError>,
    {
        let old = self.children(id);
        let mut new = Children::with_capacity(old.len());
        for &child in &old {
            new.push(f(self, child)?);
        }
        if new == old {
            return Ok(id);
        }
        Ok(self.with_children(id, &new)?)
    }
}
