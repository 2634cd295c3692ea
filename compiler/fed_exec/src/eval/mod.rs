//! Reference evaluator of building-block trees.
//!
//! Evaluates a tree directly: references look up a persistent environment,
//! intrinsics are realized natively from their registry signatures, and
//! compiled leaves go to a [`LeafExecutor`]. All-equal CLIENTS values stay
//! single-membered until an aggregation needs one member per client, so the
//! evaluator needs the invocation's [`Cardinalities`].

mod env;
pub(crate) mod errors;
mod intrinsics;


pub use env::Env;

use fed_ir::{ensure_sufficient_stack, Arena, DataSource, NodeId, NodeKind};
use fed_types::TypeId;
use rustc_hash::FxHashMap;

use crate::value::{conform, FunctionValue};
use crate::{BackendError, Cardinalities, LeafExecutor, Value};

pub struct Evaluator<'a> {
    arena: &'a Arena,
    leaves: &'a dyn LeafExecutor,
    data: &'a FxHashMap<String, Value>,
    cardinalities: Cardinalities,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        arena: &'a Arena,
        leaves: &'a dyn LeafExecutor,
        data: &'a FxHashMap<String, Value>,
        cardinalities: Cardinalities,
    ) -> Self {
        Self {
            arena,
            leaves,
            data,
            cardinalities,
        }
    }

    /// Evaluate `root`, applying it to `arg` when it is a function.
    #[tracing::instrument(level = "trace", skip_all, fields(clients = self.cardinalities.clients))]
    pub fn run(&self, root: NodeId, arg: Option<Value>) -> Result<Value, BackendError> {
        let value = self.eval(root, &Env::default())?;
        if self
            .arena
            .types()
            .function_parts(self.arena.ty(root))
            .is_none()
        {
            return match arg {
                None => Ok(value),
                Some(_) => Err(errors::unexpected_argument()),
            };
        }
        match value {
            Value::Function(f) => self.apply(&f, arg),
            other => Err(errors::not_callable(&other)),
        }
    }

    pub fn eval(&self, id: NodeId, env: &Env) -> Result<Value, BackendError> {
        ensure_sufficient_stack(|| self.eval_node(id, env))
    }

    fn eval_node(&self, id: NodeId, env: &Env) -> Result<Value, BackendError> {
        let arena = self.arena;
        match arena.kind(id) {
            NodeKind::Reference(name) => env
                .lookup(*name)
                .cloned()
                .ok_or_else(|| errors::unbound_reference(arena.name_str(*name))),
            NodeKind::Lambda { .. } => Ok(Value::Function(FunctionValue::Closure {
                lambda: id,
                env: env.clone(),
            })),
            NodeKind::Call { function, arg } => {
                let function = self.eval(*function, env)?;
                let arg = arg.map(|arg| self.eval(arg, env)).transpose()?;
                self.call(&function, arg)
            }
            NodeKind::Block { locals, result } => {
                let mut scope = env.clone();
                for &(name, value) in locals.iter() {
                    let value = self.eval(value, &scope)?;
                    scope = scope.bind(name, value);
                }
                self.eval(*result, &scope)
            }
            NodeKind::Struct(elements) => {
                let mut fields = Vec::with_capacity(elements.len());
                for &(name, element) in elements.iter() {
                    let name = name.map(|n| arena.name_str(n).to_owned());
                    fields.push((name, self.eval(element, env)?));
                }
                Ok(Value::Struct(fields))
            }
            NodeKind::Selection { source, index } => {
                let source = self.eval(*source, env)?;
                select(source, *index as usize)
            }
            NodeKind::Data(data) => self.load(arena.data_source(*data), arena.ty(id)),
            NodeKind::Compiled(leaf) => Ok(Value::Function(FunctionValue::Leaf {
                leaf: *leaf,
                ty: arena.ty(id),
            })),
            NodeKind::Intrinsic(name) => Ok(Value::Function(FunctionValue::Intrinsic {
                name: arena.name_str(*name).to_owned(),
                ty: arena.ty(id),
            })),
        }
    }

    pub(crate) fn call(&self, function: &Value, arg: Option<Value>) -> Result<Value, BackendError> {
        match function {
            Value::Function(f) => self.apply(f, arg),
            other => Err(errors::not_callable(other)),
        }
    }

    pub fn apply(&self, function: &FunctionValue, arg: Option<Value>) -> Result<Value, BackendError> {
        match function {
            FunctionValue::Closure { lambda, env } => {
                let NodeKind::Lambda { param, body } = self.arena.kind(*lambda) else {
                    return Err(errors::not_callable(&Value::Function(function.clone())));
                };
                match (param, arg) {
                    (Some(param), Some(arg)) => self.eval(*body, &env.bind(param.name, arg)),
                    (None, None) => self.eval(*body, env),
                    (Some(_), None) => Err(errors::missing_argument()),
                    (None, Some(_)) => Err(errors::unexpected_argument()),
                }
            }
            FunctionValue::Leaf { leaf, ty } => {
                let result = self.leaves.execute(self.arena.leaf(*leaf), arg)?;
                let result_ty = self.result_type(*ty);
                conform(self.arena.types(), result_ty, result)
                    .map_err(|e| errors::ill_typed("leaf result", &e))
            }
            FunctionValue::Intrinsic { name, ty } => self.apply_intrinsic(name, *ty, arg),
        }
    }

    fn result_type(&self, fn_ty: TypeId) -> TypeId {
        self.arena
            .types()
            .function_parts(fn_ty)
            .map_or(fn_ty, |(_, result)| result)
    }

    fn load(&self, source: &DataSource, ty: TypeId) -> Result<Value, BackendError> {
        let value = match source {
            DataSource::Uri(uri) => self
                .data
                .get(uri)
                .cloned()
                .ok_or_else(|| errors::unknown_data(uri))?,
            DataSource::Inline(bytes) => {
                bincode::deserialize(bytes).map_err(|e| errors::malformed_inline_data(&e))?
            }
        };
        conform(self.arena.types(), ty, value).map_err(|e| errors::ill_typed("data", &e))
    }
}

fn select(source: Value, index: usize) -> Result<Value, BackendError> {
    match source {
        Value::Struct(mut fields) => {
            let len = fields.len();
            if index >= len {
                return Err(errors::index_out_of_bounds(index, len));
            }
            Ok(fields.swap_remove(index).1)
        }
        other => Err(errors::not_a_struct(&other)),
    }
}
