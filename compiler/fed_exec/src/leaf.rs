//! The leaf execution boundary.

use fed_ir::{FusedProgram, GlueExpr, LeafProgram};

use crate::{BackendError, Value};

/// Runs compiled leaf programs.
///
/// Only [`execute_opaque`](LeafExecutor::execute_opaque) is required: the
/// provided [`execute`](LeafExecutor::execute) runs fused programs stage by
/// stage through it.
pub trait LeafExecutor: Send + Sync {
    /// Run one opaque program on its argument.
    fn execute_opaque(
        &self,
        format: &str,
        bytes: &[u8],
        arg: Option<Value>,
    ) -> Result<Value, BackendError>;

    fn execute(&self, program: &LeafProgram, arg: Option<Value>) -> Result<Value, BackendError> {
        match program {
            LeafProgram::Opaque { format, bytes } => self.execute_opaque(format, bytes, arg),
            LeafProgram::Fused(fused) => execute_fused(self, fused, arg.as_ref()),
        }
    }
}

/// Refuses every program. For computations without compiled leaves.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoLeaves;

impl LeafExecutor for NoLeaves {
    fn execute_opaque(
        &self,
        format: &str,
        _bytes: &[u8],
        _arg: Option<Value>,
    ) -> Result<Value, BackendError> {
        Err(BackendError::permanent(format!(
            "no executor for `{format}` leaf programs"
        )))
    }
}

fn execute_fused<E: LeafExecutor + ?Sized>(
    executor: &E,
    fused: &FusedProgram,
    param: Option<&Value>,
) -> Result<Value, BackendError> {
    let mut stages: Vec<Value> = Vec::with_capacity(fused.stages.len());
    for stage in &fused.stages {
        let input = match &stage.input {
            Some(glue) => Some(evaluate_glue(glue, param, &stages)?),
            None => None,
        };
        stages.push(executor.execute(&stage.program, input)?);
    }
    evaluate_glue(&fused.output, param, &stages)
}

fn evaluate_glue(
    glue: &GlueExpr,
    param: Option<&Value>,
    stages: &[Value],
) -> Result<Value, BackendError> {
    let malformed = |what: String| BackendError::permanent(format!("malformed fused program: {what}"));
    match glue {
        GlueExpr::Param => param
            .cloned()
            .ok_or_else(|| malformed("parameter read without an argument".to_owned())),
        GlueExpr::Stage(k) => stages
            .get(*k as usize)
            .cloned()
            .ok_or_else(|| malformed(format!("stage {k} read before it runs"))),
        GlueExpr::Struct(elements) => {
            let mut out = Vec::with_capacity(elements.len());
            for (name, element) in elements {
                out.push((name.clone(), evaluate_glue(element, param, stages)?));
            }
            Ok(Value::Struct(out))
        }
        GlueExpr::Select(source, index) => {
            let source = evaluate_glue(source, param, stages)?;
            source
                .fields()
                .and_then(|fields| fields.get(*index as usize))
                .map(|(_, v)| v.clone())
                .ok_or_else(|| malformed(format!("selection of element {index} from {source}")))
        }
    }
}
