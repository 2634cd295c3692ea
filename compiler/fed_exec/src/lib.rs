//! Execution of federated computations.
//!
//! An [`ExecutionContext`] compiles a computation with the
//! [`fed_compiler`] pipeline, binds and checks its argument, infers how many
//! clients the invocation covers, and dispatches it to a [`Backend`]:
//!
//! - [`DispatchMode::Single`] sends the whole computation in one call
//! - [`DispatchMode::Mergeable`] splits it with [`fed_split`], runs the
//!   client piece per partition of the clients, folds the partials with the
//!   merge piece and finishes with the server piece
//!
//! Transient backend failures are retried per call with exponential
//! backoff. Invocations can run synchronously, behind an
//! [`InvocationHandle`], or with a completion callback, and can be
//! cancelled while in flight.
//!
//! [`LocalBackend`] is an in-process reference backend built on the
//! [`Evaluator`]; compiled leaves are delegated to a [`LeafExecutor`].

mod backend;
mod cardinality;
mod context;
mod error;
mod eval;
mod leaf;
mod logging;
mod value;

pub use backend::{Backend, CancelToken, Completer, Invocation, LocalBackend, PendingResult};
pub use cardinality::{infer_cardinalities, Cardinalities};
pub use context::{
    CancelOutcome, Computation, ContextConfig, DispatchMode, ExecutionContext, InvocationControl,
    InvocationHandle, InvocationState, RetryPolicy,
};
pub use error::{BackendError, BackendErrorKind, ExecError, Phase};
pub use eval::{Env, Evaluator};
pub use leaf::{LeafExecutor, NoLeaves};
pub use logging::init_tracing;
pub use value::{conform, ConformError, FederatedValue, FunctionValue, Tensor, TensorData, Value};
