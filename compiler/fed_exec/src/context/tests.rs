#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use fed_ir::names;
use fed_types::DType;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::backend::{Completer, PendingResult};
use crate::{BackendError, LocalBackend};

fn sum_over_clients() -> Computation {
    let mut arena = Arena::with_standard_registry();
    let int = arena.types_mut().scalar(DType::Int32);
    let ct = arena.types_mut().at_clients(int, false).unwrap();
    let x = arena.reference_named("x", ct);
    let body = arena.call_intrinsic(names::FEDERATED_SUM, x).unwrap();
    let root = arena.lambda_named("x", ct, body).unwrap();
    Computation::new(arena, root)
}

fn clients(values: &[i32]) -> Value {
    Value::at_clients(values.iter().copied().map(Value::int32).collect())
}

fn context(backend: Arc<dyn Backend>, config: ContextConfig) -> ExecutionContext {
    ExecutionContext::new(Arc::new(IntrinsicRegistry::standard()), backend, config)
}

/// Fails every call with `error`, counting attempts.
struct Failing {
    error: BackendError,
    attempts: AtomicU32,
}

impl Failing {
    fn new(error: BackendError) -> Arc<Self> {
        Arc::new(Self {
            error,
            attempts: AtomicU32::new(0),
        })
    }
}

impl Backend for Failing {
    fn invoke(&self, _invocation: Invocation) -> PendingResult {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        PendingResult::ready(Err(self.error.clone()))
    }
}

/// Holds every call open until the test drops it.
#[derive(Default)]
struct Stalled {
    open: Mutex<Vec<Completer>>,
}

impl Backend for Stalled {
    fn invoke(&self, _invocation: Invocation) -> PendingResult {
        let (completer, pending) = PendingResult::channel();
        self.open.lock().push(completer);
        pending
    }
}

#[test]
fn single_dispatch() {
    let ctx = context(Arc::new(LocalBackend::without_leaves()), ContextConfig::default());
    let result = ctx.invoke(&sum_over_clients(), Some(clients(&[1, 2, 3]))).unwrap();
    assert_eq!(result, Value::at_server(Value::int32(6)));
}

#[test]
fn mergeable_dispatch_matches_single() {
    let config = ContextConfig::default().with_dispatch(DispatchMode::Mergeable { partitions: 3 });
    let ctx = context(Arc::new(LocalBackend::without_leaves()), config);
    let computation = sum_over_clients();
    for n in [0, 1, 2, 7] {
        let values: Vec<i32> = (1..=n).collect();
        let result = ctx.invoke(&computation, Some(clients(&values))).unwrap();
        assert_eq!(result, Value::at_server(Value::int32(values.iter().sum())), "n = {n}");
    }
    assert_eq!(ctx.splitter().cache_len(), 1);
}

#[test]
fn arguments_are_checked() {
    let ctx = context(Arc::new(LocalBackend::without_leaves()), ContextConfig::default());
    let computation = sum_over_clients();

    let err = ctx
        .invoke(&computation, Some(Value::at_server(Value::int32(1))))
        .unwrap_err();
    assert!(matches!(err, ExecError::InvalidArgument(_)), "{err}");

    let err = ctx.invoke(&computation, None).unwrap_err();
    assert!(matches!(err, ExecError::InvalidArgument(_)), "{err}");
}

#[test]
fn permanent_failures_are_not_retried() {
    let backend = Failing::new(BackendError::permanent("bad program"));
    let ctx = context(backend.clone(), ContextConfig::default());
    let err = ctx.invoke(&sum_over_clients(), Some(clients(&[1]))).unwrap_err();
    assert!(
        matches!(err, ExecError::Backend { phase: Phase::Single, shard: 0, .. }),
        "{err}"
    );
    assert!(!err.is_retryable());
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn transient_failures_retry_up_to_the_bound() {
    let backend = Failing::new(BackendError::transient("unavailable"));
    let config = ContextConfig::default().with_retry(RetryPolicy::immediate(2));
    let ctx = context(backend.clone(), config);
    let err = ctx.invoke(&sum_over_clients(), Some(clients(&[1]))).unwrap_err();
    assert!(
        matches!(err, ExecError::RetriesExhausted { attempts: 3, .. }),
        "{err}"
    );
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn stalled_calls_time_out_as_transient() {
    let backend = Arc::new(Stalled::default());
    let config = ContextConfig::default()
        .with_retry(RetryPolicy::immediate(1))
        .with_invoke_timeout(Duration::from_millis(10));
    let ctx = context(backend.clone(), config);
    let err = ctx.invoke(&sum_over_clients(), Some(clients(&[1]))).unwrap_err();
    assert!(
        matches!(err, ExecError::RetriesExhausted { attempts: 2, .. }),
        "{err}"
    );
    assert_eq!(backend.open.lock().len(), 2);
}

#[test]
fn async_invocation_reaches_done() {
    let ctx = Arc::new(context(
        Arc::new(LocalBackend::without_leaves()),
        ContextConfig::default(),
    ));
    let handle = ctx.invoke_async(sum_over_clients(), Some(clients(&[2, 2])));
    let control = handle.control().clone();
    assert_eq!(handle.wait().unwrap(), Value::at_server(Value::int32(4)));
    assert_eq!(control.state(), InvocationState::Done);
    assert_eq!(control.cancel(), CancelOutcome::AlreadyFinished);
}

#[test]
fn callbacks_receive_the_result() {
    let ctx = Arc::new(context(
        Arc::new(LocalBackend::without_leaves()),
        ContextConfig::default(),
    ));
    let (tx, rx) = crossbeam::channel::bounded(1);
    ctx.invoke_with_callback(sum_over_clients(), Some(clients(&[3])), move |result| {
        tx.send(result).unwrap();
    });
    let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(result.unwrap(), Value::at_server(Value::int32(3)));
}

#[test]
fn cancelling_in_flight_is_best_effort() {
    let backend = Arc::new(Stalled::default());
    let ctx = Arc::new(context(backend.clone(), ContextConfig::default()));
    let mut handle = ctx.invoke_async(sum_over_clients(), Some(clients(&[1])));

    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.state() != InvocationState::AwaitingResults {
        assert!(Instant::now() < deadline, "invocation never dispatched");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(handle.poll().is_none());
    assert_eq!(handle.cancel(), CancelOutcome::BestEffort);

    let err = handle.wait().unwrap_err();
    assert!(
        matches!(err, ExecError::Cancelled { state: InvocationState::AwaitingResults }),
        "{err}"
    );
}

#[test]
fn cancelling_before_dispatch_is_clean() {
    let progress = Progress::default();
    progress.enter(InvocationState::Compiling).unwrap();
    assert_eq!(progress.cancel(), CancelOutcome::Clean);
    let err = progress.enter(InvocationState::ResolvingCardinalities).unwrap_err();
    assert!(
        matches!(err, ExecError::Cancelled { state: InvocationState::Compiling }),
        "{err}"
    );
    assert_eq!(progress.state(), InvocationState::Failed);
    assert_eq!(progress.cancel(), CancelOutcome::AlreadyFinished);
}

#[test]
fn cancelling_after_dispatch_is_best_effort() {
    let progress = Progress::default();
    progress.enter(InvocationState::Dispatching).unwrap();
    assert_eq!(progress.cancel(), CancelOutcome::BestEffort);
    assert!(progress.token().is_cancelled());
}

#[test]
fn backoff_grows_and_caps() {
    let policy = RetryPolicy {
        max_retries: 5,
        initial_backoff: Duration::from_millis(300),
        multiplier: 2.0,
        max_backoff: Duration::from_secs(1),
    };
    assert_eq!(policy.next_backoff(Duration::from_millis(300)), Duration::from_millis(600));
    assert_eq!(policy.next_backoff(Duration::from_millis(600)), Duration::from_secs(1));
    assert_eq!(RetryPolicy::immediate(3).next_backoff(Duration::ZERO), Duration::ZERO);
}

#[test]
fn states_display_in_words() {
    assert_eq!(InvocationState::AwaitingResults.to_string(), "awaiting results");
    assert!(InvocationState::Compiling < InvocationState::Dispatching);
    assert!(InvocationState::Failed.is_finished());
}
