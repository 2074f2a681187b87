//! The sandbox worker and its request channel.
//!
//! All evaluation runs through boa's budgeted async interpreter loop, polled by hand
//! on the worker thread. Between slices of [`EVALUATION_BUDGET`] the worker checks a
//! shared cancel flag, so a caller that gives up on a request also stops the
//! interpreter and the thread exits shortly after.

use std::{
    future::Future,
    pin::pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc,
    },
    task::{Context as TaskContext, Poll, Wake, Waker},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use boa_engine::{vm::RuntimeLimits, Context, JsResult, JsValue, Script, Source};
use log::{debug, warn};

use crate::{
    analysis::StaticValue,
    sandbox::{
        globals,
        value::{to_source, CallOutcome, SandboxValue},
        SandboxConfig,
    },
    Error, Result,
};

/// Interpreter cost units run between two checks of the cancel flag.
const EVALUATION_BUDGET: u32 = 4_096;

/// How long a cancelled worker gets to notice the flag before it is detached.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

enum Request {
    Inspect(String),
    Call(String, Vec<StaticValue>),
}

enum Reply {
    Ready,
    Failed(String),
    Value(SandboxValue),
    Outcome(CallOutcome),
}

/// An isolated interpreter running one prelude.
///
/// The interpreter lives on its own thread. When a request exceeds its wall-clock
/// budget the worker is cancelled and joined, the sandbox is poisoned, and every
/// further request fails. Dropping the sandbox cancels the worker as well.
///
/// # Examples
///
/// ```rust,no_run
/// use jsdeob::{analysis::StaticValue, sandbox::{Sandbox, SandboxConfig}};
///
/// let mut sandbox = Sandbox::launch(
///     "var t = ['x', 'y']; function d(i) { return t[i]; }",
///     &SandboxConfig::default(),
/// )?;
/// assert!(sandbox.inspect("d")?.is_function());
/// let outcome = sandbox.call("d", &[StaticValue::Number(1.0)])?;
/// assert_eq!(outcome.as_str(), Some("y"));
/// # Ok::<(), jsdeob::Error>(())
/// ```
pub struct Sandbox {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    config: SandboxConfig,
    poisoned: bool,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Sandbox {
    /// Starts a worker, evaluates `source` in it and waits for completion.
    ///
    /// # Arguments
    ///
    /// * `source` - The script to evaluate (usually a prelude).
    /// * `config` - Limits for the worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SandboxTimeout`] if evaluation exceeds `config.timeout`, and
    /// [`Error::Sandbox`] if the script throws or the worker cannot be started.
    pub fn launch(source: &str, config: &SandboxConfig) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        let cancel = Arc::new(AtomicBool::new(false));
        let source_len = source.len();
        let source = source.to_string();
        let limits = config.clone();
        let flag = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("jsdeob-sandbox".to_string())
            .stack_size(config.thread_stack_size)
            .spawn(move || worker(&source, &limits, &flag, &request_rx, &reply_tx))
            .map_err(|e| Error::Sandbox(format!("cannot spawn worker: {e}")))?;

        let mut sandbox = Self {
            requests: request_tx,
            replies: reply_rx,
            config: config.clone(),
            poisoned: false,
            cancel,
            worker: Some(handle),
        };
        match sandbox.wait(config.timeout)? {
            Reply::Ready => {
                debug!("sandbox ready ({source_len} bytes of source)");
                Ok(sandbox)
            }
            Reply::Failed(message) => Err(Error::Sandbox(message)),
            _ => Err(Error::Sandbox("unexpected reply from worker".to_string())),
        }
    }

    /// Reports the runtime type of a binding.
    ///
    /// Global properties and top-level `let`/`const`/`class` bindings are both
    /// visible. A missing binding reports [`SandboxValue::Undefined`].
    ///
    /// # Arguments
    ///
    /// * `name` - An identifier.
    ///
    /// # Errors
    ///
    /// Fails if the name is not an identifier, the sandbox is poisoned, or the
    /// worker does not answer in time.
    pub fn inspect(&mut self, name: &str) -> Result<SandboxValue> {
        check_identifier(name)?;
        self.send(Request::Inspect(name.to_string()))?;
        match self.wait(self.config.call_timeout)? {
            Reply::Value(value) => Ok(value),
            Reply::Failed(message) => Err(Error::Sandbox(message)),
            _ => Err(Error::Sandbox("unexpected reply from worker".to_string())),
        }
    }

    /// Calls the function currently bound to `name`.
    ///
    /// The binding is resolved again on every call, so decoders that replace
    /// themselves on first use are followed.
    ///
    /// # Arguments
    ///
    /// * `name` - An identifier bound to a function.
    /// * `args` - Arguments, passed as number and string literals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SandboxTimeout`] if the call exceeds
    /// [`SandboxConfig::call_timeout`]. A JavaScript exception is not an error; it is
    /// reported as [`CallOutcome::Threw`].
    pub fn call(&mut self, name: &str, args: &[StaticValue]) -> Result<CallOutcome> {
        check_identifier(name)?;
        self.send(Request::Call(name.to_string(), args.to_vec()))?;
        match self.wait(self.config.call_timeout)? {
            Reply::Outcome(outcome) => Ok(outcome),
            Reply::Failed(message) => Err(Error::Sandbox(message)),
            _ => Err(Error::Sandbox("unexpected reply from worker".to_string())),
        }
    }

    /// Returns `true` once a request timed out.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns `true` while the worker thread is alive.
    #[must_use]
    pub fn is_worker_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn send(&self, request: Request) -> Result<()> {
        if self.poisoned {
            return Err(Error::Sandbox("sandbox is poisoned by an earlier timeout".to_string()));
        }
        self.requests
            .send(request)
            .map_err(|_| Error::Sandbox("worker exited".to_string()))
    }

    fn wait(&mut self, timeout: Duration) -> Result<Reply> {
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                warn!("sandbox request exceeded {timeout:?}; cancelling worker");
                self.poisoned = true;
                self.stop();
                Err(Error::SandboxTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.poisoned = true;
                Err(Error::Sandbox("worker exited".to_string()))
            }
        }
    }

    /// Cancels the worker and waits up to [`CANCEL_GRACE`] for its thread to end.
    fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        let deadline = Instant::now() + CANCEL_GRACE;
        // The worker drops its reply sender on exit.
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(left) {
                Ok(_) => {}
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("sandbox worker ignored cancellation; detaching it");
                    return;
                }
            }
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("sandbox worker panicked");
            }
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c == '$' || c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '$' || c == '_' || c.is_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(Error::Sandbox(format!("'{name}' is not an identifier")))
    }
}

struct IdleWaker;

impl Wake for IdleWaker {
    fn wake(self: Arc<Self>) {}
}

/// Runs `code` as a script. Returns `None` if the evaluation was cancelled.
fn evaluate(context: &mut Context, code: &str, cancel: &AtomicBool) -> Option<JsResult<JsValue>> {
    let script = match Script::parse(Source::from_bytes(code), None, context) {
        Ok(script) => script,
        Err(err) => return Some(Err(err)),
    };
    let waker = Waker::from(Arc::new(IdleWaker));
    let mut task = TaskContext::from_waker(&waker);
    let mut run = pin!(script.evaluate_async_with_budget(context, EVALUATION_BUDGET));
    loop {
        match run.as_mut().poll(&mut task) {
            Poll::Ready(result) => return Some(result),
            Poll::Pending if cancel.load(Ordering::Relaxed) => return None,
            Poll::Pending => {}
        }
    }
}

fn worker(
    source: &str,
    config: &SandboxConfig,
    cancel: &AtomicBool,
    requests: &Receiver<Request>,
    replies: &Sender<Reply>,
) {
    let mut context = Context::default();
    let mut limits = RuntimeLimits::default();
    limits.set_loop_iteration_limit(config.loop_iteration_limit);
    limits.set_recursion_limit(config.recursion_limit);
    limits.set_stack_size_limit(config.stack_size_limit);
    context.set_runtime_limits(limits);

    if let Err(message) = globals::install(&mut context) {
        let _ = replies.send(Reply::Failed(message));
        return;
    }
    let ready = match evaluate(&mut context, source, cancel) {
        Some(Ok(_)) => Reply::Ready,
        Some(Err(err)) => Reply::Failed(err.to_string()),
        None => return,
    };
    if replies.send(ready).is_err() {
        return;
    }

    // Ends when the owning `Sandbox` is dropped or cancels.
    while let Ok(request) = requests.recv() {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let reply = match request {
            Request::Inspect(name) => match evaluate(&mut context, &name, cancel) {
                Some(Ok(value)) => Reply::Value(SandboxValue::from_js(&value)),
                // ReferenceError for names that were never bound.
                Some(Err(_)) => Reply::Value(SandboxValue::Undefined),
                None => return,
            },
            Request::Call(name, args) => {
                let args: Vec<String> = args.iter().map(to_source).collect();
                let code = format!("{name}({})", args.join(", "));
                match evaluate(&mut context, &code, cancel) {
                    Some(Ok(value)) => {
                        Reply::Outcome(CallOutcome::Returned(SandboxValue::from_js(&value)))
                    }
                    Some(Err(err)) => Reply::Outcome(CallOutcome::Threw(err.to_string())),
                    None => return,
                }
            }
        };
        if replies.send(reply).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL: &str = "var pool = ['a', 'b', 'c', 'd', 'e', 'f'];\n\
                        function d(i) { return pool[i - 2]; }";

    #[test]
    fn test_launch_and_call() -> Result<()> {
        let mut sandbox = Sandbox::launch(POOL, &SandboxConfig::default())?;
        assert!(sandbox.inspect("d")?.is_function());
        assert_eq!(sandbox.inspect("pool")?, SandboxValue::Object);
        assert_eq!(sandbox.inspect("missing")?, SandboxValue::Undefined);

        let outcome = sandbox.call("d", &[StaticValue::Number(2.0)])?;
        assert_eq!(outcome.as_str(), Some("a"));
        let outcome = sandbox.call("d", &[StaticValue::Number(100.0)])?;
        assert_eq!(outcome, CallOutcome::Returned(SandboxValue::Undefined));
        Ok(())
    }

    #[test]
    fn test_lexical_bindings_are_visible() -> Result<()> {
        let mut sandbox = Sandbox::launch(
            "const f = (k) => 'v' + k; let n = 1;",
            &SandboxConfig::default(),
        )?;
        assert!(sandbox.inspect("f")?.is_function());
        assert_eq!(sandbox.inspect("n")?, SandboxValue::Number(1.0));
        let outcome = sandbox.call("f", &[StaticValue::Str("x".into())])?;
        assert_eq!(outcome.as_str(), Some("vx"));
        Ok(())
    }

    #[test]
    fn test_exceptions() {
        let result = Sandbox::launch("throw 'nope'", &SandboxConfig::default());
        assert!(matches!(result, Err(Error::Sandbox(message)) if message.contains("nope")));

        let mut sandbox =
            Sandbox::launch("function t() { throw 1; }", &SandboxConfig::default()).unwrap();
        assert!(matches!(sandbox.call("t", &[]).unwrap(), CallOutcome::Threw(_)));
        assert!(matches!(sandbox.call("undefinedName", &[]).unwrap(), CallOutcome::Threw(_)));
        assert!(!sandbox.is_poisoned());
    }

    #[test]
    fn test_runaway_prelude_times_out() {
        let config = SandboxConfig {
            timeout: Duration::from_millis(200),
            loop_iteration_limit: 50_000_000,
            ..Default::default()
        };
        let result = Sandbox::launch("while (true) {}", &config);
        assert!(matches!(result, Err(Error::SandboxTimeout(_))));
    }

    #[test]
    fn test_loop_limit_stops_worker() {
        let config = SandboxConfig {
            loop_iteration_limit: 1_000,
            ..Default::default()
        };
        let result = Sandbox::launch("for (;;) {}", &config);
        assert!(matches!(result, Err(Error::Sandbox(_))));
    }

    #[test]
    fn test_call_timeout_poisons() -> Result<()> {
        let config = SandboxConfig {
            call_timeout: Duration::from_millis(100),
            loop_iteration_limit: 50_000_000,
            ..Default::default()
        };
        let mut sandbox = Sandbox::launch("function spin() { while (true) {} }", &config)?;
        assert!(matches!(sandbox.call("spin", &[]), Err(Error::SandboxTimeout(_))));
        assert!(sandbox.is_poisoned());
        assert!(sandbox.inspect("spin").is_err());
        Ok(())
    }

    #[test]
    fn test_timed_out_call_stops_worker() -> Result<()> {
        let config = SandboxConfig {
            call_timeout: Duration::from_millis(100),
            loop_iteration_limit: u64::MAX,
            ..Default::default()
        };
        let mut sandbox = Sandbox::launch(
            "function spin() { for (;;) { for (var i = 0; i < 1e6; i++) {} } }",
            &config,
        )?;
        assert!(sandbox.is_worker_running());
        assert!(matches!(sandbox.call("spin", &[]), Err(Error::SandboxTimeout(_))));
        assert!(!sandbox.is_worker_running());
        assert!(sandbox.worker.is_none());
        Ok(())
    }

    #[test]
    fn test_timed_out_prelude_stops_worker() {
        let config = SandboxConfig {
            timeout: Duration::from_millis(100),
            loop_iteration_limit: u64::MAX,
            ..Default::default()
        };
        let started = Instant::now();
        let result = Sandbox::launch("for (;;) {}", &config);
        assert!(matches!(result, Err(Error::SandboxTimeout(_))));
        // `launch` only returns after the cancelled worker was joined.
        assert!(started.elapsed() < CANCEL_GRACE);
    }

    #[test]
    fn test_arguments_reach_the_callee() -> Result<()> {
        let mut sandbox = Sandbox::launch(
            "function echo(a, b) { return typeof a + ':' + a + '|' + b; }",
            &SandboxConfig::default(),
        )?;
        let outcome = sandbox.call(
            "echo",
            &[StaticValue::Number(-1.5), StaticValue::Str("it's\n".into())],
        )?;
        assert_eq!(outcome.as_str(), Some("number:-1.5|it's\n"));
        Ok(())
    }

    #[test]
    fn test_names_must_be_identifiers() -> Result<()> {
        let mut sandbox = Sandbox::launch("", &SandboxConfig::default())?;
        assert!(sandbox.inspect("a; b").is_err());
        assert!(sandbox.call("f()", &[]).is_err());
        assert!(sandbox.inspect("").is_err());
        assert!(sandbox.inspect("_0x1a$").is_ok());
        Ok(())
    }

    #[test]
    fn test_denied_globals_stay_unreachable() -> Result<()> {
        let mut sandbox = Sandbox::launch(
            "var leaked = (1, eval)('this').process; var req = typeof require;",
            &SandboxConfig::default(),
        )?;
        assert_eq!(sandbox.inspect("leaked")?, SandboxValue::Undefined);
        Ok(())
    }
}
