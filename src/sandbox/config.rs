//! Resource limits for sandboxed execution.

use std::time::Duration;

/// Limits applied to every [`crate::sandbox::Sandbox`].
///
/// Wall-clock budgets bound the caller; the interpreter limits bound the worker
/// thread itself so that a prelude stuck in a loop eventually stops even after the
/// caller has given up on it.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use jsdeob::sandbox::SandboxConfig;
///
/// let config = SandboxConfig {
///     timeout: Duration::from_millis(250),
///     ..Default::default()
/// };
/// assert_eq!(config.recursion_limit, 400);
/// ```
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget for evaluating the prelude (default: 1s).
    pub timeout: Duration,

    /// Wall-clock budget for a single decoder call (default: 500ms).
    pub call_timeout: Duration,

    /// Maximum iterations of any single loop (default: 5,000,000).
    pub loop_iteration_limit: u64,

    /// Maximum JavaScript call depth (default: 400).
    pub recursion_limit: usize,

    /// Maximum interpreter stack size in values (default: 10,240).
    pub stack_size_limit: usize,

    /// Native stack size of the worker thread in bytes (default: 16 MiB).
    pub thread_stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            call_timeout: Duration::from_millis(500),
            loop_iteration_limit: 5_000_000,
            recursion_limit: 400,
            stack_size_limit: 10 * 1024,
            thread_stack_size: 16 * 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Creates a configuration with the given prelude budget and default limits.
    ///
    /// The per-call budget is capped at the prelude budget.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Wall-clock budget for evaluating the prelude.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let defaults = Self::default();
        Self {
            timeout,
            call_timeout: defaults.call_timeout.min(timeout),
            ..defaults
        }
    }
}
