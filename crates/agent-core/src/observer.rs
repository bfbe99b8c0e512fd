//! Observer Hooks
//!
//! Explicit callbacks injected by the host application. Every hook
//! defaults to a no-op, so logging and UI behavior live with the caller.

use std::sync::Arc;

use crate::agent_loop::ActionExecution;

type StepFn = dyn Fn(usize, &str) + Send + Sync;
type OutputFn = dyn Fn(&str) + Send + Sync;
type ExecutionFn = dyn Fn(&ActionExecution) + Send + Sync;
type InvalidOutputFn = dyn Fn(u32, &str, &str) + Send + Sync;
type ActionRetryFn = dyn Fn(&str, u32, &str) + Send + Sync;
type ActionExhaustedFn = dyn Fn(&str, &str) + Send + Sync;

/// Callback set shared by [`crate::Agent`] and [`crate::AgentLoop`]
#[derive(Clone, Default)]
pub struct Observers {
    on_step: Option<Arc<StepFn>>,
    on_output: Option<Arc<OutputFn>>,
    on_action_executed: Option<Arc<ExecutionFn>>,
    on_invalid_output: Option<Arc<InvalidOutputFn>>,
    on_action_retry: Option<Arc<ActionRetryFn>>,
    on_action_exhausted: Option<Arc<ActionExhaustedFn>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round completed: `(round, accepted response)`
    #[must_use]
    pub fn on_step(mut self, f: impl Fn(usize, &str) + Send + Sync + 'static) -> Self {
        self.on_step = Some(Arc::new(f));
        self
    }

    /// Output emitted for the user
    #[must_use]
    pub fn on_output(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_output = Some(Arc::new(f));
        self
    }

    /// Non-output action recorded by a run
    #[must_use]
    pub fn on_action_executed(mut self, f: impl Fn(&ActionExecution) + Send + Sync + 'static) -> Self {
        self.on_action_executed = Some(Arc::new(f));
        self
    }

    /// Model output rejected: `(attempt, error, raw output)`
    #[must_use]
    pub fn on_invalid_output(mut self, f: impl Fn(u32, &str, &str) + Send + Sync + 'static) -> Self {
        self.on_invalid_output = Some(Arc::new(f));
        self
    }

    /// Action attempt failed and will be retried: `(action, attempt, error)`
    #[must_use]
    pub fn on_action_retry(mut self, f: impl Fn(&str, u32, &str) + Send + Sync + 'static) -> Self {
        self.on_action_retry = Some(Arc::new(f));
        self
    }

    /// Action gave up: `(action, error)`
    #[must_use]
    pub fn on_action_exhausted(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_action_exhausted = Some(Arc::new(f));
        self
    }

    pub(crate) fn step(&self, round: usize, response: &str) {
        if let Some(f) = &self.on_step {
            f(round, response);
        }
    }

    pub(crate) fn output(&self, message: &str) {
        if let Some(f) = &self.on_output {
            f(message);
        }
    }

    pub(crate) fn action_executed(&self, execution: &ActionExecution) {
        if let Some(f) = &self.on_action_executed {
            f(execution);
        }
    }

    pub(crate) fn invalid_output(&self, attempt: u32, error: &str, raw: &str) {
        if let Some(f) = &self.on_invalid_output {
            f(attempt, error, raw);
        }
    }

    pub(crate) fn action_retry(&self, action: &str, attempt: u32, error: &str) {
        if let Some(f) = &self.on_action_retry {
            f(action, attempt, error);
        }
    }

    pub(crate) fn action_exhausted(&self, action: &str, error: &str) {
        if let Some(f) = &self.on_action_exhausted {
            f(action, error);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("on_step", &self.on_step.is_some())
            .field("on_output", &self.on_output.is_some())
            .field("on_action_executed", &self.on_action_executed.is_some())
            .field("on_invalid_output", &self.on_invalid_output.is_some())
            .field("on_action_retry", &self.on_action_retry.is_some())
            .field("on_action_exhausted", &self.on_action_exhausted.is_some())
            .finish()
    }
}
