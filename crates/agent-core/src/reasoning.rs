//! Orchestration Loop
//!
//! Drives the multi-round exchange between the user, the model and the
//! registered actions. Each round asks the model for a reply, validates it
//! (retrying with backoff), dispatches any embedded action calls in order
//! and feeds their results back, until the model answers without actions
//! or invokes the terminal action.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::action::{Action, ActionCall, ActionRegistry, ActionResult};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::observer::Observers;
use crate::parser::{format_action_results, looks_like_action_attempt, parse_action_calls};
use crate::provider::LlmProvider;
use crate::retry::with_retry;

/// One action dispatched during the current `chat` call
#[derive(Clone, Debug)]
pub struct DispatchedAction {
    pub call: ActionCall,
    pub result: ActionResult,
    pub timestamp: DateTime<Utc>,
}

/// Rejected model reply
#[derive(Debug)]
struct InvalidResponse {
    reason: String,
    raw: String,
}

impl std::fmt::Display for InvalidResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Accept a reply unless it is blank or an action attempt with no
/// parseable call. Returns the reply with its parsed calls.
fn validate_response(raw: String) -> std::result::Result<(String, Vec<ActionCall>), InvalidResponse> {
    if raw.trim().is_empty() {
        return Err(InvalidResponse {
            reason: "Model returned an empty response".into(),
            raw,
        });
    }

    let calls = parse_action_calls(&raw);
    if calls.is_empty() && looks_like_action_attempt(&raw) {
        return Err(InvalidResponse {
            reason: "Response looks like an action call but contains no valid action JSON".into(),
            raw,
        });
    }

    Ok((raw, calls))
}

/// The orchestration loop.
///
/// Owns its transcript; one `chat` call runs strictly sequentially.
/// Independent agents share nothing mutable and may run in parallel.
pub struct Agent {
    id: Uuid,
    provider: Arc<dyn LlmProvider>,
    actions: Arc<ActionRegistry>,
    config: AgentConfig,
    observers: Observers,
    history: Conversation,
    dispatched: Vec<DispatchedAction>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("actions", &self.actions)
            .field("config", &self.config)
            .field("messages", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, actions: ActionRegistry, config: AgentConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            actions: Arc::new(actions),
            config,
            observers: Observers::default(),
            history: Conversation::new(),
            dispatched: Vec::new(),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, actions: ActionRegistry) -> Self {
        Self::new(provider, actions, AgentConfig::default())
    }

    /// Attach observer callbacks
    #[must_use]
    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    /// Conversation identifier used in logs
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Transcript so far
    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    /// Actions dispatched by the most recent `chat` call, in order
    pub fn dispatched(&self) -> &[DispatchedAction] {
        &self.dispatched
    }

    /// Get the action registry
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub(crate) const fn observers(&self) -> &Observers {
        &self.observers
    }

    pub(crate) fn set_observers(&mut self, observers: Observers) {
        self.observers = observers;
    }

    /// Clear the transcript and dispatch log
    pub fn reset(&mut self) {
        self.history.clear();
        self.dispatched.clear();
    }

    /// Effective system prompt: prefix followed by the action manifest
    pub fn system_prompt(&self) -> String {
        let prefix = self.config.system_prompt_prefix.trim_end();
        let manifest = self.actions.render_manifest();

        match (prefix.is_empty(), manifest.is_empty()) {
            (true, _) => manifest,
            (false, true) => prefix.to_owned(),
            (false, false) => format!("{prefix}\n\n{manifest}"),
        }
    }

    /// Send a user message and drive rounds until a final response
    pub async fn chat(&mut self, user_message: &str) -> Result<String> {
        let span = tracing::info_span!("chat", conversation_id = %self.id);
        self.run_rounds(user_message).instrument(span).await
    }

    async fn run_rounds(&mut self, user_message: &str) -> Result<String> {
        self.dispatched.clear();
        self.history.push(Message::user(user_message));

        for round in 1..=self.config.max_iterations {
            let system_prompt = self.system_prompt();
            let (response, calls) = self.request_response(&system_prompt).await?;
            self.history.push(Message::assistant(&response));

            if calls.is_empty() {
                tracing::info!(round, "Final response");
                self.observers.step(round, &response);
                return Ok(response);
            }

            let terminal = calls.iter().any(|c| c.action == self.config.terminal_action);
            tracing::debug!(round, calls = calls.len(), terminal, "Dispatching actions");
            let results = self.dispatch(calls).await;
            self.observers.step(round, &response);

            if terminal {
                tracing::info!(round, action = %self.config.terminal_action, "Terminal action invoked");
                return Ok(response);
            }

            self.history.push(Message::user(format_action_results(&results)));
        }

        tracing::warn!(max_iterations = self.config.max_iterations, "Round limit reached");
        Err(AgentError::MaxIterations(self.config.max_iterations))
    }

    /// Ask the model for a reply that passes validation
    async fn request_response(&self, system_prompt: &str) -> Result<(String, Vec<ActionCall>)> {
        let policy = self.config.model_retry_policy();
        let provider = self.provider.as_ref();
        let history = self.history.messages();
        let options = &self.config.generation;

        let outcome = with_retry(
            &policy,
            "model_response",
            move |_| async move {
                match provider.send_agentic(history, system_prompt, options).await {
                    Ok(raw) => validate_response(raw),
                    Err(e) => Err(InvalidResponse {
                        reason: format!("provider: {e}"),
                        raw: String::new(),
                    }),
                }
            },
            |attempt, err: &InvalidResponse| {
                tracing::warn!(attempt, reason = %err.reason, "Rejected model output");
                self.observers.invalid_output(attempt, &err.reason, &err.raw);
            },
        )
        .await;

        outcome.map_err(|e| AgentError::InvalidOutput {
            attempts: e.attempts,
            reason: e.last_error.reason,
        })
    }

    /// Dispatch calls in order; failures become failed results
    async fn dispatch(&mut self, calls: Vec<ActionCall>) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let result = self.dispatch_one(&call).await;
            self.dispatched.push(DispatchedAction {
                call,
                result: result.clone(),
                timestamp: Utc::now(),
            });
            results.push(result);
        }

        results
    }

    async fn dispatch_one(&self, call: &ActionCall) -> ActionResult {
        let name = call.action.as_str();

        let Some(action) = self.actions.get(name) else {
            tracing::warn!(action = name, "Action not found");
            return ActionResult::failure(name, AgentError::ActionNotFound(name.to_owned()).to_string());
        };

        if let Err(e) = action.validate(&call.parameters) {
            tracing::warn!(action = name, error = %e, "Invalid action parameters");
            return ActionResult::failure(name, e.to_string());
        }

        let policy = self.config.action_retry_policy();
        let max_attempts = policy.max_attempts.max(1);
        let action: &dyn Action = action.as_ref();
        let parameters = &call.parameters;

        let outcome = with_retry(
            &policy,
            name,
            move |_| action.execute(parameters),
            |attempt, err: &AgentError| {
                if attempt < max_attempts {
                    self.observers.action_retry(name, attempt, &err.to_string());
                }
            },
        )
        .await;

        match outcome {
            Ok(value) => {
                tracing::debug!(action = name, "Action succeeded");
                ActionResult::success(name, value)
            }
            Err(exhausted) => {
                let error = format!(
                    "failed after {} attempt(s): {}",
                    exhausted.attempts, exhausted.last_error
                );
                tracing::warn!(action = name, %error, "Action retries exhausted");
                self.observers.action_exhausted(name, &error);
                ActionResult::failure(name, error)
            }
        }
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    actions: ActionRegistry,
    config: AgentConfig,
    observers: Observers,
    error: Option<AgentError>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            actions: ActionRegistry::new(),
            config: AgentConfig::default(),
            observers: Observers::default(),
            error: None,
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register an action; a duplicate name surfaces from [`Self::build`]
    #[must_use]
    pub fn action<A: Action + 'static>(mut self, action: A) -> Self {
        if let Err(e) = self.actions.register(action) {
            self.error.get_or_insert(e);
        }
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt_prefix = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.config.max_retries = max;
        self
    }

    #[must_use]
    pub fn max_action_retries(mut self, max: u32) -> Self {
        self.config.max_action_retries = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.config.validate()?;

        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, self.actions, self.config).with_observers(self.observers))
    }
}
