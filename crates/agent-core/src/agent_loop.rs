//! Loop Wrapper
//!
//! Batteries-included front end over [`Agent`]: registers the built-in
//! actions, tracks what each run emitted and executed, and never returns
//! an error from [`AgentLoop::run`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::action::{ActionRegistry, ActionResult, Parameters};
use crate::builtin::{BuiltinAction, QueryLlmAction, USER_OUTPUT_ACTION, UserOutputAction};
use crate::config::AgentLoopConfig;
use crate::error::{AgentError, Result};
use crate::message::{Message, Role};
use crate::observer::Observers;
use crate::parser::parse_action_calls;
use crate::provider::LlmProvider;
use crate::reasoning::Agent;

/// A non-output action executed during a run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionExecution {
    pub action_name: String,
    pub parameters: Parameters,
    pub result: ActionResult,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of [`AgentLoop::run`]
#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub success: bool,

    /// Final model response (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Messages emitted for the user, deduplicated, in first-seen order
    pub outputs: Vec<String>,

    /// Distinct non-output actions, in execution order
    pub actions_executed: Vec<ActionExecution>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct AgentLoop {
    agent: Agent,
    outputs: Vec<String>,
    executions: Vec<ActionExecution>,
}

impl AgentLoop {
    /// Build the loop, registering the configured built-in actions after
    /// the caller's own.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        mut actions: ActionRegistry,
        config: AgentLoopConfig,
    ) -> Result<Self> {
        config.validate()?;

        for builtin in &config.include_default_actions {
            match builtin {
                BuiltinAction::UserOutput => actions.register(UserOutputAction)?,
                BuiltinAction::QueryLlm => actions.register(QueryLlmAction::new(
                    Arc::clone(&provider),
                    config.generation.clone(),
                ))?,
            }
        }

        // the loop ends its turn through this action
        if !actions.contains(USER_OUTPUT_ACTION) {
            return Err(AgentError::Config(format!(
                "'{USER_OUTPUT_ACTION}' must be included in include_default_actions or registered by the caller"
            )));
        }

        tracing::info!(actions = ?actions.names(), "Agent loop ready");

        Ok(Self {
            agent: Agent::new(provider, actions, config.agent_config()),
            outputs: Vec::new(),
            executions: Vec::new(),
        })
    }

    /// Attach observer callbacks
    #[must_use]
    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.agent.set_observers(observers);
        self
    }

    /// Run one user message to completion. Failures are reported in the
    /// result rather than returned.
    pub async fn run(&mut self, message: &str) -> RunResult {
        self.outputs.clear();
        self.executions.clear();

        let start = self.agent.history().len();
        let outcome = self.agent.chat(message).await;
        self.collect(start);

        match outcome {
            Ok(response) => {
                if self.outputs.is_empty() && !self.executions.is_empty() {
                    let notice = self.fallback_notice();
                    tracing::debug!(%notice, "No output emitted, notifying");
                    self.agent.observers().output(&notice);
                    self.outputs.push(notice);
                }

                RunResult {
                    success: true,
                    response: Some(response),
                    outputs: self.outputs.clone(),
                    actions_executed: self.executions.clone(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, fatal = e.is_fatal(), "Agent run failed");

                RunResult {
                    success: false,
                    response: None,
                    outputs: self.outputs.clone(),
                    actions_executed: self.executions.clone(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Gather outputs from assistant messages appended since `start` and
    /// executions from the agent's dispatch log.
    fn collect(&mut self, start: usize) {
        let observers = self.agent.observers();

        let assistant_messages = self.agent.history()[start..]
            .iter()
            .filter(|m| m.role == Role::Assistant);

        for message in assistant_messages {
            for call in parse_action_calls(&message.content) {
                if call.action != USER_OUTPUT_ACTION {
                    continue;
                }
                let Some(Value::String(text)) = call.parameters.get("message") else {
                    continue;
                };
                if !self.outputs.contains(text) {
                    observers.output(text);
                    self.outputs.push(text.clone());
                }
            }
        }

        for dispatched in self.agent.dispatched() {
            let call = &dispatched.call;
            if call.action == USER_OUTPUT_ACTION {
                continue;
            }
            let seen = self
                .executions
                .iter()
                .any(|e| e.action_name == call.action && e.parameters == call.parameters);
            if seen {
                continue;
            }

            let execution = ActionExecution {
                action_name: call.action.clone(),
                parameters: call.parameters.clone(),
                result: dispatched.result.clone(),
                timestamp: dispatched.timestamp,
            };
            observers.action_executed(&execution);
            self.executions.push(execution);
        }
    }

    fn fallback_notice(&self) -> String {
        let mut names: Vec<&str> = Vec::new();
        for execution in &self.executions {
            if !names.contains(&execution.action_name.as_str()) {
                names.push(&execution.action_name);
            }
        }
        format!("Executed actions: {}", names.join(", "))
    }

    /// Outputs of the most recent run
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Executions of the most recent run
    pub fn actions_executed(&self) -> &[ActionExecution] {
        &self.executions
    }

    /// Full transcript
    pub fn history(&self) -> &[Message] {
        self.agent.history()
    }

    /// Clear transcript and run bookkeeping
    pub fn reset_history(&mut self) {
        self.agent.reset();
        self.outputs.clear();
        self.executions.clear();
    }

    /// The wrapped orchestration loop
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionDefinition, FnAction, ParamType, ParameterSpec};
    use crate::builtin::QUERY_LLM_ACTION;
    use crate::testing::ScriptedProvider;
    use serde_json::json;
    use std::sync::Mutex;

    fn fast_config() -> AgentLoopConfig {
        AgentLoopConfig {
            retry_base_delay_ms: 0,
            action_retry_base_delay_ms: 0,
            ..AgentLoopConfig::default()
        }
    }

    fn weather_actions() -> ActionRegistry {
        let mut actions = ActionRegistry::new();
        actions
            .register(FnAction::new(
                ActionDefinition::new("get_weather", "Current weather for a city")
                    .with_parameter(ParameterSpec::new("location", ParamType::String, "City name")),
                |params| async move {
                    let city = params.get("location").and_then(Value::as_str).unwrap_or("?").to_owned();
                    Ok(json!({"location": city, "conditions": "Sunny", "temperature_c": 22}))
                },
            ))
            .unwrap();
        actions
    }

    #[tokio::test]
    async fn test_weather_then_output() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"action":"get_weather","parameters":{"location":"Paris"}}"#,
            r#"{"action":"user_output","parameters":{"message":"Sunny, 22°C"}}"#,
        ]));
        let mut agent_loop = AgentLoop::new(provider.clone(), weather_actions(), fast_config()).unwrap();

        let result = agent_loop.run("Weather in Paris?").await;

        assert!(result.success);
        assert_eq!(result.outputs, vec!["Sunny, 22°C"]);
        assert_eq!(result.actions_executed.len(), 1);
        assert_eq!(result.actions_executed[0].action_name, "get_weather");
        assert_eq!(result.actions_executed[0].parameters["location"], json!("Paris"));
        assert!(result.actions_executed[0].result.success);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_auto_notify_when_nothing_emitted() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"action":"get_weather","parameters":{"location":"Oslo"}}"#,
            "All done.",
        ]));
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let mut agent_loop = AgentLoop::new(provider, weather_actions(), fast_config())
            .unwrap()
            .with_observers(Observers::new().on_output(move |m| sink.lock().unwrap().push(m.to_owned())));

        let result = agent_loop.run("Weather in Oslo?").await;

        assert!(result.success);
        assert_eq!(result.response.as_deref(), Some("All done."));
        assert_eq!(result.outputs.len(), 1);
        assert!(result.outputs[0].contains("get_weather"));
        assert_eq!(*emitted.lock().unwrap(), result.outputs);
    }

    #[tokio::test]
    async fn test_plain_answer_has_no_outputs() {
        let provider = Arc::new(ScriptedProvider::new(["Hello!"]));
        let mut agent_loop = AgentLoop::new(provider, ActionRegistry::new(), fast_config()).unwrap();

        let result = agent_loop.run("hi").await;
        assert!(result.success);
        assert!(result.outputs.is_empty());
        assert!(result.actions_executed.is_empty());
    }

    #[tokio::test]
    async fn test_errors_become_failed_result() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let mut agent_loop = AgentLoop::new(provider, ActionRegistry::new(), fast_config()).unwrap();

        let result = agent_loop.run("hi").await;

        assert!(!result.success);
        assert!(result.response.is_none());
        assert!(result.error.unwrap().contains("Invalid model output after 3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_deduplicates_outputs_and_executions() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"action":"get_weather","parameters":{"location":"Rome"}}
{"action":"get_weather","parameters":{"location":"Rome"}}
{"action":"get_weather","parameters":{"location":"Milan"}}"#,
            r#"{"action":"user_output","parameters":{"message":"Warm"}} {"action":"user_output","parameters":{"message":"Warm"}}"#,
        ]));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        let observers = Observers::new().on_action_executed(move |e: &ActionExecution| {
            sink.lock().unwrap().push(e.action_name.clone());
        });
        let mut agent_loop = AgentLoop::new(provider, weather_actions(), fast_config())
            .unwrap()
            .with_observers(observers);

        let result = agent_loop.run("Weather?").await;

        assert_eq!(result.outputs, vec!["Warm"]);
        assert_eq!(result.actions_executed.len(), 2);
        assert_eq!(result.actions_executed[1].parameters["location"], json!("Milan"));
        assert_eq!(recorded.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_llm_round_trip() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"action":"query_llm","parameters":{"prompt":"What is 6 * 7?","context":"Reply with a number."}}"#,
            "42",
            r#"{"action":"user_output","parameters":{"message":"It is 42."}}"#,
        ]));
        let mut agent_loop = AgentLoop::new(provider.clone(), ActionRegistry::new(), fast_config()).unwrap();

        let result = agent_loop.run("Multiply 6 by 7").await;

        assert!(result.success);
        assert_eq!(result.outputs, vec!["It is 42."]);
        assert_eq!(result.actions_executed[0].action_name, QUERY_LLM_ACTION);
        assert_eq!(result.actions_executed[0].result.result, Some(json!("42")));
        assert_eq!(provider.call_count(), 3);

        // the self-query is a plain call: context as system prompt, prompt as the only user turn
        let plain_call = &provider.calls()[1];
        assert_eq!(plain_call.len(), 2);
        assert_eq!(plain_call[0].content, "Reply with a number.");
        assert_eq!(plain_call[1].content, "What is 6 * 7?");
    }

    #[tokio::test]
    async fn test_accumulators_reset_per_run() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"action":"user_output","parameters":{"message":"first"}}"#,
            "second answer",
        ]));
        let mut agent_loop = AgentLoop::new(provider, ActionRegistry::new(), fast_config()).unwrap();

        assert_eq!(agent_loop.run("one").await.outputs, vec!["first"]);
        let second = agent_loop.run("two").await;
        assert!(second.outputs.is_empty());
        assert_eq!(agent_loop.history().len(), 4);

        agent_loop.reset_history();
        assert!(agent_loop.history().is_empty());
        assert!(agent_loop.outputs().is_empty());
    }

    #[test]
    fn test_default_action_selection() {
        let provider = Arc::new(ScriptedProvider::repeating("hi"));

        let all = AgentLoop::new(provider.clone(), ActionRegistry::new(), fast_config()).unwrap();
        assert_eq!(all.agent().actions().names(), vec!["user_output", "query_llm"]);

        let mut own = ActionRegistry::new();
        own.register(UserOutputAction).unwrap();
        let config = AgentLoopConfig { include_default_actions: Vec::new(), ..fast_config() };
        let none = AgentLoop::new(provider, own, config).unwrap();
        assert_eq!(none.agent().actions().names(), vec!["user_output"]);
    }

    #[test]
    fn test_requires_output_action() {
        let config = AgentLoopConfig {
            include_default_actions: vec![BuiltinAction::QueryLlm],
            ..fast_config()
        };

        let result = AgentLoop::new(Arc::new(ScriptedProvider::repeating("hi")), weather_actions(), config);
        assert!(matches!(result, Err(AgentError::Config(ref m)) if m.contains("user_output")));
    }

    #[test]
    fn test_conflicting_builtin_name_rejected() {
        let mut actions = ActionRegistry::new();
        actions.register(UserOutputAction).unwrap();

        let result = AgentLoop::new(Arc::new(ScriptedProvider::repeating("hi")), actions, fast_config());
        assert!(matches!(result, Err(AgentError::DuplicateAction(_))));
    }
}
