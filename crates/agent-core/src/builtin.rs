//! Built-in Actions
//!
//! `user_output` is the loop's communication primitive and terminal signal;
//! `query_llm` lets the model ask itself a side question without action
//! semantics.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::{Action, ActionDefinition, ParamType, ParameterSpec, Parameters};
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};

/// Name of the output/terminal action
pub const USER_OUTPUT_ACTION: &str = "user_output";

/// Name of the self-query action
pub const QUERY_LLM_ACTION: &str = "query_llm";

/// Selector for [`crate::config::AgentLoopConfig::include_default_actions`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinAction {
    UserOutput,
    QueryLlm,
}

impl BuiltinAction {
    pub const ALL: [Self; 2] = [Self::UserOutput, Self::QueryLlm];

    pub const fn name(self) -> &'static str {
        match self {
            Self::UserOutput => USER_OUTPUT_ACTION,
            Self::QueryLlm => QUERY_LLM_ACTION,
        }
    }
}

fn required_str<'a>(parameters: &'a Parameters, name: &str) -> Result<&'a str> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ActionValidation(format!("'{name}' must be a string")))
}

/// Emits a message to the user.
///
/// Execution only timestamps and echoes the message; the wrapper collects
/// emitted messages from the transcript.
pub struct UserOutputAction;

#[async_trait]
impl Action for UserOutputAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition::new(
            USER_OUTPUT_ACTION,
            "Show a message to the user. Calling this ends your turn.",
        )
        .with_parameter(ParameterSpec::new(
            "message",
            ParamType::String,
            "The message to display to the user",
        ))
    }

    async fn execute(&self, parameters: &Parameters) -> Result<Value> {
        let message = required_str(parameters, "message")?;

        Ok(json!({
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

/// Issues a plain, action-blind model call.
pub struct QueryLlmAction {
    provider: Arc<dyn LlmProvider>,
    options: GenerationOptions,
}

impl QueryLlmAction {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GenerationOptions) -> Self {
        Self { provider, options }
    }
}

#[async_trait]
impl Action for QueryLlmAction {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition::new(
            QUERY_LLM_ACTION,
            "Ask the language model a standalone question and get its raw reply.",
        )
        .with_parameter(ParameterSpec::new("prompt", ParamType::String, "The question to ask"))
        .with_parameter(ParameterSpec::optional(
            "context",
            ParamType::String,
            "Instructions or background used as the system prompt",
        ))
    }

    async fn execute(&self, parameters: &Parameters) -> Result<Value> {
        let prompt = required_str(parameters, "prompt")?;
        let context = parameters.get("context").and_then(Value::as_str);

        let reply = self
            .provider
            .send_plain(&[Message::user(prompt)], context, &self.options)
            .await?;

        Ok(Value::String(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::testing::ScriptedProvider;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_user_output_echoes_message() {
        let result = UserOutputAction
            .execute(&params(json!({"message": "Sunny, 22°C"})))
            .await
            .unwrap();

        assert_eq!(result["message"], "Sunny, 22°C");
        assert!(result["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_user_output_rejects_non_string() {
        let err = UserOutputAction.execute(&params(json!({"message": 5}))).await.unwrap_err();
        assert!(matches!(err, AgentError::ActionValidation(_)));
    }

    #[tokio::test]
    async fn test_query_llm_uses_plain_call() {
        let provider = Arc::new(ScriptedProvider::new(["Paris"]));
        let action = QueryLlmAction::new(provider.clone(), GenerationOptions::default());

        let reply = action
            .execute(&params(json!({"prompt": "Capital of France?", "context": "Answer in one word."})))
            .await
            .unwrap();

        assert_eq!(reply, json!("Paris"));
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][0].role, Role::System);
        assert_eq!(calls[0][0].content, "Answer in one word.");
        assert_eq!(calls[0][1].content, "Capital of France?");
    }

    #[test]
    fn test_builtin_selector_serde() {
        let parsed: Vec<BuiltinAction> = serde_json::from_value(json!(["user_output", "query_llm"])).unwrap();
        assert_eq!(parsed, BuiltinAction::ALL.to_vec());
        assert_eq!(BuiltinAction::QueryLlm.name(), QUERY_LLM_ACTION);
    }
}
