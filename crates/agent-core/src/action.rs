//! Action System
//!
//! Named, typed operations the model can invoke by embedding JSON in its
//! replies. Actions are registered at runtime and dispatched by the
//! orchestration loop.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Parameters of an action call, keyed by parameter name
pub type Parameters = serde_json::Map<String, Value>;

/// Action call parsed from model output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    /// Action name
    pub action: String,

    /// Parameter values
    pub parameters: Parameters,
}

/// Outcome of dispatching one [`ActionCall`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Action that was called
    pub action: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Returned value (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error text (failure only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn success(action: impl Into<String>, result: Value) -> Self {
        Self {
            action: action.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Parameter value type advertised to the model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

impl ParamType {
    /// Whether a JSON value has this type
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// Parameter definition for an action
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,

    /// Value type
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default = "default_required")]
    pub required: bool,
}

const fn default_required() -> bool {
    true
}

impl ParameterSpec {
    /// Required parameter
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    /// Optional parameter
    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::new(name, param_type, description)
        }
    }
}

/// Capability descriptor, immutable once registered
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique action identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions, in display order
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// Action trait - implement to add new capabilities
#[async_trait]
pub trait Action: Send + Sync {
    /// Get the action's definition for the prompt manifest
    fn definition(&self) -> ActionDefinition;

    /// Execute the action with given parameters
    async fn execute(&self, parameters: &Parameters) -> Result<Value>;

    /// Validate parameters before execution (optional)
    fn validate(&self, parameters: &Parameters) -> Result<()> {
        let definition = self.definition();

        for param in &definition.parameters {
            match parameters.get(&param.name) {
                None if param.required => {
                    return Err(AgentError::ActionValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(Value::Null) if !param.required => {}
                Some(value) if !param.param_type.matches(value) => {
                    return Err(AgentError::ActionValidation(format!(
                        "Parameter '{}' must be of type {}",
                        param.name, param.param_type
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

type ActionFn = dyn Fn(Parameters) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// Closure-backed action: a `{definition, execute}` capability record
#[derive(Clone)]
pub struct FnAction {
    definition: ActionDefinition,
    handler: Arc<ActionFn>,
}

impl FnAction {
    pub fn new<F, Fut>(definition: ActionDefinition, handler: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |params| handler(params).boxed()),
        }
    }
}

impl std::fmt::Debug for FnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Action for FnAction {
    fn definition(&self) -> ActionDefinition {
        self.definition.clone()
    }

    async fn execute(&self, parameters: &Parameters) -> Result<Value> {
        (self.handler)(parameters.clone()).await
    }
}

/// Registry for available actions, preserving registration order
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn Action>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new action
    pub fn register<A: Action + 'static>(&mut self, action: A) -> Result<()> {
        self.register_arc(Arc::new(action))
    }

    /// Register a shared action. Fails if the name is taken; the existing
    /// registration is left untouched.
    pub fn register_arc(&mut self, action: Arc<dyn Action>) -> Result<()> {
        let name = action.definition().name;
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateAction(name));
        }

        tracing::debug!(action = %name, "Registered action");
        self.index.insert(name, self.actions.len());
        self.actions.push(action);
        Ok(())
    }

    /// Get an action by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.index.get(name).map(|&i| Arc::clone(&self.actions[i]))
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All actions in registration order
    pub fn list(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Action names in registration order
    pub fn names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.definition().name).collect()
    }

    /// Number of registered actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Render the capability manifest for the system prompt.
    ///
    /// Returns an empty string when nothing is registered, meaning the
    /// prompt should carry no action section at all.
    pub fn render_manifest(&self) -> String {
        if self.actions.is_empty() {
            return String::new();
        }

        let mut prompt = String::from("## Available Actions\n\n");

        for definition in self.actions.iter().map(|a| a.definition()) {
            let _ = writeln!(prompt, "### {}", definition.name);
            let _ = writeln!(prompt, "{}", definition.description);

            if !definition.parameters.is_empty() {
                prompt.push_str("Parameters:\n");
                for param in &definition.parameters {
                    let required = if param.required { "required" } else { "optional" };
                    let _ = writeln!(
                        prompt,
                        "- {} ({}) ({}): {}",
                        param.name, param.param_type, required, param.description
                    );
                }
            }
            prompt.push('\n');
        }

        prompt.push_str("To use an action, respond with a JSON object in exactly this format:\n");
        prompt.push_str("{\"action\": \"action_name\", \"parameters\": {\"param_name\": \"value\"}}\n\n");
        prompt.push_str(
            "You may include multiple action blocks in one response; they are executed in order.\n",
        );

        prompt
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
