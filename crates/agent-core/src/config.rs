//! Configuration
//!
//! Immutable settings built once per agent instance, loadable from TOML.
//!
//! ```toml
//! max_steps = 8
//! max_retries = 3
//! system_prompt = "You are a travel assistant."
//! include_default_actions = ["user_output"]
//!
//! [generation]
//! model = "llama3.2"
//! temperature = 0.2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builtin::{BuiltinAction, USER_OUTPUT_ACTION};
use crate::error::{AgentError, Result};
use crate::provider::GenerationOptions;
use crate::retry::RetryPolicy;

/// Instructions prepended by [`crate::AgentLoop`] unless overridden
pub const DEFAULT_SYSTEM_PROMPT: &str = r"You are a helpful AI assistant that can perform actions.

Use the available actions whenever they help answer the request. After
receiving action results, decide whether more actions are needed.
When you have something to tell the user, call the user_output action with
your message; this ends your turn.
Be concise and accurate.";

const fn default_max_iterations() -> usize { 10 }
const fn default_max_retries() -> u32 { 3 }
const fn default_max_action_retries() -> u32 { 2 }
const fn default_retry_base_delay_ms() -> u64 { 500 }
const fn default_action_retry_base_delay_ms() -> u64 { 300 }
fn default_terminal_action() -> String { USER_OUTPUT_ACTION.into() }
fn default_system_prompt() -> String { DEFAULT_SYSTEM_PROMPT.into() }
fn default_actions() -> Vec<BuiltinAction> { BuiltinAction::ALL.to_vec() }

/// Orchestration loop configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Instructions placed before the action manifest
    #[serde(alias = "system_prompt")]
    pub system_prompt_prefix: String,

    /// Model rounds per `chat` call before giving up
    #[serde(alias = "max_steps")]
    pub max_iterations: usize,

    /// Attempts at obtaining a valid model response per round
    pub max_retries: u32,

    /// Attempts per action call
    pub max_action_retries: u32,

    /// Backoff base between model attempts
    pub retry_base_delay_ms: u64,

    /// Backoff base between action attempts
    pub action_retry_base_delay_ms: u64,

    /// Action whose presence in a round ends the loop
    pub terminal_action: String,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt_prefix: String::new(),
            max_iterations: default_max_iterations(),
            max_retries: default_max_retries(),
            max_action_retries: default_max_action_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            action_retry_base_delay_ms: default_action_retry_base_delay_ms(),
            terminal_action: default_terminal_action(),
            generation: GenerationOptions::default(),
        }
    }
}

impl AgentConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_ceilings(self.max_iterations, self.max_retries, self.max_action_retries)
    }

    /// Policy for model-output validation
    pub const fn model_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_delay_ms))
    }

    /// Policy for action execution
    pub const fn action_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_action_retries,
            Duration::from_millis(self.action_retry_base_delay_ms),
        )
    }
}

/// Loop wrapper configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Instructions placed before the action manifest
    #[serde(alias = "system_prompt_prefix")]
    pub system_prompt: String,

    /// Model rounds per `run` call
    #[serde(alias = "max_iterations")]
    pub max_steps: usize,

    pub max_retries: u32,
    pub max_action_retries: u32,
    pub retry_base_delay_ms: u64,
    pub action_retry_base_delay_ms: u64,

    /// Built-in actions to register
    pub include_default_actions: Vec<BuiltinAction>,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_steps: default_max_iterations(),
            max_retries: default_max_retries(),
            max_action_retries: default_max_action_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            action_retry_base_delay_ms: default_action_retry_base_delay_ms(),
            include_default_actions: default_actions(),
            generation: GenerationOptions::default(),
        }
    }
}

impl AgentLoopConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_ceilings(self.max_steps, self.max_retries, self.max_action_retries)
    }

    pub fn includes(&self, action: BuiltinAction) -> bool {
        self.include_default_actions.contains(&action)
    }

    /// Settings for the wrapped orchestration loop
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            system_prompt_prefix: self.system_prompt.clone(),
            max_iterations: self.max_steps,
            max_retries: self.max_retries,
            max_action_retries: self.max_action_retries,
            retry_base_delay_ms: self.retry_base_delay_ms,
            action_retry_base_delay_ms: self.action_retry_base_delay_ms,
            terminal_action: USER_OUTPUT_ACTION.into(),
            generation: self.generation.clone(),
        }
    }
}

fn validate_ceilings(max_iterations: usize, max_retries: u32, max_action_retries: u32) -> Result<()> {
    if max_iterations == 0 {
        return Err(AgentError::Config("max_iterations must be at least 1".into()));
    }
    if max_retries == 0 {
        return Err(AgentError::Config("max_retries must be at least 1".into()));
    }
    if max_action_retries == 0 {
        return Err(AgentError::Config("max_action_retries must be at least 1".into()));
    }
    Ok(())
}
