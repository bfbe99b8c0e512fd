//! LLM Provider Strategy Pattern
//!
//! Defines the message-sending capability the orchestration loop consumes.
//! Backends implement [`LlmProvider::complete`]; the two call shapes the
//! loop actually uses ([`LlmProvider::send_agentic`] and
//! [`LlmProvider::send_plain`]) are provided on top of it and may be
//! overridden when a backend distinguishes them natively.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider};
//!
//! let provider = OllamaProvider::localhost();
//! let reply = provider
//!     .send_plain(&history, Some("Answer briefly."), &GenerationOptions::default())
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "gpt-4", "claude-3-sonnet")
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,

    /// System prompt override (if provider supports it separately)
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_model() -> String { "llama3.2".into() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 0.9 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
            system_prompt: None,
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Whether the response was truncated
    pub truncated: bool,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Plain text completion with no usage data
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            truncated: false,
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// Provider metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g., "Ollama", "OpenAI")
    pub name: String,

    /// Provider version
    pub version: Option<String>,

    /// Available models
    pub models: Vec<ModelInfo>,
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub context_length: Option<u32>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface, and may call it
/// several times for the same transcript when output fails validation.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider information and capabilities
    async fn info(&self) -> Result<ProviderInfo>;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion from messages
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Action-aware call: `system_prompt` may carry the action manifest and
    /// the reply may embed action-call JSON.
    async fn send_agentic(
        &self,
        history: &[Message],
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let prompt = (!system_prompt.is_empty()).then_some(system_prompt);
        let messages = with_system_prompt(history, prompt);
        let options = GenerationOptions {
            system_prompt: prompt.map(str::to_owned),
            ..options.clone()
        };

        Ok(self.complete(&messages, &options).await?.content)
    }

    /// Action-blind call: no action semantics expected in the reply.
    async fn send_plain(
        &self,
        history: &[Message],
        system_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String> {
        let prompt = system_prompt.filter(|p| !p.is_empty());
        let messages = with_system_prompt(history, prompt);

        Ok(self.complete(&messages, options).await?.content)
    }
}

/// Prepend a system message to the transcript when a prompt is given
pub fn with_system_prompt(history: &[Message], system_prompt: Option<&str>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = system_prompt {
        messages.push(Message::system(prompt));
    }
    messages.extend_from_slice(history);
    messages
}
