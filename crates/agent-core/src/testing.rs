//! Shared test helpers.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` pops the next response; once the script is
/// exhausted the `repeat` response (if any) is returned, otherwise the
/// call fails.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            repeat: Some(response.into()),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Messages sent on each call, system prompt included
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "scripted".into(),
            version: None,
            models: Vec::new(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let next = self.responses.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .map(|content| Completion::text(content, options.model.clone()))
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}
