//! # agent-runtime
//!
//! Concrete collaborators for agent-core.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{init_tracing, OllamaProvider};
//!
//! init_tracing("info")?;
//! let provider = Arc::new(OllamaProvider::from_env());
//! let mut agent_loop = AgentLoop::new(provider, actions, AgentLoopConfig::default())?;
//! let result = agent_loop.run("What's the weather in Paris?").await;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;
pub mod telemetry;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};
pub use telemetry::init_tracing;

// Re-export core types for convenience
pub use agent_core::{
    Action, Agent, AgentError, AgentLoop, AgentLoopConfig, LlmProvider, Message, Result, Role,
    RunResult,
};
