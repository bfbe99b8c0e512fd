//! # agent-core
//!
//! Conversation/action control loop with a provider-agnostic LLM
//! abstraction and an extensible action system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         AgentLoop                             │
//! │  built-in actions · output/execution bookkeeping · no errors  │
//! │  ┌────────────────────────────────────────────────────────┐   │
//! │  │                        Agent                           │   │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌───────────────┐   │   │
//! │  │  │  Response  │  │    Action    │  │  LlmProvider  │   │   │
//! │  │  │   Parser   │──│   Registry   │──│  (Strategy)   │   │   │
//! │  │  └────────────┘  └──────────────┘  └───────────────┘   │   │
//! │  └────────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The model invokes actions by embedding JSON in its reply:
//!
//! ```text
//! {"action": "get_weather", "parameters": {"city": "Paris"}}
//! ```
//!
//! Any number of such blocks may appear in one reply, mixed with prose.

pub mod action;
pub mod agent_loop;
pub mod builtin;
pub mod config;
pub mod error;
pub mod message;
pub mod observer;
pub mod parser;
pub mod provider;
pub mod reasoning;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{Action, ActionCall, ActionDefinition, ActionRegistry, ActionResult, FnAction, ParamType, ParameterSpec, Parameters};
pub use agent_loop::{ActionExecution, AgentLoop, RunResult};
pub use config::{AgentConfig, AgentLoopConfig};
pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use observer::Observers;
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder};
