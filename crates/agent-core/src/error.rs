//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Action not found in registry
    #[error("Action '{0}' not found")]
    ActionNotFound(String),

    /// An action with the same name is already registered
    #[error("Action already registered: {0}")]
    DuplicateAction(String),

    /// Action parameter validation failed
    #[error("Action validation error: {0}")]
    ActionValidation(String),

    /// Action execution failed
    #[error("Action execution error: {0}")]
    ActionExecution(String),

    /// Maximum rounds reached in the orchestration loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Model output kept failing validation
    #[error("Invalid model output after {attempts} attempt(s): {reason}")]
    InvalidOutput { attempts: u32, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether this error ends a `chat` call (as opposed to being folded
    /// into an action result)
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MaxIterations(_) | Self::InvalidOutput { .. }
        )
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AgentError::MaxIterations(10).is_fatal());
        assert!(AgentError::InvalidOutput { attempts: 3, reason: "empty".into() }.is_fatal());
        assert!(!AgentError::ActionNotFound("x".into()).is_fatal());
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: AgentError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
