//! Error Types
//!
//! Tool-level errors (`ToolNotFound`, `InvalidArguments`, `ToolExecution`) are
//! recoverable: the executor folds them into a failed `ToolResult` that the
//! model gets to see. Backend errors and `ReasoningLoopExceeded` abort the
//! current user turn.

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

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Arguments did not match the tool schema
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Tool execution failed (transport error or remote failure)
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Too many tool rounds within a single user turn
    #[error("Reasoning loop exceeded {0} tool rounds in one turn")]
    ReasoningLoopExceeded(usize),

    /// Conversation append invariant violated
    #[error("Conversation error: {0}")]
    Conversation(String),

    /// Session / checkpoint error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Io(_)
        )
    }

    /// Errors raised by the reasoning backend itself
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(_)
                | AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Auth(_)
        )
    }

    /// Whether this error aborts the current user turn
    pub fn is_fatal_for_turn(&self) -> bool {
        self.is_backend_error() || matches!(self, AgentError::ReasoningLoopExceeded(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::InvalidArguments { tool, reason } => format!("Invalid input for '{}': {}", tool, reason),
            AgentError::ToolExecution(msg) => format!("Tool error: {}", msg),
            AgentError::ReasoningLoopExceeded(max) => format!(
                "The request needed more than {} tool rounds and was stopped. Please try a simpler query.",
                max
            ),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
