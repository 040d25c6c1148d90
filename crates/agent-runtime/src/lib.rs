//! # agent-runtime
//!
//! Concrete collaborators for the agent control loop.
//!
//! ## Providers
//!
//! - **Ollama** (default feature): local inference, text tool-block protocol
//! - **OpenAI / Azure OpenAI**: chat completions with native tool calls
//!
//! ## Tool server
//!
//! - **`McpToolSource`**: discovers and invokes tools on a remote tool
//!   server and fetches its named prompts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{McpToolSource, ollama::OllamaProvider};
//!
//! let source = McpToolSource::connect("http://localhost:8000/mcp").await?;
//! let tools = Arc::new(ToolRegistry::discover(&source).await?);
//! let agent = ControlLoop::builder()
//!     .provider(Arc::new(OllamaProvider::from_env()))
//!     .tools(tools)
//!     .system_prompt_from(&source, "system_prompt").await?
//!     .build()?;
//! ```

pub mod mcp;
pub mod openai;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use mcp::{McpTool, McpToolSource};
pub use openai::{OpenAiConfig, OpenAiProvider};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{
    AgentError, ControlLoop, LlmProvider, Message, Result, Role, SessionId, Tool, ToolRegistry,
};
