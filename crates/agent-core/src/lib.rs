//! # agent-core
//!
//! Tool-calling conversation loop with a provider-agnostic LLM abstraction.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         ControlLoop                            │
//! │  ┌───────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ ReasoningStep │──▶│ ToolExecutor │──▶│   ToolRegistry   │  │
//! │  │ (LlmProvider) │◀──│              │   │ (ToolSource)     │  │
//! │  └───────────────┘   └──────────────┘   └──────────────────┘  │
//! │          │                                                      │
//! │  Conversation ◀──▶ SessionCheckpoint                            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait lets the loop run against Ollama, OpenAI, Azure
//! OpenAI or a test double without changing loop logic. Tools come from a
//! `ToolSource` (a remote tool server) or are registered locally.

pub mod control;
pub mod error;
pub mod executor;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use control::{ControlLoop, ControlLoopBuilder, LoopConfig, LoopState};
pub use error::{AgentError, Result};
pub use executor::ToolExecutor;
pub use message::{Conversation, Message, Role};
pub use prompt::PromptSource;
pub use provider::LlmProvider;
pub use reasoning::{ReasoningOutcome, ReasoningStep};
pub use session::{MemoryCheckpoint, SessionCheckpoint, SessionId};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema, ToolSource};
