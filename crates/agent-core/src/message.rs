//! Conversation Messages
//!
//! Standard message format used across the agent system, plus the
//! append-only `Conversation` log the control loop feeds to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content (for tool messages: the result payload)
    pub content: String,

    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Correlation id linking a tool message to its request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message that records tool call requests
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.tool_calls = calls;
        msg
    }

    /// Create a tool result message correlated to its request
    pub fn tool(result: &ToolResult) -> Self {
        let mut msg = Self::new(Role::Tool, result.payload());
        msg.tool_call_id = Some(result.id.clone());
        msg.name = Some(result.name.clone());
        msg
    }

    /// Whether this assistant message asked for tools
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token is a rough estimate
        (self.content.len() / 4) as u32 + 4 // +4 for role overhead
    }
}

/// Ordered, append-only conversation history.
///
/// Past entries are never mutated or reordered. A `tool` message is only
/// accepted when it answers an earlier, still-open assistant tool call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, message: Message) -> Result<()> {
        match message.role {
            Role::System => {
                return Err(AgentError::Conversation(
                    "system instructions are not stored in the conversation".into(),
                ));
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().ok_or_else(|| {
                    AgentError::Conversation("tool message without a tool call id".into())
                })?;
                if !self.pending_tool_call_ids().iter().any(|pending| pending == id) {
                    return Err(AgentError::Conversation(format!(
                        "tool result '{}' does not answer an open tool call",
                        id
                    )));
                }
            }
            Role::User | Role::Assistant => {}
        }

        self.messages.push(message);
        Ok(())
    }

    /// Tool call ids requested by assistant messages that have no result yet
    pub fn pending_tool_call_ids(&self) -> Vec<String> {
        let mut pending = Vec::new();
        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    pending.extend(message.tool_calls.iter().map(|c| c.id.clone()));
                }
                Role::Tool => {
                    if let Some(id) = &message.tool_call_id {
                        pending.retain(|p| p != id);
                    }
                }
                _ => {}
            }
        }
        pending
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(|m| m.estimate_tokens()).sum()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
