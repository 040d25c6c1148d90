//! Reasoning Step
//!
//! One call to the model: system instructions plus the conversation go in,
//! either a final answer or a batch of tool calls comes out.
//!
//! Backends with native tool calling get the tool schemas with the request.
//! For text-only backends the tool catalogue is appended to the system
//! prompt and calls are parsed back out of ```` ```tool ```` JSON blocks.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolSchema};

/// What the model decided to do
#[derive(Clone, Debug, PartialEq)]
pub enum ReasoningOutcome {
    /// Final textual answer for the user
    FinalAnswer(String),

    /// One or more tool calls, all of which must run before the next inference
    ToolCalls {
        /// Any text the model emitted alongside the calls
        content: String,
        calls: Vec<ToolCall>,
    },
}

pub struct ReasoningStep {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
    tools: Vec<ToolSchema>,
    options: GenerationOptions,
    native_tools: bool,
}

impl ReasoningStep {
    /// `instructions` are fixed for the lifetime of the step.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: &ToolRegistry,
        instructions: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        let native_tools = provider.supports_tools();
        let mut system_prompt = instructions.into();

        let tools = if native_tools {
            registry.schemas()
        } else {
            if !registry.is_empty() {
                system_prompt.push_str("\n\n");
                system_prompt.push_str(&registry.generate_prompt_section());
            }
            Vec::new()
        };

        Self {
            provider,
            system_prompt,
            tools,
            options,
            native_tools,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Run one inference over the full conversation. Backend errors are
    /// returned untouched; retrying is the caller's decision.
    pub async fn infer(&self, conversation: &Conversation) -> Result<ReasoningOutcome> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(conversation.messages().iter().cloned());

        tracing::debug!(
            messages = messages.len(),
            estimated_tokens = conversation.estimate_tokens(),
            model = %self.options.model,
            "Invoking model"
        );

        let completion = self
            .provider
            .complete(&messages, &self.tools, &self.options)
            .await?;

        let calls = if !completion.tool_calls.is_empty() {
            completion.tool_calls
        } else if self.native_tools {
            Vec::new()
        } else {
            parse_tool_calls(&completion.content)
        };

        if calls.is_empty() {
            return Ok(ReasoningOutcome::FinalAnswer(completion.content));
        }

        Ok(ReasoningOutcome::ToolCalls {
            content: completion.content,
            calls: ensure_unique_ids(calls),
        })
    }
}

/// Every call in a batch needs its own correlation id
fn ensure_unique_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || !seen.insert(call.id.clone()) {
                call.id = uuid::Uuid::new_v4().to_string();
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}

/// Parse every ```` ```tool ```` block from a model reply, in order
pub fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    const TOOL_START: &str = "```tool";
    const TOOL_END: &str = "```";

    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start_idx) = rest.find(TOOL_START) {
        let after_marker = &rest[start_idx + TOOL_START.len()..];
        let Some(end_idx) = after_marker.find(TOOL_END) else {
            break;
        };

        let json_str = after_marker[..end_idx].trim();
        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => calls.push(call),
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed tool block"),
        }

        rest = &after_marker[end_idx + TOOL_END.len()..];
    }

    if calls.is_empty() {
        calls.extend(parse_inline_tool_call(content));
    }

    calls
}

/// Fallback: a bare JSON object with a "tool" key
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}
