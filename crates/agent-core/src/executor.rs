//! Tool Executor
//!
//! Turns one `ToolCall` into exactly one `ToolResult`. Lookup, validation
//! and execution failures all come back as failed results so the model can
//! react to them; nothing here aborts the loop.

use std::sync::Arc;

use crate::error::AgentError;
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a single call. The returned result always carries `call.id`.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        tracing::debug!(tool = %call.name, id = %call.id, "Executing tool");

        let result = match self.try_execute(call).await {
            Ok(mut result) => {
                result.name = call.name.clone();
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, id = %call.id, error = %e, "Tool call failed");
                ToolResult::failure(&call.name, failure_message(&e))
            }
        };

        result.with_id(call.id.clone())
    }

    /// Execute a batch in request order. No call is skipped when an
    /// earlier one fails.
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call).await);
        }
        results
    }

    async fn try_execute(&self, call: &ToolCall) -> crate::Result<ToolResult> {
        let tool = self.registry.resolve(&call.name)?;
        tool.validate(call)?;
        tool.execute(call).await
    }
}

fn failure_message(err: &AgentError) -> String {
    match err {
        AgentError::ToolNotFound(name) => format!("Tool not found: {}", name),
        AgentError::InvalidArguments { reason, .. } => format!("Invalid arguments: {}", reason),
        other => other.to_string(),
    }
}
