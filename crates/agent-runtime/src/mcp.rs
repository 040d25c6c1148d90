//! Tool server client (MCP over streamable HTTP)
//!
//! `McpToolSource` performs the protocol handshake once, then serves as both
//! the `ToolSource` for registry discovery and the `PromptSource` for the
//! agent's system instructions. Each discovered tool holds a cheap handle to
//! the same connection.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    prompt::PromptSource,
    tool::{Tool, ToolCall, ToolResult, ToolSchema, ToolSource},
};
use async_trait::async_trait;
use rmcp::{
    ClientHandler, RoleClient,
    model::{
        CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo,
        GetPromptRequestParam, Implementation, PaginatedRequestParam, PromptMessageContent,
        ProtocolVersion, RawContent,
    },
    service::{Peer, RunningService},
    transport::StreamableHttpClientTransport,
};
use serde_json::Value;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on `tools/list` pages fetched by one discovery
const MAX_TOOL_PAGES: usize = 64;

/// Cursor bookkeeping for `tools/list`. Stops on the last page, on a cursor
/// the server already handed out, and after `limit` pages.
struct Pages {
    seen: HashSet<String>,
    fetched: usize,
    limit: usize,
}

impl Pages {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            fetched: 0,
            limit,
        }
    }

    /// Record a fetched page; returns the cursor to request next, if any
    fn advance(&mut self, next_cursor: Option<String>) -> Option<String> {
        self.fetched += 1;
        let next = next_cursor?;

        if !self.seen.insert(next.clone()) {
            tracing::warn!(cursor = %next, "tools/list returned a repeated cursor; stopping discovery");
            return None;
        }
        if self.fetched >= self.limit {
            tracing::warn!(pages = self.fetched, "tools/list page limit reached; stopping discovery");
            return None;
        }
        Some(next)
    }
}

#[derive(Clone)]
struct AgentClientHandler {
    info: ClientInfo,
}

impl AgentClientHandler {
    fn new() -> Self {
        Self {
            info: ClientInfo {
                protocol_version: ProtocolVersion::LATEST,
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    title: None,
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    icons: None,
                    website_url: None,
                },
            },
        }
    }
}

impl ClientHandler for AgentClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// Connection handle shared by the source and every tool it discovered
#[derive(Clone)]
struct Remote {
    peer: Peer<RoleClient>,
    timeout: Duration,
}

impl Remote {
    async fn invoke(&self, name: &str, arguments: &Value) -> Result<ToolResult> {
        let arguments = match arguments {
            Value::Object(map) => Some(map.clone()),
            Value::Null => None,
            other => {
                return Err(AgentError::InvalidArguments {
                    tool: name.to_string(),
                    reason: format!("arguments must be a JSON object, got {}", other),
                });
            }
        };

        let fut = self.peer.call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments,
        });
        let result = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AgentError::ToolExecution(format!("tools/call '{}' timed out after {:?}", name, self.timeout)))?
            .map_err(|e| AgentError::ToolExecution(format!("tools/call '{}' failed: {}", name, e)))?;

        Ok(map_tool_result(name, result))
    }
}

/// Client for a remote tool server
pub struct McpToolSource {
    url: String,
    remote: Remote,
    service: RunningService<RoleClient, AgentClientHandler>,
}

impl McpToolSource {
    /// Connect and complete the protocol handshake
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let transport = StreamableHttpClientTransport::from_uri(url.clone());

        let service = tokio::time::timeout(timeout, rmcp::serve_client(AgentClientHandler::new(), transport))
            .await
            .map_err(|_| AgentError::Other(format!("Timed out connecting to tool server at {}", url)))?
            .map_err(|e| AgentError::Other(format!("Tool server handshake with {} failed: {}", url, e)))?;

        if let Some(info) = service.peer().peer_info() {
            tracing::info!(
                server = %info.server_info.name,
                version = %info.server_info.version,
                "✓ Connected to tool server at {}", url
            );
        }

        let remote = Remote {
            peer: service.peer().clone(),
            timeout,
        };

        Ok(Self { url, remote, service })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call a tool by name without going through a registry
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<ToolResult> {
        self.remote.invoke(name, arguments).await
    }

    /// End the session with the server
    pub async fn close(self) {
        match self.service.cancel().await {
            Ok(reason) => tracing::debug!(?reason, "Tool server connection closed"),
            Err(e) => tracing::warn!("Tool server connection did not shut down cleanly: {}", e),
        }
    }
}

#[async_trait]
impl ToolSource for McpToolSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn discover(&self) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut pages = Pages::new(MAX_TOOL_PAGES);
        let mut cursor = None;

        loop {
            let fut = self.remote.peer.list_tools(Some(PaginatedRequestParam { cursor }));
            let page = tokio::time::timeout(self.remote.timeout, fut)
                .await
                .map_err(|_| AgentError::Other(format!("tools/list timed out on {}", self.url)))?
                .map_err(|e| AgentError::Other(format!("tools/list failed on {}: {}", self.url, e)))?;

            for tool in page.tools {
                let schema = ToolSchema::from_json_schema(
                    tool.name.to_string(),
                    tool.description.map(|d| d.to_string()).unwrap_or_default(),
                    &Value::Object((*tool.input_schema).clone()),
                );
                tracing::debug!(tool = %schema.name, "Discovered remote tool");
                tools.push(Arc::new(McpTool {
                    schema,
                    remote: self.remote.clone(),
                }));
            }

            cursor = pages.advance(page.next_cursor);
            if cursor.is_none() {
                break;
            }
        }

        Ok(tools)
    }
}

#[async_trait]
impl PromptSource for McpToolSource {
    async fn fetch_prompt(&self, name: &str) -> Result<String> {
        let fut = self.remote.peer.get_prompt(GetPromptRequestParam {
            name: name.to_string(),
            arguments: None,
        });
        let result = tokio::time::timeout(self.remote.timeout, fut)
            .await
            .map_err(|_| AgentError::Config(format!("prompts/get '{}' timed out", name)))?
            .map_err(|e| AgentError::Config(format!("prompt '{}' unavailable: {}", name, e)))?;

        let text: Vec<String> = result
            .messages
            .into_iter()
            .filter_map(|message| match message.content {
                PromptMessageContent::Text { text } => Some(text),
                _ => None,
            })
            .collect();

        if text.is_empty() {
            return Err(AgentError::Config(format!("prompt '{}' has no text content", name)));
        }
        Ok(text.join("\n"))
    }
}

/// A tool served by the remote server
pub struct McpTool {
    schema: ToolSchema,
    remote: Remote,
}

#[async_trait]
impl Tool for McpTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        self.remote.invoke(&self.schema.name, &call.arguments).await
    }
}

fn map_tool_result(name: &str, result: CallToolResult) -> ToolResult {
    let mut text: Vec<String> = result
        .content
        .into_iter()
        .filter_map(|content| match content.raw {
            RawContent::Text(text) => Some(text.text),
            _ => None,
        })
        .collect();

    if text.is_empty() {
        if let Some(value) = result.structured_content {
            text.push(value.to_string());
        }
    }
    let text = text.join("\n");

    if result.is_error.unwrap_or(false) {
        return ToolResult::failure(name, error_message(&text));
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(data) => ToolResult::success(name, text).with_data(data),
        Err(_) => ToolResult::success(name, text),
    }
}

/// Unwrap `{"error": "..."}` payloads so the failure isn't double-encoded
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| text.to_string())
}
