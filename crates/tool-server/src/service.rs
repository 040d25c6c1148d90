//! Tool Protocol Service
//!
//! `ToolService` answers the tool-serving protocol through rmcp's
//! `ServerHandler`: tool listing and invocation are backed by the shared
//! `ToolRegistry`, prompts by the named prompts in `AppState`. The
//! streamable HTTP transport (sessions, SSE framing, handshake) is rmcp's.

use std::sync::Arc;

use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam, GetPromptResult,
        Implementation, JsonObject, ListPromptsResult, ListToolsResult, PaginatedRequestParam,
        Prompt as ProtocolPrompt, PromptMessage, PromptMessageRole, ProtocolVersion,
        ServerCapabilities, ServerInfo, Tool as ProtocolTool,
    },
    service::RequestContext,
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use serde_json::Value;

use agent_core::{ToolCall, ToolExecutor, ToolResult, ToolSchema};

use crate::state::AppState;

/// Protocol handler over the application state
#[derive(Clone)]
pub struct ToolService {
    state: AppState,
    executor: Arc<ToolExecutor>,
}

impl ToolService {
    pub fn new(state: AppState) -> Self {
        let executor = Arc::new(ToolExecutor::new(state.tools.clone()));
        Self { state, executor }
    }

    /// Every registered tool, described for the protocol
    pub fn tools(&self) -> Vec<ProtocolTool> {
        self.state.tools.schemas().iter().map(describe_tool).collect()
    }

    /// Run one tool. Unknown tools, bad arguments and tool failures all come
    /// back as error results, never as protocol errors.
    pub async fn invoke(&self, request: CallToolRequestParam) -> CallToolResult {
        let arguments = Value::Object(request.arguments.unwrap_or_default());
        let call = ToolCall::new(request.name, arguments);

        let result = self.executor.execute(&call).await;
        if !result.success {
            tracing::warn!(tool = %call.name, error = %result.output, "Tool call failed");
        }

        call_result(&result)
    }

    pub fn prompts(&self) -> Vec<ProtocolPrompt> {
        self.state
            .prompts
            .iter()
            .map(|(name, prompt)| ProtocolPrompt::new(name, Some(&prompt.description), None))
            .collect()
    }

    /// Look up a prompt by name
    pub fn prompt(&self, name: &str) -> Result<GetPromptResult, ErrorData> {
        let prompt = self
            .state
            .prompts
            .get(name)
            .ok_or_else(|| ErrorData::invalid_params(format!("Unknown prompt: {}", name), None))?;

        Ok(GetPromptResult {
            description: Some(prompt.description.clone()),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, &prompt.text)],
        })
    }
}

impl ServerHandler for ToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: self.state.server_name.clone(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::default()
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        tracing::debug!(tool = %request.name, "tools/call");
        Ok(self.invoke(request).await)
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        Ok(ListPromptsResult::with_all_items(self.prompts()))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        self.prompt(&request.name)
    }
}

/// Streamable HTTP endpoint serving `ToolService`, one instance per session
pub fn streamable_http(state: AppState) -> StreamableHttpService<ToolService, LocalSessionManager> {
    let service = ToolService::new(state);
    StreamableHttpService::new(
        move || Ok(service.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    )
}

fn describe_tool(schema: &ToolSchema) -> ProtocolTool {
    let input_schema = match schema.to_json_schema() {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    ProtocolTool::new(schema.name.clone(), schema.description.clone(), Arc::new(input_schema))
}

fn call_result(result: &ToolResult) -> CallToolResult {
    let content = vec![Content::text(result.payload())];
    if result.success {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    }
}
