//! OpenAI / Azure OpenAI Provider
//!
//! Chat completions over HTTP with native function calling. The same wire
//! format serves both deployments; only the URL and auth header differ.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Which flavor of the API to talk to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `{base_url}/chat/completions` with bearer auth
    OpenAi { base_url: String },

    /// `{endpoint}/openai/deployments/{deployment}/chat/completions` with `api-key`
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub endpoint: Endpoint,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Plain OpenAI from `OPENAI_API_KEY` / `OPENAI_BASE_URL`
    pub fn openai_from_env() -> Result<Self> {
        let api_key = required_env("OPENAI_API_KEY")?;
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        Ok(Self {
            endpoint: Endpoint::OpenAi { base_url },
            api_key,
            timeout_secs: 120,
        })
    }

    /// Azure OpenAI from `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`,
    /// `LLM_DEPLOYMENT_MODEL` and `LLM_API_VERSION`
    pub fn azure_from_env() -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::Azure {
                endpoint: required_env("AZURE_OPENAI_ENDPOINT")?,
                deployment: required_env("LLM_DEPLOYMENT_MODEL")?,
                api_version: std::env::var("LLM_API_VERSION")
                    .unwrap_or_else(|_| DEFAULT_API_VERSION.into()),
            },
            api_key: required_env("AZURE_OPENAI_API_KEY")?,
            timeout_secs: 120,
        })
    }

    fn completions_url(&self) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Endpoint::Azure { endpoint, deployment, api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AgentError::Config(format!("{} is not set", key)))
}

/// OpenAI-compatible LLM provider
pub struct OpenAiProvider {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.endpoint {
            Endpoint::OpenAi { .. } => request.bearer_auth(&self.config.api_key),
            Endpoint::Azure { .. } => request.header("api-key", &self.config.api_key),
        }
    }

    fn build_request(messages: &[Message], tools: &[ToolSchema], options: &GenerationOptions) -> Value {
        let mut body = json!({
            "model": options.model,
            "messages": messages.iter().map(Self::convert_message).collect::<Vec<_>>(),
            "temperature": options.temperature,
            "top_p": options.top_p,
            "max_tokens": options.max_tokens,
        });

        if !options.stop_sequences.is_empty() {
            body["stop"] = json!(options.stop_sequences);
        }

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|schema| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": schema.name,
                            "description": schema.description,
                            "parameters": schema.to_json_schema(),
                        }
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn convert_message(message: &Message) -> Value {
        match message.role {
            Role::System => json!({ "role": "system", "content": message.content }),
            Role::User => json!({ "role": "user", "content": message.content }),
            Role::Assistant if message.has_tool_calls() => json!({
                "role": "assistant",
                "content": if message.content.is_empty() { Value::Null } else { json!(message.content) },
                "tool_calls": message.tool_calls.iter().map(|call| json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })).collect::<Vec<_>>(),
            }),
            Role::Assistant => json!({ "role": "assistant", "content": message.content }),
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id,
                "content": message.content,
            }),
        }
    }

    fn convert_completion(response: ChatResponse, model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                // Unparseable arguments are kept as a string and rejected by validation
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments));
                match call.id {
                    Some(id) => ToolCall::new(call.function.name, arguments).with_id(id),
                    None => ToolCall::new(call.function.name, arguments),
                }
            })
            .collect();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => Some(FinishReason::Stop),
            Some("length") => Some(FinishReason::Length),
            Some("tool_calls" | "function_call") => Some(FinishReason::ToolUse),
            Some("content_filter") => Some(FinishReason::ContentFilter),
            Some(_) => Some(FinishReason::Error),
            None => None,
        };

        let mut completion = Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: Vec::new(),
            model: response.model.unwrap_or_else(|| model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason,
        };
        if !tool_calls.is_empty() {
            completion = completion.with_tool_calls(tool_calls);
        }
        Ok(completion)
    }
}

/// Map an HTTP failure status to the agent error family
fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

fn transport_error(err: &reqwest::Error) -> AgentError {
    if err.is_connect() || err.is_timeout() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let name = match self.config.endpoint {
            Endpoint::OpenAi { .. } => "OpenAI",
            Endpoint::Azure { .. } => "Azure OpenAI",
        };

        Ok(ProviderInfo {
            name: name.into(),
            version: None,
            models: self.list_models().await.unwrap_or_default(),
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, tools, options);
        tracing::debug!(model = %options.model, messages = messages.len(), tools = tools.len(), "Chat completion");

        let response = self
            .authorize(self.http.post(self.config.completions_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("malformed response: {}", e)))?;

        Self::convert_completion(parsed, &options.model)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let base_url = match &self.config.endpoint {
            // Azure serves a single deployment
            Endpoint::Azure { deployment, .. } => {
                return Ok(vec![ModelInfo {
                    id: deployment.clone(),
                    name: deployment.clone(),
                    context_length: None,
                }]);
            }
            Endpoint::OpenAi { base_url } => base_url,
        };
        let url = format!("{}/models", base_url.trim_end_matches('/'));

        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id.clone(),
                name: m.id,
                context_length: None,
            })
            .collect())
    }

    fn supports_tools(&self) -> bool {
        true
    }
}
