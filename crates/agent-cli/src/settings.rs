//! Agent settings from the environment

use std::str::FromStr;

use agent_core::{AgentError, Result};

/// Which reasoning backend to drive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Azure,
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            "azure" | "azure_openai" => Ok(Self::Azure),
            other => Err(AgentError::Config(format!(
                "unknown LLM_PROVIDER '{}' (expected ollama, openai or azure)",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgentSettings {
    pub provider: ProviderKind,

    /// Model name; `None` means the backend's default
    pub model: Option<String>,

    pub mcp_server_url: String,
    pub session_id: String,
    pub max_iterations: usize,
}

impl AgentSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = match get("LLM_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::Ollama,
        };

        let max_iterations = match get("AGENT_MAX_ITERATIONS") {
            Some(value) => value.trim().parse().map_err(|_| {
                AgentError::Config(format!("AGENT_MAX_ITERATIONS must be a positive integer, got '{}'", value))
            })?,
            None => 10,
        };

        Ok(Self {
            provider,
            model: get("LLM_MODEL").filter(|m| !m.trim().is_empty()),
            mcp_server_url: get("MCP_SERVER_URL").unwrap_or_else(|| "http://localhost:8000/mcp".into()),
            session_id: get("SESSION_ID").unwrap_or_else(|| "1234".into()),
            max_iterations,
        })
    }
}
