//! Application State

use std::collections::BTreeMap;
use std::sync::Arc;

use agent_core::ToolRegistry;

/// A named prompt published to clients
#[derive(Clone, Debug)]
pub struct Prompt {
    pub description: String,
    pub text: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Tools served over the protocol
    pub tools: Arc<ToolRegistry>,

    /// Prompts served over the protocol, by name
    pub prompts: Arc<BTreeMap<String, Prompt>>,

    /// Name reported in the handshake
    pub server_name: String,
}

impl AppState {
    pub fn new(tools: ToolRegistry, server_name: impl Into<String>) -> Self {
        Self {
            tools: Arc::new(tools),
            prompts: Arc::new(BTreeMap::new()),
            server_name: server_name.into(),
        }
    }

    pub fn with_prompt(mut self, name: impl Into<String>, description: impl Into<String>, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.prompts).insert(
            name.into(),
            Prompt {
                description: description.into(),
                text: text.into(),
            },
        );
        self
    }
}
