//! Create Client Tool
//!
//! Inserts a client row and returns it as JSON.

use async_trait::async_trait;
use serde_json::Value;

use agent_core::{
    Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use crate::model::NewClient;
use crate::store::ClientStore;

/// Tool for registering a new client
pub struct CreateClientTool {
    store: ClientStore,
}

impl CreateClientTool {
    pub fn new(store: ClientStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateClientTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_client".into(),
            description: "Create a new client in the database from a name and an email. Returns the created client (id, name, email) as JSON.".into(),
            parameters: vec![
                ParameterSchema::required("name", "string", "Client name (at least 2 characters)"),
                ParameterSchema::required("email", "string", "Client email, must be unique"),
            ],
            category: Some("clients".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let field = |key: &str| {
            call.argument(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        let new = NewClient::new(field("name"), field("email"));

        match self.store.create_async(new).await {
            Ok(client) => {
                tracing::info!(id = client.id, "Created client");
                let data = serde_json::to_value(&client)?;
                Ok(ToolResult::success("create_client", data.to_string()).with_data(data))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create client");
                Ok(ToolResult::failure("create_client", e.to_string()))
            }
        }
    }
}
