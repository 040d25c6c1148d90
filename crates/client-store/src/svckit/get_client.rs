//! Get Client Tool

use async_trait::async_trait;
use serde_json::Value;

use agent_core::{
    Tool, ToolSchema, ToolCall, ToolResult,
    tool::ParameterSchema,
    Result as CoreResult,
};

use crate::store::ClientStore;

/// Tool for looking up a client by id
pub struct GetClientTool {
    store: ClientStore,
}

impl GetClientTool {
    pub fn new(store: ClientStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetClientTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_client".into(),
            description: "Get a client from the database by id. The id must be an integer. Returns the client as JSON or an error message.".into(),
            parameters: vec![ParameterSchema::required("id", "integer", "Client id")],
            category: Some("clients".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let Some(id) = call.argument("id").and_then(Value::as_i64) else {
            return Ok(ToolResult::failure(
                "get_client",
                "Validation error: id must be an integer",
            ));
        };

        match self.store.get_async(id).await {
            Ok(client) => {
                let data = serde_json::to_value(&client)?;
                Ok(ToolResult::success("get_client", data.to_string()).with_data(data))
            }
            Err(e) => {
                tracing::error!(id, error = %e, "Error getting client");
                Ok(ToolResult::failure("get_client", e.to_string()))
            }
        }
    }
}
