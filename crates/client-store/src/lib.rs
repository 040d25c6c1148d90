//! # client-store
//!
//! A tiny SQLite record store of clients, exposed to the agent as two tools:
//!
//! - `create_client(name, email)` → `{id, name, email}` or `{error}`
//! - `get_client(id)` → `{id, name, email}` or `{error: "Client not found"}`
//!
//! Store-level failures (duplicate email, unknown id, malformed input) are
//! returned as failed tool results, never as errors that stop the agent.

pub mod error;
pub mod model;
pub mod store;
pub mod svckit;

pub use error::{Result, StoreError};
pub use model::{Client, NewClient};
pub use store::ClientStore;

use agent_core::ToolRegistry;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{CreateClientTool, GetClientTool};
}

/// Registry with both client tools backed by `store`
pub fn client_tools(store: &ClientStore) -> agent_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(tools::CreateClientTool::new(store.clone()))?;
    registry.register(tools::GetClientTool::new(store.clone()))?;
    Ok(registry)
}

/// Name under which the tool server publishes the agent's instructions
pub const SYSTEM_PROMPT_NAME: &str = "system_prompt";

/// System prompt for the client management agent
pub const SYSTEM_PROMPT: &str = r#"You are an assistant that manages a client registry.

## Tools

- `create_client` - register a client from a name and an email address
- `get_client` - look up a client by its integer id

## Rules

1. Only create a client when the user gave both a name and an email.
2. Ids are integers. If the user gives something else, ask for the numeric id.
3. If a tool returns an error (duplicate email, client not found, invalid
   input), explain it to the user plainly and suggest what to do next.
4. Never invent client data; report exactly what the tools return.

Answer concisely."#;
