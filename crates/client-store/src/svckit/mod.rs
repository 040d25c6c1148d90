//! Service Kit - Agent Tools
//!
//! Record-store tools that implement `agent_core::Tool`.

mod create_client;
mod get_client;

pub use create_client::CreateClientTool;
pub use get_client::GetClientTool;
