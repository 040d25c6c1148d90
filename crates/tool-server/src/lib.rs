//! # tool-server
//!
//! Serves a `ToolRegistry` and a set of named prompts over the tool-serving
//! protocol (MCP streamable HTTP on `/mcp`).

pub mod handlers;
pub mod service;
pub mod state;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use service::ToolService;
pub use state::{AppState, Prompt};

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest_service("/mcp", service::streamable_http(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
