//! Client record tool server
//!
//! Exposes `create_client` / `get_client` and the agent's system prompt
//! over the tool-serving protocol.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client_store::{ClientStore, SYSTEM_PROMPT, SYSTEM_PROMPT_NAME, client_tools};
use tool_server::{router, AppState};

/// Server settings from the environment
struct ServerSettings {
    bind_addr: String,
    database: String,
}

impl ServerSettings {
    fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            database: std::env::var("CLIENTS_DB").unwrap_or_else(|_| "clients.db".into()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ServerSettings::from_env();

    let store = ClientStore::open(&settings.database)
        .with_context(|| format!("opening client database {}", settings.database))?;
    tracing::info!("✓ Client database ready at {}", settings.database);

    let tools = client_tools(&store)?;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let state = AppState::new(tools, "Clients").with_prompt(
        SYSTEM_PROMPT_NAME,
        "Instructions for the client management agent",
        SYSTEM_PROMPT,
    );

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 tool server running on http://{}", settings.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  *    /mcp    - Tool protocol (MCP streamable HTTP)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
