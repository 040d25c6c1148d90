//! Client agent REPL
//!
//! Connects to the tool server, discovers its tools, fetches the system
//! prompt and then answers one line of user input at a time.

mod settings;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{ControlLoop, LlmProvider, SessionId, ToolRegistry};
use agent_runtime::{McpToolSource, OllamaProvider, OpenAiConfig, OpenAiProvider};

use crate::settings::{AgentSettings, ProviderKind};

const SYSTEM_PROMPT_NAME: &str = "system_prompt";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout is the conversation
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = AgentSettings::from_env()?;
    let (provider, model) = build_provider(&settings)?;

    // Verify backend connection
    match unavailable_reason(provider.health_check().await) {
        None => tracing::info!("✓ Reasoning backend reachable (model {})", model),
        Some(reason) => tracing::warn!(%reason, "⚠ Reasoning backend not available - turns will fail"),
    }

    let source = McpToolSource::connect(&settings.mcp_server_url)
        .await
        .with_context(|| format!("connecting to tool server at {}", settings.mcp_server_url))?;

    let outcome = run(&settings, &source, provider, model).await;
    source.close().await;
    outcome
}

/// Why the backend health check did not pass, if it didn't
fn unavailable_reason(health: agent_core::Result<bool>) -> Option<String> {
    match health {
        Ok(true) => None,
        Ok(false) => Some("health check reported the backend down".into()),
        Err(e) => Some(e.to_string()),
    }
}

fn build_provider(settings: &AgentSettings) -> anyhow::Result<(Arc<dyn LlmProvider>, String)> {
    let provider: (Arc<dyn LlmProvider>, String) = match settings.provider {
        ProviderKind::Ollama => (
            Arc::new(OllamaProvider::from_env()),
            settings.model.clone().unwrap_or_else(|| "llama3.2".into()),
        ),
        ProviderKind::OpenAi => (
            Arc::new(OpenAiProvider::new(OpenAiConfig::openai_from_env()?)?),
            settings.model.clone().unwrap_or_else(|| "gpt-4o-mini".into()),
        ),
        ProviderKind::Azure => {
            let config = OpenAiConfig::azure_from_env()?;
            let deployment = match &config.endpoint {
                agent_runtime::openai::Endpoint::Azure { deployment, .. } => deployment.clone(),
                agent_runtime::openai::Endpoint::OpenAi { .. } => String::new(),
            };
            (
                Arc::new(OpenAiProvider::new(config)?),
                settings.model.clone().unwrap_or(deployment),
            )
        }
    };
    Ok(provider)
}

async fn run(
    settings: &AgentSettings,
    source: &McpToolSource,
    provider: Arc<dyn LlmProvider>,
    model: String,
) -> anyhow::Result<()> {
    let tools = ToolRegistry::discover(source)
        .await
        .context("discovering tools")?;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent = ControlLoop::builder()
        .provider(provider)
        .tools(Arc::new(tools))
        .model(model)
        .max_iterations(settings.max_iterations)
        .system_prompt_from(source, SYSTEM_PROMPT_NAME)
        .await
        .context("fetching system prompt")?
        .build()?;

    let session = SessionId::from_string(settings.session_id.clone());
    tracing::info!(session = %session, "Agent ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"User: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            stdout.write_all(b"\n").await?;
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = render_turn(agent.run_turn(&session, input).await)?;
        stdout.write_all(reply.as_bytes()).await?;
    }

    let sessions = agent.sessions()?;
    tracing::info!("Conversation kept for {} session(s)", sessions.len());
    Ok(())
}

/// Text printed for a finished turn. Errors that abort only the turn are
/// shown to the user; anything else stops the REPL.
fn render_turn(outcome: agent_core::Result<String>) -> anyhow::Result<String> {
    match outcome {
        Ok(answer) => Ok(format!("Agent: {}\n", answer)),
        Err(e) if e.is_fatal_for_turn() => Ok(format!("Agent error: {}\n", e.user_message())),
        Err(e) => Err(anyhow::Error::new(e).context("agent turn failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::AgentError;

    #[test]
    fn test_unavailable_reason_keeps_error() {
        assert_eq!(unavailable_reason(Ok(true)), None);
        assert!(unavailable_reason(Ok(false)).is_some());

        let reason = unavailable_reason(Err(AgentError::ProviderUnavailable("connection refused".into())));
        assert!(reason.unwrap().contains("connection refused"));
    }

    #[test]
    fn test_turn_errors_shown_to_user() {
        assert_eq!(render_turn(Ok("Hi".into())).unwrap(), "Agent: Hi\n");

        let shown = render_turn(Err(AgentError::ReasoningLoopExceeded(10))).unwrap();
        assert!(shown.starts_with("Agent error: "));
        assert!(shown.contains("10 tool rounds"));

        let shown = render_turn(Err(AgentError::Auth("bad key".into()))).unwrap();
        assert!(shown.contains("Authentication failed"));
    }

    #[test]
    fn test_internal_errors_stop_the_repl() {
        assert!(render_turn(Err(AgentError::Session("checkpoint lock poisoned".into()))).is_err());
    }
}
