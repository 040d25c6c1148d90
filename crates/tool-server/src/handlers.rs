//! HTTP Handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tools: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tools: state.tools.len(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use client_store::{ClientStore, client_tools};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::state::AppState;

    fn app() -> axum::Router {
        let tools = client_tools(&ClientStore::open_in_memory().unwrap()).unwrap();
        crate::router(AppState::new(tools, "Clients"))
    }

    fn post_mcp(accept: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("content-type", "application/json")
            .header("accept", accept)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn initialize() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0.0.0" }
            }
        })
    }

    #[tokio::test]
    async fn test_health_reports_tools() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tools"], 2);
    }

    #[tokio::test]
    async fn test_initialize_issues_session() {
        let response = app()
            .oneshot(post_mcp("application/json, text/event-stream", initialize()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("mcp-session-id"));
    }

    #[tokio::test]
    async fn test_request_without_session_must_initialize() {
        let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let response = app()
            .oneshot(post_mcp("application/json, text/event-stream", list))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_client_must_accept_event_stream() {
        let response = app()
            .oneshot(post_mcp("application/json", initialize()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }
}
