use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use remark_engine::{AgentDefinition, RunnerConfig};

use crate::chat::chat_handler;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    /// Capacity of the per-request event channel feeding the response
    /// body. Backpressure: a slow client slows the loop down rather
    /// than growing memory.
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            stream_buffer: 64,
        }
    }
}

/// Shared application state passed to Axum handlers. The agent
/// definition is built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentDefinition>,
    pub runner_config: RunnerConfig,
    pub stream_buffer: usize,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/comments/chat", post(chat_handler))
        .route("/api/comments/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle carrying the bound
/// port (useful with port 0) and keeping the serve task alive.
pub async fn start(
    config: ServerConfig,
    agent: Arc<AgentDefinition>,
    runner_config: RunnerConfig,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        agent,
        runner_config,
        stream_buffer: config.stream_buffer,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "comments agent server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "agent": state.agent.name,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
