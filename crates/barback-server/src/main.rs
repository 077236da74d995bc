//! Barback server binary
//!
//! HTTP and WebSocket surface over the barback session/orchestration
//! library. Configuration comes from the environment:
//! `BARBACK_PORT` (default 3001), `BARBACK_SCRATCH_DIR` (default `/tmp`),
//! `BARBACK_AUTH_TOKEN` (unset accepts every caller), `RUST_LOG`.

use anyhow::Result;
use axum::routing::get;
use axum::{Json, Router};
use barback::{EventBroadcaster, Orchestrator, OrchestratorConfig, SessionRegistry};
use barback_ssh::SshConnector;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

mod auth;
mod error;
mod routes;
mod state;
mod ws;

use auth::{AllowAll, Authorizer, TokenAuthorizer};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port: u16 = std::env::var("BARBACK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let scratch_dir =
        std::env::var("BARBACK_SCRATCH_DIR").unwrap_or_else(|_| "/tmp".to_string());

    let authorizer: Arc<dyn Authorizer> = match std::env::var("BARBACK_AUTH_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(TokenAuthorizer::new(token)),
        _ => {
            warn!("BARBACK_AUTH_TOKEN not set; accepting every caller");
            Arc::new(AllowAll)
        }
    };

    let registry = Arc::new(SessionRegistry::new(Arc::new(SshConnector)));
    let orchestrator = Orchestrator::new(
        Arc::clone(&registry),
        EventBroadcaster::default(),
        OrchestratorConfig { scratch_dir },
    );

    let state = AppState {
        orchestrator,
        authorizer,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_handler))
        .merge(routes::api_router())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server running on port {}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    registry.shutdown().await;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for shutdown signal");
    }
}
