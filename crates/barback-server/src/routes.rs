//! HTTP API routes
//!
//! Mirrors the dashboard's REST surface: connect/disconnect manage sessions,
//! backup/restore starts are acknowledged immediately and report through the
//! WebSocket event stream.

use crate::auth::CallerContext;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use barback::probe;
use barback::BackupRecord;
use barback_ssh::SshConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Build the `/api` router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/connect", post(connect))
        .route("/api/system-info/:session_id", get(system_info))
        .route("/api/backup/start", post(start_backup))
        .route("/api/backup/stop/:session_id", post(stop_backup))
        .route("/api/backups/:session_id", get(list_backups))
        .route("/api/restore/start", post(start_restore))
        .route("/api/disconnect/:session_id", post(disconnect))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<CallerContext, ApiError> {
    let ctx = CallerContext::from_headers(headers);
    if !state.authorizer.is_authorized(&ctx) {
        return Err(ApiError::Unauthorized);
    }
    if let Some(user) = state.authorizer.current_user(&ctx) {
        debug!("Request authorized for {}", user.username);
    }
    Ok(ctx)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
}

impl ConnectRequest {
    fn into_config(self) -> Result<SshConfig, ApiError> {
        let port = self.port.unwrap_or(22);
        if let Some(key) = self.private_key {
            Ok(SshConfig::with_private_key(self.host, port, self.username, key))
        } else if let Some(password) = self.password {
            Ok(SshConfig::with_password(self.host, port, self.username, password))
        } else {
            Err(ApiError::BadRequest(
                "either password or privateKey is required".to_string(),
            ))
        }
    }
}

async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    let config = request.into_config()?;
    let handle = state.orchestrator.registry().open(config).await?;
    let snapshot = probe::system_snapshot(handle.executor().as_ref()).await?;

    Ok(Json(json!({
        "success": true,
        "sessionId": handle.id(),
        "systemInfo": snapshot,
    })))
}

async fn system_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<barback::SystemSnapshot>, ApiError> {
    authorize(&state, &headers)?;
    let handle = state.orchestrator.registry().get(&session_id).await?;
    let snapshot = probe::system_snapshot(handle.executor().as_ref()).await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartBackupRequest {
    session_id: String,
    backup_path: String,
    #[serde(default)]
    exclude_paths: Vec<String>,
}

async fn start_backup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StartBackupRequest>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    state
        .orchestrator
        .start_backup(
            &request.session_id,
            &request.backup_path,
            &request.exclude_paths,
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "Backup started" })))
}

async fn stop_backup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    state.orchestrator.stop_backup(&session_id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn list_backups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<BackupRecord>>, ApiError> {
    authorize(&state, &headers)?;
    let records = state.orchestrator.list_backups(&session_id).await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRestoreRequest {
    session_id: String,
    backup_id: String,
}

async fn start_restore(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StartRestoreRequest>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    state
        .orchestrator
        .start_restore(&request.session_id, &request.backup_id)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Restore started" })))
}

async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    state.orchestrator.registry().close(&session_id).await;
    Ok(Json(json!({ "success": true })))
}
