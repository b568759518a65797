//! Lifecycle and status handlers.

use axum::Json;
use axum::extract::{Path, State};
use olb_mcp::{LifecycleOutcome, ServerStatus, StatusSummary};

use crate::dto::ApiResponse;
use crate::error::HttpError;
use crate::state::AppState;

/// Status of every configured server.
pub async fn list(State(state): State<AppState>) -> Json<Vec<ServerStatus>> {
    Json(state.bridge.list_status())
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerStatus>, HttpError> {
    Ok(Json(state.bridge.server_status(&id)?))
}

pub async fn summary(State(state): State<AppState>) -> Json<StatusSummary> {
    Json(state.bridge.summary())
}

pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleOutcome>>, HttpError> {
    Ok(envelope(state.bridge.start_server(&id).await?))
}

pub async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleOutcome>>, HttpError> {
    Ok(envelope(state.bridge.stop_server(&id).await?))
}

pub async fn restart(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleOutcome>>, HttpError> {
    Ok(envelope(state.bridge.restart_server(&id).await?))
}

/// Rediscover a live server's tools.
pub async fn refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LifecycleOutcome>>, HttpError> {
    Ok(envelope(state.bridge.refresh_tools(&id).await?))
}

/// Lifecycle failures are reported in the envelope, not as HTTP errors.
fn envelope(outcome: LifecycleOutcome) -> Json<ApiResponse<LifecycleOutcome>> {
    if outcome.success {
        return Json(ApiResponse::ok(outcome));
    }
    let error = outcome
        .message
        .clone()
        .unwrap_or_else(|| format!("Server is {}", outcome.state));
    Json(ApiResponse::failed(outcome, error))
}
