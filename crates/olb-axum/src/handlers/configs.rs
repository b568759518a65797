//! Server config handlers.

use axum::Json;
use axum::extract::{Path, State};
use olb_core::ServerConfig;

use crate::dto::ApiResponse;
use crate::error::HttpError;
use crate::state::AppState;

/// List all stored server configs.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ServerConfig>>, HttpError> {
    Ok(Json(state.bridge.list_configs().await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerConfig>, HttpError> {
    Ok(Json(state.bridge.get_config(&id).await?))
}

/// Add a server config. 409 on a duplicate id, 400 when invalid.
pub async fn add(
    State(state): State<AppState>,
    Json(config): Json<ServerConfig>,
) -> Result<Json<ApiResponse<ServerConfig>>, HttpError> {
    Ok(Json(ApiResponse::ok(state.bridge.add_config(config).await?)))
}

/// Replace a server config. The path id wins over the body.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<ServerConfig>,
) -> Result<Json<ApiResponse<ServerConfig>>, HttpError> {
    Ok(Json(ApiResponse::ok(
        state.bridge.update_config(&id, config).await?,
    )))
}

/// Delete a server config. 409 while the server is live.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, HttpError> {
    state.bridge.remove_config(&id).await?;
    Ok(Json(ApiResponse::empty()))
}
