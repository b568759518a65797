//! Tool catalog and invocation handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use olb_core::{InvocationRequest, InvocationResult, ToolEntry};
use serde::Deserialize;

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ToolsQuery {
    /// Only tools owned by this server.
    pub server: Option<String>,
}

/// Tools currently invocable, optionally for one server.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ToolsQuery>,
) -> Result<Json<Vec<ToolEntry>>, HttpError> {
    Ok(Json(state.bridge.list_tools(query.server.as_deref())?))
}

/// Tool detail (schema, category, actions) for one server.
pub async fn list_for_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ToolEntry>>, HttpError> {
    Ok(Json(state.bridge.list_tools(Some(&id))?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ToolEntry>, HttpError> {
    Ok(Json(state.bridge.get_tool(&name)?))
}

/// Invoke a tool. Always 200; failures are described in the result.
pub async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvocationRequest>,
) -> Json<InvocationResult> {
    Json(state.bridge.invoke(request).await)
}
