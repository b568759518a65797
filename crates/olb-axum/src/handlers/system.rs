//! Bridge health, settings, and the event stream.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use olb_core::BridgeSettings;

use crate::dto::HealthInfo;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthInfo> {
    Json(HealthInfo {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        servers: state.bridge.summary(),
    })
}

/// Effective bridge settings (read-only).
pub async fn settings(State(state): State<AppState>) -> Json<BridgeSettings> {
    Json(state.bridge.settings().clone())
}

/// Lifecycle and catalog events as server-sent events.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    state.sse.clone().subscribe()
}
