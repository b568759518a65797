//! Route definitions and router construction.
//!
//! Handlers delegate to the shared `BridgeService`.

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// All API routes, without the `/api` prefix.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::system::health))
        // Server configs
        .route(
            "/mcp/configs",
            get(handlers::configs::list).post(handlers::configs::add),
        )
        .route(
            "/mcp/configs/{id}",
            get(handlers::configs::get)
                .put(handlers::configs::update)
                .delete(handlers::configs::remove),
        )
        // Lifecycle and status
        .route("/mcp/servers", get(handlers::servers::list))
        .route("/mcp/servers/{id}", get(handlers::servers::get))
        .route("/mcp/servers/{id}/start", post(handlers::servers::start))
        .route("/mcp/servers/{id}/stop", post(handlers::servers::stop))
        .route("/mcp/servers/{id}/restart", post(handlers::servers::restart))
        .route("/mcp/servers/{id}/refresh", post(handlers::servers::refresh))
        .route("/mcp/servers/{id}/tools", get(handlers::tools::list_for_server))
        .route("/mcp/summary", get(handlers::servers::summary))
        // Tools
        .route("/mcp/tools", get(handlers::tools::list))
        .route("/mcp/tools/{name}", get(handlers::tools::get))
        .route("/mcp/invoke", post(handlers::tools::invoke))
        // Events (SSE)
        .route("/events", get(handlers::system::events))
        .route("/settings", get(handlers::system::settings))
}

/// Create the main Axum router.
///
/// Axum 0.8 uses brace syntax for path parameters: `{id}`, `{name}`.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    Router::new()
        .nest("/api", api_routes().with_state(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
