//! Axum server bootstrap - the composition root for the HTTP adapter.
//!
//! Concrete stores and emitters are instantiated here and injected into the
//! bridge service.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use olb_core::paths::{ensure_dir, servers_file};
use olb_core::{AppEventEmitter, BridgeSettings, JsonServerStore, ServerConfigRepository};
use olb_mcp::BridgeService;
use tokio::net::TcpListener;
use tracing::info;

use crate::sse::SseBroadcaster;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins.
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

/// Listener configuration for the HTTP surface.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

impl HttpConfig {
    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            cors: CorsConfig::default(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Services the HTTP handlers use.
pub struct AxumContext {
    pub bridge: Arc<BridgeService>,
    pub sse: Arc<SseBroadcaster>,
}

impl AxumContext {
    /// Wire a context around any config repository. Nothing is started.
    pub fn new(repository: Arc<dyn ServerConfigRepository>, settings: BridgeSettings) -> Self {
        let sse = Arc::new(SseBroadcaster::default());
        let bridge = Arc::new(BridgeService::new(
            repository,
            Arc::clone(&sse) as Arc<dyn AppEventEmitter>,
            settings,
        ));
        Self { bridge, sse }
    }
}

/// Build the context from a config directory and auto-start servers.
pub async fn bootstrap(config_dir: &Path, settings: BridgeSettings) -> Result<AxumContext> {
    ensure_dir(config_dir)?;
    let servers_path = servers_file(config_dir);
    info!(
        config_dir = %config_dir.display(),
        servers_file = %servers_path.display(),
        "bootstrapping bridge"
    );

    let ctx = AxumContext::new(Arc::new(JsonServerStore::new(servers_path)), settings);
    ctx.bridge.initialize().await?;
    Ok(ctx)
}

/// Serve the control surface until `shutdown` resolves.
///
/// Supervised servers are not stopped here; the caller owns that.
pub async fn start_server(
    ctx: AxumContext,
    config: HttpConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = crate::routes::create_router(ctx, &config.cors);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("office local bridge listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
