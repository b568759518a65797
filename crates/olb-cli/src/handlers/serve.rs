//! Serve command handler.
//!
//! Boots the bridge, serves HTTP until Ctrl-C, then stops every supervised
//! server before returning.

use std::sync::Arc;

use anyhow::Result;
use olb_axum::HttpConfig;
use tracing::{info, warn};

use crate::bootstrap::CliContext;

/// Apply command-line overrides on top of the configured listener.
pub fn http_config(ctx: &CliContext, host: Option<String>, port: Option<u16>) -> HttpConfig {
    let mut config = HttpConfig::from_settings(&ctx.settings);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}

pub async fn execute(ctx: &CliContext, host: Option<String>, port: Option<u16>) -> Result<()> {
    let http = http_config(ctx, host, port);
    let app = olb_axum::bootstrap(&ctx.config_dir, ctx.settings.clone()).await?;
    let bridge = Arc::clone(&app.bridge);

    let summary = bridge.summary();
    info!(
        servers = summary.total,
        running = summary.running,
        tools = summary.tools,
        "bridge ready"
    );

    let served = olb_axum::start_server(app, http, shutdown_signal()).await;

    info!("stopping supervised servers");
    bridge.shutdown().await;
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use olb_core::BridgeSettings;
    use std::path::PathBuf;

    fn ctx() -> CliContext {
        CliContext {
            config_dir: PathBuf::from("/tmp/olb"),
            settings: BridgeSettings {
                host: "127.0.0.1".into(),
                port: 3001,
                ..BridgeSettings::default()
            },
        }
    }

    #[test]
    fn test_http_config_defaults_to_settings() {
        let config = http_config(&ctx(), None, None);
        assert_eq!(config.addr(), "127.0.0.1:3001");
    }

    #[test]
    fn test_http_config_overrides() {
        let config = http_config(&ctx(), Some("0.0.0.0".into()), Some(8080));
        assert_eq!(config.addr(), "0.0.0.0:8080");
    }
}
