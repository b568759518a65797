//! Shared helpers for the olb-mcp integration tests.
//!
//! Every test drives real `olb-echo-server` child processes.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use olb_core::{
    AppEvent, AppEventEmitter, BridgeSettings, BroadcastEmitter, MemoryServerStore, NoopEmitter,
    ServerConfig,
};
use olb_mcp::BridgeService;
use tokio::sync::broadcast;

/// Path of the reference tool-server built alongside these tests.
pub const ECHO_SERVER: &str = env!("CARGO_BIN_EXE_olb-echo-server");

/// Timings short enough for tests, long enough for a loaded CI box.
pub fn fast_settings() -> BridgeSettings {
    BridgeSettings {
        startup_timeout_ms: 10_000,
        discovery_timeout_ms: 5_000,
        invocation_timeout_ms: 5_000,
        health_interval_ms: 100,
        ping_timeout_ms: 500,
        stop_grace_ms: 1_000,
        backoff_base_ms: 50,
        backoff_cap_ms: 200,
        restart_window_ms: 60_000,
        max_restarts_per_window: 3,
        ..BridgeSettings::default()
    }
}

pub fn echo_config(id: &str) -> ServerConfig {
    ServerConfig::new(id, format!("Echo {id}"), ECHO_SERVER).with_env("OLB_ECHO_LOG", "warn")
}

pub fn service(settings: BridgeSettings, configs: Vec<ServerConfig>) -> BridgeService {
    service_with_emitter(settings, configs, Arc::new(NoopEmitter::new()))
}

pub fn service_with_emitter(
    settings: BridgeSettings,
    configs: Vec<ServerConfig>,
    emitter: Arc<dyn AppEventEmitter>,
) -> BridgeService {
    BridgeService::new(
        Arc::new(MemoryServerStore::with_servers(configs)),
        emitter,
        settings,
    )
}

pub fn emitter() -> (Arc<BroadcastEmitter>, broadcast::Receiver<AppEvent>) {
    let emitter = Arc::new(BroadcastEmitter::new(1024));
    let rx = emitter.subscribe();
    (emitter, rx)
}

/// Poll `check` until it holds or `limit` elapses.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Receive events until `stop` matches one, returning everything seen.
pub async fn collect_until(
    rx: &mut broadcast::Receiver<AppEvent>,
    limit: Duration,
    stop: impl Fn(&AppEvent) -> bool,
) -> Vec<AppEvent> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(limit, async {
        while let Ok(event) = rx.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}
