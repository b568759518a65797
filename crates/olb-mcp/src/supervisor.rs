//! Lifecycle supervisor for one tool-server.
//!
//! Every lifecycle transition runs under one async mutex, so concurrent
//! start/stop/restart requests and health-driven crashes are serialized and
//! at most one process exists per server. Observers never touch that lock:
//! they read the latest [`ServerSnapshot`] from a watch channel.
//!
//! Each launched instance gets a new generation number. Health reports,
//! discovery results, and restart timers carry the generation they were
//! created for and are ignored once it is stale.

use std::pin::pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use olb_core::{
    AppEvent, AppEventEmitter, BridgeSettings, ErrorKind, ServerConfig, ServerSnapshot,
    ServerState, ToolEntry,
};
use olb_runtime::{ProcessError, ProcessHandle, ProcessProbe};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore, mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::ToolCatalog;
use crate::client::{ServerNotification, ToolServerClient};
use crate::discovery::{DiscoveryError, DiscoveryGate, discover};
use crate::health::{HealthChecker, HealthMonitor, HealthReport};
use crate::policy::{RestartDecision, RestartPolicy, RestartTracker};
use crate::protocol::METHOD_TOOLS_LIST_CHANGED;

/// Collaborators shared by every supervisor.
#[derive(Clone)]
pub struct SupervisorContext {
    pub catalog: Arc<ToolCatalog>,
    pub emitter: Arc<dyn AppEventEmitter>,
    pub settings: Arc<BridgeSettings>,
    pub probe: Arc<ProcessProbe>,
}

impl SupervisorContext {
    pub fn new(
        catalog: Arc<ToolCatalog>,
        emitter: Arc<dyn AppEventEmitter>,
        settings: Arc<BridgeSettings>,
    ) -> Self {
        Self {
            catalog,
            emitter,
            settings,
            probe: Arc::new(ProcessProbe::new()),
        }
    }
}

impl std::fmt::Debug for SupervisorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorContext")
            .field("catalog_version", &self.catalog.version())
            .finish_non_exhaustive()
    }
}

/// Result of a lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleOutcome {
    pub success: bool,
    /// State after the command finished.
    pub state: ServerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LifecycleOutcome {
    const fn ok(state: ServerState) -> Self {
        Self {
            success: true,
            state,
            error_kind: None,
            message: None,
        }
    }

    fn failed(state: ServerState, failure: Failure) -> Self {
        Self {
            success: false,
            state,
            error_kind: Some(failure.kind),
            message: Some(failure.message),
        }
    }
}

#[derive(Debug, Clone)]
struct Failure {
    kind: ErrorKind,
    message: String,
}

impl Failure {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Attach the process's last stderr line, if it said anything.
    fn with_stderr(mut self, process: &ProcessHandle) -> Self {
        if let Some(line) = process.last_stderr_line() {
            self.message = format!("{} (stderr: {line})", self.message);
        }
        self
    }
}

/// A process that passed handshake and discovery.
struct Ready {
    process: Arc<ProcessHandle>,
    client: Arc<ToolServerClient>,
    gate: Arc<DiscoveryGate>,
    tools: Vec<ToolEntry>,
}

struct Instance {
    process: Arc<ProcessHandle>,
    client: Arc<ToolServerClient>,
    gate: Arc<DiscoveryGate>,
    monitor: CancellationToken,
    /// Consecutive unhealthy polls.
    failures: u32,
    /// Last discovery failed; entries may be out of date.
    stale_catalog: bool,
}

struct Lifecycle {
    generation: u64,
    instance: Option<Instance>,
    restarts: RestartTracker,
    pending_restart: Option<CancellationToken>,
    /// Set while the config is being deleted. Blocks every launch.
    retired: bool,
}

/// Owns the process, state, and catalog slice of one configured server.
pub struct Supervisor {
    id: String,
    ctx: SupervisorContext,
    config: RwLock<ServerConfig>,
    lifecycle: Mutex<Lifecycle>,
    snapshot: watch::Sender<ServerSnapshot>,
    /// Set only while an instance is live.
    connection: RwLock<Option<Arc<ToolServerClient>>>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(config: ServerConfig, ctx: SupervisorContext) -> Arc<Self> {
        let (snapshot, _) = watch::channel(ServerSnapshot::stopped(&config.id, &config.name));
        let policy = RestartPolicy::from_settings(&ctx.settings);
        let permits = Arc::new(Semaphore::new(ctx.settings.max_concurrent_invocations.max(1)));
        Arc::new(Self {
            id: config.id.clone(),
            config: RwLock::new(config),
            lifecycle: Mutex::new(Lifecycle {
                generation: 0,
                instance: None,
                restarts: RestartTracker::new(policy),
                pending_restart: None,
                retired: false,
            }),
            snapshot,
            connection: RwLock::new(None),
            permits,
            ctx,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> ServerConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the launch spec. Takes effect on the next launch.
    pub fn set_config(&self, config: ServerConfig) {
        let name = config.name.clone();
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        self.snapshot.send_modify(|s| s.name = name);
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> ServerState {
        self.snapshot.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerSnapshot> {
        self.snapshot.subscribe()
    }

    /// Protocol client of the live instance, only while `running`.
    pub fn connection(&self) -> Option<Arc<ToolServerClient>> {
        if !self.state().accepts_invocations() {
            return None;
        }
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bounds concurrent invocations against this server.
    pub fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    /// Launch the server unless it is already up.
    ///
    /// A manual start from `stopped` or `crashed` resets the restart counter
    /// and backoff history.
    pub async fn start(self: &Arc<Self>) -> LifecycleOutcome {
        let mut lc = self.lifecycle.lock().await;
        let state = self.state();
        if matches!(
            state,
            ServerState::Starting | ServerState::Running | ServerState::Degraded
        ) {
            debug!(server_id = %self.id, %state, "start ignored; already up");
            return LifecycleOutcome::ok(state);
        }
        if let Err(failure) = self.check_launchable(&lc) {
            return LifecycleOutcome::failed(state, failure);
        }

        if let Some(timer) = lc.pending_restart.take() {
            timer.cancel();
        }
        lc.restarts.reset();
        self.snapshot.send_modify(|s| {
            s.runtime.restart_count = 0;
            s.runtime.last_error = None;
            s.terminal = false;
        });
        info!(server_id = %self.id, "starting tool-server");
        self.launch(&mut lc).await
    }

    /// Stop the server. Always ends in `stopped`.
    ///
    /// Waits for an in-progress start to finish first. Pending automatic
    /// restarts are cancelled.
    pub async fn stop(&self) -> LifecycleOutcome {
        let mut lc = self.lifecycle.lock().await;
        self.stop_locked(&mut lc).await;
        LifecycleOutcome::ok(ServerState::Stopped)
    }

    /// Stop then start, counting as a restart without resetting history.
    pub async fn restart(self: &Arc<Self>) -> LifecycleOutcome {
        let mut lc = self.lifecycle.lock().await;
        if let Err(failure) = self.check_launchable(&lc) {
            return LifecycleOutcome::failed(self.state(), failure);
        }
        self.stop_locked(&mut lc).await;
        lc.restarts.record_manual(Instant::now());
        self.snapshot.send_modify(|s| {
            s.runtime.restart_count = s.runtime.restart_count.saturating_add(1);
            s.terminal = false;
        });
        info!(server_id = %self.id, "restarting tool-server");
        self.launch(&mut lc).await
    }

    /// Rediscover tools now.
    pub async fn refresh_tools(self: &Arc<Self>) -> LifecycleOutcome {
        let generation = {
            let lc = self.lifecycle.lock().await;
            if lc.instance.is_none() {
                let state = self.state();
                return LifecycleOutcome::failed(
                    state,
                    Failure::new(ErrorKind::ServerUnavailable, format!("Server is {state}")),
                );
            }
            lc.generation
        };
        match self.rediscover(generation).await {
            Ok(_) => LifecycleOutcome::ok(self.state()),
            Err(failure) => LifecycleOutcome::failed(self.state(), failure),
        }
    }

    /// Block further launches ahead of deleting the config.
    ///
    /// Refused with the current state while the server is live. Otherwise
    /// any pending automatic restart is dropped and every later start or
    /// restart fails until [`Supervisor::reinstate`].
    pub async fn retire(&self) -> Result<(), ServerState> {
        let mut lc = self.lifecycle.lock().await;
        let state = self.state();
        if state.is_live() {
            return Err(state);
        }
        lc.retired = true;
        self.stop_locked(&mut lc).await;
        debug!(server_id = %self.id, "supervisor retired");
        Ok(())
    }

    /// Undo [`Supervisor::retire`].
    pub async fn reinstate(&self) {
        self.lifecycle.lock().await.retired = false;
    }

    fn check_launchable(&self, lc: &Lifecycle) -> Result<(), Failure> {
        if lc.retired {
            return Err(Failure::new(
                ErrorKind::ServerUnavailable,
                format!("Server '{}' is being removed", self.id),
            ));
        }
        if self.config().enabled {
            Ok(())
        } else {
            Err(Failure::new(
                ErrorKind::ConfigInvalid,
                format!("Server '{}' is disabled", self.id),
            ))
        }
    }

    async fn stop_locked(&self, lc: &mut Lifecycle) {
        if let Some(timer) = lc.pending_restart.take() {
            timer.cancel();
        }
        lc.generation += 1;

        if let Some(instance) = lc.instance.take() {
            self.transition(ServerState::Stopping, |_| {});
            instance.monitor.cancel();
            self.set_connection(None);
            self.unpublish_tools();
            let exit = instance.process.shutdown(self.ctx.settings.stop_grace()).await;
            info!(server_id = %self.id, %exit, "tool-server stopped");
        }

        self.transition(ServerState::Stopped, |s| {
            s.runtime.clear_process();
            s.tool_count = 0;
            s.usage = None;
            s.terminal = false;
        });
    }

    async fn launch(self: &Arc<Self>, lc: &mut Lifecycle) -> LifecycleOutcome {
        let config = self.config();
        lc.generation += 1;
        let generation = lc.generation;
        self.transition(ServerState::Starting, |s| {
            s.runtime.clear_process();
            s.tool_count = 0;
            s.usage = None;
        });

        let limit = self.ctx.settings.startup_timeout();
        let attempt = match timeout(limit, self.bring_up(&config)).await {
            Ok(result) => result,
            // Dropping the half-started process kills it.
            Err(_) => Err(Failure::new(
                ErrorKind::StartupTimeout,
                format!("Not ready within {}ms", limit.as_millis()),
            )),
        };

        match attempt {
            Ok(ready) => {
                self.go_live(lc, generation, ready);
                LifecycleOutcome::ok(ServerState::Running)
            }
            Err(failure) => {
                warn!(
                    server_id = %self.id,
                    kind = %failure.kind,
                    error = %failure.message,
                    "tool-server failed to start"
                );
                self.fail(lc, failure.clone());
                LifecycleOutcome::failed(self.state(), failure)
            }
        }
    }

    /// Spawn, handshake, and discover. Bounded by the caller's startup timeout.
    async fn bring_up(&self, config: &ServerConfig) -> Result<Ready, Failure> {
        let (process, io) = ProcessHandle::spawn(config).map_err(|e| match e {
            ProcessError::Config(e) => Failure::new(ErrorKind::ConfigInvalid, e.to_string()),
            other => Failure::new(ErrorKind::ProcessCrashed, other.to_string()),
        })?;
        let process = Arc::new(process);
        self.snapshot.send_modify(|s| {
            s.runtime.pid = process.pid();
            s.runtime.started_at = Some(process.started_at());
        });

        let client = Arc::new(ToolServerClient::from_process(&self.id, io));
        client.initialize().await.map_err(|e| {
            Failure::new(ErrorKind::ProcessCrashed, format!("Handshake failed: {e}"))
                .with_stderr(&process)
        })?;

        let gate = Arc::new(DiscoveryGate::default());
        let tools = discover(
            &client,
            &gate,
            self.ctx.settings.tool_naming,
            self.ctx.settings.discovery_timeout(),
        )
        .await
        .map_err(|e| {
            let kind = match e {
                DiscoveryError::Timeout(_) => ErrorKind::StartupTimeout,
                _ => ErrorKind::DiscoveryFailed,
            };
            Failure::new(kind, e.to_string()).with_stderr(&process)
        })?;

        Ok(Ready {
            process,
            client,
            gate,
            tools,
        })
    }

    fn go_live(self: &Arc<Self>, lc: &mut Lifecycle, generation: u64, ready: Ready) {
        let Ready {
            process,
            client,
            gate,
            tools,
        } = ready;
        let tool_count = self.publish_tools(tools);
        self.set_connection(Some(Arc::clone(&client)));

        let monitor = CancellationToken::new();
        let settings = &self.ctx.settings;
        let checker = HealthChecker::new(Arc::clone(&self.ctx.probe), settings.ping_timeout());
        let reports = HealthMonitor::new(checker, settings.health_interval(), monitor.clone())
            .monitor(Arc::clone(&process), Arc::clone(&client));
        let notifications = client.take_notifications();
        tokio::spawn(Arc::clone(self).watch(generation, reports, notifications));

        let last_activity = client.last_activity();
        self.transition(ServerState::Running, |s| {
            s.tool_count = tool_count;
            s.runtime.last_activity_at = last_activity;
        });
        info!(server_id = %self.id, pid = ?process.pid(), tool_count, "tool-server running");

        lc.instance = Some(Instance {
            process,
            client,
            gate,
            monitor,
            failures: 0,
            stale_catalog: false,
        });
    }

    /// Drive one instance from its health reports and server notifications.
    async fn watch(
        self: Arc<Self>,
        generation: u64,
        reports: impl Stream<Item = HealthReport>,
        mut notifications: Option<mpsc::UnboundedReceiver<ServerNotification>>,
    ) {
        let mut reports = pin!(reports);
        loop {
            let keep_going = tokio::select! {
                report = reports.next() => match report {
                    Some(report) => self.on_health(generation, report).await,
                    None => false,
                },
                Some(note) = next_notification(&mut notifications) => {
                    if note.method == METHOD_TOOLS_LIST_CHANGED {
                        debug!(server_id = %self.id, "tool list changed, rediscovering");
                        let _ = self.rediscover(generation).await;
                    }
                    true
                }
            };
            if !keep_going {
                break;
            }
        }
        debug!(server_id = %self.id, generation, "instance watcher exiting");
    }

    /// Apply one health report. Returns false once the instance is gone.
    async fn on_health(self: &Arc<Self>, generation: u64, report: HealthReport) -> bool {
        let mut lc = self.lifecycle.lock().await;
        if lc.generation != generation {
            return false;
        }
        let Some(instance) = lc.instance.as_mut() else {
            return false;
        };
        self.snapshot.send_modify(|s| {
            s.runtime.last_activity_at = report.last_activity;
            s.usage = report.usage;
        });

        if report.is_healthy() {
            instance.failures = 0;
            let stale = instance.stale_catalog;
            if self.state() == ServerState::Degraded {
                if stale {
                    drop(lc);
                    let _ = self.rediscover(generation).await;
                } else {
                    info!(server_id = %self.id, "tool-server recovered");
                    self.transition(ServerState::Running, |_| {});
                }
            }
            return true;
        }

        instance.failures += 1;
        let failures = instance.failures;
        let reason = report.describe();
        debug!(server_id = %self.id, failures, reason = %reason, "health check failed");

        if failures >= self.ctx.settings.crashed_after_failures {
            let failure =
                Failure::new(ErrorKind::ProcessCrashed, reason).with_stderr(&instance.process);
            self.crash(&mut lc, failure).await;
            return false;
        }
        if failures >= self.ctx.settings.degraded_after_failures
            && self.state() == ServerState::Running
        {
            warn!(server_id = %self.id, failures, reason = %reason, "tool-server degraded");
            self.transition(ServerState::Degraded, |s| {
                s.runtime.last_error = Some(reason);
            });
        }
        true
    }

    /// Refresh this instance's catalog slice. On failure the server is
    /// degraded and the next healthy tick retries.
    async fn rediscover(self: &Arc<Self>, generation: u64) -> Result<usize, Failure> {
        let stale = || Failure::new(ErrorKind::ServerUnavailable, "Server instance was replaced");
        let (client, gate) = {
            let lc = self.lifecycle.lock().await;
            match lc.instance.as_ref() {
                Some(i) if lc.generation == generation => {
                    (Arc::clone(&i.client), Arc::clone(&i.gate))
                }
                _ => return Err(stale()),
            }
        };

        let settings = &self.ctx.settings;
        let result = discover(
            &client,
            &gate,
            settings.tool_naming,
            settings.discovery_timeout(),
        )
        .await;

        let mut lc = self.lifecycle.lock().await;
        if lc.generation != generation {
            return Err(stale());
        }
        let Some(instance) = lc.instance.as_mut() else {
            return Err(stale());
        };

        match result {
            Ok(tools) => {
                let tool_count = self.publish_tools(tools);
                instance.stale_catalog = false;
                let recovered = instance.failures == 0;
                self.snapshot.send_modify(|s| s.tool_count = tool_count);
                if recovered && self.state() == ServerState::Degraded {
                    info!(server_id = %self.id, tool_count, "tool-server recovered after rediscovery");
                    self.transition(ServerState::Running, |_| {});
                }
                Ok(tool_count)
            }
            Err(DiscoveryError::InProgress) => Ok(self.snapshot.borrow().tool_count),
            Err(e) => {
                instance.stale_catalog = true;
                let failure = Failure::new(ErrorKind::DiscoveryFailed, e.to_string());
                warn!(server_id = %self.id, error = %e, "tool discovery failed; will retry");
                if self.state() == ServerState::Running {
                    let message = format!("{}: {}", failure.kind, failure.message);
                    self.transition(ServerState::Degraded, |s| {
                        s.runtime.last_error = Some(message);
                    });
                }
                Err(failure)
            }
        }
    }

    /// Tear down a failed instance and hand it to the restart policy.
    async fn crash(self: &Arc<Self>, lc: &mut Lifecycle, failure: Failure) {
        lc.generation += 1;
        if let Some(instance) = lc.instance.take() {
            instance.monitor.cancel();
            self.set_connection(None);
            self.unpublish_tools();
            let exit = instance.process.shutdown(self.ctx.settings.stop_grace()).await;
            debug!(server_id = %self.id, %exit, "crashed instance reaped");
        }
        warn!(server_id = %self.id, error = %failure.message, "tool-server crashed");
        self.fail(lc, failure);
    }

    /// Enter `crashed` and schedule a restart unless policy forbids it.
    fn fail(self: &Arc<Self>, lc: &mut Lifecycle, failure: Failure) {
        let kind = failure.kind;
        let message = format!("{}: {}", failure.kind, failure.message);
        self.transition(ServerState::Crashed, |s| {
            s.runtime.clear_process();
            s.runtime.last_error = Some(message);
            s.tool_count = 0;
            s.usage = None;
        });

        if kind == ErrorKind::ConfigInvalid {
            error!(server_id = %self.id, "invalid configuration; not restarting");
            self.snapshot.send_modify(|s| s.terminal = true);
            return;
        }
        self.schedule_restart(lc);
    }

    fn schedule_restart(self: &Arc<Self>, lc: &mut Lifecycle) {
        match lc.restarts.on_crash(Instant::now()) {
            RestartDecision::Retry { attempt, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(server_id = %self.id, attempt, delay_ms, "restart scheduled");
                self.ctx
                    .emitter
                    .emit(AppEvent::restart_scheduled(&self.id, attempt, delay_ms));

                let timer = CancellationToken::new();
                if let Some(previous) = lc.pending_restart.replace(timer.clone()) {
                    previous.cancel();
                }
                let this = Arc::clone(self);
                let generation = lc.generation;
                tokio::spawn(async move {
                    tokio::select! {
                        () = timer.cancelled() => {}
                        () = tokio::time::sleep(delay) => this.auto_restart(generation, attempt).await,
                    }
                });
            }
            RestartDecision::Exhausted { restarts } => {
                error!(
                    server_id = %self.id,
                    restarts,
                    "restart limit reached; server stays crashed until started manually"
                );
                self.snapshot.send_modify(|s| s.terminal = true);
                self.ctx
                    .emitter
                    .emit(AppEvent::restart_exhausted(&self.id, restarts));
            }
        }
    }

    async fn auto_restart(self: Arc<Self>, generation: u64, attempt: u32) {
        let mut lc = self.lifecycle.lock().await;
        if lc.generation != generation || self.state() != ServerState::Crashed {
            debug!(server_id = %self.id, "stale restart timer ignored");
            return;
        }
        lc.pending_restart = None;
        warn!(server_id = %self.id, attempt, "automatic restart attempt");
        self.snapshot.send_modify(|s| {
            s.runtime.restart_count = s.runtime.restart_count.saturating_add(1);
        });
        let _ = self.launch(&mut lc).await;
    }

    fn publish_tools(&self, tools: Vec<ToolEntry>) -> usize {
        let update = self.ctx.catalog.replace_server(&self.id, tools);
        for collision in &update.collisions {
            warn!(
                tool = %collision.tool,
                previous_server_id = %collision.previous_server_id,
                server_id = %self.id,
                "tool name collision; latest discovery wins"
            );
            self.ctx.emitter.emit(AppEvent::tool_name_collision(
                &collision.tool,
                &collision.previous_server_id,
                &self.id,
            ));
        }
        self.ctx.emitter.emit(AppEvent::catalog_updated(
            &self.id,
            update.version,
            update.tool_count,
        ));
        update.tool_count
    }

    fn unpublish_tools(&self) {
        if let Some(update) = self.ctx.catalog.remove_server(&self.id) {
            self.ctx
                .emitter
                .emit(AppEvent::catalog_updated(&self.id, update.version, 0));
        }
    }

    fn set_connection(&self, client: Option<Arc<ToolServerClient>>) {
        *self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = client;
    }

    fn transition(&self, to: ServerState, update: impl FnOnce(&mut ServerSnapshot)) {
        let mut from = to;
        self.snapshot.send_modify(|s| {
            from = s.state;
            s.state = to;
            update(s);
        });
        if from != to {
            info!(server_id = %self.id, %from, %to, "server state changed");
            self.ctx
                .emitter
                .emit(AppEvent::state_changed(&self.id, from, to));
        }
    }
}

async fn next_notification(
    rx: &mut Option<mpsc::UnboundedReceiver<ServerNotification>>,
) -> Option<ServerNotification> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olb_core::{BroadcastEmitter, NoopEmitter};
    use std::time::Duration;

    fn settings() -> BridgeSettings {
        BridgeSettings {
            startup_timeout_ms: 300,
            discovery_timeout_ms: 200,
            health_interval_ms: 50,
            ping_timeout_ms: 50,
            stop_grace_ms: 200,
            backoff_base_ms: 20,
            backoff_cap_ms: 40,
            max_restarts_per_window: 2,
            ..BridgeSettings::default()
        }
    }

    fn context(settings: BridgeSettings, emitter: Arc<dyn AppEventEmitter>) -> SupervisorContext {
        SupervisorContext::new(Arc::new(ToolCatalog::new()), emitter, Arc::new(settings))
    }

    async fn wait_for(supervisor: &Supervisor, want: impl Fn(&ServerSnapshot) -> bool) -> ServerSnapshot {
        let mut rx = supervisor.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| want(s)))
            .await
            .expect("condition not reached in time")
            .unwrap()
            .clone();
        snapshot
    }

    #[tokio::test]
    async fn test_invalid_config_is_terminal() {
        let config = ServerConfig::new("bad", "Bad", "no-such-binary-for-olb-tests");
        let supervisor = Supervisor::new(config, context(settings(), Arc::new(NoopEmitter::new())));

        let outcome = supervisor.start().await;
        assert!(!outcome.success);
        assert_eq!(outcome.state, ServerState::Crashed);
        assert_eq!(outcome.error_kind, Some(ErrorKind::ConfigInvalid));

        let snapshot = supervisor.snapshot();
        assert!(snapshot.terminal);
        assert!(snapshot.runtime.pid.is_none());

        // No restart is ever scheduled.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(supervisor.snapshot().runtime.restart_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_server_is_not_started() {
        let config = ServerConfig::new("off", "Off", "sh").with_enabled(false);
        let supervisor = Supervisor::new(config, context(settings(), Arc::new(NoopEmitter::new())));
        let outcome = supervisor.start().await;
        assert!(!outcome.success);
        assert_eq!(outcome.state, ServerState::Stopped);
        assert_eq!(outcome.error_kind, Some(ErrorKind::ConfigInvalid));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_silent_process_times_out_and_exhausts_restarts() {
        let emitter = BroadcastEmitter::new(64);
        let mut events = emitter.subscribe();
        let config = ServerConfig::new("mute", "Mute", "sleep").with_args(["30"]);
        let supervisor = Supervisor::new(config, context(settings(), Arc::new(emitter)));

        let outcome = supervisor.start().await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::StartupTimeout));
        assert_eq!(outcome.state, ServerState::Crashed);

        let snapshot = wait_for(&supervisor, |s| s.terminal).await;
        assert_eq!(snapshot.state, ServerState::Crashed);
        assert_eq!(snapshot.runtime.restart_count, 2);
        assert!(snapshot
            .runtime
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("StartupTimeout")));

        let mut scheduled = 0;
        let mut exhausted = false;
        while let Ok(event) = events.try_recv() {
            match event {
                AppEvent::ServerRestartScheduled { .. } => scheduled += 1,
                AppEvent::ServerRestartExhausted { restarts, .. } => {
                    exhausted = true;
                    assert_eq!(restarts, 2);
                }
                _ => {}
            }
        }
        assert_eq!(scheduled, 2);
        assert!(exhausted);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_handshake_crash_then_stop_cancels_restart() {
        let config = ServerConfig::new("dies", "Dies", "sh")
            .with_args(["-c", "echo 'missing office runtime' >&2; exit 1"]);
        let supervisor = Supervisor::new(config, context(settings(), Arc::new(NoopEmitter::new())));

        let outcome = supervisor.start().await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::ProcessCrashed));
        assert_eq!(outcome.state, ServerState::Crashed);

        // A manual stop cancels the pending automatic restart.
        let stopped = supervisor.stop().await;
        assert_eq!(stopped.state, ServerState::Stopped);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(supervisor.state(), ServerState::Stopped);
        assert_eq!(supervisor.snapshot().runtime.restart_count, 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let config = ServerConfig::new("idle", "Idle", "sh");
        let supervisor = Supervisor::new(config, context(settings(), Arc::new(NoopEmitter::new())));
        assert_eq!(supervisor.stop().await, LifecycleOutcome::ok(ServerState::Stopped));
        assert_eq!(supervisor.stop().await.state, ServerState::Stopped);
        assert!(supervisor.connection().is_none());
    }

    #[tokio::test]
    async fn test_refresh_requires_live_instance() {
        let config = ServerConfig::new("idle", "Idle", "sh");
        let supervisor = Supervisor::new(config, context(settings(), Arc::new(NoopEmitter::new())));
        let outcome = supervisor.refresh_tools().await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::ServerUnavailable));
    }

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = LifecycleOutcome::failed(
            ServerState::Crashed,
            Failure::new(ErrorKind::StartupTimeout, "slow"),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["state"], "crashed");
        assert_eq!(json["errorKind"], "StartupTimeout");
        assert_eq!(json["message"], "slow");
    }
}
