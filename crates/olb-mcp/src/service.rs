//! High-level bridge service.
//!
//! This is the API the HTTP surface and the CLI use. It owns the catalog,
//! the supervisor registry, the dispatcher, and the status aggregator, and
//! takes the config repository and event emitter by injection.

use std::sync::Arc;

use futures_util::future::join_all;
use olb_core::{
    AppEvent, AppEventEmitter, BridgeSettings, ConfigError, InvocationRequest, InvocationResult,
    RepositoryError, ServerConfig, ServerConfigRepository, ServerState, ToolEntry,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::ToolCatalog;
use crate::dispatcher::Dispatcher;
use crate::registry::{SnapshotSource, SupervisorRegistry};
use crate::status::{ServerStatus, StatusAggregator, StatusSummary};
use crate::supervisor::{LifecycleOutcome, Supervisor, SupervisorContext};

/// Errors from service operations. Invocation failures are not errors; they
/// come back as [`InvocationResult`]s.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Invalid server config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The operation needs the server stopped first.
    #[error("Server '{id}' is {state}; stop it first")]
    ServerBusy { id: String, state: ServerState },
}

pub struct BridgeService {
    repository: Arc<dyn ServerConfigRepository>,
    emitter: Arc<dyn AppEventEmitter>,
    settings: Arc<BridgeSettings>,
    catalog: Arc<ToolCatalog>,
    registry: Arc<SupervisorRegistry>,
    dispatcher: Dispatcher,
    status: StatusAggregator,
}

impl BridgeService {
    /// Create a new bridge service with injected dependencies.
    pub fn new(
        repository: Arc<dyn ServerConfigRepository>,
        emitter: Arc<dyn AppEventEmitter>,
        settings: BridgeSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        let catalog = Arc::new(ToolCatalog::new());
        let registry = Arc::new(SupervisorRegistry::new(SupervisorContext::new(
            Arc::clone(&catalog),
            Arc::clone(&emitter),
            Arc::clone(&settings),
        )));
        let dispatcher = Dispatcher::new(
            Arc::clone(&catalog),
            Arc::clone(&registry),
            settings.invocation_timeout(),
        );
        let status = StatusAggregator::new(
            Arc::clone(&registry) as Arc<dyn SnapshotSource>,
            Arc::clone(&catalog),
        );
        Self {
            repository,
            emitter,
            settings,
            catalog,
            registry,
            dispatcher,
            status,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Load every stored config and start the `enabled && autoStart` ones
    /// concurrently. Start failures are logged, never fatal.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let configs = self.repository.list().await?;
        let mut auto_start = Vec::new();
        for config in configs {
            let wants_start = config.enabled && config.auto_start;
            let supervisor = self.registry.upsert(config);
            if wants_start {
                auto_start.push(supervisor);
            }
        }
        info!(
            servers = self.registry.len(),
            auto_start = auto_start.len(),
            "bridge service initialized"
        );

        let outcomes = join_all(auto_start.iter().map(|s| s.start())).await;
        for (supervisor, outcome) in auto_start.iter().zip(outcomes) {
            if !outcome.success {
                warn!(
                    server_id = %supervisor.id(),
                    error = ?outcome.message,
                    "failed to auto-start tool-server"
                );
            }
        }
        Ok(())
    }

    // =========================================================================
    // Config operations
    // =========================================================================

    pub async fn list_configs(&self) -> Result<Vec<ServerConfig>, ServiceError> {
        Ok(self.repository.list().await?)
    }

    pub async fn get_config(&self, id: &str) -> Result<ServerConfig, ServiceError> {
        self.repository.get(id).await.map_err(not_found(id))
    }

    pub async fn add_config(&self, config: ServerConfig) -> Result<ServerConfig, ServiceError> {
        olb_runtime::resolve_command(&config)?;
        let config = self.repository.insert(config).await?;
        self.registry.upsert(config.clone());
        self.emitter.emit(AppEvent::config_added(&config.id));
        info!(server_id = %config.id, "server config added");
        Ok(config)
    }

    /// Replace a config. The path id wins over any id in the body. A live
    /// server keeps running on its old config until restarted.
    pub async fn update_config(
        &self,
        id: &str,
        mut config: ServerConfig,
    ) -> Result<ServerConfig, ServiceError> {
        config.id = id.to_string();
        olb_runtime::resolve_command(&config)?;
        let config = self.repository.update(config).await.map_err(not_found(id))?;
        self.registry.upsert(config.clone());
        self.emitter.emit(AppEvent::config_updated(id));
        info!(server_id = %id, "server config updated");
        Ok(config)
    }

    /// Delete a config. Rejected while the server is live.
    ///
    /// The supervisor is retired and unregistered before the row goes, so a
    /// concurrent start either finishes first (and this call reports busy)
    /// or fails. A failed delete puts the supervisor back.
    pub async fn remove_config(&self, id: &str) -> Result<(), ServiceError> {
        let retired = match self.registry.get(id) {
            Some(supervisor) => {
                supervisor
                    .retire()
                    .await
                    .map_err(|state| ServiceError::ServerBusy {
                        id: id.to_string(),
                        state,
                    })?;
                self.registry.remove(id);
                Some(supervisor)
            }
            None => None,
        };

        if let Err(e) = self.repository.delete(id).await {
            if let Some(supervisor) = retired {
                supervisor.reinstate().await;
                self.registry.insert(supervisor);
                warn!(server_id = %id, error = %e, "config delete failed; server kept");
            }
            return Err(not_found(id)(e));
        }
        self.emitter.emit(AppEvent::config_removed(id));
        info!(server_id = %id, "server config removed");
        Ok(())
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    pub async fn start_server(&self, id: &str) -> Result<LifecycleOutcome, ServiceError> {
        Ok(self.supervisor(id)?.start().await)
    }

    pub async fn stop_server(&self, id: &str) -> Result<LifecycleOutcome, ServiceError> {
        Ok(self.supervisor(id)?.stop().await)
    }

    pub async fn restart_server(&self, id: &str) -> Result<LifecycleOutcome, ServiceError> {
        Ok(self.supervisor(id)?.restart().await)
    }

    /// Rediscover a live server's tools.
    pub async fn refresh_tools(&self, id: &str) -> Result<LifecycleOutcome, ServiceError> {
        Ok(self.supervisor(id)?.refresh_tools().await)
    }

    /// Stop every server concurrently.
    pub async fn shutdown(&self) {
        let supervisors = self.registry.all();
        info!(count = supervisors.len(), "stopping all tool-servers");
        join_all(supervisors.iter().map(|s| s.stop())).await;
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn list_status(&self) -> Vec<ServerStatus> {
        self.status.all()
    }

    pub fn server_status(&self, id: &str) -> Result<ServerStatus, ServiceError> {
        self.status
            .get(id)
            .ok_or_else(|| ServiceError::ServerNotFound(id.to_string()))
    }

    pub fn summary(&self) -> StatusSummary {
        self.status.summary()
    }

    // =========================================================================
    // Tools
    // =========================================================================

    /// Tools invocable right now, optionally for one server.
    pub fn list_tools(&self, server_id: Option<&str>) -> Result<Vec<ToolEntry>, ServiceError> {
        if let Some(id) = server_id {
            self.supervisor(id)?;
        }
        let snapshot = self.catalog.snapshot();
        Ok(snapshot
            .iter()
            .filter(|t| server_id.is_none_or(|id| t.server_id == id))
            .filter(|t| self.owner_running(&t.server_id))
            .cloned()
            .collect())
    }

    pub fn get_tool(&self, name: &str) -> Result<ToolEntry, ServiceError> {
        self.catalog
            .snapshot()
            .get(name)
            .filter(|t| self.owner_running(&t.server_id))
            .cloned()
            .ok_or_else(|| ServiceError::ToolNotFound(name.to_string()))
    }

    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        self.dispatcher.invoke(request).await
    }

    fn supervisor(&self, id: &str) -> Result<Arc<Supervisor>, ServiceError> {
        self.registry
            .get(id)
            .ok_or_else(|| ServiceError::ServerNotFound(id.to_string()))
    }

    fn owner_running(&self, server_id: &str) -> bool {
        self.registry
            .get(server_id)
            .is_some_and(|s| s.state().accepts_invocations())
    }
}

fn not_found(id: &str) -> impl FnOnce(RepositoryError) -> ServiceError + '_ {
    move |e| match e {
        RepositoryError::NotFound(_) => ServiceError::ServerNotFound(id.to_string()),
        other => ServiceError::Repository(other),
    }
}
