//! In-memory config store for tests and ephemeral runs.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ServerConfig;
use crate::ports::{RepositoryError, ServerConfigRepository};

#[derive(Debug, Default)]
pub struct MemoryServerStore {
    servers: RwLock<Vec<ServerConfig>>,
}

impl MemoryServerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_servers(servers: Vec<ServerConfig>) -> Self {
        Self {
            servers: RwLock::new(servers),
        }
    }
}

#[async_trait]
impl ServerConfigRepository for MemoryServerStore {
    async fn list(&self) -> Result<Vec<ServerConfig>, RepositoryError> {
        Ok(self.servers.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<ServerConfig, RepositoryError> {
        self.servers
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn insert(&self, config: ServerConfig) -> Result<ServerConfig, RepositoryError> {
        let mut servers = self.servers.write().await;
        if servers.iter().any(|s| s.id == config.id) {
            return Err(RepositoryError::Conflict(config.id));
        }
        servers.push(config.clone());
        Ok(config)
    }

    async fn update(&self, config: ServerConfig) -> Result<ServerConfig, RepositoryError> {
        let mut servers = self.servers.write().await;
        let slot = servers
            .iter_mut()
            .find(|s| s.id == config.id)
            .ok_or_else(|| RepositoryError::NotFound(config.id.clone()))?;
        *slot = config.clone();
        Ok(config)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut servers = self.servers.write().await;
        let before = servers.len();
        servers.retain(|s| s.id != id);
        if servers.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
