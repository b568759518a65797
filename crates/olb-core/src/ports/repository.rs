//! Storage port for server configurations.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ServerConfig;

/// Errors from a configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Server config not found: {0}")]
    NotFound(String),

    #[error("Server config already exists: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Persistence for operator-managed `ServerConfig`s, keyed by id.
#[async_trait]
pub trait ServerConfigRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<ServerConfig>, RepositoryError>;

    async fn get(&self, id: &str) -> Result<ServerConfig, RepositoryError>;

    /// Fails with `Conflict` if the id is taken.
    async fn insert(&self, config: ServerConfig) -> Result<ServerConfig, RepositoryError>;

    /// Replaces the config with the same id.
    async fn update(&self, config: ServerConfig) -> Result<ServerConfig, RepositoryError>;

    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}
