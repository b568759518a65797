//! JSON file config store (`mcp-servers.json`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::ServerConfig;
use crate::ports::{RepositoryError, ServerConfigRepository};

const FILE_VERSION: &str = "1.0";

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct ServersFile {
    version: String,
    #[serde(default)]
    servers: Vec<ServerConfig>,
}

impl Default for ServersFile {
    fn default() -> Self {
        Self {
            version: FILE_VERSION.to_string(),
            servers: Vec::new(),
        }
    }
}

/// Stores configs in a single JSON document.
///
/// Every mutation is a read-modify-write under one lock, and the file is
/// replaced by rename so readers never see a half-written document.
#[derive(Debug)]
pub struct JsonServerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonServerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<ServersFile, RepositoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(ServersFile::default()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                RepositoryError::Storage(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServersFile::default()),
            Err(e) => Err(RepositoryError::Storage(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write(&self, file: &ServersFile) -> Result<(), RepositoryError> {
        let storage = |e: std::io::Error| {
            RepositoryError::Storage(format!("{}: {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage)?;
        }
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(storage)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage)
    }
}

#[async_trait]
impl ServerConfigRepository for JsonServerStore {
    async fn list(&self) -> Result<Vec<ServerConfig>, RepositoryError> {
        Ok(self.read().await?.servers)
    }

    async fn get(&self, id: &str) -> Result<ServerConfig, RepositoryError> {
        self.read()
            .await?
            .servers
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn insert(&self, config: ServerConfig) -> Result<ServerConfig, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read().await?;
        if file.servers.iter().any(|s| s.id == config.id) {
            return Err(RepositoryError::Conflict(config.id));
        }
        file.servers.push(config.clone());
        self.write(&file).await?;
        tracing::debug!(server_id = %config.id, path = %self.path.display(), "Saved server config");
        Ok(config)
    }

    async fn update(&self, config: ServerConfig) -> Result<ServerConfig, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read().await?;
        let slot = file
            .servers
            .iter_mut()
            .find(|s| s.id == config.id)
            .ok_or_else(|| RepositoryError::NotFound(config.id.clone()))?;
        *slot = config.clone();
        self.write(&file).await?;
        Ok(config)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read().await?;
        let before = file.servers.len();
        file.servers.retain(|s| s.id != id);
        if file.servers.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        self.write(&file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonServerStore::new(dir.path().join("mcp-servers.json"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/mcp-servers.json");

        let store = JsonServerStore::new(&path);
        store
            .insert(ServerConfig::new("word", "Word", "word-server").with_auto_start(true))
            .await
            .unwrap();

        let reopened = JsonServerStore::new(&path);
        let servers = reopened.list().await.unwrap();
        assert_eq!(servers.len(), 1);
        assert!(servers[0].auto_start);

        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["version"], "1.0");
        assert_eq!(doc["servers"][0]["autoStart"], true);
    }

    #[tokio::test]
    async fn test_reads_original_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mcp-servers.json");
        std::fs::write(
            &path,
            r#"{"version":"1.0","servers":[{"id":"excel","name":"Excel","command":"python","args":["-m","excel"],"enabled":false,"autoStart":false}]}"#,
        )
        .unwrap();

        let store = JsonServerStore::new(&path);
        let excel = store.get("excel").await.unwrap();
        assert!(!excel.enabled);
        assert_eq!(excel.args, vec!["-m", "excel"]);
    }

    #[tokio::test]
    async fn test_conflict_and_delete() {
        let dir = tempdir().unwrap();
        let store = JsonServerStore::new(dir.path().join("mcp-servers.json"));
        store.insert(ServerConfig::new("A", "A", "a")).await.unwrap();
        assert!(matches!(
            store.insert(ServerConfig::new("A", "B", "b")).await,
            Err(RepositoryError::Conflict(_))
        ));
        store.delete("A").await.unwrap();
        assert!(matches!(store.get("A").await, Err(RepositoryError::NotFound(_))));
    }
}
