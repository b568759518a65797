//! CLI bootstrap.
//!
//! Resolves the config directory and loads settings. Long-lived services
//! are only wired by the `serve` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use olb_core::paths::{config_dir, servers_file, settings_file};
use olb_core::{BridgeSettings, JsonServerStore};

/// Resolved configuration shared by all command handlers.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config_dir: PathBuf,
    pub settings: BridgeSettings,
}

impl CliContext {
    /// Resolve paths and read `config.json`. A missing file means defaults.
    pub fn load(explicit_dir: Option<&Path>) -> Result<Self> {
        let config_dir = config_dir(explicit_dir)?;
        let settings = BridgeSettings::load(&settings_file(&config_dir))?;
        Ok(Self {
            config_dir,
            settings,
        })
    }

    pub fn settings_file(&self) -> PathBuf {
        settings_file(&self.config_dir)
    }

    pub fn servers_file(&self) -> PathBuf {
        servers_file(&self.config_dir)
    }

    /// Read-only access to stored server configs.
    pub fn store(&self) -> JsonServerStore {
        JsonServerStore::new(self.servers_file())
    }
}
