//! Bridge settings.
//!
//! Loaded from `config.json` in the config directory. Every field has a
//! default so a partial or missing file is fine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default port for the HTTP control surface.
pub const DEFAULT_PORT: u16 = 3001;

/// How public tool names are derived from advertised names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolNaming {
    /// Advertised names are used as-is; on collision the latest discovery wins.
    #[default]
    Shared,
    /// Public name is `<serverId>.<tool>`.
    Prefixed,
}

impl ToolNaming {
    pub fn public_name(self, server_id: &str, tool: &str) -> String {
        match self {
            Self::Shared => tool.to_string(),
            Self::Prefixed => format!("{server_id}.{tool}"),
        }
    }
}

/// Bridge-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeSettings {
    pub host: String,
    pub port: u16,
    pub log_level: String,

    /// Spawn + handshake + first discovery must finish within this.
    pub startup_timeout_ms: u64,
    pub discovery_timeout_ms: u64,
    pub invocation_timeout_ms: u64,

    pub health_interval_ms: u64,
    /// Consecutive failed polls before `running -> degraded`.
    pub degraded_after_failures: u32,
    /// Consecutive failed polls before the server counts as crashed.
    pub crashed_after_failures: u32,
    pub ping_timeout_ms: u64,

    /// Grace period between the termination signal and a forced kill.
    pub stop_grace_ms: u64,

    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub restart_window_ms: u64,
    pub max_restarts_per_window: u32,

    /// In-flight invocations allowed per server.
    pub max_concurrent_invocations: usize,

    pub tool_naming: ToolNaming,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            startup_timeout_ms: 30_000,
            discovery_timeout_ms: 10_000,
            invocation_timeout_ms: 60_000,
            health_interval_ms: 5_000,
            degraded_after_failures: 1,
            crashed_after_failures: 2,
            ping_timeout_ms: 2_000,
            stop_grace_ms: 5_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            restart_window_ms: 300_000,
            max_restarts_per_window: 5,
            max_concurrent_invocations: 3,
            tool_naming: ToolNaming::Shared,
        }
    }
}

impl BridgeSettings {
    /// Read settings from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let settings: Self = serde_json::from_str(&raw).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |e: std::io::Error| SettingsError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("startupTimeoutMs", self.startup_timeout_ms),
            ("discoveryTimeoutMs", self.discovery_timeout_ms),
            ("invocationTimeoutMs", self.invocation_timeout_ms),
            ("healthIntervalMs", self.health_interval_ms),
            ("pingTimeoutMs", self.ping_timeout_ms),
            ("backoffBaseMs", self.backoff_base_ms),
            ("restartWindowMs", self.restart_window_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::Zero(name));
            }
        }
        if self.degraded_after_failures == 0 {
            return Err(SettingsError::Zero("degradedAfterFailures"));
        }
        if self.crashed_after_failures < self.degraded_after_failures {
            return Err(SettingsError::Inconsistent(
                "crashedAfterFailures must be >= degradedAfterFailures".to_string(),
            ));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(SettingsError::Inconsistent(
                "backoffCapMs must be >= backoffBaseMs".to_string(),
            ));
        }
        if self.max_concurrent_invocations == 0 {
            return Err(SettingsError::Zero("maxConcurrentInvocations"));
        }
        Ok(())
    }

    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub const fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub const fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }

    pub const fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub const fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub const fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub const fn restart_window(&self) -> Duration {
        Duration::from_millis(self.restart_window_ms)
    }
}

/// Settings load/validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Setting '{0}' must be greater than zero")]
    Zero(&'static str),

    #[error("Inconsistent settings: {0}")]
    Inconsistent(String),

    #[error("Failed to access settings file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse settings file {path}: {reason}")]
    Parse { path: String, reason: String },
}
