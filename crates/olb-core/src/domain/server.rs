//! Tool-server launch configuration.
//!
//! A `ServerConfig` is created and edited by the operator. Supervisors take
//! their own copy when a process starts, so edits made while a server is
//! running apply on the next start.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const fn default_true() -> bool {
    true
}

/// Identity and launch spec for one supervised tool-server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Stable identifier, unique across the bridge.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Executable name or path. Flags belong in `args`.
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Environment overrides applied on top of the bridge's environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Start this server when the bridge boots.
    #[serde(default)]
    pub auto_start: bool,
}

impl ServerConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            enabled: true,
            auto_start: false,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Structural validation that needs no filesystem access.
    ///
    /// Whether the command and working directory actually exist is checked
    /// by the runtime right before spawning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyField("id"));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError::EmptyField("command"));
        }
        if self.command.contains(char::is_whitespace) {
            return Err(ConfigError::CommandHasWhitespace(self.command.clone()));
        }
        if let Some(cwd) = &self.cwd {
            if cwd.trim().is_empty() {
                return Err(ConfigError::EmptyField("cwd"));
            }
        }
        if let Some(key) = self
            .env
            .keys()
            .find(|k| k.is_empty() || k.contains('=') || k.contains('\0'))
        {
            return Err(ConfigError::InvalidEnvKey(key.clone()));
        }
        Ok(())
    }
}

/// Why a launch spec was rejected.
///
/// Every variant classifies as `ConfigInvalid`: fatal for the current start
/// attempt and never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("Server id '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidId(String),

    #[error(
        "Command must be an executable name or path only (got '{0}'); put flags and arguments in 'args'"
    )]
    CommandHasWhitespace(String),

    #[error("Invalid environment variable name '{0}'")]
    InvalidEnvKey(String),

    #[error("Command '{command}' could not be resolved: {reason}")]
    CommandNotFound { command: String, reason: String },

    #[error("Working directory '{0}' does not exist or is not a directory")]
    WorkingDirMissing(String),

    #[error("Server '{0}' is disabled")]
    Disabled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ServerConfig {
        ServerConfig::new("word", "Word tools", "office-word-server")
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_id() {
        let config = ServerConfig { id: "word tools".into(), ..valid() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidId("word tools".into()))
        );
    }

    #[test]
    fn test_rejects_command_with_flags() {
        let config = ServerConfig { command: "python -m server".into(), ..valid() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CommandHasWhitespace(_))
        ));
    }

    #[test]
    fn test_rejects_bad_env_key() {
        let config = valid().with_env("A=B", "1");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEnvKey(_))));
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = serde_json::json!({
            "id": "A",
            "name": "Echo",
            "command": "echo-tool-server",
            "autoStart": true
        });
        let config: ServerConfig = serde_json::from_value(json).unwrap();
        assert!(config.auto_start);
        assert!(config.enabled, "enabled defaults to true");
        assert!(config.args.is_empty());

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["autoStart"], true);
        assert!(back.get("args").is_none());
    }
}
