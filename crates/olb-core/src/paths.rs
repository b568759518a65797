//! Config directory resolution.
//!
//! Layout:
//!
//! ```text
//! ~/.office-local-bridge/
//!   config.json       bridge settings
//!   mcp-servers.json  tool-server configs
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "OLB_CONFIG_DIR";

const CONFIG_DIR_NAME: &str = ".office-local-bridge";
const SETTINGS_FILE: &str = "config.json";
const SERVERS_FILE: &str = "mcp-servers.json";

/// Errors that can occur during path resolution and directory operations.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot determine home directory")]
    NoHomeDir,

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Resolve the config directory.
///
/// Precedence: explicit override, then `OLB_CONFIG_DIR`, then
/// `~/.office-local-bridge`.
pub fn config_dir(explicit: Option<&Path>) -> Result<PathBuf, PathError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(PathError::NoHomeDir)
}

pub fn settings_file(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

pub fn servers_file(config_dir: &Path) -> PathBuf {
    config_dir.join(SERVERS_FILE)
}

/// Create `dir` if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), PathError> {
    if dir.exists() {
        if dir.is_dir() {
            return Ok(());
        }
        return Err(PathError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|e| PathError::CreateFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_dir_wins() {
        let dir = tempdir().unwrap();
        assert_eq!(config_dir(Some(dir.path())).unwrap(), dir.path());
    }

    #[test]
    fn test_file_names() {
        let root = Path::new("/tmp/olb");
        assert_eq!(servers_file(root), root.join("mcp-servers.json"));
        assert_eq!(settings_file(root), root.join("config.json"));
    }

    #[test]
    fn test_ensure_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(ensure_dir(&file), Err(PathError::NotADirectory(_))));
    }
}
