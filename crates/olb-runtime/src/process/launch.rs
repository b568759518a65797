//! Pre-spawn resolution of a server's command and working directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use olb_core::{ConfigError, ServerConfig};

/// Resolve the executable a config launches.
///
/// Paths (anything with a separator) are taken relative to `cwd` when one
/// is set. Bare names are looked up on `PATH`, honouring a `PATH` override
/// in the config's environment.
pub fn resolve_command(config: &ServerConfig) -> Result<PathBuf, ConfigError> {
    config.validate()?;

    let cwd = config.cwd.as_deref().map(Path::new);
    if let Some(dir) = cwd {
        if !dir.is_dir() {
            return Err(ConfigError::WorkingDirMissing(dir.display().to_string()));
        }
    }

    let command = Path::new(&config.command);
    let not_found = |reason: String| ConfigError::CommandNotFound {
        command: config.command.clone(),
        reason,
    };

    if command.is_absolute() || command.components().count() > 1 {
        let candidate = match cwd {
            Some(dir) if command.is_relative() => dir.join(command),
            _ => command.to_path_buf(),
        };
        if !candidate.is_file() {
            return Err(not_found(format!("{} is not a file", candidate.display())));
        }
        check_executable(&candidate).map_err(not_found)?;
        return Ok(candidate);
    }

    let search_path: Option<OsString> = config.env.get("PATH").map(OsString::from);
    let resolved = match search_path {
        Some(paths) => {
            let base = match cwd {
                Some(dir) => dir.to_path_buf(),
                None => std::env::current_dir().map_err(|e| not_found(e.to_string()))?,
            };
            which::which_in(command, Some(paths), base)
        }
        None => which::which(command),
    };
    resolved.map_err(|e| not_found(e.to_string()))
}

#[cfg(unix)]
fn check_executable(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| e.to_string())?;
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(format!("{} is not executable", path.display()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_executable(_path: &Path) -> Result<(), String> {
    Ok(())
}
