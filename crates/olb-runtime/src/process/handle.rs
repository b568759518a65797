//! Ownership of one child process.
//!
//! The `Child` itself lives in a watcher task that waits for exit or for a
//! termination request, whichever comes first. The handle keeps the pid, an
//! exit watch channel, and the sender that asks the watcher to terminate.
//! Dropping the handle without calling [`ProcessHandle::shutdown`] kills the
//! child immediately, so a handle never leaks a running process.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use olb_core::{ConfigError, ServerConfig};
use thiserror::Error;
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use super::launch::resolve_command;
use super::shutdown::terminate_child;
use super::stream::{StderrTail, spawn_stderr_reader};

/// Errors from spawning a child.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The launch spec is unusable. Retrying will not help.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The OS refused to start the process.
    #[error("Failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Child process has no {0} pipe")]
    MissingPipe(&'static str),
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// True when the bridge terminated the process.
    pub requested: bool,
}

impl ProcessExit {
    fn from_status(status: ExitStatus, requested: bool) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
            requested,
        }
    }

    const fn unknown(requested: bool) -> Self {
        Self {
            code: None,
            signal: None,
            requested,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exited with code {code}"),
            (None, Some(signal)) => write!(f, "killed by signal {signal}"),
            (None, None) => write!(f, "exited"),
        }
    }
}

/// Stdio pipes handed to the protocol client.
#[derive(Debug)]
pub struct ProcessIo {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// One spawned tool-server process.
#[derive(Debug)]
pub struct ProcessHandle {
    server_id: String,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
    terminate_tx: Mutex<Option<oneshot::Sender<Duration>>>,
    stderr: Arc<StderrTail>,
}

impl ProcessHandle {
    /// Spawn the process described by `config` with piped stdio.
    pub fn spawn(config: &ServerConfig) -> Result<(Self, ProcessIo), ProcessError> {
        let program = resolve_command(config)?;

        let mut command = Command::new(&program);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
            command: program.display().to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr_tail = Arc::new(StderrTail::default());
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_reader(stderr, config.id.clone(), Arc::clone(&stderr_tail));
        }

        let pid = child.id();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (terminate_tx, mut terminate_rx) = oneshot::channel::<Duration>();
        let server_id = config.id.clone();

        tokio::spawn(async move {
            let exit = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => ProcessExit::from_status(status, false),
                    Err(e) => {
                        warn!(server_id = %server_id, error = %e, "failed to wait on child");
                        ProcessExit::unknown(false)
                    }
                },
                // A dropped handle also lands here, with zero grace.
                grace = &mut terminate_rx => {
                    let grace = grace.unwrap_or(Duration::ZERO);
                    match terminate_child(&mut child, grace).await {
                        Ok(status) => ProcessExit::from_status(status, true),
                        Err(e) => {
                            warn!(server_id = %server_id, error = %e, "failed to terminate child");
                            ProcessExit::unknown(true)
                        }
                    }
                }
            };
            debug!(server_id = %server_id, pid = ?pid, exit = %exit, "child process ended");
            let _ = exit_tx.send(Some(exit));
        });

        info!(server_id = %config.id, pid = ?pid, command = %program.display(), "spawned tool-server");

        let handle = Self {
            server_id: config.id.clone(),
            pid,
            started_at: Utc::now(),
            exit_rx,
            terminate_tx: Mutex::new(Some(terminate_tx)),
            stderr: stderr_tail,
        };
        Ok((handle, ProcessIo { stdin, stdout }))
    }

    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `Some` once the process has exited.
    pub fn exit(&self) -> Option<ProcessExit> {
        self.exit_rx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    /// Last non-empty stderr line.
    pub fn last_stderr_line(&self) -> Option<String> {
        self.stderr.last_line()
    }

    /// Resolve when the process exits.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => exit.clone(),
            Err(_) => None,
        };
        exit.unwrap_or_else(|| ProcessExit::unknown(false))
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL. Returns once reaped.
    ///
    /// Safe to call repeatedly or after the process already exited.
    pub async fn shutdown(&self, grace: Duration) -> ProcessExit {
        let sender = self.terminate_tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(sender) = sender {
            debug!(server_id = %self.server_id, pid = ?self.pid, grace_ms = grace.as_millis(), "terminating tool-server");
            let _ = sender.send(grace);
        }
        self.wait().await
    }
}
