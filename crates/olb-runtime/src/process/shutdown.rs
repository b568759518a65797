//! Graceful termination with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::timeout;

/// Terminate a child, waiting up to `grace` before force-killing it.
///
/// Always reaps the process. A zero grace kills immediately.
///
/// # Platform behavior
/// - Unix: SIGTERM via nix, then SIGKILL via `.kill()`
/// - Windows: immediate `.kill()`
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    if !grace.is_zero() {
        if let Some(status) = sigterm_and_wait(child, grace).await? {
            return Ok(status);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

/// `Ok(None)` means the grace period elapsed and the child is still alive.
#[cfg(unix)]
async fn sigterm_and_wait(child: &mut Child, grace: Duration) -> io::Result<Option<ExitStatus>> {
    let Some(raw_pid) = child.id() else {
        return child.wait().await.map(Some);
    };
    let pid = i32::try_from(raw_pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        // Already gone
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await.map(Some);
        }
        return Err(io::Error::other(e));
    }

    match timeout(grace, child.wait()).await {
        Ok(result) => result.map(Some),
        Err(_) => {
            tracing::debug!(pid = raw_pid, grace_ms = grace.as_millis(), "grace period elapsed, escalating to SIGKILL");
            Ok(None)
        }
    }
}
