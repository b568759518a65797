//! Supervisor lifecycle state and the read-only snapshot observers see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of one supervised server.
///
/// Owned exclusively by its supervisor. Everyone else reads a
/// [`ServerSnapshot`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Degraded,
    Crashed,
    Stopping,
}

impl ServerState {
    /// True while a child process may exist for this server.
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Running | Self::Degraded | Self::Stopping
        )
    }

    /// Only a running server receives invocations.
    pub const fn accepts_invocations(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Per-process runtime facts surfaced to operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRuntimeInfo {
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Restarts since the last manual start from `stopped`/`crashed`.
    pub restart_count: u32,
    pub last_error: Option<String>,
}

impl ProcessRuntimeInfo {
    /// Forget everything tied to the previous process instance.
    ///
    /// The restart counter and last error survive so observers can see why
    /// a server is restarting while it does so.
    pub fn clear_process(&mut self) {
        self.pid = None;
        self.started_at = None;
        self.last_activity_at = None;
    }

    pub fn uptime_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.started_at
            .and_then(|t| u64::try_from((now - t).num_seconds()).ok())
    }
}

/// Last sampled resource usage of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Immutable point-in-time view of one supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub id: String,
    pub name: String,
    pub state: ServerState,
    pub runtime: ProcessRuntimeInfo,
    pub tool_count: usize,
    /// Set when the restart budget is exhausted; only a manual start clears it.
    pub terminal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResourceUsage>,
}

impl ServerSnapshot {
    pub fn stopped(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: ServerState::Stopped,
            runtime: ProcessRuntimeInfo::default(),
            tool_count: 0,
            terminal: false,
            usage: None,
        }
    }
}
