//! Read-only status views for operators.
//!
//! Built entirely from supervisor snapshots and the catalog. Nothing here
//! can change lifecycle state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use olb_core::{ServerSnapshot, ServerState};
use serde::Serialize;

use crate::catalog::ToolCatalog;
use crate::registry::SnapshotSource;

/// Per-server status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub id: String,
    pub name: String,
    pub status: ServerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
    pub restart_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub tool_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Crashed with no automatic restart coming.
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<u64>,
}

impl ServerStatus {
    pub fn from_snapshot(snapshot: ServerSnapshot, tool_count: usize, now: DateTime<Utc>) -> Self {
        let uptime_secs = snapshot.runtime.uptime_secs(now);
        Self {
            id: snapshot.id,
            name: snapshot.name,
            status: snapshot.state,
            pid: snapshot.runtime.pid,
            start_time: snapshot.runtime.started_at,
            uptime_secs,
            restart_count: snapshot.runtime.restart_count,
            last_error: snapshot.runtime.last_error,
            tool_count,
            last_activity_at: snapshot.runtime.last_activity_at,
            terminal: snapshot.terminal,
            cpu_percent: snapshot.usage.map(|u| u.cpu_percent),
            memory_bytes: snapshot.usage.map(|u| u.memory_bytes),
        }
    }
}

/// Counts by state across all servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total: usize,
    pub running: usize,
    pub degraded: usize,
    pub crashed: usize,
    pub stopped: usize,
    pub tools: usize,
}

pub struct StatusAggregator {
    source: Arc<dyn SnapshotSource>,
    catalog: Arc<ToolCatalog>,
}

impl StatusAggregator {
    pub fn new(source: Arc<dyn SnapshotSource>, catalog: Arc<ToolCatalog>) -> Self {
        Self { source, catalog }
    }

    pub fn all(&self) -> Vec<ServerStatus> {
        let catalog = self.catalog.snapshot();
        let now = Utc::now();
        self.source
            .snapshots()
            .into_iter()
            .map(|s| {
                let tools = visible_tools(&s, catalog.count_for(&s.id));
                ServerStatus::from_snapshot(s, tools, now)
            })
            .collect()
    }

    pub fn get(&self, server_id: &str) -> Option<ServerStatus> {
        let snapshot = self.source.snapshot(server_id)?;
        let tools = visible_tools(&snapshot, self.catalog.snapshot().count_for(server_id));
        Some(ServerStatus::from_snapshot(snapshot, tools, Utc::now()))
    }

    pub fn summary(&self) -> StatusSummary {
        self.all()
            .iter()
            .fold(StatusSummary::default(), |mut summary, status| {
                summary.total += 1;
                summary.tools += status.tool_count;
                match status.status {
                    ServerState::Running => summary.running += 1,
                    ServerState::Degraded => summary.degraded += 1,
                    ServerState::Crashed => summary.crashed += 1,
                    ServerState::Stopped => summary.stopped += 1,
                    ServerState::Starting | ServerState::Stopping => {}
                }
                summary
            })
    }
}

/// Tools count only while the owner serves them, matching what the tool
/// listing shows.
const fn visible_tools(snapshot: &ServerSnapshot, in_catalog: usize) -> usize {
    if snapshot.state.accepts_invocations() {
        in_catalog
    } else {
        0
    }
}
