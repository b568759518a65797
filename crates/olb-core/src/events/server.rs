//! Constructors for server and catalog events.

use super::AppEvent;
use crate::domain::ServerState;

impl AppEvent {
    pub fn state_changed(server_id: impl Into<String>, from: ServerState, to: ServerState) -> Self {
        Self::ServerStateChanged {
            server_id: server_id.into(),
            from,
            to,
        }
    }

    pub fn restart_scheduled(server_id: impl Into<String>, attempt: u32, delay_ms: u64) -> Self {
        Self::ServerRestartScheduled {
            server_id: server_id.into(),
            attempt,
            delay_ms,
        }
    }

    pub fn restart_exhausted(server_id: impl Into<String>, restarts: u32) -> Self {
        Self::ServerRestartExhausted {
            server_id: server_id.into(),
            restarts,
        }
    }

    pub fn catalog_updated(server_id: impl Into<String>, version: u64, tool_count: usize) -> Self {
        Self::CatalogUpdated {
            server_id: server_id.into(),
            version,
            tool_count,
        }
    }

    pub fn tool_name_collision(
        tool: impl Into<String>,
        previous_server_id: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self::ToolNameCollision {
            tool: tool.into(),
            previous_server_id: previous_server_id.into(),
            server_id: server_id.into(),
        }
    }

    pub fn config_added(server_id: impl Into<String>) -> Self {
        Self::ServerConfigAdded {
            server_id: server_id.into(),
        }
    }

    pub fn config_updated(server_id: impl Into<String>) -> Self {
        Self::ServerConfigUpdated {
            server_id: server_id.into(),
        }
    }

    pub fn config_removed(server_id: impl Into<String>) -> Self {
        Self::ServerConfigRemoved {
            server_id: server_id.into(),
        }
    }
}
