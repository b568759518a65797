//! Canonical event union for supervisor and catalog activity.
//!
//! Events are serialized with a `type` tag so adapters can forward them
//! unchanged:
//!
//! ```json
//! { "type": "server_state_changed", "serverId": "word", "from": "starting", "to": "running" }
//! ```

mod server;

use serde::{Deserialize, Serialize};

use crate::domain::ServerState;

/// Events emitted by the bridge core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A supervisor moved between lifecycle states.
    ServerStateChanged {
        #[serde(rename = "serverId")]
        server_id: String,
        from: ServerState,
        to: ServerState,
    },

    /// A crashed server will be relaunched after `delay_ms`.
    ServerRestartScheduled {
        #[serde(rename = "serverId")]
        server_id: String,
        attempt: u32,
        #[serde(rename = "delayMs")]
        delay_ms: u64,
    },

    /// The restart budget is spent; the server stays crashed.
    ServerRestartExhausted {
        #[serde(rename = "serverId")]
        server_id: String,
        restarts: u32,
    },

    /// A server's slice of the catalog was replaced or removed.
    CatalogUpdated {
        #[serde(rename = "serverId")]
        server_id: String,
        version: u64,
        #[serde(rename = "toolCount")]
        tool_count: usize,
    },

    /// Two servers advertised the same public tool name.
    ToolNameCollision {
        tool: String,
        #[serde(rename = "previousServerId")]
        previous_server_id: String,
        #[serde(rename = "serverId")]
        server_id: String,
    },

    ServerConfigAdded {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    ServerConfigUpdated {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    ServerConfigRemoved {
        #[serde(rename = "serverId")]
        server_id: String,
    },
}

impl AppEvent {
    /// Server id this event concerns, if it concerns exactly one.
    pub fn server_id(&self) -> &str {
        match self {
            Self::ServerStateChanged { server_id, .. }
            | Self::ServerRestartScheduled { server_id, .. }
            | Self::ServerRestartExhausted { server_id, .. }
            | Self::CatalogUpdated { server_id, .. }
            | Self::ToolNameCollision { server_id, .. }
            | Self::ServerConfigAdded { server_id }
            | Self::ServerConfigUpdated { server_id }
            | Self::ServerConfigRemoved { server_id } => server_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_tagged() {
        let event = AppEvent::state_changed("word", ServerState::Starting, ServerState::Running);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "server_state_changed");
        assert_eq!(json["serverId"], "word");
        assert_eq!(json["to"], "running");
    }

    #[test]
    fn test_server_id_accessor() {
        let event = AppEvent::tool_name_collision("echo", "A", "B");
        assert_eq!(event.server_id(), "B");
    }
}
