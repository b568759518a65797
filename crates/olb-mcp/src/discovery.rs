//! Tool discovery: ask a running server what it exposes and turn the answer
//! into catalog entries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use olb_core::{ToolCategory, ToolEntry, ToolNaming, actions_from_schema};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::client::{ClientError, ToolServerClient};
use crate::protocol::WireTool;

#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Discovery timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Discovery failed: {0}")]
    Client(#[from] ClientError),

    #[error("Malformed tool list: {0}")]
    Malformed(String),

    #[error("Discovery already in progress")]
    InProgress,
}

/// Allows one discovery at a time per server.
#[derive(Debug, Default)]
pub struct DiscoveryGate {
    busy: AtomicBool,
}

impl DiscoveryGate {
    pub fn try_begin(&self) -> Option<DiscoveryPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DiscoveryPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one discovery.
#[derive(Debug)]
pub struct DiscoveryPermit<'a> {
    gate: &'a DiscoveryGate,
}

impl Drop for DiscoveryPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Run `tools/list` against `client` and map the answer to catalog entries.
pub async fn discover(
    client: &ToolServerClient,
    gate: &DiscoveryGate,
    naming: ToolNaming,
    limit: Duration,
) -> Result<Vec<ToolEntry>, DiscoveryError> {
    let _permit = gate.try_begin().ok_or(DiscoveryError::InProgress)?;
    let tools = timeout(limit, client.list_tools())
        .await
        .map_err(|_| DiscoveryError::Timeout(limit))??;
    let entries = to_entries(client.server_id(), tools, naming)?;
    debug!(server_id = %client.server_id(), count = entries.len(), "discovered tools");
    Ok(entries)
}

/// Validate advertised tools and build entries for `server_id`.
pub fn to_entries(
    server_id: &str,
    tools: Vec<WireTool>,
    naming: ToolNaming,
) -> Result<Vec<ToolEntry>, DiscoveryError> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .map(|tool| {
            let remote_name = tool.name.trim().to_string();
            if remote_name.is_empty() {
                return Err(DiscoveryError::Malformed("tool with empty name".into()));
            }
            if !seen.insert(remote_name.clone()) {
                return Err(DiscoveryError::Malformed(format!(
                    "tool '{remote_name}' advertised twice"
                )));
            }
            let input_schema = match tool.input_schema.clone() {
                None | Some(Value::Null) => json!({ "type": "object" }),
                Some(schema @ Value::Object(_)) => schema,
                Some(_) => {
                    return Err(DiscoveryError::Malformed(format!(
                        "tool '{remote_name}' has a non-object input schema"
                    )));
                }
            };

            Ok(ToolEntry {
                name: naming.public_name(server_id, &remote_name),
                category: ToolCategory::resolve(tool.advertised_category(), &remote_name),
                actions: actions_from_schema(&input_schema),
                description: tool.description,
                input_schema,
                remote_name,
                server_id: server_id.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(value: Value) -> WireTool {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_entries_carry_category_actions_and_defaults() {
        let tools = vec![
            wire(json!({"name": "echo"})),
            wire(json!({
                "name": "content_control",
                "category": "word",
                "inputSchema": {
                    "type": "object",
                    "properties": {"action": {"type": "string", "enum": ["insert", "list"]}},
                    "required": ["action"]
                }
            })),
        ];
        let entries = to_entries("srv", tools, ToolNaming::Shared).unwrap();

        assert_eq!(entries[0].input_schema, json!({"type": "object"}));
        assert_eq!(entries[0].category, ToolCategory::General);
        assert!(!entries[0].is_multi_action());

        assert_eq!(entries[1].category, ToolCategory::Word);
        assert_eq!(
            entries[1].actions.as_deref(),
            Some(&["insert".to_string(), "list".to_string()][..])
        );
        assert_eq!(entries[1].server_id, "srv");
    }

    #[test]
    fn test_prefixed_naming_keeps_remote_name() {
        let entries =
            to_entries("srv", vec![wire(json!({"name": "echo"}))], ToolNaming::Prefixed).unwrap();
        assert_eq!(entries[0].name, "srv.echo");
        assert_eq!(entries[0].remote_name, "echo");
    }

    #[test]
    fn test_rejects_malformed_lists() {
        let dup = vec![wire(json!({"name": "a"})), wire(json!({"name": "a"}))];
        assert!(matches!(
            to_entries("s", dup, ToolNaming::Shared),
            Err(DiscoveryError::Malformed(_))
        ));

        let empty = vec![wire(json!({"name": "  "}))];
        assert!(to_entries("s", empty, ToolNaming::Shared).is_err());

        let bad_schema = vec![wire(json!({"name": "a", "inputSchema": "nope"}))];
        assert!(to_entries("s", bad_schema, ToolNaming::Shared).is_err());
    }

    #[test]
    fn test_gate_is_exclusive() {
        let gate = DiscoveryGate::default();
        let permit = gate.try_begin().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_begin().is_none());
        drop(permit);
        assert!(gate.try_begin().is_some());
    }
}
