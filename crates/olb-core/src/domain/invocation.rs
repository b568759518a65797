//! Invocation request/result types and the error taxonomy they carry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::Display;

use super::state::ServerState;

/// A request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Operation selector for action-multiplexed tools. May also be passed
    /// inside `arguments`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl InvocationRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: Map::new(),
            action: None,
        }
    }

    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Stable classification of a failure, serialized verbatim as `errorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ErrorKind {
    /// Bad launch spec. Never retried automatically.
    ConfigInvalid,
    StartupTimeout,
    ProcessCrashed,
    DiscoveryFailed,
    ToolNotFound,
    ServerUnavailable,
    InvocationTimeout,
    UnsupportedAction,
    /// Required arguments missing from the request.
    InvalidArguments,
    /// The handler itself declined the operation.
    HandlerReportedLimitation,
}

impl ErrorKind {
    /// Lifecycle failures are absorbed by the restart policy.
    pub const fn is_recoverable_by_restart(self) -> bool {
        matches!(self, Self::StartupTimeout | Self::ProcessCrashed)
    }
}

/// Normalized outcome of an invocation.
///
/// Returned for every request, including bridge-level rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl InvocationResult {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error_kind: Some(kind),
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn tool_not_found(tool: &str) -> Self {
        Self::failure(ErrorKind::ToolNotFound, format!("Unknown tool '{tool}'"))
    }

    pub fn server_unavailable(tool: &str, server_id: &str, state: ServerState) -> Self {
        Self::failure(
            ErrorKind::ServerUnavailable,
            format!("Server '{server_id}' owning tool '{tool}' is {state}"),
        )
        .with_data(json!({ "serverId": server_id, "state": state }))
    }

    pub fn invocation_timeout(tool: &str, after: Duration) -> Self {
        Self::failure(
            ErrorKind::InvocationTimeout,
            format!("Tool '{tool}' did not respond within {}ms", after.as_millis()),
        )
    }

    pub fn invalid_arguments(tool: &str, missing: &[&str]) -> Self {
        Self::failure(
            ErrorKind::InvalidArguments,
            format!(
                "Tool '{tool}' is missing required arguments: {}",
                missing.join(", ")
            ),
        )
        .with_data(json!({ "missing": missing }))
    }

    pub fn unsupported_action(tool: &str, requested: Option<&str>, supported: &[String]) -> Self {
        let message = requested.map_or_else(
            || format!("Tool '{tool}' requires an action; expected one of: {}", supported.join(", ")),
            |action| {
                format!(
                    "Tool '{tool}' does not support action '{action}'; expected one of: {}",
                    supported.join(", ")
                )
            },
        );
        Self::failure(ErrorKind::UnsupportedAction, message)
            .with_data(json!({ "action": requested, "supportedActions": supported }))
    }

    /// The handler ran but declined; its payload is kept as-is.
    pub fn handler_limitation(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data,
            error_kind: Some(ErrorKind::HandlerReportedLimitation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_wire_name() {
        let result = InvocationResult::tool_not_found("nope");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "ToolNotFound");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_unsupported_action_lists_valid_set() {
        let supported = vec!["insert".to_string(), "list".to_string()];
        let result = InvocationResult::unsupported_action("content_control", Some("frobnicate"), &supported);
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedAction));
        let data = result.data.unwrap();
        assert_eq!(data["supportedActions"], json!(["insert", "list"]));
        assert_eq!(data["action"], "frobnicate");
        assert!(result.message.contains("frobnicate"));
    }

    #[test]
    fn test_request_defaults() {
        let req: InvocationRequest = serde_json::from_value(json!({"tool": "echo"})).unwrap();
        assert!(req.arguments.is_empty());
        assert!(req.action.is_none());
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(ErrorKind::ProcessCrashed.is_recoverable_by_restart());
        assert!(!ErrorKind::ConfigInvalid.is_recoverable_by_restart());
    }
}
