//! Invocation dispatch.
//!
//! Every request goes through the same checks in order: catalog lookup,
//! owner state, action and argument validation, then a bounded call to the
//! owning server. Each step can end the invocation with a structured
//! result; nothing here returns `Err` to the caller.

use std::sync::Arc;
use std::time::Duration;

use olb_core::{ErrorKind, InvocationRequest, InvocationResult, ServerState, ToolEntry};
use serde_json::{Map, Value};
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::catalog::ToolCatalog;
use crate::client::ClientError;
use crate::protocol::CallToolResult;
use crate::registry::SupervisorRegistry;
use crate::router::ActionRouter;

pub struct Dispatcher {
    catalog: Arc<ToolCatalog>,
    registry: Arc<SupervisorRegistry>,
    router: ActionRouter,
    timeout: Duration,
}

impl Dispatcher {
    pub const fn new(
        catalog: Arc<ToolCatalog>,
        registry: Arc<SupervisorRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            registry,
            router: ActionRouter::new(),
            timeout,
        }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one invocation to a normalized result.
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("invoke", %invocation_id, tool = %request.tool);
        async move {
            let result = self.dispatch(request).await;
            debug!(success = result.success, error_kind = ?result.error_kind, "invocation finished");
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, request: InvocationRequest) -> InvocationResult {
        let deadline = Instant::now() + self.timeout;

        // Unknown names never reach a process.
        let Some(entry) = self.catalog.snapshot().get(&request.tool).cloned() else {
            debug!("unknown tool");
            return InvocationResult::tool_not_found(&request.tool);
        };

        let Some(supervisor) = self.registry.get(&entry.server_id) else {
            return InvocationResult::server_unavailable(
                &entry.name,
                &entry.server_id,
                ServerState::Stopped,
            );
        };
        let Some(client) = supervisor.connection() else {
            return InvocationResult::server_unavailable(
                &entry.name,
                &entry.server_id,
                supervisor.state(),
            );
        };

        let call = match self.router.route(&entry, request) {
            Ok(call) => call,
            Err(rejection) => return rejection,
        };
        let missing = missing_required(&entry, &call.arguments);
        if !missing.is_empty() {
            return InvocationResult::invalid_arguments(&entry.name, &missing);
        }

        // Queueing for a slot counts against the same deadline.
        let Ok(permit) = timeout_at(deadline, supervisor.permits().acquire_owned()).await else {
            return InvocationResult::invocation_timeout(&entry.name, self.timeout);
        };
        let Ok(_permit) = permit else {
            return InvocationResult::server_unavailable(
                &entry.name,
                &entry.server_id,
                supervisor.state(),
            );
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return InvocationResult::invocation_timeout(&entry.name, self.timeout);
        }
        debug!(server_id = %entry.server_id, remote = %call.remote_name, action = ?call.action, "calling tool");

        match client.call_tool(&call.remote_name, call.arguments, remaining).await {
            Ok(result) => normalize(result),
            Err(ClientError::Timeout(_)) => {
                warn!(server_id = %entry.server_id, timeout_ms = self.timeout.as_millis(), "invocation timed out");
                InvocationResult::invocation_timeout(&entry.name, self.timeout)
            }
            Err(ClientError::Server { code, message }) => InvocationResult::handler_limitation(
                message,
                Some(serde_json::json!({ "code": code })),
            ),
            Err(e) => {
                warn!(server_id = %entry.server_id, error = %e, "invocation failed in transport");
                InvocationResult::failure(
                    ErrorKind::ServerUnavailable,
                    format!("Server '{}' connection failed: {e}", entry.server_id),
                )
                .with_data(serde_json::json!({ "serverId": entry.server_id }))
            }
        }
    }
}

fn missing_required<'a>(entry: &'a ToolEntry, arguments: &Map<String, Value>) -> Vec<&'a str> {
    entry
        .required_fields()
        .into_iter()
        .filter(|field| arguments.get(*field).is_none_or(Value::is_null))
        .collect()
}

/// Map a tool-server reply onto the uniform result shape.
///
/// Office tool handlers reply with `{ success, message, ...extra }`, either
/// as structured content or as JSON text. Extra fields become `data`.
/// Other payloads are passed through as `data` and plain text becomes the
/// message.
pub fn normalize(result: CallToolResult) -> InvocationResult {
    let text = result.text();
    let payload = result.structured_content.clone().or_else(|| {
        text.as_deref()
            .and_then(|t| serde_json::from_str::<Value>(t).ok())
            .filter(Value::is_object)
    });

    match payload {
        Some(Value::Object(mut object)) if object.get("success").is_some_and(Value::is_boolean) => {
            let success = object
                .remove("success")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let message = match object.remove("message") {
                Some(Value::String(message)) => message,
                _ => default_message(success, text.as_deref()),
            };
            let data = match object.remove("data") {
                Some(data) if object.is_empty() => Some(data),
                Some(data) => {
                    object.insert("data".to_string(), data);
                    Some(Value::Object(object))
                }
                None if object.is_empty() => None,
                None => Some(Value::Object(object)),
            };
            if success && !result.is_error {
                InvocationResult::ok(message, data)
            } else {
                InvocationResult::handler_limitation(message, data)
            }
        }
        Some(other) => {
            let message = default_message(!result.is_error, text.as_deref());
            if result.is_error {
                InvocationResult::handler_limitation(message, Some(other))
            } else {
                InvocationResult::ok(message, Some(other))
            }
        }
        None => {
            let message = default_message(!result.is_error, text.as_deref());
            if result.is_error {
                InvocationResult::handler_limitation(message, None)
            } else {
                InvocationResult::ok(message, None)
            }
        }
    }
}

fn default_message(success: bool, text: Option<&str>) -> String {
    match (text, success) {
        (Some(text), _) if !text.trim_start().starts_with('{') => text.to_string(),
        (_, true) => "Tool completed".to_string(),
        (_, false) => "Tool reported an error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::SupervisorContext;
    use olb_core::{BridgeSettings, NoopEmitter, ServerConfig, ToolCategory};
    use serde_json::json;

    #[test]
    fn test_normalize_structured_success() {
        let result = normalize(CallToolResult::from_payload(json!({
            "success": true,
            "message": "Inserted content control",
            "tag": "title",
            "id": 7
        })));
        assert!(result.success);
        assert!(result.error_kind.is_none());
        assert_eq!(result.message, "Inserted content control");
        assert_eq!(result.data, Some(json!({"tag": "title", "id": 7})));
    }

    #[test]
    fn test_normalize_handler_limitation_keeps_payload() {
        let result = normalize(CallToolResult::from_payload(json!({
            "success": false,
            "message": "Operation not supported by this API version",
            "data": {"requiredApiVersion": "1.4"}
        })));
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::HandlerReportedLimitation));
        assert_eq!(result.message, "Operation not supported by this API version");
        assert_eq!(result.data, Some(json!({"requiredApiVersion": "1.4"})));
    }

    #[test]
    fn test_normalize_json_text_and_plain_text() {
        let from_text = normalize(CallToolResult {
            content: vec![json!({"type": "text", "text": "{\"success\":true,\"message\":\"ok\"}"})],
            structured_content: None,
            is_error: false,
        });
        assert!(from_text.success);
        assert_eq!(from_text.message, "ok");
        assert!(from_text.data.is_none());

        let plain = normalize(CallToolResult {
            content: vec![json!({"type": "text", "text": "boom"})],
            structured_content: None,
            is_error: true,
        });
        assert!(!plain.success);
        assert_eq!(plain.message, "boom");
        assert_eq!(plain.error_kind, Some(ErrorKind::HandlerReportedLimitation));
    }

    #[test]
    fn test_missing_required_treats_null_as_missing() {
        let entry = ToolEntry {
            name: "echo".into(),
            remote_name: "echo".into(),
            description: None,
            input_schema: json!({"type": "object", "required": ["text", "count"]}),
            category: ToolCategory::General,
            server_id: "s".into(),
            actions: None,
        };
        let mut args = Map::new();
        args.insert("text".into(), json!("hi"));
        args.insert("count".into(), Value::Null);
        assert_eq!(missing_required(&entry, &args), vec!["count"]);
    }

    fn dispatcher(catalog: Arc<ToolCatalog>) -> (Dispatcher, Arc<SupervisorRegistry>) {
        let ctx = SupervisorContext::new(
            Arc::clone(&catalog),
            Arc::new(NoopEmitter::new()),
            Arc::new(BridgeSettings::default()),
        );
        let registry = Arc::new(SupervisorRegistry::new(ctx));
        (
            Dispatcher::new(catalog, Arc::clone(&registry), Duration::from_secs(1)),
            registry,
        )
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, _) = dispatcher(Arc::new(ToolCatalog::new()));
        let result = dispatcher.invoke(InvocationRequest::new("nope")).await;
        assert_eq!(result.error_kind, Some(ErrorKind::ToolNotFound));
    }

    #[tokio::test]
    async fn test_owner_not_running_is_unavailable() {
        let catalog = Arc::new(ToolCatalog::new());
        catalog.replace_server(
            "word",
            vec![ToolEntry {
                name: "echo".into(),
                remote_name: "echo".into(),
                description: None,
                input_schema: json!({"type": "object"}),
                category: ToolCategory::General,
                server_id: "word".into(),
                actions: None,
            }],
        );
        let (dispatcher, registry) = dispatcher(catalog);
        registry.upsert(ServerConfig::new("word", "Word", "sh"));

        let result = dispatcher.invoke(InvocationRequest::new("echo")).await;
        assert_eq!(result.error_kind, Some(ErrorKind::ServerUnavailable));
        assert_eq!(result.data.unwrap()["state"], "stopped");
    }
}
