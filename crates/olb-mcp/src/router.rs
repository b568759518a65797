//! Bridge-side action routing for action-multiplexed tools.
//!
//! A multi-action tool advertises its closed action set through the `enum`
//! on its schema's `action` property. Requests naming anything else are
//! rejected here, before the tool-server is contacted, with the valid set in
//! the result.

use olb_core::{InvocationRequest, InvocationResult, ToolEntry};
use serde_json::{Map, Value};

/// Arguments ready to forward to the owning server.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedCall {
    pub remote_name: String,
    pub arguments: Map<String, Value>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionRouter;

impl ActionRouter {
    pub const fn new() -> Self {
        Self
    }

    /// Resolve the request's action against the entry's declared set.
    ///
    /// The action may come from the request's `action` field or from an
    /// `action` argument; the field wins when both are present. Plain tools
    /// pass through untouched.
    pub fn route(
        &self,
        entry: &ToolEntry,
        request: InvocationRequest,
    ) -> Result<RoutedCall, InvocationResult> {
        let InvocationRequest {
            arguments: mut args,
            action,
            ..
        } = request;

        let Some(supported) = entry.actions.as_deref() else {
            if let Some(action) = action {
                args.entry("action").or_insert(Value::String(action));
            }
            return Ok(RoutedCall {
                remote_name: entry.remote_name.clone(),
                arguments: args,
                action: None,
            });
        };

        let requested = action.or_else(|| {
            args.get("action")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });
        match requested {
            Some(action) if supported.iter().any(|a| *a == action) => {
                args.insert("action".to_string(), Value::String(action.clone()));
                Ok(RoutedCall {
                    remote_name: entry.remote_name.clone(),
                    arguments: args,
                    action: Some(action),
                })
            }
            other => Err(InvocationResult::unsupported_action(
                &entry.name,
                other.as_deref(),
                supported,
            )),
        }
    }
}
