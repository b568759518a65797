//! Response envelopes.

use serde::Serialize;

/// Envelope for control-surface mutations.
///
/// `success` mirrors the operation's outcome, not the HTTP status: a start
/// that fails still answers 200 with `success: false` and the reason.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub const fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub const fn failed(data: T, error: String) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(error),
        }
    }
}

/// Bridge liveness.
#[derive(Debug, Clone, Serialize)]
pub struct HealthInfo {
    pub status: &'static str,
    pub version: &'static str,
    pub servers: olb_mcp::StatusSummary,
}
