//! Axum-specific error types and mappings.
//!
//! Maps service errors to HTTP status codes and the `{error, status, type?}`
//! JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use olb_core::RepositoryError;
use olb_mcp::ServiceError;
use serde::Serialize;
use thiserror::Error;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A server config failed validation.
    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    /// Conflict (resource already exists).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The target server must be stopped first.
    #[error("Server running: {0}")]
    ServerRunning(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    /// Stable error type discriminant for client-side handling
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<&'static str>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, None, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, None, msg),
            Self::ConfigInvalid(msg) => (StatusCode::BAD_REQUEST, Some("ConfigInvalid"), msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, None, msg),
            Self::ServerRunning(msg) => (StatusCode::CONFLICT, Some("ServerRunning"), msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, None, msg),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
            error_type,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<RepositoryError> for HttpError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(format!("Server not found: {id}")),
            RepositoryError::Conflict(id) => {
                Self::Conflict(format!("Server '{id}' already exists"))
            }
            RepositoryError::Storage(msg) => Self::Internal(format!("Storage: {msg}")),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Repository(e) => e.into(),
            ServiceError::InvalidConfig(e) => Self::ConfigInvalid(e.to_string()),
            e @ (ServiceError::ServerNotFound(_) | ServiceError::ToolNotFound(_)) => {
                Self::NotFound(e.to_string())
            }
            e @ ServiceError::ServerBusy { .. } => Self::ServerRunning(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olb_core::{ConfigError, ServerState};

    #[test]
    fn test_service_error_mapping() {
        assert!(matches!(
            HttpError::from(ServiceError::Repository(RepositoryError::Conflict("a".into()))),
            HttpError::Conflict(_)
        ));
        assert!(matches!(
            HttpError::from(ServiceError::InvalidConfig(ConfigError::EmptyField("name"))),
            HttpError::ConfigInvalid(_)
        ));
        assert!(matches!(
            HttpError::from(ServiceError::ToolNotFound("x".into())),
            HttpError::NotFound(_)
        ));
        assert!(matches!(
            HttpError::from(ServiceError::ServerBusy {
                id: "a".into(),
                state: ServerState::Running
            }),
            HttpError::ServerRunning(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            HttpError::ServerRunning("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            HttpError::ConfigInvalid("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HttpError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
