use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced to callers of the provisioning API.
///
/// Variants carry only caller-safe text. Internal causes are logged where
/// they happen and never travel across this boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("control plane did not acknowledge tenant creation")]
    Upstream,
    #[error("failed to provision tenant")]
    Provisioning,
}

impl IntoResponse for ProvisionError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ProvisionError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ProvisionError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ProvisionError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ProvisionError::Upstream => (
                StatusCode::BAD_GATEWAY,
                "Failed to register tenant with control plane.".into(),
            ),
            ProvisionError::Provisioning => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to provision tenant.".into(),
            ),
        };
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}
