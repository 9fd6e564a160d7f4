//! Interface-layer error rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kopi_core::{ApplicationError, InterfaceError};
use serde_json::json;

/// Wrapper so handlers can `?` interface errors straight into responses.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(err: ApplicationError, correlation_id: &str) -> Self {
        tracing::error!(
            event_name = "interface.request.failed",
            correlation_id,
            error = %err,
            "request failed",
        );
        Self(err.into_interface(correlation_id))
    }

    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let correlation_id = match &self.0 {
            InterfaceError::BadRequest { correlation_id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id, .. }
            | InterfaceError::Internal { correlation_id, .. } => correlation_id.clone(),
        };
        // Detail stays in the logs; callers get the safe message.
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            _ => self.0.user_message().to_string(),
        };
        (
            status,
            Json(json!({
                "error": message,
                "correlation_id": correlation_id,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persistence_errors_render_as_service_unavailable() {
        let err = ApiError::from_application(
            ApplicationError::Persistence("disk full".to_string()),
            "req-9",
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn bad_request_keeps_its_message() {
        let response = ApiError::bad_request("message must not be empty", "req-1").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
