//! Unified error handling for the API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API error response with the HTTP status it maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// Validation error (400). The payload must be fixed before retrying.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message, StatusCode::BAD_REQUEST)
    }

    /// Forbidden (403).
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message, StatusCode::FORBIDDEN)
    }

    /// Not found (404).
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            "NOT_FOUND",
            format!("{} not found", resource.into()),
            StatusCode::NOT_FOUND,
        )
    }

    /// Conflict (409). Re-fetch for a fresh ETag.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message, StatusCode::CONFLICT)
    }

    /// Internal server error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code,
                "message": self.message,
                "request_id": serde_json::Value::Null,
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

impl From<devsim_core::Error> for ErrorResponse {
    fn from(e: devsim_core::Error) -> Self {
        use devsim_core::Error;

        match e {
            Error::Validation(v) => Self::validation(v.to_string()),
            Error::Conflict(message) => Self::conflict(message),
            Error::Forbidden(message) => Self::forbidden(message),
            Error::NotFound(resource) => Self::not_found(resource),
            Error::Storage(_) | Error::Provisioning(_) => {
                tracing::error!(error = %e, "Request failed");
                Self::internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use devsim_core::ValidationError;

    use super::*;

    #[test]
    fn test_core_errors_map_to_distinct_statuses() {
        let cases = [
            (
                devsim_core::Error::from(ValidationError::new("Name", "must not be empty")),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                devsim_core::Error::forbidden("stock model"),
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
            (
                devsim_core::Error::not_found("Simulation 9"),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                devsim_core::Error::conflict("stale"),
                StatusCode::CONFLICT,
                "CONFLICT",
            ),
            (
                devsim_core::Error::Storage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let response = ErrorResponse::from(error);
            assert_eq!(response.status, status);
            assert_eq!(response.code, code);
        }
    }

    #[test]
    fn test_validation_message_names_the_field() {
        let err: ErrorResponse =
            devsim_core::Error::from(ValidationError::new("Telemetry[0].Interval", "bad")).into();
        assert_eq!(err.message, "Telemetry[0].Interval: bad");
    }

    #[test]
    fn test_not_found_message() {
        let err = ErrorResponse::not_found("DeviceModel x");
        assert_eq!(err.message, "DeviceModel x not found");
        assert_eq!(err.to_string(), "[NOT_FOUND] DeviceModel x not found");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ErrorResponse::conflict("stale").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["message"], "stale");
        assert!(body["error"]["request_id"].is_null());
        assert!(body["error"].as_object().unwrap().contains_key("request_id"));
    }
}
