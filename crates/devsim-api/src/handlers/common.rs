//! Common API handler utilities.

use axum::extract::rejection::JsonRejection;
use axum::response::Json;

use crate::models::ErrorResponse;

/// Result type for all API handlers.
pub type HandlerResult<T> = Result<Json<T>, ErrorResponse>;

/// Result type for utility functions that return parsed values.
pub type ExtractResult<T> = Result<T, ErrorResponse>;

/// Unwrap a JSON body, turning decode failures into validation errors.
///
/// Handlers take `Result<Json<T>, JsonRejection>` so an unknown enum value or
/// a malformed document is reported like any other invalid payload.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ExtractResult<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected request body");
            Err(ErrorResponse::validation(format!(
                "body: {}",
                rejection.body_text()
            )))
        }
    }
}

/// Wrap a successful value.
pub fn ok<T>(value: T) -> HandlerResult<T> {
    Ok(Json(value))
}
