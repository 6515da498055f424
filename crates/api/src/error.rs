use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use hearing_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
///
/// Validation failures are the exception to the `{ "error", "code" }` shape:
/// their body is the field map itself, `{ "<field>": ["<message>", ...] }`,
/// so clients can attach each message to the offending input.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `hearing_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A request body that is not usable JSON at all.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Core(CoreError::Validation(errors)) => {
                return (StatusCode::BAD_REQUEST, axum::Json(errors)).into_response();
            }
            AppError::Core(CoreError::NotFound { entity, id }) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} with id {id} not found"),
            ),
            AppError::Core(CoreError::Conflict(msg)) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Core(CoreError::Unauthorized(msg)) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
            }
            AppError::Core(CoreError::Forbidden(msg)) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::Core(CoreError::Repository(err)) => {
                tracing::error!(error = %err, "Repository error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
