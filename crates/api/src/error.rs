use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleetwatch_core::error::CoreError;
use fleetwatch_events::{NotifyError, StoreError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent `{ "error", "code" }`
/// JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure from the alert store or a feed operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            },

            AppError::Store(err) => classify_store_error(err),

            AppError::Notify(NotifyError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Notify(NotifyError::Store(err)) => classify_store_error(err),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a store failure to an HTTP status, error code and message.
///
/// - `NotFound` maps to 404, `NotOwner` to 403.
/// - `UnknownRecipient` maps to 400.
/// - `Unavailable` maps to 503 so clients know a retry may succeed.
/// - Anything else maps to 500 with a sanitized message.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Alert with id {id} not found"),
        ),
        StoreError::NotOwner { .. } => (
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Alert belongs to another user".to_string(),
        ),
        StoreError::UnknownRecipient(id) => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("Recipient {id} does not exist"),
        ),
        StoreError::Unavailable(msg) => unavailable(msg),
        other => internal(&other.to_string()),
    }
}

fn unavailable(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::warn!(error = %detail, "Datastore unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "UNAVAILABLE",
        "Service temporarily unavailable, retry later".to_string(),
    )
}

fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
