use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use liveclass_core::error::{CoreError, ErrorKind};
use liveclass_db::StoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers and engines.
///
/// Wraps [`CoreError`] for domain errors and adds persistence and
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `liveclass_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persistence failure from the store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Request body failed `validator` checks.
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Coarse category, shared with the WebSocket error replies.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Core(core) => core.kind(),
            AppError::Store(StoreError::Duplicate(_)) => ErrorKind::Conflict,
            AppError::Store(_) | AppError::InternalError(_) => ErrorKind::Internal,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorKind::ValidationFailed,
        }
    }

    /// Stable error code plus a client-safe message.
    ///
    /// Internal failures are logged here and replaced by a generic message.
    pub fn public_parts(&self) -> (&'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::Validation(msg)
                | CoreError::Conflict(msg)
                | CoreError::Unauthorized(msg)
                | CoreError::Forbidden(msg)
                | CoreError::InvalidState(msg)
                | CoreError::InvalidCoordinate(msg) => (core.code(), msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (core.code(), "An internal error occurred".to_string())
                }
                other => (other.code(), other.to_string()),
            },
            AppError::Store(StoreError::Duplicate(constraint)) => (
                "CONFLICT",
                format!("Duplicate value violates unique constraint: {constraint}"),
            ),
            AppError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
            AppError::Validation(errors) => ("VALIDATION_ERROR", errors.to_string()),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
        }
    }
}

/// HTTP status for an error category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        let (code, message) = self.public_parts();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "error": message,
                "code": code,
                "details": errors,
            }),
            _ => json!({
                "error": message,
                "code": code,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
