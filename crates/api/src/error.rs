use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hserp_core::error::CoreError;
use hserp_db::DbError;

use crate::auth::AuthError;
use crate::response::Envelope;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, persistence and authentication errors and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce the
/// standard envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl AppError {
    /// Status, envelope code and caller-facing message.
    ///
    /// 5xx details are logged here and replaced with a generic message.
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::ConstraintViolation(msg) => {
                    (StatusCode::CONFLICT, "CONFLICT", msg.clone())
                }
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Unauthenticated(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            AppError::Db(db) => match db {
                DbError::NotFound { entity } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                DbError::ConstraintViolation(msg) => {
                    tracing::debug!(error = %msg, "Constraint violation");
                    (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        "The change conflicts with existing data".to_string(),
                    )
                }
                DbError::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                DbError::Timeout | DbError::Cancelled => {
                    tracing::warn!(error = %db, "Database operation did not complete");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "SERVICE_UNAVAILABLE",
                        "The service is busy, please retry".to_string(),
                    )
                }
                DbError::TransactionClosed | DbError::Database(_) => internal(db),
            },

            AppError::Auth(auth) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", auth.to_string()),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS", msg.clone())
            }
            AppError::InternalError(msg) => internal(msg),
        }
    }
}

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();
        (status, Json(Envelope::error(code, message))).into_response()
    }
}
