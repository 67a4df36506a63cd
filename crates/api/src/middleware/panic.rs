//! Panic recovery at the request boundary.
//!
//! The hook logs the panic with its backtrace and the current request id.
//! `CatchPanicLayer` then turns the unwound request into the generic
//! internal-error envelope, so nothing but "An internal error occurred"
//! reaches the caller.

use std::any::Any;
use std::backtrace::Backtrace;

use axum::response::{IntoResponse, Response};

use super::request_id;
use crate::error::AppError;

/// Replace the process panic hook with one that logs through `tracing`.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        let request_id = request_id::current().unwrap_or_else(|| "-".to_string());
        tracing::error!(%request_id, panic = %info, %backtrace, "Panic");
    }));
}

/// `CatchPanicLayer::custom` handler.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::InternalError(format!("Request handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn panic_becomes_generic_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
