//! The uniform response envelope.
//!
//! Every JSON response, success or failure, has the shape
//! `{ "code", "message", "data", "request_id" }`. Successful responses use
//! `code = "OK"`; failures use the codes in [`crate::error`].

use axum::Json;
use serde::Serialize;

use crate::middleware::request_id;

pub const CODE_OK: &str = "OK";

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: &'static str,
    pub message: String,
    pub data: Option<T>,
    /// Correlation id of the request that produced this response.
    pub request_id: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            message: "success".into(),
            data: Some(data),
            request_id: request_id::current(),
        }
    }
}

impl Envelope<()> {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            request_id: request_id::current(),
        }
    }
}

/// Handler return type for enveloped JSON.
pub type ApiJson<T> = Json<Envelope<T>>;

/// Wrap `data` in a success envelope.
pub fn ok<T: Serialize>(data: T) -> ApiJson<T> {
    Json(Envelope::ok(data))
}
