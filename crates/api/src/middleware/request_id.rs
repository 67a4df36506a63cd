//! Request-scoped correlation id.
//!
//! `SetRequestIdLayer` stamps `x-request-id` on every request (keeping an
//! inbound value). [`scope`] then makes it readable through [`current`] for
//! the rest of the request, including error envelopes and the panic hook.
//!
//! Task-local values are not inherited by spawned tasks.

use std::future::Future;

use axum::extract::Request;
use axum::http::HeaderName;
use axum::middleware::Next;
use axum::response::Response;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

tokio::task_local! {
    static REQUEST_ID: String;
}

/// The id of the request being handled, if any.
pub fn current() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

/// Run `fut` with `id` as the current request id.
pub async fn scope_with<F: Future>(id: String, fut: F) -> F::Output {
    REQUEST_ID.scope(id, fut).await
}

/// Middleware: expose the request's `x-request-id` header via [`current`].
pub async fn scope(request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    match id {
        Some(id) => scope_with(id, next.run(request)).await,
        None => next.run(request).await,
    }
}
