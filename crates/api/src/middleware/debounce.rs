//! Duplicate-submission guard for mutating endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use hserp_core::cache::TtlCache;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Remembers recent `(caller, path)` pairs for one window.
pub struct Debouncer {
    window: Duration,
    seen: Arc<TtlCache<String, ()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Arc::new(TtlCache::new(window)),
        }
    }

    /// The cache, exposed for its janitor.
    pub fn cache(&self) -> &Arc<TtlCache<String, ()>> {
        &self.seen
    }

    /// `true` for the first call with `key` in a window, `false` after.
    pub async fn admit(&self, key: String) -> bool {
        self.seen.insert_if_absent(key, (), self.window).await
    }
}

/// The caller identity used in the debounce key: the user id when
/// authenticated, otherwise the client address.
fn caller(request: &Request) -> String {
    if let Some(user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", user.user_id);
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("addr:{}", addr.ip());
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| format!("addr:{}", ip.trim()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Middleware: reject with 429 when the same caller repeats a request to
/// the same path within the debounce window.
pub async fn debounce(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("{}@{}", caller(&request), request.uri().path());
    if !state.debouncer.admit(key).await {
        tracing::debug!(path = %request.uri().path(), "Debounced duplicate request");
        return Err(AppError::TooManyRequests(
            "Request repeated too quickly, please try again shortly".into(),
        ));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeat_within_window_is_refused() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        assert!(debouncer.admit("user:1@/a".into()).await);
        assert!(!debouncer.admit("user:1@/a".into()).await);
        assert!(debouncer.admit("user:2@/a".into()).await);

        tokio::time::advance(Duration::from_millis(501)).await;
        assert!(debouncer.admit("user:1@/a".into()).await);
    }
}
