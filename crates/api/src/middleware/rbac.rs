//! Route-level permission check.
//!
//! Runs after [`super::auth::authenticate`]. The request is matched by its
//! route template (`/api/v1/users/{id}`), not the concrete path, so one
//! grant covers every id.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::auth::AuthUser;
use crate::auth::AuthError;
use crate::error::AppError;
use crate::state::AppState;

/// Middleware: refuse with 403 unless the caller's permission set covers
/// this route and verb.
pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.user_id)
        .ok_or(AuthError::MissingCredentials)?;
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    state
        .permissions
        .authorize(user_id, &path, request.method().as_str())
        .await?;
    Ok(next.run(request).await)
}
