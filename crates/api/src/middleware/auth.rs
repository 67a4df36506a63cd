//! Bearer-token authentication.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use hserp_core::types::DbId;

use crate::auth::AuthError;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, placed in request extensions by
/// [`authenticate`].
///
/// Use it as an extractor in handlers behind that middleware:
///
/// ```ignore
/// async fn me(user: AuthUser) -> AppResult<ApiJson<DbId>> {
///     Ok(ok(user.user_id))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub username: String,
    /// The bearer credential, kept for logout.
    pub token: String,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AuthError::MissingCredentials.into())
    }
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MalformedCredentials)?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MalformedCredentials)?;
    Ok(token)
}

/// Middleware: reject the request unless it carries a live session token,
/// then attach the caller as [`AuthUser`].
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?.to_owned();
    let claims = state.tokens.validate(&token).await?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        username: claims.username,
        token,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn missing_header_is_missing_credentials() {
        assert_matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn other_schemes_are_malformed() {
        assert_matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedCredentials)
        );
        assert_matches!(
            bearer_token(&headers("Bearer   ")),
            Err(AuthError::MalformedCredentials)
        );
    }
}
