//! Handlers for `/auth`.

use axum::extract::State;
use hserp_core::error::CoreError;
use hserp_core::validation::{validate_email, validate_password, validate_username};
use hserp_db::models::{User, STATUS_ACTIVE};
use hserp_db::repositories::UserRepo;
use hserp_db::DbError;
use serde::Deserialize;

use crate::auth::password::hash_password;
use crate::auth::token::IssuedToken;
use crate::config::AppMode;
use crate::error::AppResult;
use crate::extract::JsonBody;
use crate::middleware::auth::AuthUser;
use crate::response::{ok, ApiJson};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterRequest>,
) -> AppResult<ApiJson<User>> {
    validate_username(&input.username)?;
    validate_password(&input.password)?;
    validate_email(&input.email)?;

    let mut user = User {
        username: input.username,
        nickname: input.nickname,
        email: input.email,
        phone: input.phone,
        password_hash: hash_password(&input.password)?,
        status: STATUS_ACTIVE,
        ..Default::default()
    };
    UserRepo::create(&state.pool, &mut user).await?;

    tracing::info!(user_id = user.meta.id, username = %user.username, "User registered");
    Ok(ok(user))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginRequest>,
) -> AppResult<ApiJson<IssuedToken>> {
    let (_, issued) = state
        .tokens
        .login(&state.pool, &input.username, &input.password)
        .await?;
    Ok(ok(issued))
}

/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> AppResult<ApiJson<()>> {
    state.tokens.logout(&user.token).await;
    tracing::info!(user_id = user.user_id, "User logged out");
    Ok(ok(()))
}

/// GET /api/v1/auth/me -- the caller, with roles.
pub async fn me(State(state): State<AppState>, user: AuthUser) -> AppResult<ApiJson<User>> {
    let user = UserRepo::find_by_id(&state.pool, user.user_id).await?;
    Ok(ok(user))
}

/// POST /api/v1/auth/reset-password
///
/// Sets a password without the old one, so it is only served in debug mode.
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ResetPasswordRequest>,
) -> AppResult<ApiJson<()>> {
    if state.config.app_mode != AppMode::Debug {
        return Err(CoreError::Forbidden("Password reset is only available in debug mode".into()).into());
    }
    validate_password(&input.password)?;

    let user = UserRepo::find_by_username(&state.pool, &input.username)
        .await?
        .ok_or(DbError::not_found("User"))?;
    UserRepo::set_password(&state.pool, user.meta.id, &hash_password(&input.password)?).await?;

    tracing::warn!(user_id = user.meta.id, "Password reset through debug endpoint");
    Ok(ok(()))
}
