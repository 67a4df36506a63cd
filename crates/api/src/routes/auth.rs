//! Route definitions for `/auth`.

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::middleware::auth::authenticate;
use crate::middleware::debounce::debounce;
use crate::state::AppState;

/// Public routes.
///
/// ```text
/// POST /auth/register        -> register (debounced)
/// POST /auth/login           -> login
/// POST /auth/reset-password  -> reset_password (APP_MODE=debug only)
/// ```
pub fn public_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/auth/register",
            post(auth::register).layer(from_fn_with_state(state.clone(), debounce)),
        )
        .route("/auth/login", post(auth::login))
        .route("/auth/reset-password", post(auth::reset_password))
}

/// Routes that need a session but no permission.
///
/// ```text
/// POST /auth/logout  -> logout
/// GET  /auth/me      -> me
/// ```
pub fn session_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}
