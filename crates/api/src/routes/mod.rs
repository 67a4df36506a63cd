pub mod auth;
pub mod health;
pub mod rbac;
pub mod registry;
pub mod users;

use axum::middleware::from_fn_with_state;
use axum::Router;
use hserp_core::permission::PermissionPoint;

use crate::middleware::auth::authenticate;
use crate::middleware::rbac::authorize;
use crate::state::AppState;
use registry::RouteRegistry;

/// Where [`api_routes`] is nested.
pub const API_PREFIX: &str = "/api/v1";

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register, /auth/login, /auth/reset-password    public
/// /auth/logout, /auth/me                               session required
///
/// /users, /users/{id}, /users/{id}/roles               session + permission
/// /rbac/roles, /rbac/roles/{id}, ...                   session + permission
/// /rbac/permissions, /rbac/permissions/{id}            session + permission
/// /rbac/users/{id}/roles                               session + permission
/// ```
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let (protected, _) = protected_routes(state).into_parts();
    // The last route_layer runs first.
    let protected = protected
        .route_layer(from_fn_with_state(state.clone(), authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .merge(auth::public_router(state))
        .merge(auth::session_router(state))
        .merge(protected)
}

/// Every permission-protected route, with its permission point.
pub fn protected_routes(state: &AppState) -> RouteRegistry {
    let registry = RouteRegistry::new(API_PREFIX);
    let registry = users::register(registry, state);
    rbac::register(registry, state)
}

/// The permission points synced into storage at startup.
pub fn permission_points(state: &AppState) -> Vec<PermissionPoint> {
    protected_routes(state).into_parts().1
}
