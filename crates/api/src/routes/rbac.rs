//! Permission-protected routes for `/rbac`.

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};

use super::registry::RouteRegistry;
use crate::handlers::rbac;
use crate::middleware::debounce::debounce;
use crate::state::AppState;

/// ```text
/// GET    /rbac/roles                    -> list_roles
/// POST   /rbac/roles                    -> save_role
/// GET    /rbac/roles/{id}               -> get_role
/// GET    /rbac/roles/{id}/permissions   -> role_permissions
/// POST   /rbac/roles/{id}/permissions   -> assign_role_permissions (debounced)
/// GET    /rbac/permissions              -> list_permissions
/// DELETE /rbac/permissions/{id}         -> delete_permission
/// POST   /rbac/users/{id}/roles         -> assign_user_roles (debounced)
/// ```
pub fn register(registry: RouteRegistry, state: &AppState) -> RouteRegistry {
    registry
        .route("/rbac/roles", Method::GET, "List roles", get(rbac::list_roles))
        .route("/rbac/roles", Method::POST, "Create or update a role", post(rbac::save_role))
        .route("/rbac/roles/{id}", Method::GET, "Get a role", get(rbac::get_role))
        .route(
            "/rbac/roles/{id}/permissions",
            Method::GET,
            "List a role's permissions",
            get(rbac::role_permissions),
        )
        .route(
            "/rbac/roles/{id}/permissions",
            Method::POST,
            "Replace a role's permissions",
            post(rbac::assign_role_permissions).layer(from_fn_with_state(state.clone(), debounce)),
        )
        .route(
            "/rbac/permissions",
            Method::GET,
            "List permissions",
            get(rbac::list_permissions),
        )
        .route(
            "/rbac/permissions/{id}",
            Method::DELETE,
            "Delete a permission",
            delete(rbac::delete_permission),
        )
        .route(
            "/rbac/users/{id}/roles",
            Method::POST,
            "Replace a user's roles",
            post(rbac::assign_user_roles).layer(from_fn_with_state(state.clone(), debounce)),
        )
}
