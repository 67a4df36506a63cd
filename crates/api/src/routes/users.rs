//! Permission-protected routes for `/users`.

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};

use super::registry::RouteRegistry;
use crate::handlers::users;
use crate::middleware::debounce::debounce;
use crate::state::AppState;

/// ```text
/// GET    /users              -> list
/// POST   /users              -> save (debounced)
/// DELETE /users/{id}         -> remove
/// GET    /users/{id}/roles   -> roles
/// ```
pub fn register(registry: RouteRegistry, state: &AppState) -> RouteRegistry {
    registry
        .route("/users", Method::GET, "List users", get(users::list))
        .route(
            "/users",
            Method::POST,
            "Create or update a user",
            post(users::save).layer(from_fn_with_state(state.clone(), debounce)),
        )
        .route("/users/{id}", Method::DELETE, "Delete a user", delete(users::remove))
        .route("/users/{id}/roles", Method::GET, "List a user's roles", get(users::roles))
}
