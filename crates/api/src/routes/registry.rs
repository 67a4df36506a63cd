//! Permission-protected route collection.
//!
//! Each protected route is added together with its permission point, so
//! the router and the set of points synced into the permissions table can
//! never drift apart.

use axum::http::Method;
use axum::routing::MethodRouter;
use axum::Router;
use hserp_core::permission::PermissionPoint;

use crate::state::AppState;

pub struct RouteRegistry {
    prefix: &'static str,
    router: Router<AppState>,
    points: Vec<PermissionPoint>,
}

impl RouteRegistry {
    /// `prefix` is where the router will be nested; points are recorded
    /// with the full path a request is matched against.
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            router: Router::new(),
            points: Vec::new(),
        }
    }

    /// Add `handler` at `path` and record `method` on it as a permission
    /// point. Several methods on one path merge into one route.
    pub fn route(
        mut self,
        path: &str,
        method: Method,
        description: &str,
        handler: MethodRouter<AppState>,
    ) -> Self {
        self.points.push(PermissionPoint::new(
            &format!("{}{path}", self.prefix),
            method.as_str(),
            description,
        ));
        self.router = self.router.route(path, handler);
        self
    }

    pub fn points(&self) -> &[PermissionPoint] {
        &self.points
    }

    pub fn into_parts(self) -> (Router<AppState>, Vec<PermissionPoint>) {
        (self.router, self.points)
    }
}
