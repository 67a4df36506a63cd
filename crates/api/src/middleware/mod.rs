//! Request pipeline middleware.
//!
//! - [`request_id`] -- puts the `x-request-id` value in task-local scope.
//! - [`auth`] -- bearer-token authentication and the [`auth::AuthUser`]
//!   extractor.
//! - [`rbac`] -- per-route permission check.
//! - [`debounce`] -- rejects rapid duplicate mutations.
//! - [`panic`] -- panic hook and the panic-to-envelope conversion.

pub mod auth;
pub mod debounce;
pub mod panic;
pub mod rbac;
pub mod request_id;
