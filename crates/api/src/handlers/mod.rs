//! Request handlers. Each returns the standard envelope via
//! [`crate::response::ok`] or an [`crate::error::AppError`].

pub mod auth;
pub mod rbac;
pub mod users;
