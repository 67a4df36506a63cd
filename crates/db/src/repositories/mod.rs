//! Repository layer.
//!
//! Each repository is a zero-sized struct whose async methods take a pool
//! reference and compose [`crate::record::Record`] calls.

pub mod rbac_repo;
pub mod user_repo;

pub use rbac_repo::{RbacRepo, SyncReport};
pub use user_repo::UserRepo;
