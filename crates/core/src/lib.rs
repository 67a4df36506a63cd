//! Domain logic shared by the persistence and HTTP layers.
//!
//! Nothing in this crate touches the database or the network: it holds the
//! error taxonomy, pagination rules, the in-process caches used by the
//! authorization pipeline, and permission-key normalisation.

pub mod cache;
pub mod error;
pub mod pagination;
pub mod permission;
pub mod singleflight;
pub mod types;
pub mod validation;
