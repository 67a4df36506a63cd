//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- signed session claims.
//! - [`token`] -- the session service: login, validation against the
//!   allow-list, and logout.

pub mod jwt;
pub mod password;
pub mod token;

/// Why a caller could not be authenticated. Every variant maps to 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredentials,

    #[error("Invalid Authorization format. Expected: Bearer <token>")]
    MalformedCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Session has ended, please log in again")]
    TokenRevoked,

    /// Unknown username and wrong password share this variant.
    #[error("Invalid username or password")]
    InvalidCredentials,
}
