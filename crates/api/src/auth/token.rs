//! Session issuance, validation and revocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hserp_core::cache::TtlCache;
use hserp_core::error::CoreError;
use hserp_core::types::DbId;
use hserp_db::models::User;
use hserp_db::repositories::UserRepo;
use hserp_db::DbPool;
use serde::Serialize;

use super::jwt::{generate_token, token_digest, validate_token, Claims, JwtConfig};
use super::password::verify_password;
use super::AuthError;
use crate::error::{AppError, AppResult};

/// A freshly issued session token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Issues and checks session tokens.
///
/// A token is usable only while its digest is in the allow-list. Entries
/// expire together with the token, and [`TokenService::logout`] removes one
/// early, which is the only way to end a session before its expiry.
pub struct TokenService {
    config: JwtConfig,
    allow_list: Arc<TtlCache<String, DbId>>,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        let lifetime = Duration::from_secs(config.lifetime_secs().unsigned_abs());
        Self {
            config,
            allow_list: Arc::new(TtlCache::new(lifetime)),
        }
    }

    /// The allow-list, exposed for its janitor.
    pub fn allow_list(&self) -> &Arc<TtlCache<String, DbId>> {
        &self.allow_list
    }

    /// Sign a token for `user` and admit it to the allow-list.
    pub async fn issue(&self, user: &User) -> AppResult<IssuedToken> {
        let (token, claims) = generate_token(user.meta.id, &user.username, &self.config)
            .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| AppError::InternalError("Token expiry out of range".into()))?;

        let expires_in = self.config.lifetime_secs();
        self.allow_list
            .insert_with_ttl(
                token_digest(&token),
                user.meta.id,
                Duration::from_secs(expires_in.unsigned_abs()),
            )
            .await;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in,
        })
    }

    /// Check credentials and issue a token.
    ///
    /// An unknown username and a wrong password fail identically with
    /// [`AuthError::InvalidCredentials`]. A disabled account with a correct
    /// password fails with `Forbidden`.
    pub async fn login(
        &self,
        pool: &DbPool,
        username: &str,
        password: &str,
    ) -> AppResult<(User, IssuedToken)> {
        let user = UserRepo::find_by_username(pool, username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::info!(username, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active() {
            return Err(CoreError::Forbidden("Account is disabled".into()).into());
        }

        let issued = self.issue(&user).await?;
        tracing::info!(user_id = user.meta.id, "User logged in");
        Ok((user, issued))
    }

    /// Return the claims of a live session token.
    ///
    /// The allow-list is consulted before the signature, so a revoked token
    /// is rejected without any cryptographic work.
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        if !self.allow_list.contains(&token_digest(token)).await {
            return Err(AuthError::TokenRevoked);
        }
        validate_token(token, &self.config).map_err(|e| {
            tracing::debug!(error = %e, "Token failed verification");
            AuthError::InvalidToken
        })
    }

    /// End the session for `token`. Returns whether it was live.
    pub async fn logout(&self, token: &str) -> bool {
        self.allow_list.remove(&token_digest(token)).await.is_some()
    }
}
