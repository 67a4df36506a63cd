//! HS256 session tokens.
//!
//! A token carries the user id, username and expiry. Signature validity
//! alone does not make a token usable; see [`super::token::TokenService`].

use chrono::{DateTime, Utc};
use hserp_core::types::DbId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{parse_env_in, ConfigError};

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The user's database id.
    pub sub: DbId,
    pub username: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token id, so two logins in the same second differ.
    pub jti: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 signing secret.
    pub secret: String,
    /// Token lifetime in hours (default: 24).
    pub expiry_hours: i64,
}

const DEFAULT_EXPIRY_HOURS: i64 = 24;
/// One hour to one year.
const EXPIRY_HOURS_RANGE: std::ops::RangeInclusive<i64> = 1..=365 * 24;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var            | Required | Default |
    /// |--------------------|----------|---------|
    /// | `JWT_SECRET`       | **yes**  | --      |
    /// | `JWT_EXPIRY_HOURS` | no       | `24`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let expiry_hours =
            parse_env_in("JWT_EXPIRY_HOURS", DEFAULT_EXPIRY_HOURS, EXPIRY_HOURS_RANGE)?;
        Ok(Self {
            secret,
            expiry_hours,
        })
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.expiry_hours.saturating_mul(3600)
    }
}

/// Sign a token for the given user. Returns the token and its claims.
pub fn generate_token(
    user_id: DbId,
    username: &str,
    config: &JwtConfig,
) -> Result<(String, Claims), jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: now.saturating_add(config.lifetime_secs()),
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;
    Ok((token, claims))
}

/// Verify the signature and expiry of `token` and return its claims.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// SHA-256 hex digest of a token; the allow-list is keyed by this rather
/// than by the bearer credential itself.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expiry_hours: 24,
        }
    }

    #[test]
    fn generated_token_validates() {
        let config = test_config();
        let (token, issued) = generate_token(42, "alice", &config).unwrap();

        let claims = validate_token(&token, &config).unwrap();
        assert_eq!(claims, issued);
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(claims.expires_at().is_some());
    }

    #[test]
    fn expired_token_fails() {
        let config = test_config();
        // Well past the default 60-second leeway.
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            username: "bob".into(),
            exp: now - 300,
            iat: now - 600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(validate_token(&token, &config).is_err());
    }

    #[test]
    fn token_from_other_secret_fails() {
        let other = JwtConfig {
            secret: "another-secret".into(),
            expiry_hours: 1,
        };
        let (token, _) = generate_token(1, "carol", &other).unwrap();
        assert!(validate_token(&token, &test_config()).is_err());
    }

    #[test]
    fn expiry_hours_are_bounded() {
        assert!(EXPIRY_HOURS_RANGE.contains(&DEFAULT_EXPIRY_HOURS));
        assert!(!EXPIRY_HOURS_RANGE.contains(&0));
        assert!(!EXPIRY_HOURS_RANGE.contains(&(365 * 24 + 1)));
    }

    #[test]
    fn huge_lifetime_saturates_instead_of_overflowing() {
        let config = JwtConfig {
            expiry_hours: i64::MAX,
            ..test_config()
        };
        assert_eq!(config.lifetime_secs(), i64::MAX);
        let (_, claims) = generate_token(1, "dave", &config).unwrap();
        assert_eq!(claims.exp, i64::MAX);
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = token_digest("abc");
        assert_eq!(digest, token_digest("abc"));
        assert_ne!(digest, token_digest("abd"));
        assert_eq!(digest.len(), 64);
    }
}
