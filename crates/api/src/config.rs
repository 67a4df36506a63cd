use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// A configuration variable that is missing or cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Whether debug-only endpoints are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Debug,
    Release,
}

impl FromStr for AppMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            _ => Err(()),
        }
    }
}

/// Authorization settings shared by the permission resolver and startup.
#[derive(Debug, Clone)]
pub struct RbacConfig {
    /// Username that bypasses every permission check.
    pub super_account: String,
    pub permission_cache_ttl_secs: u64,
    /// Interval for the cache janitors.
    pub cache_cleanup_interval_secs: u64,
    pub auto_migrate: bool,
    pub auto_permission_sync: bool,
}

/// Accepted range for second-granularity durations: up to one year.
const SECS_RANGE: RangeInclusive<u64> = 1..=365 * 24 * 60 * 60;

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            super_account: "admin".into(),
            permission_cache_ttl_secs: 600,
            cache_cleanup_interval_secs: 1800,
            auto_migrate: true,
            auto_permission_sync: true,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Database settings live in [`hserp_db::PoolConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Upper bound on draining in-flight requests at shutdown.
    pub shutdown_timeout_secs: u64,
    pub app_mode: AppMode,
    /// Window within which a repeated mutating request is rejected.
    pub debounce_window_ms: u64,
    pub jwt: JwtConfig,
    pub rbac: RbacConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `3000`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                    |
    /// | `APP_MODE`                    | `release`               |
    /// | `DEBOUNCE_WINDOW_MS`          | `500`                   |
    /// | `SUPER_ACCOUNT`               | `admin`                 |
    /// | `PERMISSION_CACHE_TTL_SECS`   | `600`                   |
    /// | `CACHE_CLEANUP_INTERVAL_SECS` | `1800`                  |
    /// | `AUTO_MIGRATE`                | `true`                  |
    /// | `AUTO_PERMISSION_SYNC`        | `true`                  |
    ///
    /// JWT settings are read by [`JwtConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or("HOST", "0.0.0.0");
        let port = parse_env("PORT", 3000)?;

        let cors_origins = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let app_mode = match std::env::var("APP_MODE") {
            Ok(value) => value.parse().map_err(|()| ConfigError::Invalid {
                var: "APP_MODE",
                value,
            })?,
            Err(_) => AppMode::Release,
        };

        let defaults = RbacConfig::default();
        let rbac = RbacConfig {
            super_account: env_or("SUPER_ACCOUNT", &defaults.super_account),
            permission_cache_ttl_secs: parse_env_in(
                "PERMISSION_CACHE_TTL_SECS",
                defaults.permission_cache_ttl_secs,
                SECS_RANGE,
            )?,
            cache_cleanup_interval_secs: parse_env_in(
                "CACHE_CLEANUP_INTERVAL_SECS",
                defaults.cache_cleanup_interval_secs,
                SECS_RANGE,
            )?,
            auto_migrate: parse_env("AUTO_MIGRATE", defaults.auto_migrate)?,
            auto_permission_sync: parse_env("AUTO_PERMISSION_SYNC", defaults.auto_permission_sync)?,
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_env_in("REQUEST_TIMEOUT_SECS", 30, SECS_RANGE)?,
            shutdown_timeout_secs: parse_env_in("SHUTDOWN_TIMEOUT_SECS", 30, SECS_RANGE)?,
            app_mode,
            debounce_window_ms: parse_env_in("DEBOUNCE_WINDOW_MS", 500, 0..=60 * 60 * 1000)?,
            jwt: JwtConfig::from_env()?,
            rbac,
        })
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Parse `var` if set, otherwise return `default`.
pub(crate) fn parse_env<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_env`], but the value must also fall within `range`.
pub(crate) fn parse_env_in<T>(
    var: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
{
    let value = parse_env(var, default)?;
    check_range(var, value, &range)
}

fn check_range<T: PartialOrd + Display>(
    var: &'static str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<T, ConfigError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_mode_parses_case_insensitively() {
        assert_eq!("Debug".parse::<AppMode>(), Ok(AppMode::Debug));
        assert_eq!(" release ".parse::<AppMode>(), Ok(AppMode::Release));
        assert!("test".parse::<AppMode>().is_err());
    }

    #[test]
    fn unset_variable_uses_default() {
        let value: u64 = parse_env("HSERP_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert_eq!(check_range("TTL", 600, &SECS_RANGE).unwrap(), 600);
        assert!(check_range("TTL", 0, &SECS_RANGE).is_err());

        let err = check_range("PERMISSION_CACHE_TTL_SECS", u64::MAX, &SECS_RANGE).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: "PERMISSION_CACHE_TTL_SECS", ref value }
                if value == &u64::MAX.to_string()
        ));
    }

    #[test]
    fn unset_variable_default_is_range_checked() {
        assert!(parse_env_in("HSERP_TEST_UNSET_VARIABLE", 0u64, SECS_RANGE).is_err());
        assert_eq!(parse_env_in("HSERP_TEST_UNSET_VARIABLE", 5u64, SECS_RANGE).unwrap(), 5);
    }
}
