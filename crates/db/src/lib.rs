//! Persistence layer: connection pool, the generic [`record::Record`]
//! abstraction, entity models and repositories.
//!
//! The SQL dialect is chosen at compile time. The default build targets
//! SQLite; enabling the `postgres` feature switches [`Driver`] and the
//! migration set to PostgreSQL. Everything else is dialect-agnostic.

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::pool::PoolOptions;
use url::Url;

pub mod error;
pub mod models;
pub mod record;
pub mod repositories;

pub use error::DbError;

#[cfg(feature = "postgres")]
pub type Driver = sqlx::Postgres;
#[cfg(not(feature = "postgres"))]
pub type Driver = sqlx::Sqlite;

pub type DbPool = sqlx::Pool<Driver>;
pub type DbRow = <Driver as sqlx::Database>::Row;

#[cfg(feature = "postgres")]
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations/postgres");
#[cfg(not(feature = "postgres"))]
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Connection pool settings.
///
/// | Variable                  | Default | Meaning                                   |
/// |---------------------------|---------|-------------------------------------------|
/// | `DATABASE_URL`            | -       | Full connection URL (preferred)           |
/// | `DB_DIALECT`              | build   | `sqlite` or `postgres` when composing     |
/// | `DB_HOST` / `DB_PORT`     | -       | Server address when composing             |
/// | `DB_USER` / `DB_PASSWORD` | -       | Credentials when composing                |
/// | `DB_NAME`                 | -       | Database name, or file path for SQLite    |
/// | `DB_MAX_CONNECTIONS`      | `20`    | Max open connections                      |
/// | `DB_MIN_CONNECTIONS`      | `2`     | Connections kept idle                     |
/// | `DB_MAX_LIFETIME_SECS`    | `1800`  | Recycle connections older than this       |
/// | `DB_IDLE_TIMEOUT_SECS`    | `600`   | Close idle connections after this         |
/// | `DB_ACQUIRE_TIMEOUT_SECS` | `30`    | Wait for a free connection at most this   |
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolConfigError {
    #[error("DATABASE_URL is not set and DB_NAME is missing")]
    MissingLocation,

    #[error("{var} must be a valid number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("DB_DIALECT {0:?} does not match the compiled database driver")]
    UnsupportedDialect(String),

    #[error("cannot build database URL: {0}")]
    InvalidUrl(String),
}

impl PoolConfig {
    /// Pool settings for `url` with default limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 2,
            max_lifetime: Duration::from_secs(1800),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_env() -> Result<Self, PoolConfigError> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => compose_url()?,
        };

        let defaults = Self::new(url);
        Ok(Self {
            max_connections: env_number("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_number("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            max_lifetime: Duration::from_secs(env_number(
                "DB_MAX_LIFETIME_SECS",
                defaults.max_lifetime.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(env_number(
                "DB_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )?),
            acquire_timeout: Duration::from_secs(env_number(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
            ..defaults
        })
    }
}

fn compose_url() -> Result<String, PoolConfigError> {
    compose_url_from(|name| std::env::var(name).unwrap_or_default())
}

/// Build a URL from the `DB_*` variables returned by `var`.
///
/// The dialect must match the compiled [`Driver`]. Credentials are
/// percent-encoded, so they may contain `@`, `:` or `/`.
fn compose_url_from(var: impl Fn(&str) -> String) -> Result<String, PoolConfigError> {
    let name = var("DB_NAME");
    if name.is_empty() {
        return Err(PoolConfigError::MissingLocation);
    }
    let compiled = if cfg!(feature = "postgres") {
        "postgres"
    } else {
        "sqlite"
    };
    let dialect = match var("DB_DIALECT").to_lowercase() {
        d if d.is_empty() => compiled.to_string(),
        d if d == "postgresql" => "postgres".to_string(),
        d => d,
    };
    if dialect != compiled {
        return Err(PoolConfigError::UnsupportedDialect(dialect));
    }

    if dialect == "sqlite" {
        return Ok(format!("sqlite://{name}?mode=rwc"));
    }

    let or_default = |value: String, default: &str| {
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    };
    let host = or_default(var("DB_HOST"), "localhost");
    let port = or_default(var("DB_PORT"), "5432");
    let mut url = Url::parse(&format!("postgres://{host}:{port}"))
        .map_err(|e| PoolConfigError::InvalidUrl(e.to_string()))?;
    url.set_path(&format!("/{}", name.trim_start_matches('/')));

    let rejected = |()| PoolConfigError::InvalidUrl("URL cannot carry credentials".into());
    let user = var("DB_USER");
    if !user.is_empty() {
        url.set_username(&user).map_err(rejected)?;
        let password = var("DB_PASSWORD");
        if !password.is_empty() {
            url.set_password(Some(&password)).map_err(rejected)?;
        }
    }
    Ok(url.into())
}

fn env_number<T: FromStr>(var: &'static str, default: T) -> Result<T, PoolConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| PoolConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(default),
    }
}

/// Create a connection pool.
///
/// Operations wait up to `acquire_timeout` for a free connection when all
/// `max_connections` are in use, then fail.
pub async fn create_pool(config: &PoolConfig) -> Result<DbPool, sqlx::Error> {
    PoolOptions::<Driver>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations for the compiled dialect.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
