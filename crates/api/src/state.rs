use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::token::TokenService;
use crate::config::ServerConfig;
use crate::middleware::debounce::Debouncer;
use crate::permissions::PermissionResolver;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; the caches are constructed once here and shared by
/// handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: hserp_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Session issuance and the token allow-list.
    pub tokens: Arc<TokenService>,
    /// Permission cache and resolution.
    pub permissions: Arc<PermissionResolver>,
    pub debouncer: Arc<Debouncer>,
}

impl AppState {
    pub fn new(pool: hserp_db::DbPool, config: ServerConfig) -> Self {
        let tokens = TokenService::new(config.jwt.clone());
        let permissions = PermissionResolver::new(
            pool.clone(),
            config.rbac.super_account.clone(),
            Duration::from_secs(config.rbac.permission_cache_ttl_secs),
        );
        let debouncer = Debouncer::new(Duration::from_millis(config.debounce_window_ms));
        Self {
            pool,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            permissions: Arc::new(permissions),
            debouncer: Arc::new(debouncer),
        }
    }

    /// Start one expiry janitor per cache. They stop when `cancel` fires.
    pub fn spawn_janitors(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let interval = Duration::from_secs(self.config.rbac.cache_cleanup_interval_secs.max(1));
        vec![
            self.permissions
                .cache()
                .spawn_janitor("permissions", interval, cancel.clone()),
            self.tokens
                .allow_list()
                .spawn_janitor("allow_list", interval, cancel.clone()),
            self.debouncer
                .cache()
                .spawn_janitor("debounce", interval, cancel.clone()),
        ]
    }
}
