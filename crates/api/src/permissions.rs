//! Per-user permission resolution with a TTL cache.
//!
//! A user's access is the union of `path:VERB` keys over all of their roles.
//! Resolved access is cached per user id; role and permission edits reach an
//! already-cached user only when the entry expires. Concurrent misses for
//! the same user share one storage read.

use std::sync::Arc;
use std::time::Duration;

use hserp_core::cache::TtlCache;
use hserp_core::error::CoreError;
use hserp_core::permission::PermissionSet;
use hserp_core::singleflight::SingleFlight;
use hserp_core::types::DbId;
use hserp_db::models::User;
use hserp_db::record::Record;
use hserp_db::{DbError, DbPool};

use crate::error::{AppError, AppResult};

/// What a user may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The configured super account: every route.
    Unrestricted,
    Granted(PermissionSet),
}

impl Access {
    pub fn allows(&self, path: &str, method: &str) -> bool {
        match self {
            Access::Unrestricted => true,
            Access::Granted(set) => set.allows(path, method),
        }
    }
}

pub struct PermissionResolver {
    pool: DbPool,
    super_account: String,
    cache: Arc<TtlCache<DbId, Arc<Access>>>,
    flight: SingleFlight<DbId, Arc<Access>>,
}

impl PermissionResolver {
    pub fn new(pool: DbPool, super_account: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pool,
            super_account: super_account.into(),
            cache: Arc::new(TtlCache::new(ttl)),
            flight: SingleFlight::new(),
        }
    }

    /// The cache, exposed for its janitor.
    pub fn cache(&self) -> &Arc<TtlCache<DbId, Arc<Access>>> {
        &self.cache
    }

    /// Access for `user_id`, from cache or storage.
    pub async fn resolve(&self, user_id: DbId) -> Result<Arc<Access>, DbError> {
        if let Some(access) = self.cache.get(&user_id).await {
            return Ok(access);
        }
        self.flight
            .run(user_id, || async {
                let access = Arc::new(self.load(user_id).await?);
                self.cache.insert(user_id, Arc::clone(&access)).await;
                Ok::<_, DbError>(access)
            })
            .await
    }

    async fn load(&self, user_id: DbId) -> Result<Access, DbError> {
        let user = Record::<User>::new(&self.pool)
            .preload("roles.permissions")
            .read(user_id)
            .await?;

        if user.username == self.super_account {
            return Ok(Access::Unrestricted);
        }
        let set: PermissionSet = user
            .roles
            .iter()
            .flat_map(|role| role.permissions.iter())
            .map(|p| (p.path.as_str(), p.method.as_str()))
            .collect();
        tracing::debug!(user_id, permissions = set.len(), "Resolved user permissions");
        Ok(Access::Granted(set))
    }

    /// Allow or refuse `user_id` calling `method` on the route template
    /// `path`.
    ///
    /// A user that no longer exists is treated as unauthenticated.
    pub async fn authorize(&self, user_id: DbId, path: &str, method: &str) -> AppResult<()> {
        let access = match self.resolve(user_id).await {
            Ok(access) => access,
            Err(DbError::NotFound { .. }) => {
                return Err(CoreError::Unauthenticated("Account no longer exists".into()).into())
            }
            Err(e) => return Err(AppError::Db(e)),
        };
        if access.allows(path, method) {
            Ok(())
        } else {
            tracing::info!(user_id, path, method, "Permission denied");
            Err(CoreError::Forbidden(format!("No permission for {method} {path}")).into())
        }
    }

    /// Drop the cached access of one user.
    pub async fn invalidate(&self, user_id: DbId) {
        self.cache.remove(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_everything() {
        assert!(Access::Unrestricted.allows("/anything", "DELETE"));
    }

    #[test]
    fn granted_access_normalises_keys() {
        let access = Access::Granted([("/api/v1/Users", "get")].into_iter().collect());
        assert!(access.allows("/api/v1/users", "GET"));
        assert!(!access.allows("/api/v1/users", "POST"));
    }
}
