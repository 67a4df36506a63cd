//! User entity model.

use async_trait::async_trait;
use hserp_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

use super::role::{Role, USER_ROLES};
use crate::error::DbError;
use crate::record::{load_linked, split_association, Entity, Record, RecordMeta, Value};

/// Account status: may log in.
pub const STATUS_ACTIVE: i64 = 1;
/// Account status: login refused.
pub const STATUS_DISABLED: i64 = 0;

/// A row from the `users` table.
///
/// `roles` is only populated when loaded with `preload("roles")`.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct User {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gender: i64,
    pub age: i64,
    pub status: i64,
    #[sqlx(skip)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status != STATUS_DISABLED
    }
}

#[async_trait]
impl Entity for User {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "User";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("username", Value::from(&self.username)),
            ("nickname", Value::from(&self.nickname)),
            ("email", Value::from(&self.email)),
            ("phone", Value::from(&self.phone)),
            ("password_hash", Value::from(&self.password_hash)),
            ("gender", Value::from(self.gender)),
            ("age", Value::from(self.age)),
            ("status", Value::from(self.status)),
        ]
    }

    async fn preload(record: &Record<Self>, items: &mut [Self], path: &str) -> Result<(), DbError> {
        match split_association(path) {
            ("roles", nested) => {
                let ids: Vec<DbId> = items.iter().map(|u| u.meta.id).collect();
                let mut roles = load_linked::<User, Role>(record, &ids, USER_ROLES, nested).await?;
                for user in items.iter_mut() {
                    user.roles = roles.remove(&user.meta.id).unwrap_or_default();
                }
                Ok(())
            }
            _ => Err(DbError::InvalidQuery(format!(
                "User has no association named '{path}'"
            ))),
        }
    }
}
