//! Role entity model.

use async_trait::async_trait;
use hserp_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

use super::permission::Permission;
use crate::error::DbError;
use crate::record::{load_linked, split_association, Entity, Record, RecordMeta, Value, Via};

/// Link table between users and roles.
pub const USER_ROLES: Via = Via {
    table: "user_roles",
    owner_key: "user_id",
    target_key: "role_id",
};

/// Link table between roles and permissions.
pub const ROLE_PERMISSIONS: Via = Via {
    table: "role_permissions",
    owner_key: "role_id",
    target_key: "permission_id",
};

/// A row from the `roles` table.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct Role {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub remark: String,
    pub status: i64,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
}

#[async_trait]
impl Entity for Role {
    const TABLE: &'static str = "roles";
    const NAME: &'static str = "Role";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(&self.name)),
            ("remark", Value::from(&self.remark)),
            ("status", Value::from(self.status)),
        ]
    }

    async fn preload(record: &Record<Self>, items: &mut [Self], path: &str) -> Result<(), DbError> {
        match split_association(path) {
            ("permissions", nested) => {
                let ids: Vec<DbId> = items.iter().map(|r| r.meta.id).collect();
                let mut permissions =
                    load_linked::<Role, Permission>(record, &ids, ROLE_PERMISSIONS, nested).await?;
                for role in items.iter_mut() {
                    role.permissions = permissions.remove(&role.meta.id).unwrap_or_default();
                }
                Ok(())
            }
            _ => Err(DbError::InvalidQuery(format!(
                "Role has no association named '{path}'"
            ))),
        }
    }
}
