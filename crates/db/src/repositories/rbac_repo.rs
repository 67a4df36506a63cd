//! Repository for roles, permissions and their link tables.

use std::collections::BTreeSet;

use hserp_core::permission::PermissionPoint;
use hserp_core::types::DbId;

use crate::error::DbError;
use crate::models::{Permission, Role, User};
use crate::record::Record;
use crate::DbPool;

/// Outcome of [`RbacRepo::sync_permissions`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Points whose permission row was deleted by an operator; left deleted.
    pub skipped: usize,
}

/// Provides RBAC persistence.
pub struct RbacRepo;

impl RbacRepo {
    pub async fn create_role(pool: &DbPool, role: &mut Role) -> Result<(), DbError> {
        Record::<Role>::new(pool).create(role).await
    }

    /// Partial update: empty name/remark and zero status are not written.
    pub async fn update_role(pool: &DbPool, role: &mut Role) -> Result<(), DbError> {
        Record::<Role>::new(pool).update(role).await
    }

    pub async fn find_role(pool: &DbPool, id: DbId) -> Result<Role, DbError> {
        Record::<Role>::new(pool).preload("permissions").read(id).await
    }

    /// All live roles ordered by id, with permissions loaded.
    pub async fn list_roles(pool: &DbPool) -> Result<Vec<Role>, DbError> {
        Record::<Role>::new(pool)
            .preload("permissions")
            .order("roles.id")
            .more()
            .await
    }

    pub async fn list_permissions(pool: &DbPool) -> Result<Vec<Permission>, DbError> {
        Record::<Permission>::new(pool)
            .order("path")
            .order("method")
            .more()
            .await
    }

    /// Permissions granted to a live role.
    pub async fn role_permissions(pool: &DbPool, role_id: DbId) -> Result<Vec<Permission>, DbError> {
        Ok(Self::find_role(pool, role_id).await?.permissions)
    }

    /// Roles held by a live user.
    pub async fn user_roles(pool: &DbPool, user_id: DbId) -> Result<Vec<Role>, DbError> {
        let user = Record::<User>::new(pool).preload("roles").read(user_id).await?;
        Ok(user.roles)
    }

    /// Replace the roles of `user_id` with `role_ids` in one transaction.
    ///
    /// Fails with [`DbError::NotFound`] if the user or any role is missing,
    /// in which case nothing changes.
    pub async fn assign_roles_to_user(
        pool: &DbPool,
        user_id: DbId,
        role_ids: &[DbId],
    ) -> Result<(), DbError> {
        let role_ids = unique(role_ids);
        let users = Record::<User>::new(pool);
        users
            .transaction(|tx| async move {
                let users = Record::<User>::new(pool).with_transaction(&tx);
                users.read(user_id).await?;

                let found = users
                    .for_entity::<Role>()
                    .where_in("id", role_ids.clone())
                    .count()
                    .await?;
                if found != role_ids.len() as i64 {
                    return Err(DbError::not_found("Role"));
                }

                users
                    .exec("DELETE FROM user_roles WHERE user_id = ?", (user_id,))
                    .await?;
                for role_id in role_ids {
                    users
                        .exec(
                            "INSERT INTO user_roles (user_id, role_id) VALUES (?, ?)",
                            (user_id, role_id),
                        )
                        .await?;
                }
                Ok(())
            })
            .await
    }

    /// Replace the permissions of `role_id` with `permission_ids` in one
    /// transaction.
    pub async fn assign_permissions_to_role(
        pool: &DbPool,
        role_id: DbId,
        permission_ids: &[DbId],
    ) -> Result<(), DbError> {
        let permission_ids = unique(permission_ids);
        let roles = Record::<Role>::new(pool);
        roles
            .transaction(|tx| async move {
                let roles = Record::<Role>::new(pool).with_transaction(&tx);
                roles.read(role_id).await?;

                let found = roles
                    .for_entity::<Permission>()
                    .where_in("id", permission_ids.clone())
                    .count()
                    .await?;
                if found != permission_ids.len() as i64 {
                    return Err(DbError::not_found("Permission"));
                }

                roles
                    .exec("DELETE FROM role_permissions WHERE role_id = ?", (role_id,))
                    .await?;
                for permission_id in permission_ids {
                    roles
                        .exec(
                            "INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)",
                            (role_id, permission_id),
                        )
                        .await?;
                }
                Ok(())
            })
            .await
    }

    /// Remove a permission from every role and soft-delete it, atomically.
    pub async fn delete_permission(pool: &DbPool, permission_id: DbId) -> Result<(), DbError> {
        let permissions = Record::<Permission>::new(pool);
        permissions
            .transaction(|tx| async move {
                let permissions = Record::<Permission>::new(pool).with_transaction(&tx);
                permissions
                    .exec(
                        "DELETE FROM role_permissions WHERE permission_id = ?",
                        (permission_id,),
                    )
                    .await?;
                permissions.delete(permission_id).await?;
                Ok::<_, DbError>(())
            })
            .await
    }

    /// Upsert registered route permission points by name.
    ///
    /// Existing rows get their description, path and method refreshed.
    /// Points whose row was soft-deleted stay deleted.
    pub async fn sync_permissions(
        pool: &DbPool,
        points: &[PermissionPoint],
    ) -> Result<SyncReport, DbError> {
        let permissions = Record::<Permission>::new(pool).unscoped();
        let mut report = SyncReport::default();

        for point in points {
            let mut permission = Permission {
                name: point.name.clone(),
                description: point.description.clone(),
                path: point.path.clone(),
                method: point.method.clone(),
                ..Default::default()
            };
            let created = permissions
                .filter("name = ?", (point.name.as_str(),))
                .first_or_create(&mut permission)
                .await?;

            if created {
                report.created += 1;
            } else if permission.meta.is_deleted() {
                report.skipped += 1;
            } else if permission.description != point.description
                || permission.path != point.path
                || permission.method != point.method
            {
                permission.description = point.description.clone();
                permission.path = point.path.clone();
                permission.method = point.method.clone();
                permissions
                    .select(["description", "path", "method"])
                    .update(&mut permission)
                    .await?;
                report.updated += 1;
            } else {
                report.unchanged += 1;
            }
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "Permission points synced"
        );
        Ok(report)
    }
}

fn unique(ids: &[DbId]) -> Vec<DbId> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}
