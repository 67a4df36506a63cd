//! Repository for the `users` table.

use hserp_core::pagination::Page;
use hserp_core::types::DbId;

use crate::error::DbError;
use crate::models::User;
use crate::record::{Record, Value};
use crate::DbPool;

/// Provides account persistence on top of [`Record<User>`].
pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &DbPool, user: &mut User) -> Result<(), DbError> {
        Record::<User>::new(pool).create(user).await
    }

    /// Insert when `user` has no id, otherwise apply a partial update.
    ///
    /// The update writes only non-zero fields, so an empty password hash or
    /// nickname in `user` leaves the stored value untouched.
    pub async fn save(pool: &DbPool, user: &mut User) -> Result<(), DbError> {
        let users = Record::<User>::new(pool);
        if user.meta.is_persisted() {
            users.update(user).await
        } else {
            users.create(user).await
        }
    }

    /// Find a live user by id, with roles loaded.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<User, DbError> {
        Record::<User>::new(pool).preload("roles").read(id).await
    }

    /// Find a live user by username (case-sensitive).
    pub async fn find_by_username(pool: &DbPool, username: &str) -> Result<Option<User>, DbError> {
        match Record::<User>::new(pool)
            .filter("username = ?", (username,))
            .one()
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// One page of users ordered by id, optionally filtered by a username
    /// substring, with roles loaded.
    pub async fn page(
        pool: &DbPool,
        username: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<Page<User>, DbError> {
        let mut users = Record::<User>::new(pool).preload("roles").order("users.id");
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            users = users.filter("username LIKE ?", (format!("%{username}%"),));
        }
        users.page(page, page_size).await
    }

    /// Overwrite the password hash only.
    pub async fn set_password(pool: &DbPool, user_id: DbId, password_hash: &str) -> Result<(), DbError> {
        let affected = Record::<User>::new(pool)
            .filter("id = ?", (user_id,))
            .update_columns([
                ("password_hash", Value::from(password_hash)),
                ("updated_at", Value::from(chrono::Utc::now())),
            ])
            .await?;
        if affected == 0 {
            return Err(DbError::not_found("User"));
        }
        Ok(())
    }

    /// Write `status` even when it is zero, which a partial update skips.
    pub async fn set_status(pool: &DbPool, user_id: DbId, status: i64) -> Result<(), DbError> {
        let affected = Record::<User>::new(pool)
            .filter("id = ?", (user_id,))
            .update_columns([
                ("status", Value::from(status)),
                ("updated_at", Value::from(chrono::Utc::now())),
            ])
            .await?;
        if affected == 0 {
            return Err(DbError::not_found("User"));
        }
        Ok(())
    }

    /// Soft-delete a user and drop their role links.
    pub async fn delete(pool: &DbPool, user_id: DbId) -> Result<(), DbError> {
        let users = Record::<User>::new(pool);
        users
            .transaction(|tx| async move {
                let users = Record::<User>::new(pool).with_transaction(&tx);
                users.delete(user_id).await?;
                users
                    .exec("DELETE FROM user_roles WHERE user_id = ?", (user_id,))
                    .await?;
                Ok::<_, DbError>(())
            })
            .await
    }
}
