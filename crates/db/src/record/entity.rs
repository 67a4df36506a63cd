//! Schema description implemented by every persisted entity.

use std::collections::HashMap;

use async_trait::async_trait;
use hserp_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::{FromRow, Row};

use super::Record;
use crate::error::DbError;
use crate::DbRow;

/// The four bookkeeping columns every entity table carries.
///
/// Embed with `#[sqlx(flatten)]` and `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize)]
pub struct RecordMeta {
    pub id: DbId,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<Timestamp>,
}

impl RecordMeta {
    pub fn with_id(id: DbId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A table-backed type usable with [`Record`].
///
/// `fields` lists the entity-specific writable columns (the four meta
/// columns are managed by the record layer). Entities with associations
/// override `preload`.
#[async_trait]
pub trait Entity: for<'r> FromRow<'r, DbRow> + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Human-readable name used in error messages.
    const NAME: &'static str;

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
    fn fields(&self) -> Vec<(&'static str, super::Value)>;

    /// Fill the association named by the first segment of `path` on every
    /// item; any remaining `a.b` segments are passed to the associated
    /// entity's own `preload`.
    async fn preload(
        record: &Record<Self>,
        items: &mut [Self],
        path: &str,
    ) -> Result<(), DbError> {
        let _ = (record, items);
        Err(DbError::InvalidQuery(format!(
            "{} has no association named '{path}'",
            Self::NAME
        )))
    }
}

/// Split `roles.permissions` into `("roles", Some("permissions"))`.
pub fn split_association(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// A target row paired with the owner id it was reached through.
pub struct Linked<T> {
    pub owner_id: DbId,
    pub item: T,
}

impl<'r, T: FromRow<'r, DbRow>> FromRow<'r, DbRow> for Linked<T> {
    fn from_row(row: &'r DbRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            owner_id: row.try_get("owner_id")?,
            item: T::from_row(row)?,
        })
    }
}

/// A many-to-many link table between two entities.
#[derive(Debug, Clone, Copy)]
pub struct Via {
    pub table: &'static str,
    pub owner_key: &'static str,
    pub target_key: &'static str,
}

/// Load `T` rows linked to each owner id through `via`, grouped by owner.
///
/// Runs on the same connection (or transaction) as `record` and honours
/// `T`'s soft-delete scope. `nested` is forwarded to `T::preload`.
pub async fn load_linked<O, T>(
    record: &Record<O>,
    owner_ids: &[DbId],
    via: Via,
    nested: Option<&str>,
) -> Result<HashMap<DbId, Vec<T>>, DbError>
where
    O: Entity,
    T: Entity,
{
    let mut grouped: HashMap<DbId, Vec<T>> = HashMap::new();
    if owner_ids.is_empty() {
        return Ok(grouped);
    }

    let target = record.for_entity::<T>();
    let rows: Vec<Linked<T>> = target
        .select([
            format!("{}.{} AS owner_id", via.table, via.owner_key),
            format!("{}.*", T::TABLE),
        ])
        .inner_join(
            format!(
                "{link} ON {link}.{key} = {target}.id",
                link = via.table,
                key = via.target_key,
                target = T::TABLE
            ),
            (),
        )
        .filter(
            format!("{}.{} IN ?", via.table, via.owner_key),
            (owner_ids.to_vec(),),
        )
        .order(format!("{}.id", T::TABLE))
        .scan()
        .await?;

    let (owners, mut items): (Vec<DbId>, Vec<T>) =
        rows.into_iter().map(|l| (l.owner_id, l.item)).unzip();

    if let Some(nested) = nested {
        T::preload(&target, &mut items, nested).await?;
    }

    for (owner, item) in owners.into_iter().zip(items) {
        grouped.entry(owner).or_default().push(item);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_association_paths() {
        assert_eq!(split_association("roles"), ("roles", None));
        assert_eq!(
            split_association("roles.permissions"),
            ("roles", Some("permissions"))
        );
        assert_eq!(split_association("a.b.c"), ("a", Some("b.c")));
    }

    #[test]
    fn meta_persistence_flags() {
        assert!(!RecordMeta::default().is_persisted());
        assert!(RecordMeta::with_id(3).is_persisted());
        assert!(!RecordMeta::with_id(3).is_deleted());
    }
}
