//! Permission entity model.

use serde::Serialize;
use sqlx::FromRow;

use crate::record::{Entity, RecordMeta, Value};

/// A row from the `permissions` table: one verb on one route template.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct Permission {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Unique, `"<path>#<METHOD>"`.
    pub name: String,
    pub description: String,
    pub path: String,
    pub method: String,
}

impl Entity for Permission {
    const TABLE: &'static str = "permissions";
    const NAME: &'static str = "Permission";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::from(&self.name)),
            ("description", Value::from(&self.description)),
            ("path", Value::from(&self.path)),
            ("method", Value::from(&self.method)),
        ]
    }
}
