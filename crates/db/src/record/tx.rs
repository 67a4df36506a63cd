//! Unit-of-work handle shared by records bound to one transaction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sqlx::Transaction;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::DbError;
use crate::{DbPool, Driver};

type Slot = Option<Transaction<'static, Driver>>;

/// An open database transaction.
///
/// Cloning is cheap and every clone refers to the same transaction. Records
/// bound through [`super::Record::with_transaction`] run their statements on
/// it one at a time; the internal lock serialises statements, so a handle
/// shared between tasks never interleaves two statements on the connection.
///
/// Once committed or rolled back, further use fails with
/// [`DbError::TransactionClosed`]. Dropping the last clone of an unfinished
/// transaction rolls it back.
#[derive(Clone)]
pub struct Tx {
    inner: Arc<TxInner>,
}

struct TxInner {
    conn: Mutex<Slot>,
    savepoints: AtomicU32,
}

impl Tx {
    pub async fn begin(pool: &DbPool) -> Result<Self, DbError> {
        let tx = pool.begin().await?;
        Ok(Self {
            inner: Arc::new(TxInner {
                conn: Mutex::new(Some(tx)),
                savepoints: AtomicU32::new(0),
            }),
        })
    }

    pub async fn commit(&self) -> Result<(), DbError> {
        let tx = self.take().await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<(), DbError> {
        let tx = self.take().await?;
        tx.rollback().await?;
        Ok(())
    }

    pub async fn is_active(&self) -> bool {
        self.inner.conn.lock().await.is_some()
    }

    async fn take(&self) -> Result<Transaction<'static, Driver>, DbError> {
        self.inner
            .conn
            .lock()
            .await
            .take()
            .ok_or(DbError::TransactionClosed)
    }

    /// Lock the connection for one statement.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.conn.lock().await
    }

    /// Open a savepoint and return its name.
    pub(crate) async fn savepoint(&self) -> Result<String, DbError> {
        let n = self.inner.savepoints.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("sp_{n}");
        self.execute(&format!("SAVEPOINT {name}")).await?;
        Ok(name)
    }

    pub(crate) async fn release(&self, name: &str) -> Result<(), DbError> {
        self.execute(&format!("RELEASE SAVEPOINT {name}")).await
    }

    pub(crate) async fn rollback_to(&self, name: &str) -> Result<(), DbError> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {name}")).await
    }

    async fn execute(&self, sql: &str) -> Result<(), DbError> {
        let mut slot = self.lock().await;
        let tx = slot.as_mut().ok_or(DbError::TransactionClosed)?;
        sqlx::query(sql).execute(&mut **tx).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("savepoints", &self.inner.savepoints.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
