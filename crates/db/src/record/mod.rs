//! Generic active-record access over any [`Entity`].
//!
//! A [`Record<E>`] pairs a connection binding (the pool, or an open [`Tx`])
//! with an immutable query state. Chain methods (`filter`, `order`, `limit`,
//! ...) never mutate the receiver: each returns a new `Record` holding a copy
//! of the previous state plus the new clause, so one base record can be
//! shared freely and chained from many tasks at once.
//!
//! ```ignore
//! let users = Record::<User>::new(&pool);
//! let admins = users.filter("status = ?", (1,)).order("id DESC").more().await?;
//! let page = users.preload("roles").page(2, 20).await?;
//! ```
//!
//! Terminal operations execute immediately; nothing is retried. Every
//! operation honours the deadline and cancellation token attached with
//! [`Record::with_timeout`] and [`Record::with_cancellation`].

mod entity;
mod query;
mod tx;
mod value;

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use chrono::Utc;
use hserp_core::pagination::{Page, PageRequest};
use hserp_core::types::DbId;
use sqlx::{FromRow, QueryBuilder};
use tokio_util::sync::CancellationToken;

pub use entity::{load_linked, split_association, Entity, Linked, RecordMeta, Via};
pub use tx::Tx;
pub use value::{Params, Value};

use crate::error::DbError;
use crate::{DbPool, DbRow, Driver};
use query::{Condition, Conjunction, Fragment, Join, Projection, QueryState};

/// Default chunk size for [`Record::batch_create`].
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone)]
enum Binding {
    Pool(DbPool),
    Tx(Tx),
}

/// Runs `$body` with `$ex` bound to an executor for `$binding`: the pool
/// itself, or the locked transaction connection.
macro_rules! with_executor {
    ($binding:expr, |$ex:ident| $body:expr) => {
        match $binding {
            Binding::Pool(pool) => {
                let $ex = pool;
                $body
            }
            Binding::Tx(tx) => {
                let mut slot = tx.lock().await;
                let conn = slot.as_mut().ok_or(DbError::TransactionClosed)?;
                let $ex = &mut **conn;
                $body
            }
        }
    };
}

/// How `update` chooses the columns it writes.
enum UpdateSelection {
    NonZero,
    All,
    Named(Vec<String>),
}

/// Generic CRUD and query building for entity `E`. See the module docs.
pub struct Record<E> {
    binding: Binding,
    state: QueryState,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Record<E> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            state: self.state.clone(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> std::fmt::Debug for Record<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("table", &E::TABLE)
            .field("in_transaction", &matches!(self.binding, Binding::Tx(_)))
            .field("state", &self.state)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction and binding
// ---------------------------------------------------------------------------

impl<E: Entity> Record<E> {
    /// A record bound to the pool, with empty query state.
    pub fn new(pool: &DbPool) -> Self {
        Self {
            binding: Binding::Pool(pool.clone()),
            state: QueryState::default(),
            timeout: None,
            cancel: None,
            _entity: PhantomData,
        }
    }

    /// A copy whose operations all run inside `tx`.
    pub fn with_transaction(&self, tx: &Tx) -> Self {
        let mut next = self.clone();
        next.binding = Binding::Tx(tx.clone());
        next
    }

    /// A copy whose operations each fail with [`DbError::Timeout`] after
    /// `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut next = self.clone();
        next.timeout = Some(timeout);
        next
    }

    /// A copy whose operations fail with [`DbError::Cancelled`] once `token`
    /// is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut next = self.clone();
        next.cancel = Some(token);
        next
    }

    /// A record for another entity on the same binding, deadline and
    /// cancellation token, with empty query state.
    pub fn for_entity<O: Entity>(&self) -> Record<O> {
        Record {
            binding: self.binding.clone(),
            state: QueryState::default(),
            timeout: self.timeout,
            cancel: self.cancel.clone(),
            _entity: PhantomData,
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        matches!(self.binding, Binding::Tx(_))
    }

    /// Same binding, empty query state.
    fn fresh(&self) -> Self {
        self.for_entity::<E>()
    }

    fn chain(&self, apply: impl FnOnce(&mut QueryState)) -> Self {
        let mut next = self.clone();
        apply(&mut next.state);
        next
    }
}

// ---------------------------------------------------------------------------
// Chain methods
// ---------------------------------------------------------------------------

impl<E: Entity> Record<E> {
    /// Add an `AND` predicate. `?` placeholders are filled from `params`.
    pub fn filter(&self, sql: impl Into<String>, params: impl Params) -> Self {
        self.condition(Conjunction::And, sql.into(), params.into_values())
    }

    /// Add an `OR` predicate.
    pub fn or(&self, sql: impl Into<String>, params: impl Params) -> Self {
        self.condition(Conjunction::Or, sql.into(), params.into_values())
    }

    /// Add an `AND NOT` predicate.
    pub fn not(&self, sql: impl Into<String>, params: impl Params) -> Self {
        self.condition(Conjunction::Not, sql.into(), params.into_values())
    }

    /// Shorthand for `filter("column IN ?", (values,))`.
    pub fn where_in<T: Into<Value>>(&self, column: &str, values: Vec<T>) -> Self {
        self.filter(format!("{column} IN ?"), (values,))
    }

    fn condition(&self, conjunction: Conjunction, sql: String, args: Vec<Value>) -> Self {
        self.chain(|state| {
            state.conditions.push(Condition {
                conjunction,
                fragment: Fragment::new(sql, args),
            })
        })
    }

    /// Replace the projection. `"*"` selects every column and, for
    /// [`Record::update`], means "write all fields".
    pub fn select<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.chain(|state| state.selects = columns)
    }

    pub fn order(&self, order: impl Into<String>) -> Self {
        let order = order.into();
        self.chain(|state| state.orders.push(order))
    }

    pub fn limit(&self, limit: i64) -> Self {
        self.chain(|state| state.limit = Some(limit))
    }

    pub fn offset(&self, offset: i64) -> Self {
        self.chain(|state| state.offset = Some(offset))
    }

    pub fn group(&self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.chain(|state| state.groups.push(column))
    }

    pub fn having(&self, sql: impl Into<String>, params: impl Params) -> Self {
        let fragment = Fragment::new(sql, params.into_values());
        self.chain(|state| state.havings.push(fragment))
    }

    /// `LEFT JOIN <sql>`.
    pub fn join(&self, sql: impl Into<String>, params: impl Params) -> Self {
        self.add_join("LEFT JOIN", sql.into(), params.into_values())
    }

    /// `INNER JOIN <sql>`.
    pub fn inner_join(&self, sql: impl Into<String>, params: impl Params) -> Self {
        self.add_join("INNER JOIN", sql.into(), params.into_values())
    }

    fn add_join(&self, kind: &'static str, sql: String, args: Vec<Value>) -> Self {
        self.chain(|state| {
            state.joins.push(Join {
                kind,
                fragment: Fragment::new(sql, args),
            })
        })
    }

    /// Load an association (`"roles"`, or nested `"roles.permissions"`)
    /// after fetching rows.
    pub fn preload(&self, association: impl Into<String>) -> Self {
        let association = association.into();
        self.chain(|state| state.preloads.push(association))
    }

    /// Include soft-deleted rows. In this mode [`Record::delete`] removes
    /// the row permanently.
    pub fn unscoped(&self) -> Self {
        self.chain(|state| state.unscoped = true)
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl<E: Entity> Record<E> {
    /// All rows matching the current state.
    pub async fn more(&self) -> Result<Vec<E>, DbError> {
        self.guard(self.fetch_all()).await
    }

    /// The first matching row, or [`DbError::NotFound`].
    pub async fn one(&self) -> Result<E, DbError> {
        let mut items = self.guard(self.limit(1).fetch_all()).await?;
        items.pop().ok_or(DbError::not_found(E::NAME))
    }

    /// The live row with `id`, or [`DbError::NotFound`].
    pub async fn read(&self, id: DbId) -> Result<E, DbError> {
        self.filter(format!("{}.id = ?", E::TABLE), (id,)).one().await
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        self.guard(self.fetch_count()).await
    }

    pub async fn exist(&self) -> Result<bool, DbError> {
        self.guard(async {
            let mut qb = self.state.select_sql(E::TABLE, Projection::Exists)?;
            let exists: bool = with_executor!(&self.binding, |ex| qb
                .build_query_scalar()
                .fetch_one(ex)
                .await
                .map_err(|e| self.log_failure(e))?);
            Ok::<_, DbError>(exists)
        })
        .await
    }

    /// One column of every matching row.
    pub async fn pluck<T>(&self, column: &str) -> Result<Vec<T>, DbError>
    where
        T: Send + Unpin,
        (T,): for<'r> FromRow<'r, DbRow>,
    {
        self.guard(async {
            let mut qb = self
                .state
                .select_sql(E::TABLE, Projection::Column(column))?;
            let values: Vec<T> = with_executor!(&self.binding, |ex| qb
                .build_query_scalar()
                .fetch_all(ex)
                .await
                .map_err(|e| self.log_failure(e))?);
            Ok::<_, DbError>(values)
        })
        .await
    }

    /// Matching rows decoded into an arbitrary row type, for projections and
    /// joins that do not map onto `E`.
    pub async fn scan<R>(&self) -> Result<Vec<R>, DbError>
    where
        R: for<'r> FromRow<'r, DbRow> + Send + Unpin,
    {
        self.guard(async {
            let mut qb = self.state.select_sql(E::TABLE, Projection::Rows)?;
            let rows: Vec<R> = with_executor!(&self.binding, |ex| qb
                .build_query_as()
                .fetch_all(ex)
                .await
                .map_err(|e| self.log_failure(e))?);
            Ok::<_, DbError>(rows)
        })
        .await
    }

    /// One page of matches plus the total count.
    ///
    /// Out-of-range input is coerced, never rejected: see
    /// [`PageRequest::new`]. When nothing matches, the row fetch is skipped.
    pub async fn page(&self, page: i64, page_size: i64) -> Result<Page<E>, DbError> {
        let request = PageRequest::new(page, page_size);
        let total = self.count().await?;
        if total == 0 {
            return Ok(Page::empty(request));
        }
        let items = self
            .limit(request.page_size)
            .offset(request.offset())
            .more()
            .await?;
        Ok(Page {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        })
    }

    async fn fetch_all(&self) -> Result<Vec<E>, DbError> {
        let mut qb = self.state.select_sql(E::TABLE, Projection::Rows)?;
        let mut items: Vec<E> = with_executor!(&self.binding, |ex| qb
            .build_query_as()
            .fetch_all(ex)
            .await
            .map_err(|e| self.log_failure(e))?);

        if !items.is_empty() {
            let base = self.fresh();
            for association in &self.state.preloads {
                E::preload(&base, &mut items, association).await?;
            }
        }
        Ok(items)
    }

    async fn fetch_count(&self) -> Result<i64, DbError> {
        let mut qb = self.state.select_sql(E::TABLE, Projection::Count)?;
        let count: i64 = with_executor!(&self.binding, |ex| qb
            .build_query_scalar()
            .fetch_one(ex)
            .await
            .map_err(|e| self.log_failure(e))?);
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

impl<E: Entity> Record<E> {
    /// Insert `item`, assigning its id and timestamps.
    ///
    /// Fails with [`DbError::ConstraintViolation`] on a uniqueness conflict
    /// and [`DbError::InvalidQuery`] if `item` already has an id.
    pub async fn create(&self, item: &mut E) -> Result<(), DbError> {
        self.guard(self.insert_one(item)).await
    }

    /// Insert `items` in chunks of `batch_size` (0 means
    /// [`DEFAULT_BATCH_SIZE`]). Each chunk is atomic; a failing chunk leaves
    /// earlier chunks committed unless the record is already inside a
    /// transaction.
    pub async fn batch_create(&self, items: &mut [E], batch_size: usize) -> Result<(), DbError> {
        let size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        for chunk in items.chunks_mut(size) {
            self.transaction(|tx| async move {
                let bound = self.with_transaction(&tx);
                for item in chunk.iter_mut() {
                    bound.create(item).await?;
                }
                Ok::<_, DbError>(())
            })
            .await?;
        }
        Ok(())
    }

    async fn insert_one(&self, item: &mut E) -> Result<(), DbError> {
        if item.meta().is_persisted() {
            return Err(DbError::InvalidQuery(format!(
                "{} already has id {}",
                E::NAME,
                item.meta().id
            )));
        }

        let now = Utc::now();
        let fields = item.fields();

        let mut qb = QueryBuilder::<Driver>::new(format!("INSERT INTO {} (created_at, updated_at", E::TABLE));
        for (column, _) in &fields {
            qb.push(", ");
            qb.push(*column);
        }
        qb.push(") VALUES (");
        qb.push_bind(now);
        qb.push(", ");
        qb.push_bind(now);
        for (_, value) in fields {
            qb.push(", ");
            value.push_bind(&mut qb);
        }
        qb.push(") RETURNING id, created_at, updated_at, deleted_at");

        let meta: RecordMeta = with_executor!(&self.binding, |ex| qb
            .build_query_as()
            .fetch_one(ex)
            .await
            .map_err(|e| self.log_failure(e))?);
        *item.meta_mut() = meta;
        Ok(())
    }

    /// Persist `item` by id.
    ///
    /// By default only fields whose value is non-zero are written: a field
    /// set to `0`, `false` or `""` is left unchanged in storage. To write
    /// zero values, chain `select(["*"])` (all fields) or name the columns
    /// with `select([...])`. Chained predicates further restrict the row.
    /// Fails with [`DbError::NotFound`] when no live row matches.
    pub async fn update(&self, item: &mut E) -> Result<(), DbError> {
        self.guard(self.update_one(item)).await
    }

    async fn update_one(&self, item: &mut E) -> Result<(), DbError> {
        let id = item.meta().id;
        if id <= 0 {
            return Err(DbError::InvalidQuery(format!(
                "cannot update {} without an id",
                E::NAME
            )));
        }

        let selection = match self.state.selects.as_slice() {
            [] => UpdateSelection::NonZero,
            cols if cols.iter().any(|c| c == "*") => UpdateSelection::All,
            cols => UpdateSelection::Named(cols.to_vec()),
        };
        let columns: Vec<(&'static str, Value)> = item
            .fields()
            .into_iter()
            .filter(|(column, value)| match &selection {
                UpdateSelection::NonZero => !value.is_zero(),
                UpdateSelection::All => true,
                UpdateSelection::Named(names) => names.iter().any(|n| n == column),
            })
            .collect();

        let now = Utc::now();
        let mut qb = QueryBuilder::<Driver>::new(format!("UPDATE {} SET updated_at = ", E::TABLE));
        qb.push_bind(now);
        for (column, value) in columns {
            qb.push(", ");
            qb.push(column);
            qb.push(" = ");
            value.push_bind(&mut qb);
        }
        let scope = self.filter(format!("{}.id = ?", E::TABLE), (id,));
        scope.state.push_where(&mut qb, E::TABLE)?;

        let affected = self.execute(qb).await?;
        if affected == 0 {
            return Err(DbError::not_found(E::NAME));
        }
        item.meta_mut().updated_at = Some(now);
        Ok(())
    }

    /// Write `columns` to every row matching the current predicates,
    /// including zero values. `updated_at` is not touched.
    ///
    /// Requires at least one predicate; an unfiltered mass update fails with
    /// [`DbError::InvalidQuery`]. Returns the number of rows affected.
    pub async fn update_columns<I, C>(&self, columns: I) -> Result<u64, DbError>
    where
        I: IntoIterator<Item = (C, Value)>,
        C: AsRef<str>,
    {
        if !self.state.has_conditions() {
            return Err(DbError::InvalidQuery(format!(
                "update_columns on {} requires a filter",
                E::TABLE
            )));
        }
        let mut qb = QueryBuilder::<Driver>::new(format!("UPDATE {} SET ", E::TABLE));
        let mut any = false;
        for (i, (column, value)) in columns.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column.as_ref());
            qb.push(" = ");
            value.push_bind(&mut qb);
            any = true;
        }
        if !any {
            return Ok(0);
        }
        self.state.push_where(&mut qb, E::TABLE)?;
        self.guard(self.execute(qb)).await
    }

    /// Soft-delete the row with `id` by stamping `deleted_at`. On an
    /// [`unscoped`](Record::unscoped) record the row is removed for good.
    pub async fn delete(&self, id: DbId) -> Result<(), DbError> {
        let scope = self.filter(format!("{}.id = ?", E::TABLE), (id,));
        let mut qb = if self.state.unscoped {
            QueryBuilder::<Driver>::new(format!("DELETE FROM {}", E::TABLE))
        } else {
            let mut qb = QueryBuilder::<Driver>::new(format!("UPDATE {} SET deleted_at = ", E::TABLE));
            qb.push_bind(Utc::now());
            qb
        };
        scope.state.push_where(&mut qb, E::TABLE)?;

        let affected = self.guard(self.execute(qb)).await?;
        if affected == 0 {
            return Err(DbError::not_found(E::NAME));
        }
        Ok(())
    }

    /// Return the first match of the current predicates, or insert `item`
    /// when there is none. `Ok(true)` means `item` was created.
    pub async fn first_or_create(&self, item: &mut E) -> Result<bool, DbError> {
        match self.one().await {
            Ok(found) => {
                *item = found;
                Ok(false)
            }
            Err(DbError::NotFound { .. }) => {
                self.create(item).await?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Run a raw statement on this record's connection or transaction.
    /// Returns rows affected.
    pub async fn exec(&self, sql: &str, params: impl Params) -> Result<u64, DbError> {
        let mut qb = QueryBuilder::<Driver>::new("");
        Fragment::new(sql, params.into_values()).push_to(&mut qb)?;
        self.guard(self.execute(qb)).await
    }

    async fn execute(&self, mut qb: QueryBuilder<'static, Driver>) -> Result<u64, DbError> {
        let result = with_executor!(&self.binding, |ex| qb
            .build()
            .execute(ex)
            .await
            .map_err(|e| self.log_failure(e))?);
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

impl<E: Entity> Record<E> {
    /// Run `work` inside a unit of work and commit if it returns `Ok`.
    ///
    /// On a pool-bound record this begins a new transaction. On a record
    /// already bound to one, it opens a savepoint inside it instead: an
    /// inner `Err` rolls back to the savepoint, and whether that failure
    /// also aborts the outer unit is up to the outer closure, by returning
    /// or swallowing the inner error.
    ///
    /// `work` receives the transaction handle; bind records to it with
    /// [`Record::with_transaction`].
    pub async fn transaction<F, Fut, T, Err>(&self, work: F) -> Result<T, Err>
    where
        F: FnOnce(Tx) -> Fut,
        Fut: Future<Output = Result<T, Err>>,
        Err: From<DbError>,
    {
        match &self.binding {
            Binding::Tx(tx) => {
                let savepoint = tx.savepoint().await?;
                match work(tx.clone()).await {
                    Ok(value) => {
                        tx.release(&savepoint).await?;
                        Ok(value)
                    }
                    Err(err) => {
                        if let Err(rollback) = tx.rollback_to(&savepoint).await {
                            tracing::error!(error = %rollback, savepoint, "Savepoint rollback failed");
                        }
                        Err(err)
                    }
                }
            }
            Binding::Pool(pool) => {
                let tx = Tx::begin(pool).await?;
                match work(tx.clone()).await {
                    Ok(value) => {
                        tx.commit().await?;
                        Ok(value)
                    }
                    Err(err) => {
                        match tx.rollback().await {
                            Ok(()) | Err(DbError::TransactionClosed) => {}
                            Err(rollback) => {
                                tracing::error!(error = %rollback, "Transaction rollback failed");
                            }
                        }
                        Err(err)
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Deadline and cancellation
// ---------------------------------------------------------------------------

impl<E: Entity> Record<E> {
    async fn guard<T>(&self, op: impl Future<Output = Result<T, DbError>>) -> Result<T, DbError> {
        let timed = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, op)
                    .await
                    .map_err(|_| DbError::Timeout)?,
                None => op.await,
            }
        };
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(DbError::Cancelled),
                result = timed => result,
            },
            None => timed.await,
        }
    }

    fn log_failure(&self, err: sqlx::Error) -> DbError {
        let err = DbError::from(err);
        tracing::debug!(table = E::TABLE, error = %err, "Record operation failed");
        err
    }
}
