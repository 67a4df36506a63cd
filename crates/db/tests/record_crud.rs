//! CRUD behaviour of the generic record layer.

mod common;

use assert_matches::assert_matches;
use hserp_db::models::User;
use hserp_db::record::{Record, RecordMeta, Value};
use hserp_db::{DbError, DbPool};

use common::{insert_user, user};

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn create_assigns_identity_and_timestamps(pool: DbPool) {
    let users = Record::<User>::new(&pool);
    let mut first = user("alice");
    let mut second = user("bob");

    users.create(&mut first).await.unwrap();
    users.create(&mut second).await.unwrap();

    assert!(first.meta.id > 0);
    assert!(second.meta.id > first.meta.id, "ids increase monotonically");
    assert!(first.meta.created_at.is_some());
    assert!(first.meta.updated_at.is_some());
    assert!(first.meta.deleted_at.is_none());
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn create_rejects_item_with_id(pool: DbPool) {
    let mut u = user("alice");
    u.meta = RecordMeta::with_id(42);
    let result = Record::<User>::new(&pool).create(&mut u).await;
    assert_matches!(result, Err(DbError::InvalidQuery(_)));
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn duplicate_username_is_constraint_violation(pool: DbPool) {
    insert_user(&pool, "alice").await;
    let mut dup = user("alice");
    let result = Record::<User>::new(&pool).create(&mut dup).await;
    assert_matches!(result, Err(DbError::ConstraintViolation(_)));
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn read_returns_row_or_not_found(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    let found = users.read(alice.meta.id).await.unwrap();
    assert_eq!(found.username, "alice");
    assert_eq!(found.email, "alice@example.com");

    assert_matches!(users.read(9999).await, Err(DbError::NotFound { entity: "User" }));
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn partial_update_skips_zero_fields(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    // Only nickname is non-zero; everything else must stay as stored.
    let mut patch = User {
        meta: RecordMeta::with_id(alice.meta.id),
        nickname: "Ally".to_string(),
        ..Default::default()
    };
    users.update(&mut patch).await.unwrap();

    let stored = users.read(alice.meta.id).await.unwrap();
    assert_eq!(stored.nickname, "Ally");
    assert_eq!(stored.username, "alice");
    assert_eq!(stored.email, "alice@example.com");
    assert_eq!(stored.password_hash, "hash");
    assert_eq!(stored.age, 30);
    assert_eq!(stored.status, 1);
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn zero_value_is_not_written_by_default_update(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    let mut disabled = alice.clone();
    disabled.status = 0;
    users.update(&mut disabled).await.unwrap();

    let stored = users.read(alice.meta.id).await.unwrap();
    assert_eq!(stored.status, 1, "zero status is skipped by a partial update");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn select_all_update_overwrites_zero_fields(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    let mut replacement = alice.clone();
    replacement.status = 0;
    replacement.age = 0;
    replacement.nickname = String::new();
    users.select(["*"]).update(&mut replacement).await.unwrap();

    let stored = users.read(alice.meta.id).await.unwrap();
    assert_eq!(stored.status, 0);
    assert_eq!(stored.age, 0);
    assert_eq!(stored.nickname, "");
    assert_eq!(stored.username, "alice");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn named_select_update_writes_only_named_columns(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    let mut change = alice.clone();
    change.status = 0;
    change.nickname = "ignored".to_string();
    users.select(["status"]).update(&mut change).await.unwrap();

    let stored = users.read(alice.meta.id).await.unwrap();
    assert_eq!(stored.status, 0);
    assert_eq!(stored.nickname, "alice nick");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn update_of_missing_row_is_not_found(pool: DbPool) {
    let mut ghost = user("ghost");
    ghost.meta = RecordMeta::with_id(404);
    let result = Record::<User>::new(&pool).update(&mut ghost).await;
    assert_matches!(result, Err(DbError::NotFound { .. }));
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn soft_delete_round_trip(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    users.delete(alice.meta.id).await.unwrap();

    assert_matches!(users.read(alice.meta.id).await, Err(DbError::NotFound { .. }));
    let archived = users.unscoped().read(alice.meta.id).await.unwrap();
    assert!(archived.meta.deleted_at.is_some(), "deleted_at must be stamped");
    assert_eq!(users.count().await.unwrap(), 0);
    assert_eq!(users.unscoped().count().await.unwrap(), 1);

    // Deleting again finds nothing live.
    assert_matches!(users.delete(alice.meta.id).await, Err(DbError::NotFound { .. }));
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn unscoped_delete_removes_row(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    users.unscoped().delete(alice.meta.id).await.unwrap();
    assert_eq!(users.unscoped().count().await.unwrap(), 0);
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn update_columns_requires_filter_and_writes_zeroes(pool: DbPool) {
    let alice = insert_user(&pool, "alice").await;
    insert_user(&pool, "bob").await;
    let users = Record::<User>::new(&pool);

    let unfiltered = users.update_columns([("status", Value::from(0))]).await;
    assert_matches!(unfiltered, Err(DbError::InvalidQuery(_)));

    let affected = users
        .filter("username = ?", ("alice",))
        .update_columns([("status", Value::from(0)), ("age", Value::from(0))])
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let stored = users.read(alice.meta.id).await.unwrap();
    assert_eq!((stored.status, stored.age), (0, 0));
    let bob = users.filter("username = ?", ("bob",)).one().await.unwrap();
    assert_eq!(bob.status, 1);
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn first_or_create_creates_once(pool: DbPool) {
    let users = Record::<User>::new(&pool);
    let by_name = users.filter("username = ?", ("carol",));

    let mut first = user("carol");
    assert!(by_name.first_or_create(&mut first).await.unwrap());

    let mut second = user("carol");
    second.nickname = "different".to_string();
    assert!(!by_name.first_or_create(&mut second).await.unwrap());
    assert_eq!(second.meta.id, first.meta.id);
    assert_eq!(second.nickname, "carol nick", "existing row is returned");
    assert_eq!(users.count().await.unwrap(), 1);
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn batch_create_assigns_ids_to_every_item(pool: DbPool) {
    let users = Record::<User>::new(&pool);
    let mut batch: Vec<User> = (0..7).map(|i| user(&format!("user{i}"))).collect();

    users.batch_create(&mut batch, 3).await.unwrap();

    assert!(batch.iter().all(|u| u.meta.id > 0));
    assert_eq!(users.count().await.unwrap(), 7);
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn failing_batch_chunk_is_atomic(pool: DbPool) {
    let users = Record::<User>::new(&pool);
    insert_user(&pool, "taken").await;

    let mut batch = vec![user("fresh1"), user("fresh2"), user("taken")];
    let result = users.batch_create(&mut batch, 10).await;

    assert_matches!(result, Err(DbError::ConstraintViolation(_)));
    assert_eq!(users.count().await.unwrap(), 1, "the whole chunk rolls back");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn exec_runs_raw_statements(pool: DbPool) {
    insert_user(&pool, "alice").await;
    let users = Record::<User>::new(&pool);

    let affected = users
        .exec("UPDATE users SET age = ? WHERE username = ?", (41, "alice"))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let bad = users.exec("UPDATE users SET age = ?", ()).await;
    assert_matches!(bad, Err(DbError::InvalidQuery(_)));
}
