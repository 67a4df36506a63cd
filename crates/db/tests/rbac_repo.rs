//! Role/permission persistence.

mod common;

use assert_matches::assert_matches;
use hserp_core::permission::PermissionPoint;
use hserp_db::models::{Permission, User};
use hserp_db::record::Record;
use hserp_db::repositories::{RbacRepo, SyncReport, UserRepo};
use hserp_db::{DbError, DbPool};

use common::{insert_permission, insert_role, insert_user, user};

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn assign_roles_replaces_previous_roles(pool: DbPool) {
    let ann = insert_user(&pool, "ann").await;
    let a = insert_role(&pool, "a").await;
    let b = insert_role(&pool, "b").await;

    RbacRepo::assign_roles_to_user(&pool, ann.meta.id, &[a.meta.id, a.meta.id])
        .await
        .unwrap();
    RbacRepo::assign_roles_to_user(&pool, ann.meta.id, &[b.meta.id])
        .await
        .unwrap();

    let roles = RbacRepo::user_roles(&pool, ann.meta.id).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "b");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn assign_with_missing_role_changes_nothing(pool: DbPool) {
    let ann = insert_user(&pool, "ann").await;
    let a = insert_role(&pool, "a").await;
    RbacRepo::assign_roles_to_user(&pool, ann.meta.id, &[a.meta.id])
        .await
        .unwrap();

    let result = RbacRepo::assign_roles_to_user(&pool, ann.meta.id, &[a.meta.id, 999]).await;
    assert_matches!(result, Err(DbError::NotFound { entity: "Role" }));

    let roles = RbacRepo::user_roles(&pool, ann.meta.id).await.unwrap();
    assert_eq!(roles.len(), 1, "previous assignment is kept");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn assign_to_missing_user_is_not_found(pool: DbPool) {
    let a = insert_role(&pool, "a").await;
    let result = RbacRepo::assign_roles_to_user(&pool, 77, &[a.meta.id]).await;
    assert_matches!(result, Err(DbError::NotFound { entity: "User" }));
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn delete_permission_unlinks_and_soft_deletes(pool: DbPool) {
    let role = insert_role(&pool, "editor").await;
    let p = insert_permission(&pool, "/api/v1/users", "GET").await;
    RbacRepo::assign_permissions_to_role(&pool, role.meta.id, &[p.meta.id])
        .await
        .unwrap();

    RbacRepo::delete_permission(&pool, p.meta.id).await.unwrap();

    assert!(RbacRepo::role_permissions(&pool, role.meta.id)
        .await
        .unwrap()
        .is_empty());
    let archived = Record::<Permission>::new(&pool)
        .unscoped()
        .read(p.meta.id)
        .await
        .unwrap();
    assert!(archived.meta.is_deleted());

    assert_matches!(
        RbacRepo::delete_permission(&pool, p.meta.id).await,
        Err(DbError::NotFound { .. })
    );
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn sync_permissions_upserts_by_name(pool: DbPool) {
    let points = vec![
        PermissionPoint::new("/api/v1/users", "GET", "List users"),
        PermissionPoint::new("/api/v1/users", "POST", "Save user"),
    ];
    let first = RbacRepo::sync_permissions(&pool, &points).await.unwrap();
    assert_eq!(first, SyncReport { created: 2, ..Default::default() });

    let changed = vec![
        PermissionPoint::new("/api/v1/users", "GET", "List all users"),
        PermissionPoint::new("/api/v1/users", "POST", "Save user"),
    ];
    let second = RbacRepo::sync_permissions(&pool, &changed).await.unwrap();
    assert_eq!(second.updated, 1);
    assert_eq!(second.unchanged, 1);

    let all = RbacRepo::list_permissions(&pool).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].description, "List all users");
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn sync_leaves_deleted_points_deleted(pool: DbPool) {
    let point = PermissionPoint::new("/api/v1/users", "GET", "List users");
    RbacRepo::sync_permissions(&pool, std::slice::from_ref(&point))
        .await
        .unwrap();
    let existing = RbacRepo::list_permissions(&pool).await.unwrap();
    RbacRepo::delete_permission(&pool, existing[0].meta.id)
        .await
        .unwrap();

    let report = RbacRepo::sync_permissions(&pool, &[point]).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(RbacRepo::list_permissions(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn user_repo_save_and_page(pool: DbPool) {
    let mut fresh = user("zoe");
    UserRepo::save(&pool, &mut fresh).await.unwrap();
    assert!(fresh.meta.id > 0);

    let mut patch = User {
        meta: fresh.meta.clone(),
        nickname: "Zo".into(),
        ..Default::default()
    };
    UserRepo::save(&pool, &mut patch).await.unwrap();

    let stored = UserRepo::find_by_id(&pool, fresh.meta.id).await.unwrap();
    assert_eq!(stored.nickname, "Zo");
    assert_eq!(stored.password_hash, "hash", "empty hash is not written");

    insert_user(&pool, "zack").await;
    insert_user(&pool, "amy").await;
    let page = UserRepo::page(&pool, Some("z"), 1, 10).await.unwrap();
    assert_eq!(page.total, 2);

    UserRepo::set_password(&pool, fresh.meta.id, "new-hash").await.unwrap();
    let found = UserRepo::find_by_username(&pool, "zoe").await.unwrap().unwrap();
    assert_eq!(found.password_hash, "new-hash");
    assert!(UserRepo::find_by_username(&pool, "nobody").await.unwrap().is_none());
}

#[sqlx::test(migrator = "hserp_db::MIGRATOR")]
async fn user_delete_drops_role_links(pool: DbPool) {
    let ann = insert_user(&pool, "ann").await;
    let role = insert_role(&pool, "r").await;
    RbacRepo::assign_roles_to_user(&pool, ann.meta.id, &[role.meta.id])
        .await
        .unwrap();

    UserRepo::delete(&pool, ann.meta.id).await.unwrap();

    assert_matches!(
        UserRepo::find_by_id(&pool, ann.meta.id).await,
        Err(DbError::NotFound { .. })
    );
    let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(links, 0);
}
