//! Shared fixtures for record-layer integration tests.

#![allow(dead_code)]

use hserp_db::models::{Permission, Role, User};
use hserp_db::record::Record;
use hserp_db::DbPool;

pub fn user(username: &str) -> User {
    User {
        username: username.to_string(),
        nickname: format!("{username} nick"),
        email: format!("{username}@example.com"),
        password_hash: "hash".to_string(),
        age: 30,
        status: 1,
        ..Default::default()
    }
}

pub fn role(name: &str) -> Role {
    Role {
        name: name.to_string(),
        remark: format!("{name} role"),
        status: 1,
        ..Default::default()
    }
}

pub fn permission(path: &str, method: &str) -> Permission {
    Permission {
        name: format!("{path}#{method}"),
        description: String::new(),
        path: path.to_string(),
        method: method.to_string(),
        ..Default::default()
    }
}

pub async fn insert_user(pool: &DbPool, username: &str) -> User {
    let mut u = user(username);
    Record::<User>::new(pool)
        .create(&mut u)
        .await
        .expect("user insert should succeed");
    u
}

pub async fn insert_role(pool: &DbPool, name: &str) -> Role {
    let mut r = role(name);
    Record::<Role>::new(pool)
        .create(&mut r)
        .await
        .expect("role insert should succeed");
    r
}

pub async fn insert_permission(pool: &DbPool, path: &str, method: &str) -> Permission {
    let mut p = permission(path, method);
    Record::<Permission>::new(pool)
        .create(&mut p)
        .await
        .expect("permission insert should succeed");
    p
}
