//! Handlers for `/users`.

use axum::extract::State;
use hserp_core::pagination::{Page, PageRequest};
use hserp_core::types::DbId;
use hserp_core::validation::{validate_email, validate_password, validate_username};
use hserp_db::models::{Role, User, STATUS_ACTIVE, STATUS_DISABLED};
use hserp_db::record::RecordMeta;
use hserp_db::repositories::{RbacRepo, UserRepo};
use serde::Deserialize;

use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::response::{ok, ApiJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// Substring match on username.
    pub username: Option<String>,
}

/// Create (no `id`) or partially update (with `id`) a user.
///
/// On update, empty strings and zero numbers leave the stored value alone.
/// `status: 0` is the exception and disables the account.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveUserRequest {
    pub id: Option<DbId>,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub phone: String,
    pub password: Option<String>,
    pub gender: i64,
    pub age: i64,
    pub status: Option<i64>,
    /// When present, replaces the user's roles.
    pub role_ids: Option<Vec<DbId>>,
}

/// GET /api/v1/users
pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListUsersQuery>,
) -> AppResult<ApiJson<Page<User>>> {
    let request = PageRequest::from_query(query.page, query.page_size);
    let page = UserRepo::page(
        &state.pool,
        query.username.as_deref(),
        request.page,
        request.page_size,
    )
    .await?;
    Ok(ok(page))
}

/// POST /api/v1/users
pub async fn save(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<SaveUserRequest>,
) -> AppResult<ApiJson<User>> {
    let creating = input.id.is_none();
    if creating || !input.username.is_empty() {
        validate_username(&input.username)?;
    }
    validate_email(&input.email)?;

    let password_hash = match (&input.password, creating) {
        (Some(password), _) => {
            validate_password(password)?;
            hash_password(password)?
        }
        (None, true) => return Err(AppError::BadRequest("password is required".into())),
        (None, false) => String::new(),
    };

    let mut user = User {
        meta: input.id.map(RecordMeta::with_id).unwrap_or_default(),
        username: input.username,
        nickname: input.nickname,
        email: input.email,
        phone: input.phone,
        password_hash,
        gender: input.gender,
        age: input.age,
        status: input
            .status
            .unwrap_or(if creating { STATUS_ACTIVE } else { 0 }),
        ..Default::default()
    };
    UserRepo::save(&state.pool, &mut user).await?;
    let user_id = user.meta.id;

    if !creating && input.status == Some(STATUS_DISABLED) {
        UserRepo::set_status(&state.pool, user_id, STATUS_DISABLED).await?;
    }
    if let Some(role_ids) = &input.role_ids {
        RbacRepo::assign_roles_to_user(&state.pool, user_id, role_ids).await?;
    }

    tracing::info!(user_id, created = creating, "User saved");
    Ok(ok(UserRepo::find_by_id(&state.pool, user_id).await?))
}

/// DELETE /api/v1/users/{id}
pub async fn remove(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<ApiJson<()>> {
    UserRepo::delete(&state.pool, id).await?;
    state.permissions.invalidate(id).await;
    tracing::info!(user_id = id, "User deleted");
    Ok(ok(()))
}

/// GET /api/v1/users/{id}/roles
pub async fn roles(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<ApiJson<Vec<Role>>> {
    Ok(ok(RbacRepo::user_roles(&state.pool, id).await?))
}
