//! Handlers for `/rbac`.

use axum::extract::State;
use hserp_core::types::DbId;
use hserp_core::validation::validate_required;
use hserp_db::models::{Permission, Role};
use hserp_db::record::RecordMeta;
use hserp_db::repositories::RbacRepo;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extract::{JsonBody, PathParam};
use crate::response::{ok, ApiJson};
use crate::state::AppState;

/// Create (no `id`) or partially update (with `id`) a role.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaveRoleRequest {
    pub id: Option<DbId>,
    pub name: String,
    pub remark: String,
    pub status: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPermissionsRequest {
    pub permission_ids: Vec<DbId>,
}

/// GET /api/v1/rbac/roles
pub async fn list_roles(State(state): State<AppState>) -> AppResult<ApiJson<Vec<Role>>> {
    Ok(ok(RbacRepo::list_roles(&state.pool).await?))
}

/// POST /api/v1/rbac/roles
pub async fn save_role(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<SaveRoleRequest>,
) -> AppResult<ApiJson<Role>> {
    let creating = input.id.is_none();
    let mut role = Role {
        meta: input.id.map(RecordMeta::with_id).unwrap_or_default(),
        name: input.name,
        remark: input.remark,
        status: input.status.unwrap_or(if creating { 1 } else { 0 }),
        ..Default::default()
    };
    if !creating {
        RbacRepo::update_role(&state.pool, &mut role).await?;
    } else {
        validate_required("name", &role.name)?;
        RbacRepo::create_role(&state.pool, &mut role).await?;
    }
    tracing::info!(role_id = role.meta.id, "Role saved");
    Ok(ok(RbacRepo::find_role(&state.pool, role.meta.id).await?))
}

/// GET /api/v1/rbac/roles/{id}
pub async fn get_role(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<ApiJson<Role>> {
    Ok(ok(RbacRepo::find_role(&state.pool, id).await?))
}

/// GET /api/v1/rbac/roles/{id}/permissions
pub async fn role_permissions(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<ApiJson<Vec<Permission>>> {
    Ok(ok(RbacRepo::role_permissions(&state.pool, id).await?))
}

/// POST /api/v1/rbac/roles/{id}/permissions
///
/// Users already holding this role keep their cached permissions until the
/// cache entry expires.
pub async fn assign_role_permissions(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
    JsonBody(input): JsonBody<AssignPermissionsRequest>,
) -> AppResult<ApiJson<Vec<Permission>>> {
    RbacRepo::assign_permissions_to_role(&state.pool, id, &input.permission_ids).await?;
    tracing::info!(role_id = id, count = input.permission_ids.len(), "Role permissions replaced");
    Ok(ok(RbacRepo::role_permissions(&state.pool, id).await?))
}

/// GET /api/v1/rbac/permissions
pub async fn list_permissions(State(state): State<AppState>) -> AppResult<ApiJson<Vec<Permission>>> {
    Ok(ok(RbacRepo::list_permissions(&state.pool).await?))
}

/// DELETE /api/v1/rbac/permissions/{id}
pub async fn delete_permission(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
) -> AppResult<ApiJson<()>> {
    RbacRepo::delete_permission(&state.pool, id).await?;
    tracing::info!(permission_id = id, "Permission deleted");
    Ok(ok(()))
}

/// POST /api/v1/rbac/users/{id}/roles
pub async fn assign_user_roles(
    State(state): State<AppState>,
    PathParam(id): PathParam<DbId>,
    JsonBody(input): JsonBody<AssignRolesRequest>,
) -> AppResult<ApiJson<Vec<Role>>> {
    RbacRepo::assign_roles_to_user(&state.pool, id, &input.role_ids).await?;
    tracing::info!(user_id = id, count = input.role_ids.len(), "User roles replaced");
    Ok(ok(RbacRepo::user_roles(&state.pool, id).await?))
}
