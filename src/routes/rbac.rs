//! Role and permission administration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{
    AssignRoleRequest, EffectivePermissions, Permission, PermissionCreateRequest, Role, RoleCreateRequest,
    RoleDetail, RoleSummary, RoleUpdateRequest,
};
use crate::utils::{non_blank, require_text, updated_optional, updated_text, utc_now};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", get(get_role).put(update_role).delete(delete_role))
        .route(
            "/roles/:role_id/permissions/:permission_id",
            post(add_permission_to_role).delete(remove_permission_from_role),
        )
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/users/:user_id/roles", get(get_user_roles).post(assign_role_to_user))
        .route("/users/:user_id/roles/:role_id", delete(revoke_role_from_user))
        .route("/users/:user_id/permissions", get(get_effective_permissions))
}

#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses((status = 200, description = "Roles with the number of users holding each", body = [RoleSummary])),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, session: Session) -> AppResult<Json<Vec<RoleSummary>>> {
    session.require(permissions::VIEW_ROLES)?;

    let roles = sqlx::query_as::<_, RoleSummary>(
        "SELECT r.id, r.name, r.description, \
           (SELECT COUNT(1) FROM user_roles ur WHERE ur.role_id = r.id) AS user_count, r.created_at \
         FROM roles r ORDER BY r.name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleDetail),
        (status = 409, description = "Role name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<RoleDetail>)> {
    let principal = session.require(permissions::CREATE_ROLE)?;
    let name = require_text("name", &req.name)?;

    let mut tx = state.pool.begin().await?;
    let role_id = sqlx::query("INSERT INTO roles (name, description, created_at) VALUES (?, ?, ?)")
        .bind(&name)
        .bind(non_blank(req.description))
        .bind(utc_now())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
    replace_role_permissions(&mut tx, role_id, &req.permission_ids).await?;
    tx.commit().await?;

    tracing::info!(role_id, role = %name, by = principal.user_id, "role created");
    Ok((StatusCode::CREATED, Json(fetch_role_detail(&state.pool, role_id).await?)))
}

#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = i64, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role with its permissions", body = RoleDetail),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    session: Session,
    Path(role_id): Path<i64>,
) -> AppResult<Json<RoleDetail>> {
    session.require(permissions::VIEW_ROLES)?;
    Ok(Json(fetch_role_detail(&state.pool, role_id).await?))
}

#[utoipa::path(
    put,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = i64, Path, description = "Role ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleDetail),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    session: Session,
    Path(role_id): Path<i64>,
    Json(req): Json<RoleUpdateRequest>,
) -> AppResult<Json<RoleDetail>> {
    let principal = session.require(permissions::EDIT_ROLE)?;
    let current = fetch_role(&state.pool, role_id).await?;

    let mut tx = state.pool.begin().await?;
    sqlx::query("UPDATE roles SET name = ?, description = ? WHERE id = ?")
        .bind(updated_text("name", req.name, current.name)?)
        .bind(updated_optional(req.description, current.description))
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

    if let Some(permission_ids) = &req.permission_ids {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        replace_role_permissions(&mut tx, role_id, permission_ids).await?;
    }
    tx.commit().await?;

    tracing::info!(role_id, by = principal.user_id, "role updated");
    Ok(Json(fetch_role_detail(&state.pool, role_id).await?))
}

#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = i64, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted; its holders keep their accounts"),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    session: Session,
    Path(role_id): Path<i64>,
) -> AppResult<StatusCode> {
    let principal = session.require(permissions::DELETE_ROLE)?;

    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("role not found"));
    }

    tracing::info!(role_id, by = principal.user_id, "role deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/rbac/roles/{role_id}/permissions/{permission_id}",
    tag = "RBAC",
    params(
        ("role_id" = i64, Path, description = "Role ID"),
        ("permission_id" = i64, Path, description = "Permission ID"),
    ),
    responses(
        (status = 204, description = "Permission granted to the role; repeating is harmless"),
        (status = 404, description = "Role or permission not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_permission_to_role(
    State(state): State<AppState>,
    session: Session,
    Path((role_id, permission_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    session.require(permissions::EDIT_ROLE)?;
    fetch_role(&state.pool, role_id).await?;
    fetch_permission(&state.pool, permission_id).await?;

    sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
        .bind(role_id)
        .bind(permission_id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}/permissions/{permission_id}",
    tag = "RBAC",
    params(
        ("role_id" = i64, Path, description = "Role ID"),
        ("permission_id" = i64, Path, description = "Permission ID"),
    ),
    responses(
        (status = 204, description = "Permission removed from the role"),
        (status = 404, description = "The role does not hold that permission")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_permission_from_role(
    State(state): State<AppState>,
    session: Session,
    Path((role_id, permission_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    session.require(permissions::EDIT_ROLE)?;

    let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
        .bind(role_id)
        .bind(permission_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("permission is not assigned to this role"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/rbac/permissions",
    tag = "RBAC",
    responses((status = 200, description = "Permission catalogue", body = [Permission])),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(State(state): State<AppState>, session: Session) -> AppResult<Json<Vec<Permission>>> {
    session.require(permissions::VIEW_ROLES)?;

    let permissions = sqlx::query_as::<_, Permission>(
        "SELECT id, name, description, created_at FROM permissions ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(permissions))
}

#[utoipa::path(
    post,
    path = "/rbac/permissions",
    tag = "RBAC",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Permission name already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<PermissionCreateRequest>,
) -> AppResult<(StatusCode, Json<Permission>)> {
    session.require(permissions::CREATE_ROLE)?;

    let id = sqlx::query("INSERT INTO permissions (name, description, created_at) VALUES (?, ?, ?)")
        .bind(require_text("name", &req.name)?)
        .bind(non_blank(req.description))
        .bind(utc_now())
        .execute(&state.pool)
        .await?
        .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_permission(&state.pool, id).await?)))
}

#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = i64, Path, description = "User ID")),
    responses((status = 200, description = "Roles held by the user", body = [Role])),
    security(("bearerAuth" = []))
)]
pub async fn get_user_roles(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<Role>>> {
    session.require(permissions::VIEW_ROLES)?;
    ensure_user_exists(&state.pool, user_id).await?;
    Ok(Json(fetch_user_roles(&state.pool, user_id).await?))
}

#[utoipa::path(
    post,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = i64, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 204, description = "Role assigned; repeating is harmless"),
        (status = 404, description = "User or role not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role_to_user(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<StatusCode> {
    let principal = session.require(permissions::EDIT_USER)?;
    ensure_user_exists(&state.pool, user_id).await?;
    fetch_role(&state.pool, req.role_id).await?;

    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(req.role_id)
        .bind(utc_now())
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id, role_id = req.role_id, by = principal.user_id, "role assigned");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/rbac/users/{user_id}/roles/{role_id}",
    tag = "RBAC",
    params(
        ("user_id" = i64, Path, description = "User ID"),
        ("role_id" = i64, Path, description = "Role ID"),
    ),
    responses(
        (status = 204, description = "Role revoked"),
        (status = 404, description = "The user does not hold that role")
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role_from_user(
    State(state): State<AppState>,
    session: Session,
    Path((user_id, role_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let principal = session.require(permissions::EDIT_USER)?;

    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
        .bind(user_id)
        .bind(role_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user does not hold this role"));
    }

    tracing::info!(user_id, role_id, by = principal.user_id, "role revoked");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/permissions",
    tag = "RBAC",
    params(("user_id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Roles and the union of their permissions", body = EffectivePermissions),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> AppResult<Json<EffectivePermissions>> {
    session.require(permissions::VIEW_ROLES)?;
    ensure_user_exists(&state.pool, user_id).await?;

    let roles = fetch_user_roles(&state.pool, user_id).await?;
    let permissions = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT p.name FROM permissions p \
         JOIN role_permissions rp ON rp.permission_id = p.id \
         JOIN user_roles ur ON ur.role_id = rp.role_id \
         WHERE ur.user_id = ? ORDER BY p.name",
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(EffectivePermissions {
        user_id,
        roles,
        permissions,
    }))
}

async fn replace_role_permissions(
    tx: &mut Transaction<'_, Sqlite>,
    role_id: i64,
    permission_ids: &[i64],
) -> AppResult<()> {
    for permission_id in permission_ids {
        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn fetch_role(pool: &SqlitePool, role_id: i64) -> AppResult<Role> {
    sqlx::query_as::<_, Role>("SELECT id, name, description, created_at FROM roles WHERE id = ?")
        .bind(role_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))
}

async fn fetch_role_detail(pool: &SqlitePool, role_id: i64) -> AppResult<RoleDetail> {
    let role = fetch_role(pool, role_id).await?;
    let permissions = sqlx::query_as::<_, Permission>(
        "SELECT p.id, p.name, p.description, p.created_at FROM permissions p \
         JOIN role_permissions rp ON rp.permission_id = p.id \
         WHERE rp.role_id = ? ORDER BY p.name",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await?;

    Ok(RoleDetail { role, permissions })
}

async fn fetch_permission(pool: &SqlitePool, permission_id: i64) -> AppResult<Permission> {
    sqlx::query_as::<_, Permission>("SELECT id, name, description, created_at FROM permissions WHERE id = ?")
        .bind(permission_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("permission not found"))
}

async fn fetch_user_roles(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<Role>> {
    let roles = sqlx::query_as::<_, Role>(
        "SELECT r.id, r.name, r.description, r.created_at FROM roles r \
         JOIN user_roles ur ON ur.role_id = r.id \
         WHERE ur.user_id = ? ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(roles)
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: i64) -> AppResult<()> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    found.map(|_| ()).ok_or_else(|| AppError::not_found("user not found"))
}
