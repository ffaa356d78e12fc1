use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::pagination::{Paginated, PaginationParams, UserPage};
use crate::models::user::{DbUser, User, UserCreateRequest, UserListQuery, UserUpdateRequest, USER_COLUMNS};
use crate::routes::auth::fetch_user;
use crate::utils::{hash_password, non_blank, require_text, updated_optional, utc_now};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("active" = Option<bool>, Query, description = "Only active or inactive accounts"),
    ),
    responses((status = 200, description = "User accounts", body = UserPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Paginated<User>>> {
    session.require(permissions::VIEW_USERS)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE (? IS NULL OR active = ?)")
        .bind(query.active)
        .bind(query.active)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE (? IS NULL OR active = ?) ORDER BY username LIMIT ? OFFSET ?"
    );
    let users = sqlx::query_as::<_, DbUser>(&sql)
        .bind(query.active)
        .bind(query.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    let users = users.into_iter().map(User::from).collect();
    Ok(Json(Paginated::new(users, &page, total)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User account", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    session.require(permissions::VIEW_USERS)?;
    Ok(Json(fetch_user(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Password too short or unknown role"),
        (status = 409, description = "Username already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<UserCreateRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    session.require(permissions::CREATE_USER)?;

    let username = require_text("username", &payload.username)?;
    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();

    let mut tx = state.pool.begin().await?;

    let id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, person_id, student_id, instructor_id, active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&username)
    .bind(non_blank(payload.email))
    .bind(password_hash)
    .bind(payload.person_id)
    .bind(payload.student_id)
    .bind(payload.instructor_id)
    .bind(payload.active.unwrap_or(true))
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for role_id in &payload.role_ids {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(role_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = id, username = %username, roles = payload.role_ids.len(), "user account created");
    Ok((StatusCode::CREATED, Json(fetch_user(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Account updated", body = User),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    session.require(permissions::EDIT_USER)?;

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let current = sqlx::query_as::<_, DbUser>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let password_hash = match payload.password.as_deref() {
        Some(password) => hash_password(password)?,
        None => current.password_hash,
    };

    sqlx::query(
        "UPDATE users SET email = ?, password_hash = ?, person_id = ?, student_id = ?, instructor_id = ?, \
         active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(updated_optional(payload.email, current.email))
    .bind(password_hash)
    .bind(payload.person_id.or(current.person_id))
    .bind(payload.student_id.or(current.student_id))
    .bind(payload.instructor_id.or(current.instructor_id))
    .bind(payload.active.unwrap_or(current.active))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_user(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "An account cannot delete itself"),
        (status = 404, description = "User not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let principal = session.require(permissions::DELETE_USER)?;
    if principal.user_id == id {
        return Err(AppError::bad_request("an account cannot delete itself"));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
