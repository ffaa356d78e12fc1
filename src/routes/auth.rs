use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Session;
use crate::errors::{AppError, AppResult};
use crate::models::user::{AuthResponse, DbUser, LoginRequest, MeResponse, User, USER_COLUMNS};
use crate::utils::{utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    let db_user = sqlx::query_as::<_, DbUser>(&sql)
        .bind(payload.username.trim())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    if !db_user.active {
        tracing::info!(user_id = db_user.id, "login refused for inactive account");
        return Err(AppError::unauthorized("account is inactive"));
    }

    let now = utc_now();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(db_user.id)
        .execute(&state.pool)
        .await?;

    let token = state.jwt.encode(db_user.id)?;
    let mut user = User::from(db_user);
    user.last_login = Some(now);

    tracing::info!(user_id = user.id, username = %user.username, "user signed in");
    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Not signed in")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, session: Session) -> AppResult<Json<MeResponse>> {
    let principal = session.authenticated()?;
    let user = fetch_user(&state.pool, principal.user_id).await?;

    Ok(Json(MeResponse {
        user,
        roles: principal.roles.iter().map(|role| role.name.clone()).collect(),
        permissions: principal
            .permission_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Logout acknowledged", body = MessageResponse),
        (status = 401, description = "Not signed in")
    ),
    security(("bearerAuth" = []))
)]
pub async fn logout(session: Session) -> AppResult<Json<MessageResponse>> {
    session.authenticated()?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

pub(crate) async fn fetch_user(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, DbUser>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .map(User::from)
        .ok_or_else(|| AppError::not_found("user not found"))
}
