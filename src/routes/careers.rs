use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::career::{Career, CareerCreateRequest, CareerListQuery, CareerUpdateRequest, CAREER_COLUMNS};
use crate::models::pagination::{CareerPage, Paginated, PaginationParams};
use crate::utils::{non_blank, require_text, updated_optional, updated_text, utc_now};

const DEFAULT_KIND: &str = "Pregrado";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_careers).post(create_career))
        .route("/:id", get(get_career).put(update_career).delete(delete_career))
}

#[utoipa::path(
    get,
    path = "/careers",
    tag = "Careers",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("active" = Option<bool>, Query, description = "Only active or inactive careers"),
    ),
    responses((status = 200, description = "Careers", body = CareerPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_careers(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CareerListQuery>,
) -> AppResult<Json<Paginated<Career>>> {
    session.require(permissions::VIEW_CAREERS)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM careers WHERE (? IS NULL OR active = ?)")
        .bind(query.active)
        .bind(query.active)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {CAREER_COLUMNS} FROM careers WHERE (? IS NULL OR active = ?) ORDER BY name, id LIMIT ? OFFSET ?"
    );
    let careers = sqlx::query_as::<_, Career>(&sql)
        .bind(query.active)
        .bind(query.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(careers, &page, total)))
}

#[utoipa::path(
    get,
    path = "/careers/{id}",
    tag = "Careers",
    params(("id" = i64, Path, description = "Career ID")),
    responses(
        (status = 200, description = "Career", body = Career),
        (status = 404, description = "Career not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_career(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Career>> {
    session.require(permissions::VIEW_CAREERS)?;
    Ok(Json(fetch_career(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/careers",
    tag = "Careers",
    request_body = CareerCreateRequest,
    responses(
        (status = 201, description = "Career created", body = Career),
        (status = 409, description = "Code already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_career(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CareerCreateRequest>,
) -> AppResult<(StatusCode, Json<Career>)> {
    session.require(permissions::CREATE_CAREER)?;

    let id = sqlx::query(
        "INSERT INTO careers (code, name, description, kind, total_hours, credits, opened_on, active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(require_text("code", &payload.code)?)
    .bind(require_text("name", &payload.name)?)
    .bind(non_blank(payload.description))
    .bind(payload.kind.unwrap_or_else(|| DEFAULT_KIND.to_string()))
    .bind(payload.total_hours.unwrap_or(0))
    .bind(payload.credits)
    .bind(payload.opened_on)
    .bind(payload.active.unwrap_or(true))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_career(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/careers/{id}",
    tag = "Careers",
    params(("id" = i64, Path, description = "Career ID")),
    request_body = CareerUpdateRequest,
    responses(
        (status = 200, description = "Career updated", body = Career),
        (status = 404, description = "Career not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_career(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<CareerUpdateRequest>,
) -> AppResult<Json<Career>> {
    session.require(permissions::EDIT_CAREER)?;
    let current = fetch_career(&state.pool, id).await?;

    sqlx::query(
        "UPDATE careers SET code = ?, name = ?, description = ?, kind = ?, total_hours = ?, credits = ?, \
         opened_on = ?, active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(updated_text("code", payload.code, current.code)?)
    .bind(updated_text("name", payload.name, current.name)?)
    .bind(updated_optional(payload.description, current.description))
    .bind(payload.kind.unwrap_or(current.kind))
    .bind(payload.total_hours.unwrap_or(current.total_hours))
    .bind(payload.credits.or(current.credits))
    .bind(payload.opened_on.or(current.opened_on))
    .bind(payload.active.unwrap_or(current.active))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_career(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/careers/{id}",
    tag = "Careers",
    params(("id" = i64, Path, description = "Career ID")),
    responses(
        (status = 204, description = "Career deleted"),
        (status = 404, description = "Career not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_career(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_CAREER)?;

    let result = sqlx::query("DELETE FROM careers WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("career not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_career(pool: &SqlitePool, id: i64) -> AppResult<Career> {
    let sql = format!("SELECT {CAREER_COLUMNS} FROM careers WHERE id = ?");
    sqlx::query_as::<_, Career>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("career not found"))
}
