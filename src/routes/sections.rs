use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::pagination::{Paginated, PaginationParams, SectionPage};
use crate::models::section::{Section, SectionCreateRequest, SectionListQuery, SectionUpdateRequest, SECTION_COLUMNS};
use crate::utils::{non_blank, updated_optional, utc_now};

const SECTION_FILTER: &str = "(? IS NULL OR instructor_id = ?) AND (? IS NULL OR year = ?)";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sections).post(create_section))
        .route("/:id", get(get_section).put(update_section).delete(delete_section))
}

#[utoipa::path(
    get,
    path = "/sections",
    tag = "Sections",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("instructor_id" = Option<i64>, Query, description = "Sections taught by one instructor"),
        ("year" = Option<i64>, Query, description = "Management year"),
    ),
    responses((status = 200, description = "Course assignments", body = SectionPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_sections(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SectionListQuery>,
) -> AppResult<Json<Paginated<Section>>> {
    session.require(permissions::VIEW_SECTIONS)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let count_sql = format!("SELECT COUNT(1) FROM sections WHERE {SECTION_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(query.instructor_id)
        .bind(query.instructor_id)
        .bind(query.year)
        .bind(query.year)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE {SECTION_FILTER} \
         ORDER BY year DESC, period, id LIMIT ? OFFSET ?"
    );
    let sections = sqlx::query_as::<_, Section>(&sql)
        .bind(query.instructor_id)
        .bind(query.instructor_id)
        .bind(query.year)
        .bind(query.year)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(sections, &page, total)))
}

#[utoipa::path(
    get,
    path = "/sections/{id}",
    tag = "Sections",
    params(("id" = i64, Path, description = "Section ID")),
    responses(
        (status = 200, description = "Course assignment", body = Section),
        (status = 404, description = "Section not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_section(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Section>> {
    session.require(permissions::VIEW_SECTIONS)?;
    Ok(Json(fetch_section(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/sections",
    tag = "Sections",
    request_body = SectionCreateRequest,
    responses(
        (status = 201, description = "Course assigned", body = Section),
        (status = 400, description = "Unknown course, instructor or career")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_section(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<SectionCreateRequest>,
) -> AppResult<(StatusCode, Json<Section>)> {
    session.require(permissions::CREATE_SECTION)?;

    if payload.capacity.is_some_and(|capacity| capacity < 0) {
        return Err(AppError::bad_request("capacity cannot be negative"));
    }

    let id = sqlx::query(
        "INSERT INTO sections (course_id, instructor_id, career_id, year, period, group_code, schedule, \
         delivery_mode, capacity, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.course_id)
    .bind(payload.instructor_id)
    .bind(payload.career_id)
    .bind(payload.year)
    .bind(payload.period.unwrap_or_else(|| "I".to_string()))
    .bind(non_blank(payload.group_code))
    .bind(non_blank(payload.schedule))
    .bind(payload.delivery_mode.unwrap_or_else(|| "Presencial".to_string()))
    .bind(payload.capacity)
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_section(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/sections/{id}",
    tag = "Sections",
    params(("id" = i64, Path, description = "Section ID")),
    request_body = SectionUpdateRequest,
    responses(
        (status = 200, description = "Course assignment updated", body = Section),
        (status = 404, description = "Section not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_section(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<SectionUpdateRequest>,
) -> AppResult<Json<Section>> {
    session.require(permissions::EDIT_SECTION)?;
    let current = fetch_section(&state.pool, id).await?;

    if payload.capacity.is_some_and(|capacity| capacity < 0) {
        return Err(AppError::bad_request("capacity cannot be negative"));
    }

    sqlx::query(
        "UPDATE sections SET course_id = ?, instructor_id = ?, career_id = ?, year = ?, period = ?, group_code = ?, \
         schedule = ?, delivery_mode = ?, capacity = ?, updated_at = ? WHERE id = ?",
    )
    .bind(payload.course_id.unwrap_or(current.course_id))
    .bind(payload.instructor_id.unwrap_or(current.instructor_id))
    .bind(payload.career_id.or(current.career_id))
    .bind(payload.year.unwrap_or(current.year))
    .bind(payload.period.unwrap_or(current.period))
    .bind(updated_optional(payload.group_code, current.group_code))
    .bind(updated_optional(payload.schedule, current.schedule))
    .bind(payload.delivery_mode.unwrap_or(current.delivery_mode))
    .bind(payload.capacity.or(current.capacity))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_section(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/sections/{id}",
    tag = "Sections",
    params(("id" = i64, Path, description = "Section ID")),
    responses(
        (status = 204, description = "Course assignment removed"),
        (status = 404, description = "Section not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_section(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_SECTION)?;

    let result = sqlx::query("DELETE FROM sections WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("section not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_section(pool: &SqlitePool, id: i64) -> AppResult<Section> {
    let sql = format!("SELECT {SECTION_COLUMNS} FROM sections WHERE id = ?");
    sqlx::query_as::<_, Section>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("section not found"))
}
