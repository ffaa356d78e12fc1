use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::instructor::{Instructor, InstructorCreateRequest, InstructorListQuery, InstructorUpdateRequest};
use crate::models::pagination::{InstructorPage, Paginated, PaginationParams};
use crate::models::person::FULL_NAME_SQL;
use crate::utils::{non_blank, updated_optional, utc_now};

fn instructor_select() -> String {
    format!(
        "SELECT i.id, i.person_id, {FULL_NAME_SQL} AS full_name, i.instructor_code, i.academic_degree, \
           i.hired_on, i.university_degree, i.active, i.created_at, i.updated_at \
         FROM instructors i JOIN persons p ON p.id = i.person_id"
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_instructors).post(create_instructor))
        .route("/:id", get(get_instructor).put(update_instructor).delete(delete_instructor))
}

#[utoipa::path(
    get,
    path = "/instructors",
    tag = "Instructors",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("active" = Option<bool>, Query, description = "Only active or inactive instructors"),
    ),
    responses((status = 200, description = "Instructors", body = InstructorPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_instructors(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<InstructorListQuery>,
) -> AppResult<Json<Paginated<Instructor>>> {
    session.require(permissions::VIEW_INSTRUCTORS)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM instructors WHERE (? IS NULL OR active = ?)")
        .bind(query.active)
        .bind(query.active)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "{} WHERE (? IS NULL OR i.active = ?) \
         ORDER BY p.paternal_surname, p.maternal_surname, p.first_name, i.id LIMIT ? OFFSET ?",
        instructor_select()
    );
    let instructors = sqlx::query_as::<_, Instructor>(&sql)
        .bind(query.active)
        .bind(query.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(instructors, &page, total)))
}

#[utoipa::path(
    get,
    path = "/instructors/{id}",
    tag = "Instructors",
    params(("id" = i64, Path, description = "Instructor ID")),
    responses(
        (status = 200, description = "Instructor", body = Instructor),
        (status = 404, description = "Instructor not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_instructor(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Instructor>> {
    session.require(permissions::VIEW_INSTRUCTORS)?;
    Ok(Json(fetch_instructor(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/instructors",
    tag = "Instructors",
    request_body = InstructorCreateRequest,
    responses(
        (status = 201, description = "Instructor created", body = Instructor),
        (status = 409, description = "Instructor code already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_instructor(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<InstructorCreateRequest>,
) -> AppResult<(StatusCode, Json<Instructor>)> {
    session.require(permissions::CREATE_INSTRUCTOR)?;

    let id = sqlx::query(
        "INSERT INTO instructors (person_id, instructor_code, academic_degree, hired_on, university_degree, active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.person_id)
    .bind(non_blank(payload.instructor_code))
    .bind(non_blank(payload.academic_degree))
    .bind(payload.hired_on)
    .bind(non_blank(payload.university_degree))
    .bind(payload.active.unwrap_or(true))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_instructor(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/instructors/{id}",
    tag = "Instructors",
    params(("id" = i64, Path, description = "Instructor ID")),
    request_body = InstructorUpdateRequest,
    responses(
        (status = 200, description = "Instructor updated", body = Instructor),
        (status = 404, description = "Instructor not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_instructor(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<InstructorUpdateRequest>,
) -> AppResult<Json<Instructor>> {
    session.require(permissions::EDIT_INSTRUCTOR)?;
    let current = fetch_instructor(&state.pool, id).await?;

    sqlx::query(
        "UPDATE instructors SET instructor_code = ?, academic_degree = ?, hired_on = ?, university_degree = ?, \
         active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(updated_optional(payload.instructor_code, current.instructor_code))
    .bind(updated_optional(payload.academic_degree, current.academic_degree))
    .bind(payload.hired_on.or(current.hired_on))
    .bind(updated_optional(payload.university_degree, current.university_degree))
    .bind(payload.active.unwrap_or(current.active))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_instructor(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/instructors/{id}",
    tag = "Instructors",
    params(("id" = i64, Path, description = "Instructor ID")),
    responses(
        (status = 204, description = "Instructor deleted with their course assignments"),
        (status = 404, description = "Instructor not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_instructor(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_INSTRUCTOR)?;

    let result = sqlx::query("DELETE FROM instructors WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("instructor not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_instructor(pool: &SqlitePool, id: i64) -> AppResult<Instructor> {
    let sql = format!("{} WHERE i.id = ?", instructor_select());
    sqlx::query_as::<_, Instructor>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("instructor not found"))
}
