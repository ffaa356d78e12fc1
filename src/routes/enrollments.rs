use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Local;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::enrollment::{
    Enrollment, EnrollmentCreateRequest, EnrollmentListQuery, EnrollmentUpdateRequest, ENROLLMENT_COLUMNS,
};
use crate::models::pagination::{EnrollmentPage, Paginated, PaginationParams};
use crate::utils::utc_now;

const ENROLLMENT_FILTER: &str =
    "(? IS NULL OR career_id = ?) AND (? IS NULL OR year = ?) AND (? IS NULL OR student_id = ?)";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_enrollments).post(create_enrollment))
        .route("/:id", get(get_enrollment).put(update_enrollment).delete(delete_enrollment))
}

#[utoipa::path(
    get,
    path = "/enrollments",
    tag = "Enrollments",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("career_id" = Option<i64>, Query, description = "Enrollments in one career"),
        ("year" = Option<i64>, Query, description = "Management year"),
        ("student_id" = Option<i64>, Query, description = "Enrollments of one student"),
    ),
    responses((status = 200, description = "Enrollments", body = EnrollmentPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<EnrollmentListQuery>,
) -> AppResult<Json<Paginated<Enrollment>>> {
    session.require(permissions::VIEW_ENROLLMENTS)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let count_sql = format!("SELECT COUNT(1) FROM enrollments WHERE {ENROLLMENT_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(query.career_id)
        .bind(query.career_id)
        .bind(query.year)
        .bind(query.year)
        .bind(query.student_id)
        .bind(query.student_id)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE {ENROLLMENT_FILTER} \
         ORDER BY enrolled_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let enrollments = sqlx::query_as::<_, Enrollment>(&sql)
        .bind(query.career_id)
        .bind(query.career_id)
        .bind(query.year)
        .bind(query.year)
        .bind(query.student_id)
        .bind(query.student_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(enrollments, &page, total)))
}

#[utoipa::path(
    get,
    path = "/enrollments/{id}",
    tag = "Enrollments",
    params(("id" = i64, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Enrollment", body = Enrollment),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_enrollment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Enrollment>> {
    session.require(permissions::VIEW_ENROLLMENTS)?;
    Ok(Json(fetch_enrollment(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/enrollments",
    tag = "Enrollments",
    request_body = EnrollmentCreateRequest,
    responses(
        (status = 201, description = "Student enrolled", body = Enrollment),
        (status = 400, description = "Unknown student or career, or invalid option")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<EnrollmentCreateRequest>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    session.require(permissions::CREATE_ENROLLMENT)?;

    let id = sqlx::query(
        "INSERT INTO enrollments (student_id, career_id, year, period, enrolled_at, status, admission_method, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.student_id)
    .bind(payload.career_id)
    .bind(payload.year)
    .bind(payload.period.unwrap_or_else(|| "I".to_string()))
    .bind(payload.enrolled_at.unwrap_or_else(|| Local::now().date_naive()))
    .bind(payload.status.unwrap_or_else(|| "Matriculado".to_string()))
    .bind(payload.admission_method.unwrap_or_else(|| "Regular".to_string()))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_enrollment(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/enrollments/{id}",
    tag = "Enrollments",
    params(("id" = i64, Path, description = "Enrollment ID")),
    request_body = EnrollmentUpdateRequest,
    responses(
        (status = 200, description = "Enrollment updated", body = Enrollment),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_enrollment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<EnrollmentUpdateRequest>,
) -> AppResult<Json<Enrollment>> {
    session.require(permissions::EDIT_ENROLLMENT)?;
    let current = fetch_enrollment(&state.pool, id).await?;

    sqlx::query(
        "UPDATE enrollments SET career_id = ?, year = ?, period = ?, enrolled_at = ?, status = ?, \
         admission_method = ?, updated_at = ? WHERE id = ?",
    )
    .bind(payload.career_id.unwrap_or(current.career_id))
    .bind(payload.year.unwrap_or(current.year))
    .bind(payload.period.unwrap_or(current.period))
    .bind(payload.enrolled_at.unwrap_or(current.enrolled_at))
    .bind(payload.status.unwrap_or(current.status))
    .bind(payload.admission_method.unwrap_or(current.admission_method))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_enrollment(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/enrollments/{id}",
    tag = "Enrollments",
    params(("id" = i64, Path, description = "Enrollment ID")),
    responses(
        (status = 204, description = "Enrollment deleted with its grades"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_enrollment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_ENROLLMENT)?;

    let result = sqlx::query("DELETE FROM enrollments WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("enrollment not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_enrollment(pool: &SqlitePool, id: i64) -> AppResult<Enrollment> {
    let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?");
    sqlx::query_as::<_, Enrollment>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("enrollment not found"))
}
