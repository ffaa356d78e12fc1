use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::pagination::{Paginated, PaginationParams, StudentPage};
use crate::models::person::FULL_NAME_SQL;
use crate::models::student::{Student, StudentCreateRequest, StudentListQuery, StudentUpdateRequest};
use crate::utils::{non_blank, updated_optional, utc_now};

const STUDENT_FILTER: &str = "(? IS NULL OR s.active = ?) \
    AND (? IS NULL OR EXISTS (SELECT 1 FROM enrollments e WHERE e.student_id = s.id AND e.career_id = ?))";

fn student_select() -> String {
    format!(
        "SELECT s.id, s.person_id, {FULL_NAME_SQL} AS full_name, p.document_number, s.student_code, \
           s.nationality, s.province, s.department, s.marital_status, s.school, s.graduation_year, \
           s.admission_type, s.active, s.created_at, s.updated_at \
         FROM students s JOIN persons p ON p.id = s.person_id"
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/:id", get(get_student).put(update_student).delete(delete_student))
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "Students",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("active" = Option<bool>, Query, description = "Only active or inactive students"),
        ("career_id" = Option<i64>, Query, description = "Students enrolled in this career"),
    ),
    responses((status = 200, description = "Students", body = StudentPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_students(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<StudentListQuery>,
) -> AppResult<Json<Paginated<Student>>> {
    session.require(permissions::VIEW_STUDENTS)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let count_sql = format!("SELECT COUNT(1) FROM students s WHERE {STUDENT_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(query.active)
        .bind(query.active)
        .bind(query.career_id)
        .bind(query.career_id)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "{} WHERE {STUDENT_FILTER} ORDER BY p.paternal_surname, p.maternal_surname, p.first_name, s.id LIMIT ? OFFSET ?",
        student_select()
    );
    let students = sqlx::query_as::<_, Student>(&sql)
        .bind(query.active)
        .bind(query.active)
        .bind(query.career_id)
        .bind(query.career_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(students, &page, total)))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student", body = Student),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_student(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Student>> {
    session.require(permissions::VIEW_STUDENTS)?;
    Ok(Json(fetch_student(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/students",
    tag = "Students",
    request_body = StudentCreateRequest,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Unknown person or invalid option"),
        (status = 409, description = "Student code already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_student(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<StudentCreateRequest>,
) -> AppResult<(StatusCode, Json<Student>)> {
    session.require(permissions::CREATE_STUDENT)?;

    let id = sqlx::query(
        "INSERT INTO students (person_id, student_code, nationality, province, department, marital_status, \
         school, graduation_year, admission_type, active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.person_id)
    .bind(non_blank(payload.student_code))
    .bind(non_blank(payload.nationality))
    .bind(non_blank(payload.province))
    .bind(non_blank(payload.department))
    .bind(payload.marital_status.unwrap_or_else(|| "Soltero".to_string()))
    .bind(non_blank(payload.school))
    .bind(payload.graduation_year)
    .bind(payload.admission_type.unwrap_or_else(|| "Regular".to_string()))
    .bind(payload.active.unwrap_or(true))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_student(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student ID")),
    request_body = StudentUpdateRequest,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_student(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<StudentUpdateRequest>,
) -> AppResult<Json<Student>> {
    session.require(permissions::EDIT_STUDENT)?;
    let current = fetch_student(&state.pool, id).await?;

    sqlx::query(
        "UPDATE students SET student_code = ?, nationality = ?, province = ?, department = ?, marital_status = ?, \
         school = ?, graduation_year = ?, admission_type = ?, active = ?, updated_at = ? WHERE id = ?",
    )
    .bind(updated_optional(payload.student_code, current.student_code))
    .bind(updated_optional(payload.nationality, current.nationality))
    .bind(updated_optional(payload.province, current.province))
    .bind(updated_optional(payload.department, current.department))
    .bind(payload.marital_status.unwrap_or(current.marital_status))
    .bind(updated_optional(payload.school, current.school))
    .bind(payload.graduation_year.or(current.graduation_year))
    .bind(payload.admission_type.unwrap_or(current.admission_type))
    .bind(payload.active.unwrap_or(current.active))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_student(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "Students",
    params(("id" = i64, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted with their enrollments and grades"),
        (status = 404, description = "Student not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_student(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_STUDENT)?;

    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("student not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_student(pool: &SqlitePool, id: i64) -> AppResult<Student> {
    let sql = format!("{} WHERE s.id = ?", student_select());
    sqlx::query_as::<_, Student>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("student not found"))
}
