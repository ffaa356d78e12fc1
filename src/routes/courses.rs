use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::course::{Course, CourseCreateRequest, CourseListQuery, CourseUpdateRequest, COURSE_COLUMNS};
use crate::models::pagination::{CoursePage, Paginated, PaginationParams};
use crate::utils::{non_blank, require_text, updated_optional, updated_text, utc_now};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:id", get(get_course).put(update_course).delete(delete_course))
}

#[utoipa::path(
    get,
    path = "/courses",
    tag = "Courses",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("career_id" = Option<i64>, Query, description = "Courses of one career"),
    ),
    responses((status = 200, description = "Courses", body = CoursePage)),
    security(("bearerAuth" = []))
)]
pub async fn list_courses(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CourseListQuery>,
) -> AppResult<Json<Paginated<Course>>> {
    session.require(permissions::VIEW_COURSES)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM courses WHERE (? IS NULL OR career_id = ?)")
        .bind(query.career_id)
        .bind(query.career_id)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE (? IS NULL OR career_id = ?) \
         ORDER BY semester, code, id LIMIT ? OFFSET ?"
    );
    let courses = sqlx::query_as::<_, Course>(&sql)
        .bind(query.career_id)
        .bind(query.career_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(courses, &page, total)))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course", body = Course),
        (status = 404, description = "Course not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_course(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Course>> {
    session.require(permissions::VIEW_COURSES)?;
    Ok(Json(fetch_course(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/courses",
    tag = "Courses",
    request_body = CourseCreateRequest,
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 409, description = "Code already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_course(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CourseCreateRequest>,
) -> AppResult<(StatusCode, Json<Course>)> {
    session.require(permissions::CREATE_COURSE)?;

    let theory = payload.theory_hours.unwrap_or(0);
    let practice = payload.practice_hours.unwrap_or(0);

    let id = sqlx::query(
        "INSERT INTO courses (code, name, description, total_hours, theory_hours, practice_hours, credits, semester, \
         prerequisite_id, career_id, required_for_semester, active, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(require_text("code", &payload.code)?)
    .bind(require_text("name", &payload.name)?)
    .bind(non_blank(payload.description))
    .bind(payload.total_hours.unwrap_or(theory + practice))
    .bind(theory)
    .bind(practice)
    .bind(payload.credits.unwrap_or(0))
    .bind(payload.semester)
    .bind(payload.prerequisite_id)
    .bind(payload.career_id)
    .bind(payload.required_for_semester.unwrap_or(false))
    .bind(payload.active.unwrap_or(true))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_course(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = CourseUpdateRequest,
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 400, description = "A course cannot be its own prerequisite"),
        (status = 404, description = "Course not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_course(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<CourseUpdateRequest>,
) -> AppResult<Json<Course>> {
    session.require(permissions::EDIT_COURSE)?;
    let current = fetch_course(&state.pool, id).await?;

    if payload.prerequisite_id == Some(id) {
        return Err(AppError::bad_request("a course cannot be its own prerequisite"));
    }

    sqlx::query(
        "UPDATE courses SET code = ?, name = ?, description = ?, total_hours = ?, theory_hours = ?, practice_hours = ?, \
         credits = ?, semester = ?, prerequisite_id = ?, career_id = ?, required_for_semester = ?, active = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(updated_text("code", payload.code, current.code)?)
    .bind(updated_text("name", payload.name, current.name)?)
    .bind(updated_optional(payload.description, current.description))
    .bind(payload.total_hours.unwrap_or(current.total_hours))
    .bind(payload.theory_hours.unwrap_or(current.theory_hours))
    .bind(payload.practice_hours.unwrap_or(current.practice_hours))
    .bind(payload.credits.unwrap_or(current.credits))
    .bind(payload.semester.or(current.semester))
    .bind(payload.prerequisite_id.or(current.prerequisite_id))
    .bind(payload.career_id.or(current.career_id))
    .bind(payload.required_for_semester.unwrap_or(current.required_for_semester))
    .bind(payload.active.unwrap_or(current.active))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_course(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 404, description = "Course not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_course(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_COURSE)?;

    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("course not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_course(pool: &SqlitePool, id: i64) -> AppResult<Course> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?");
    sqlx::query_as::<_, Course>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))
}
