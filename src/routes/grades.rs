use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::grade::{DbGrade, Grade, GradeCreateRequest, GradeListQuery, GradeUpdateRequest, GRADE_COLUMNS};
use crate::models::pagination::{GradePage, Paginated, PaginationParams};
use crate::utils::{non_blank, updated_optional, utc_now};

const GRADE_FILTER: &str = "(? IS NULL OR enrollment_id = ?) AND (? IS NULL OR section_id = ?)";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_grades).post(create_grade))
        .route("/:id", get(get_grade).put(update_grade).delete(delete_grade))
}

#[utoipa::path(
    get,
    path = "/grades",
    tag = "Grades",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
        ("enrollment_id" = Option<i64>, Query, description = "Grades of one enrollment"),
        ("section_id" = Option<i64>, Query, description = "Grades of one course assignment"),
    ),
    responses((status = 200, description = "Grades", body = GradePage)),
    security(("bearerAuth" = []))
)]
pub async fn list_grades(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<GradeListQuery>,
) -> AppResult<Json<Paginated<Grade>>> {
    session.require(permissions::VIEW_GRADES)?;
    let page = PaginationParams::new(query.page, query.per_page);

    let count_sql = format!("SELECT COUNT(1) FROM grades WHERE {GRADE_FILTER}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(query.enrollment_id)
        .bind(query.enrollment_id)
        .bind(query.section_id)
        .bind(query.section_id)
        .fetch_one(&state.pool)
        .await?;

    let sql = format!("SELECT {GRADE_COLUMNS} FROM grades WHERE {GRADE_FILTER} ORDER BY id LIMIT ? OFFSET ?");
    let grades = sqlx::query_as::<_, DbGrade>(&sql)
        .bind(query.enrollment_id)
        .bind(query.enrollment_id)
        .bind(query.section_id)
        .bind(query.section_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    let grades = grades.into_iter().map(Grade::from).collect();
    Ok(Json(Paginated::new(grades, &page, total)))
}

#[utoipa::path(
    get,
    path = "/grades/{id}",
    tag = "Grades",
    params(("id" = i64, Path, description = "Grade ID")),
    responses(
        (status = 200, description = "Grade", body = Grade),
        (status = 404, description = "Grade not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_grade(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Grade>> {
    session.require(permissions::VIEW_GRADES)?;
    Ok(Json(fetch_grade(&state.pool, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/grades",
    tag = "Grades",
    request_body = GradeCreateRequest,
    responses(
        (status = 201, description = "Grade recorded; average and final computed", body = Grade),
        (status = 400, description = "Score outside 0-100 or unknown enrollment/section")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_grade(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<GradeCreateRequest>,
) -> AppResult<(StatusCode, Json<Grade>)> {
    let principal = session.require(permissions::CREATE_GRADE)?;

    let scores = payload.scores();
    scores.validate()?;

    let id = sqlx::query(
        "INSERT INTO grades (enrollment_id, section_id, first_partial, second_partial, third_partial, final_grade, \
         average, remarks, status, recorded_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.enrollment_id)
    .bind(payload.section_id)
    .bind(scores.partials[0])
    .bind(scores.partials[1])
    .bind(scores.partials[2])
    .bind(scores.final_grade())
    .bind(scores.average())
    .bind(non_blank(payload.remarks))
    .bind(payload.status.unwrap_or_else(|| "Abierto".to_string()))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    tracing::info!(grade_id = id, recorded_by = principal.user_id, "grade recorded");
    Ok((StatusCode::CREATED, Json(fetch_grade(&state.pool, id).await?.into())))
}

#[utoipa::path(
    put,
    path = "/grades/{id}",
    tag = "Grades",
    params(("id" = i64, Path, description = "Grade ID")),
    request_body = GradeUpdateRequest,
    responses(
        (status = 200, description = "Grade updated; average and final recomputed", body = Grade),
        (status = 400, description = "Score outside 0-100"),
        (status = 404, description = "Grade not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_grade(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<GradeUpdateRequest>,
) -> AppResult<Json<Grade>> {
    let principal = session.require(permissions::EDIT_GRADE)?;
    let current = fetch_grade(&state.pool, id).await?;

    let scores = payload.merged_scores(&current);
    scores.validate()?;

    sqlx::query(
        "UPDATE grades SET section_id = ?, first_partial = ?, second_partial = ?, third_partial = ?, final_grade = ?, \
         average = ?, remarks = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(payload.section_id.unwrap_or(current.section_id))
    .bind(scores.partials[0])
    .bind(scores.partials[1])
    .bind(scores.partials[2])
    .bind(scores.final_grade())
    .bind(scores.average())
    .bind(updated_optional(payload.remarks, current.remarks))
    .bind(payload.status.unwrap_or(current.status))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    tracing::info!(grade_id = id, updated_by = principal.user_id, "grade updated");
    Ok(Json(fetch_grade(&state.pool, id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/grades/{id}",
    tag = "Grades",
    params(("id" = i64, Path, description = "Grade ID")),
    responses(
        (status = 204, description = "Grade deleted"),
        (status = 404, description = "Grade not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_grade(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_GRADE)?;

    let result = sqlx::query("DELETE FROM grades WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("grade not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_grade(pool: &SqlitePool, id: i64) -> AppResult<DbGrade> {
    let sql = format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?");
    sqlx::query_as::<_, DbGrade>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("grade not found"))
}
