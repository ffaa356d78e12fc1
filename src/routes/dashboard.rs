use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::Session;
use crate::errors::AppResult;
use crate::models::career::{Career, CAREER_COLUMNS};

const RECENT_CAREERS: i64 = 5;

/// Headline counts for the landing page.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct DashboardStats {
    pub active_careers: i64,
    pub active_students: i64,
    pub active_instructors: i64,
    pub active_courses: i64,
    pub total_enrollments: i64,
    /// Course sections assigned to an instructor
    pub total_assignments: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    /// Newest active careers, most recent first
    pub recent_careers: Vec<Career>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Headline counts and recent careers", body = DashboardResponse),
        (status = 401, description = "Not signed in")
    ),
    security(("bearerAuth" = []))
)]
pub async fn dashboard(State(state): State<AppState>, session: Session) -> AppResult<Json<DashboardResponse>> {
    session.authenticated()?;

    let mut tx = state.pool.begin().await?;

    let stats = sqlx::query_as::<_, DashboardStats>(
        "SELECT \
           (SELECT COUNT(1) FROM careers WHERE active = 1) AS active_careers, \
           (SELECT COUNT(1) FROM students WHERE active = 1) AS active_students, \
           (SELECT COUNT(1) FROM instructors WHERE active = 1) AS active_instructors, \
           (SELECT COUNT(1) FROM courses WHERE active = 1) AS active_courses, \
           (SELECT COUNT(1) FROM enrollments) AS total_enrollments, \
           (SELECT COUNT(1) FROM sections) AS total_assignments",
    )
    .fetch_one(&mut *tx)
    .await?;

    let sql = format!(
        "SELECT {CAREER_COLUMNS} FROM careers WHERE active = 1 ORDER BY created_at DESC, id DESC LIMIT ?"
    );
    let recent_careers = sqlx::query_as::<_, Career>(&sql)
        .bind(RECENT_CAREERS)
        .fetch_all(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(DashboardResponse { stats, recent_careers }))
}
