//! PDF report downloads.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::authz::Session;
use crate::errors::{AppError, AppResult};
use crate::reports::{
    generate_report, ArtifactHandle, ReportError, ReportFilters, ReportKind, ReportRequest, ReportStage,
    SqliteReportSource,
};

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct StudentReportParams {
    /// Only students enrolled in this career
    pub career_id: Option<i64>,
    /// Only active or inactive students
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EnrollmentReportParams {
    /// Management year; the current year when omitted
    pub year: Option<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(students_report).post(students_report_with_body))
        .route("/grades/:enrollment_id", get(grades_report))
        .route("/instructors", get(instructors_report))
        .route("/careers", get(careers_report))
        .route("/enrollments", get(enrollments_report))
}

#[utoipa::path(
    get,
    path = "/reports/students",
    tag = "Reports",
    params(StudentReportParams),
    responses(
        (status = 200, description = "Student list as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing ver_estudiantes"),
        (status = 404, description = "Unknown career")
    ),
    security(("bearerAuth" = []))
)]
pub async fn students_report(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<StudentReportParams>,
) -> AppResult<Response> {
    run(&state, &session, ReportKind::Students, student_filters(params)).await
}

#[utoipa::path(
    post,
    path = "/reports/students",
    tag = "Reports",
    request_body = StudentReportParams,
    responses(
        (status = 200, description = "Student list as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing ver_estudiantes"),
        (status = 404, description = "Unknown career")
    ),
    security(("bearerAuth" = []))
)]
pub async fn students_report_with_body(
    State(state): State<AppState>,
    session: Session,
    Json(params): Json<StudentReportParams>,
) -> AppResult<Response> {
    run(&state, &session, ReportKind::Students, student_filters(params)).await
}

#[utoipa::path(
    get,
    path = "/reports/grades/{enrollment_id}",
    tag = "Reports",
    params(("enrollment_id" = i64, Path, description = "Enrollment whose grades are certified")),
    responses(
        (status = 200, description = "Grade certificate as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing ver_notas and not the enrolled student"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn grades_report(
    State(state): State<AppState>,
    session: Session,
    Path(enrollment_id): Path<i64>,
) -> AppResult<Response> {
    let filters = ReportFilters {
        enrollment_id: Some(enrollment_id),
        ..ReportFilters::default()
    };
    run(&state, &session, ReportKind::Grades, filters).await
}

#[utoipa::path(
    get,
    path = "/reports/instructors",
    tag = "Reports",
    responses(
        (status = 200, description = "Active instructors as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing ver_docentes")
    ),
    security(("bearerAuth" = []))
)]
pub async fn instructors_report(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    run(&state, &session, ReportKind::Instructors, ReportFilters::default()).await
}

#[utoipa::path(
    get,
    path = "/reports/careers",
    tag = "Reports",
    responses(
        (status = 200, description = "Active careers as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing ver_carreras")
    ),
    security(("bearerAuth" = []))
)]
pub async fn careers_report(State(state): State<AppState>, session: Session) -> AppResult<Response> {
    run(&state, &session, ReportKind::Careers, ReportFilters::default()).await
}

#[utoipa::path(
    get,
    path = "/reports/enrollments",
    tag = "Reports",
    params(EnrollmentReportParams),
    responses(
        (status = 200, description = "Enrollments of one year as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 400, description = "Year out of range"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Missing ver_inscripciones")
    ),
    security(("bearerAuth" = []))
)]
pub async fn enrollments_report(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<EnrollmentReportParams>,
) -> AppResult<Response> {
    let filters = ReportFilters {
        year: params.year,
        ..ReportFilters::default()
    };
    run(&state, &session, ReportKind::Enrollments, filters).await
}

fn student_filters(params: StudentReportParams) -> ReportFilters {
    ReportFilters {
        career_id: params.career_id,
        active: params.active,
        ..ReportFilters::default()
    }
}

async fn run(state: &AppState, session: &Session, kind: ReportKind, filters: ReportFilters) -> AppResult<Response> {
    let source = SqliteReportSource::new(state.pool.clone());
    let request = ReportRequest::new(kind, filters);

    let handle = generate_report(&source, &state.reports, &request, session.principal()).await?;
    deliver(handle).await
}

async fn deliver(handle: ArtifactHandle) -> AppResult<Response> {
    let bytes = tokio::fs::read(&handle.path).await.map_err(|source| {
        AppError::from(ReportError::WriteFailed {
            stage: ReportStage::Written,
            source,
        })
    })?;

    let disposition = format!("attachment; filename=\"{}\"", header_safe(&handle.suggested_name));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Header values must be visible ASCII; anything else becomes `_`.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_names_are_header_safe() {
        assert_eq!(header_safe("reporte_estudiantes_20250301.pdf"), "reporte_estudiantes_20250301.pdf");
        assert_eq!(header_safe("certificado_notas_EST-ñ 1.pdf"), "certificado_notas_EST-__1.pdf");
        assert_eq!(header_safe("a\"b.pdf"), "a_b.pdf");
    }
}
