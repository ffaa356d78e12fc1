use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub career_id: i64,
    pub year: i64,
    pub period: String,
    pub enrolled_at: NaiveDate,
    /// Preinscrito, Matriculado, Rechazado or Anulado
    pub status: String,
    /// Regular, Traslado, Admitido or Otro
    pub admission_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const ENROLLMENT_COLUMNS: &str =
    "id, student_id, career_id, year, period, enrolled_at, status, admission_method, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnrollmentCreateRequest {
    pub student_id: i64,
    pub career_id: i64,
    #[schema(example = 2025)]
    pub year: i64,
    pub period: Option<String>,
    /// Defaults to today
    pub enrolled_at: Option<NaiveDate>,
    pub status: Option<String>,
    pub admission_method: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EnrollmentUpdateRequest {
    pub career_id: Option<i64>,
    pub year: Option<i64>,
    pub period: Option<String>,
    pub enrolled_at: Option<NaiveDate>,
    pub status: Option<String>,
    pub admission_method: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EnrollmentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub career_id: Option<i64>,
    pub year: Option<i64>,
    pub student_id: Option<i64>,
}
