use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A course taught by one instructor in a given year and period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Section {
    pub id: i64,
    pub course_id: i64,
    pub instructor_id: i64,
    pub career_id: Option<i64>,
    pub year: i64,
    /// I, II, III, Cuatrimestral or Anual
    pub period: String,
    pub group_code: Option<String>,
    pub schedule: Option<String>,
    /// Presencial, Virtual or Hibrido
    pub delivery_mode: String,
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const SECTION_COLUMNS: &str = "id, course_id, instructor_id, career_id, year, period, group_code, schedule, delivery_mode, capacity, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct SectionCreateRequest {
    pub course_id: i64,
    pub instructor_id: i64,
    pub career_id: Option<i64>,
    #[schema(example = 2025)]
    pub year: i64,
    pub period: Option<String>,
    pub group_code: Option<String>,
    pub schedule: Option<String>,
    pub delivery_mode: Option<String>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SectionUpdateRequest {
    pub course_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub career_id: Option<i64>,
    pub year: Option<i64>,
    pub period: Option<String>,
    pub group_code: Option<String>,
    pub schedule: Option<String>,
    pub delivery_mode: Option<String>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SectionListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub instructor_id: Option<i64>,
    pub year: Option<i64>,
}
