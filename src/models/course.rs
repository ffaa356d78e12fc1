use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub total_hours: i64,
    pub theory_hours: i64,
    pub practice_hours: i64,
    pub credits: i64,
    pub semester: Option<i64>,
    pub prerequisite_id: Option<i64>,
    pub career_id: Option<i64>,
    pub required_for_semester: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const COURSE_COLUMNS: &str = "id, code, name, description, total_hours, theory_hours, practice_hours, credits, semester, prerequisite_id, career_id, required_for_semester, active, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CourseCreateRequest {
    #[schema(example = "PRG-101")]
    pub code: String,
    #[schema(example = "Programación I")]
    pub name: String,
    pub description: Option<String>,
    pub total_hours: Option<i64>,
    pub theory_hours: Option<i64>,
    pub practice_hours: Option<i64>,
    pub credits: Option<i64>,
    pub semester: Option<i64>,
    pub prerequisite_id: Option<i64>,
    pub career_id: Option<i64>,
    pub required_for_semester: Option<bool>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CourseUpdateRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_hours: Option<i64>,
    pub theory_hours: Option<i64>,
    pub practice_hours: Option<i64>,
    pub credits: Option<i64>,
    pub semester: Option<i64>,
    pub prerequisite_id: Option<i64>,
    pub career_id: Option<i64>,
    pub required_for_semester: Option<bool>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CourseListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub career_id: Option<i64>,
}
