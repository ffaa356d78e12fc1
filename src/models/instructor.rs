use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Instructor {
    pub id: i64,
    pub person_id: i64,
    pub full_name: String,
    pub instructor_code: Option<String>,
    pub academic_degree: Option<String>,
    pub hired_on: Option<NaiveDate>,
    pub university_degree: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstructorCreateRequest {
    pub person_id: i64,
    #[schema(example = "DOC-014")]
    pub instructor_code: Option<String>,
    #[schema(example = "Licenciatura")]
    pub academic_degree: Option<String>,
    pub hired_on: Option<NaiveDate>,
    pub university_degree: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct InstructorUpdateRequest {
    pub instructor_code: Option<String>,
    pub academic_degree: Option<String>,
    pub hired_on: Option<NaiveDate>,
    pub university_degree: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InstructorListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub active: Option<bool>,
}
