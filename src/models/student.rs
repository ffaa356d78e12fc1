use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Student profile joined with the owning person's name and document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: i64,
    pub person_id: i64,
    pub full_name: String,
    pub document_number: String,
    pub student_code: Option<String>,
    pub nationality: Option<String>,
    pub province: Option<String>,
    pub department: Option<String>,
    /// Soltero, Casado, Viudo, Divorciado or Otro
    pub marital_status: String,
    pub school: Option<String>,
    pub graduation_year: Option<i64>,
    /// Regular, Traslado or Libre
    pub admission_type: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StudentCreateRequest {
    pub person_id: i64,
    #[schema(example = "EST-2025-001")]
    pub student_code: Option<String>,
    pub nationality: Option<String>,
    pub province: Option<String>,
    pub department: Option<String>,
    pub marital_status: Option<String>,
    pub school: Option<String>,
    pub graduation_year: Option<i64>,
    pub admission_type: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StudentUpdateRequest {
    pub student_code: Option<String>,
    pub nationality: Option<String>,
    pub province: Option<String>,
    pub department: Option<String>,
    pub marital_status: Option<String>,
    pub school: Option<String>,
    pub graduation_year: Option<i64>,
    pub admission_type: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StudentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub active: Option<bool>,
    /// Students with at least one enrollment in this career
    pub career_id: Option<i64>,
}
