use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Career {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Pregrado, Tecnico, Posgrado, Diplomado or Otro
    pub kind: String,
    pub total_hours: i64,
    pub credits: Option<i64>,
    pub opened_on: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const CAREER_COLUMNS: &str =
    "id, code, name, description, kind, total_hours, credits, opened_on, active, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CareerCreateRequest {
    #[schema(example = "SIS")]
    pub code: String,
    #[schema(example = "Sistemas Informáticos")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "Tecnico")]
    pub kind: Option<String>,
    pub total_hours: Option<i64>,
    pub credits: Option<i64>,
    pub opened_on: Option<NaiveDate>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CareerUpdateRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub total_hours: Option<i64>,
    pub credits: Option<i64>,
    pub opened_on: Option<NaiveDate>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CareerListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub active: Option<bool>,
}
