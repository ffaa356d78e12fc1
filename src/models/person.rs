use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Person {
    pub id: i64,
    /// CI, Pasaporte or Otro
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub birth_place: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Person {
    pub fn full_name(&self) -> String {
        let mut name = format!("{} {}", self.first_name, self.paternal_surname);
        if let Some(maternal) = self.maternal_surname.as_deref().filter(|s| !s.is_empty()) {
            name.push(' ');
            name.push_str(maternal);
        }
        name
    }
}

/// SQL expression for a person's display name; expects `persons` aliased as `p`.
pub const FULL_NAME_SQL: &str =
    "p.first_name || ' ' || p.paternal_surname || COALESCE(' ' || NULLIF(p.maternal_surname, ''), '')";

pub const PERSON_COLUMNS: &str = "id, document_type, document_number, first_name, paternal_surname, maternal_surname, birth_date, sex, birth_place, address, phone, email, created_at, updated_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct PersonCreateRequest {
    #[schema(example = "CI")]
    pub document_type: Option<String>,
    #[schema(example = "4567890")]
    pub document_number: String,
    #[schema(example = "Ana")]
    pub first_name: String,
    #[schema(example = "Quispe")]
    pub paternal_surname: String,
    pub maternal_surname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub birth_place: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PersonUpdateRequest {
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub first_name: Option<String>,
    pub paternal_surname: Option<String>,
    pub maternal_surname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub birth_place: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(maternal: Option<&str>) -> Person {
        Person {
            id: 1,
            document_type: "CI".into(),
            document_number: "123".into(),
            first_name: "Ana".into(),
            paternal_surname: "Quispe".into(),
            maternal_surname: maternal.map(Into::into),
            birth_date: None,
            sex: None,
            birth_place: None,
            address: None,
            phone: None,
            email: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn full_name_skips_missing_maternal_surname() {
        assert_eq!(person(None).full_name(), "Ana Quispe");
        assert_eq!(person(Some("")).full_name(), "Ana Quispe");
        assert_eq!(person(Some("Mamani")).full_name(), "Ana Quispe Mamani");
    }
}
