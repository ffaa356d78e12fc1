use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub person_id: Option<i64>,
    pub student_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub person_id: Option<i64>,
    pub student_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const USER_COLUMNS: &str = "id, username, email, password_hash, person_id, student_id, instructor_id, active, last_login, created_at, updated_at";

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            id: value.id,
            username: value.username,
            email: value.email,
            person_id: value.person_id,
            student_id: value.student_id,
            instructor_id: value.instructor_id,
            active: value.active,
            last_login: value.last_login,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "secretaria")]
    pub username: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Signed-in user together with the roles and permission names the session carries.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    #[schema(example = "docente1")]
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub person_id: Option<i64>,
    pub student_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub active: Option<bool>,
    /// Roles granted on creation
    #[serde(default)]
    pub role_ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub email: Option<String>,
    /// Replaces the password when present
    pub password: Option<String>,
    pub person_id: Option<i64>,
    pub student_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub active: Option<bool>,
}
