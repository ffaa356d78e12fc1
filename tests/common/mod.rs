#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

use academia::jwt::JwtConfig;
use academia::reports::ReportConfig;
use academia::utils::hash_password;
use academia::{create_router, db, AppState};

pub const PASSWORD: &str = "contraseña-segura";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub jwt: JwtConfig,
    pub reports_dir: PathBuf,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub disposition: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).context("response body is not JSON")
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create tempdir")?;
        let db_path = dir.path().join("academia.db");
        let pool = db::connect(&format!("sqlite://{}", db_path.display())).await?;

        let jwt = JwtConfig::new("test-secret", 1);
        let reports_dir = dir.path().join("reports");
        let state = AppState::new(pool.clone(), jwt.clone(), ReportConfig::new(&reports_dir));

        Ok(Self {
            router: create_router(state),
            pool,
            jwt,
            reports_dir,
            _dir: dir,
        })
    }

    pub fn token_for(&self, user_id: i64) -> Result<String> {
        self.jwt.encode(user_id).map_err(|err| anyhow::anyhow!("{err}"))
    }

    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header("content-type");
        let disposition = header("content-disposition");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?.to_vec();

        Ok(TestResponse {
            status,
            content_type,
            disposition,
            body,
        })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.send("GET", uri, token, None).await
    }

    /// Inserts an active user holding the named roles and returns its id.
    pub async fn create_user(&self, username: &str, role_names: &[&str]) -> Result<i64> {
        let hash = hash_password(PASSWORD).map_err(|err| anyhow::anyhow!("{err}"))?;
        let user_id = sqlx::query(
            "INSERT INTO users (username, password_hash, active, created_at) VALUES (?, ?, 1, '2025-03-01T08:00:00Z')",
        )
        .bind(username)
        .bind(hash)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        for role in role_names {
            self.grant_role(user_id, role).await?;
        }
        Ok(user_id)
    }

    pub async fn grant_role(&self, user_id: i64, role: &str) -> Result<()> {
        let affected = sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at) \
             SELECT ?, id, '2025-03-01T08:00:00Z' FROM roles WHERE name = ?",
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?
        .rows_affected();
        anyhow::ensure!(affected == 1, "role {role} not found");
        Ok(())
    }

    pub async fn login_as(&self, username: &str, role_names: &[&str]) -> Result<(i64, String)> {
        let user_id = self.create_user(username, role_names).await?;
        Ok((user_id, self.token_for(user_id)?))
    }

    pub async fn insert_career(&self, code: &str, name: &str) -> Result<i64> {
        Ok(sqlx::query(
            "INSERT INTO careers (code, name, kind, created_at) VALUES (?, ?, 'Tecnico', '2025-03-01T08:00:00Z')",
        )
        .bind(code)
        .bind(name)
        .execute(&self.pool)
        .await?
        .last_insert_rowid())
    }

    /// Person plus student profile; returns the student id.
    pub async fn insert_student(&self, code: &str, first: &str, surname: &str, active: bool) -> Result<i64> {
        let person_id = sqlx::query(
            "INSERT INTO persons (document_number, first_name, paternal_surname, created_at) \
             VALUES (?, ?, ?, '2025-03-01T08:00:00Z')",
        )
        .bind(format!("CI-{code}"))
        .bind(first)
        .bind(surname)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(sqlx::query(
            "INSERT INTO students (person_id, student_code, active, created_at) VALUES (?, ?, ?, '2025-03-01T08:00:00Z')",
        )
        .bind(person_id)
        .bind(code)
        .bind(active)
        .execute(&self.pool)
        .await?
        .last_insert_rowid())
    }

    pub async fn insert_enrollment(&self, student_id: i64, career_id: i64, year: i64, status: &str) -> Result<i64> {
        Ok(sqlx::query(
            "INSERT INTO enrollments (student_id, career_id, year, period, enrolled_at, status, created_at) \
             VALUES (?, ?, ?, 'I', ?, ?, '2025-03-01T08:00:00Z')",
        )
        .bind(student_id)
        .bind(career_id)
        .bind(year)
        .bind(format!("{year}-02-15"))
        .bind(status)
        .execute(&self.pool)
        .await?
        .last_insert_rowid())
    }

    /// Course taught by a fresh instructor; returns the section id.
    pub async fn insert_section(&self, course_code: &str, course_name: &str, career_id: i64) -> Result<i64> {
        let course_id = sqlx::query(
            "INSERT INTO courses (code, name, career_id, created_at) VALUES (?, ?, ?, '2025-03-01T08:00:00Z')",
        )
        .bind(course_code)
        .bind(course_name)
        .bind(career_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let person_id = sqlx::query(
            "INSERT INTO persons (document_number, first_name, paternal_surname, created_at) \
             VALUES (?, 'Luis', 'Docente', '2025-03-01T08:00:00Z')",
        )
        .bind(format!("DOC-{course_code}"))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let instructor_id = sqlx::query(
            "INSERT INTO instructors (person_id, instructor_code, academic_degree, created_at) \
             VALUES (?, ?, 'Licenciatura', '2025-03-01T08:00:00Z')",
        )
        .bind(person_id)
        .bind(format!("DOC-{course_code}"))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(sqlx::query(
            "INSERT INTO sections (course_id, instructor_id, career_id, year, created_at) \
             VALUES (?, ?, ?, 2025, '2025-03-01T08:00:00Z')",
        )
        .bind(course_id)
        .bind(instructor_id)
        .bind(career_id)
        .execute(&self.pool)
        .await?
        .last_insert_rowid())
    }

    pub fn artifact_count(&self) -> usize {
        std::fs::read_dir(&self.reports_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
