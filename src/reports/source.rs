//! Read-only queries backing the report pipeline.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, SqlitePool};

use crate::models::person::FULL_NAME_SQL;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Worth one more attempt: pool exhaustion, dropped connection, locked database.
    #[error("transient persistence failure")]
    Transient(#[source] sqlx::Error),
    #[error("persistence failure")]
    Permanent(#[source] sqlx::Error),
    #[error("{0} not found")]
    NotFound(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<sqlx::Error> for FetchError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::RowNotFound => FetchError::NotFound("record".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => FetchError::Transient(value),
            sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("5" | "6" | "517")) => {
                FetchError::Transient(value)
            }
            _ => FetchError::Permanent(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StudentRecord {
    pub id: i64,
    pub code: Option<String>,
    pub full_name: String,
    pub document_number: String,
    pub career: Option<String>,
    pub active: bool,
}

/// Students report input read under one transaction: the career filter's
/// name (when filtered) and the matching students.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRoster {
    pub career: Option<String>,
    pub records: Vec<StudentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradeSheet {
    pub enrollment_id: i64,
    pub student_id: i64,
    pub student_code: Option<String>,
    pub student_name: String,
    pub document_number: String,
    pub career: String,
    pub year: i64,
    pub period: String,
    pub lines: Vec<GradeLine>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct GradeLine {
    pub course: String,
    pub first_partial: Option<f64>,
    pub second_partial: Option<f64>,
    pub third_partial: Option<f64>,
    pub final_grade: Option<f64>,
}

impl GradeLine {
    pub fn partials(&self) -> [Option<f64>; 3] {
        [self.first_partial, self.second_partial, self.third_partial]
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct InstructorRecord {
    pub code: Option<String>,
    pub full_name: String,
    pub degree: Option<String>,
    pub assigned_courses: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CareerRecord {
    pub code: String,
    pub name: String,
    pub kind: String,
    pub students: i64,
    pub courses: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EnrollmentRecord {
    pub student_name: String,
    pub career: String,
    pub period: String,
    pub status: String,
    pub enrolled_on: NaiveDate,
}

/// One consistent snapshot of everything a report needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportData {
    Students {
        records: Vec<StudentRecord>,
        career: Option<String>,
        active: Option<bool>,
    },
    Grades(GradeSheet),
    Instructors(Vec<InstructorRecord>),
    Careers(Vec<CareerRecord>),
    Enrollments {
        year: i32,
        records: Vec<EnrollmentRecord>,
    },
}

impl ReportData {
    pub fn record_count(&self) -> usize {
        match self {
            ReportData::Students { records, .. } => records.len(),
            ReportData::Grades(sheet) => sheet.lines.len(),
            ReportData::Instructors(records) => records.len(),
            ReportData::Careers(records) => records.len(),
            ReportData::Enrollments { records, .. } => records.len(),
        }
    }
}

/// Persistence collaborator of the pipeline. Every method is a pure read.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Students, optionally restricted to those enrolled in a career and/or by active flag.
    /// An unknown career is `NotFound`.
    async fn student_roster(&self, career_id: Option<i64>, active: Option<bool>) -> Result<StudentRoster, FetchError>;

    /// The student that owns an enrollment, if the enrollment exists.
    async fn enrollment_owner(&self, enrollment_id: i64) -> Result<Option<i64>, FetchError>;

    async fn grade_sheet(&self, enrollment_id: i64) -> Result<GradeSheet, FetchError>;

    async fn instructors(&self) -> Result<Vec<InstructorRecord>, FetchError>;

    async fn careers(&self) -> Result<Vec<CareerRecord>, FetchError>;

    async fn enrollments(&self, year: i32) -> Result<Vec<EnrollmentRecord>, FetchError>;
}

#[derive(Clone)]
pub struct SqliteReportSource {
    pool: SqlitePool,
}

impl SqliteReportSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SheetHeader {
    student_id: i64,
    student_code: Option<String>,
    student_name: String,
    document_number: String,
    career: String,
    year: i64,
    period: String,
}

#[async_trait]
impl ReportSource for SqliteReportSource {
    async fn student_roster(&self, career_id: Option<i64>, active: Option<bool>) -> Result<StudentRoster, FetchError> {
        let mut tx = self.pool.begin().await?;

        let career = match career_id {
            Some(id) => Some(
                sqlx::query_scalar::<_, String>("SELECT name FROM careers WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| FetchError::NotFound(format!("career {id}")))?,
            ),
            None => None,
        };

        let sql = format!(
            "SELECT s.id, s.student_code AS code, {FULL_NAME_SQL} AS full_name, p.document_number, \
               (SELECT c.name FROM enrollments e JOIN careers c ON c.id = e.career_id \
                 WHERE e.student_id = s.id AND (? IS NULL OR e.career_id = ?) \
                 ORDER BY e.year DESC, e.id DESC LIMIT 1) AS career, \
               s.active \
             FROM students s \
             JOIN persons p ON p.id = s.person_id \
             WHERE (? IS NULL OR EXISTS (SELECT 1 FROM enrollments e WHERE e.student_id = s.id AND e.career_id = ?)) \
               AND (? IS NULL OR s.active = ?) \
             ORDER BY p.paternal_surname, p.maternal_surname, p.first_name, s.id"
        );

        let records = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(career_id)
            .bind(career_id)
            .bind(career_id)
            .bind(career_id)
            .bind(active)
            .bind(active)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(StudentRoster { career, records })
    }

    async fn enrollment_owner(&self, enrollment_id: i64) -> Result<Option<i64>, FetchError> {
        let owner = sqlx::query_scalar::<_, i64>("SELECT student_id FROM enrollments WHERE id = ?")
            .bind(enrollment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn grade_sheet(&self, enrollment_id: i64) -> Result<GradeSheet, FetchError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT s.id AS student_id, s.student_code, {FULL_NAME_SQL} AS student_name, p.document_number, \
               c.name AS career, e.year, e.period \
             FROM enrollments e \
             JOIN students s ON s.id = e.student_id \
             JOIN persons p ON p.id = s.person_id \
             JOIN careers c ON c.id = e.career_id \
             WHERE e.id = ?"
        );

        let header = sqlx::query_as::<_, SheetHeader>(&sql)
            .bind(enrollment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| FetchError::NotFound(format!("enrollment {enrollment_id}")))?;

        let lines = sqlx::query_as::<_, GradeLine>(
            "SELECT co.name AS course, g.first_partial, g.second_partial, g.third_partial, g.final_grade \
             FROM grades g \
             JOIN sections sc ON sc.id = g.section_id \
             JOIN courses co ON co.id = sc.course_id \
             WHERE g.enrollment_id = ? \
             ORDER BY co.name, g.id",
        )
        .bind(enrollment_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(GradeSheet {
            enrollment_id,
            student_id: header.student_id,
            student_code: header.student_code,
            student_name: header.student_name,
            document_number: header.document_number,
            career: header.career,
            year: header.year,
            period: header.period,
            lines,
        })
    }

    async fn instructors(&self) -> Result<Vec<InstructorRecord>, FetchError> {
        let sql = format!(
            "SELECT i.instructor_code AS code, {FULL_NAME_SQL} AS full_name, i.academic_degree AS degree, \
               (SELECT COUNT(1) FROM sections sc WHERE sc.instructor_id = i.id) AS assigned_courses \
             FROM instructors i \
             JOIN persons p ON p.id = i.person_id \
             WHERE i.active = 1 \
             ORDER BY p.paternal_surname, p.maternal_surname, p.first_name, i.id"
        );

        let rows = sqlx::query_as::<_, InstructorRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn careers(&self) -> Result<Vec<CareerRecord>, FetchError> {
        let rows = sqlx::query_as::<_, CareerRecord>(
            "SELECT c.code, c.name, c.kind, \
               (SELECT COUNT(DISTINCT e.student_id) FROM enrollments e WHERE e.career_id = c.id) AS students, \
               (SELECT COUNT(1) FROM courses co WHERE co.career_id = c.id AND co.active = 1) AS courses \
             FROM careers c \
             WHERE c.active = 1 \
             ORDER BY c.name, c.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn enrollments(&self, year: i32) -> Result<Vec<EnrollmentRecord>, FetchError> {
        let sql = format!(
            "SELECT {FULL_NAME_SQL} AS student_name, c.name AS career, e.period, e.status, e.enrolled_at AS enrolled_on \
             FROM enrollments e \
             JOIN students s ON s.id = e.student_id \
             JOIN persons p ON p.id = s.person_id \
             JOIN careers c ON c.id = e.career_id \
             WHERE e.year = ? \
             ORDER BY e.enrolled_at, e.id"
        );

        let rows = sqlx::query_as::<_, EnrollmentRecord>(&sql)
            .bind(year)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
