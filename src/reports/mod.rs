//! Report pipeline: authorize, fetch, aggregate, compose, render, write.
//!
//! Each invocation walks the stages of [`ReportStage`] strictly in order
//! and shares nothing with concurrent invocations apart from the output
//! directory, where unique file names keep artifacts apart.

pub mod aggregate;
pub mod artifact;
pub mod compose;
pub mod config;
pub mod document;
pub mod pdf;
pub mod source;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime};

use crate::authz::{authorize, permissions, AuthzError, Principal};

pub use config::{Institution, ReportConfig};
pub use pdf::RenderError;
pub use source::{FetchError, ReportData, ReportSource, SqliteReportSource};

use compose::ReportContext;
use pdf::InstitutionTemplate;

const FETCH_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Students,
    Grades,
    Instructors,
    Careers,
    Enrollments,
}

impl ReportKind {
    /// Spanish slug used in file names.
    pub fn slug(self) -> &'static str {
        match self {
            ReportKind::Students => "estudiantes",
            ReportKind::Grades => "notas",
            ReportKind::Instructors => "docentes",
            ReportKind::Careers => "carreras",
            ReportKind::Enrollments => "inscripciones",
        }
    }

    pub fn permission(self) -> &'static str {
        match self {
            ReportKind::Students => permissions::VIEW_STUDENTS,
            ReportKind::Grades => permissions::VIEW_GRADES,
            ReportKind::Instructors => permissions::VIEW_INSTRUCTORS,
            ReportKind::Careers => permissions::VIEW_CAREERS,
            ReportKind::Enrollments => permissions::VIEW_ENROLLMENTS,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "students" | "estudiantes" => Ok(ReportKind::Students),
            "grades" | "notas" => Ok(ReportKind::Grades),
            "instructors" | "docentes" => Ok(ReportKind::Instructors),
            "careers" | "carreras" => Ok(ReportKind::Careers),
            "enrollments" | "inscripciones" => Ok(ReportKind::Enrollments),
            other => Err(format!("unknown report kind: {other}")),
        }
    }
}

/// Filter criteria. Each kind reads only the fields it understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilters {
    /// Students enrolled in this career
    pub career_id: Option<i64>,
    pub active: Option<bool>,
    /// Management year; enrollment reports default to the current year
    pub year: Option<i32>,
    pub enrollment_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub filters: ReportFilters,
}

impl ReportRequest {
    pub fn new(kind: ReportKind, filters: ReportFilters) -> Self {
        Self { kind, filters }
    }
}

/// A finished artifact on disk plus the name offered to the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub kind: ReportKind,
    pub path: PathBuf,
    pub suggested_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStage {
    Requested,
    Authorized,
    Fetched,
    Aggregated,
    Composed,
    Written,
    Delivered,
}

impl fmt::Display for ReportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportStage::Requested => "requested",
            ReportStage::Authorized => "authorized",
            ReportStage::Fetched => "fetched",
            ReportStage::Aggregated => "aggregated",
            ReportStage::Composed => "composed",
            ReportStage::Written => "written",
            ReportStage::Delivered => "delivered",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one invocation. `stage` is the last stage reached.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Authz(#[from] AuthzError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid report request: {0}")]
    InvalidRequest(String),
    #[error("fetch failed after stage {stage}")]
    FetchFailed {
        stage: ReportStage,
        #[source]
        source: FetchError,
    },
    #[error("render failed after stage {stage}")]
    RenderFailed {
        stage: ReportStage,
        #[source]
        source: RenderError,
    },
    #[error("write failed after stage {stage}")]
    WriteFailed {
        stage: ReportStage,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    fn fetch(stage: ReportStage, err: FetchError) -> Self {
        match err {
            FetchError::NotFound(what) => ReportError::NotFound(what),
            other => ReportError::FetchFailed { stage, source: other },
        }
    }
}

fn enter(kind: ReportKind, stage: ReportStage) {
    tracing::debug!(report = %kind, stage = %stage, "report stage reached");
}

/// Runs the whole pipeline for one request and returns the written artifact.
pub async fn generate_report(
    source: &dyn ReportSource,
    config: &ReportConfig,
    request: &ReportRequest,
    requester: Option<&Principal>,
) -> Result<ArtifactHandle, ReportError> {
    generate_report_at(source, config, request, requester, Local::now().naive_local()).await
}

/// Same as [`generate_report`] with an explicit generation time.
pub async fn generate_report_at(
    source: &dyn ReportSource,
    config: &ReportConfig,
    request: &ReportRequest,
    requester: Option<&Principal>,
    generated_at: NaiveDateTime,
) -> Result<ArtifactHandle, ReportError> {
    let kind = request.kind;
    enter(kind, ReportStage::Requested);

    let principal = authorize_request(source, request, requester).await?;
    validate_request(request)?;
    enter(kind, ReportStage::Authorized);

    let data = fetch_with_retry(source, request, generated_at).await?;
    enter(kind, ReportStage::Fetched);

    let summary = aggregate::summarize(&data);
    enter(kind, ReportStage::Aggregated);

    let context = ReportContext::for_principal(principal, generated_at);
    let document = compose::compose(&data, &summary, &context);
    enter(kind, ReportStage::Composed);

    let logo = config.load_logo().await;
    let template = InstitutionTemplate {
        institution: &config.institution,
        logo,
    };
    let bytes = pdf::render(&document, &template).map_err(|source| {
        tracing::warn!(report = %kind, error = %source, "report rendering failed");
        ReportError::RenderFailed {
            stage: ReportStage::Composed,
            source,
        }
    })?;

    let file_name = artifact::artifact_file_name(kind.slug(), generated_at);
    let path = artifact::persist(&config.output_dir, &file_name, &bytes)
        .await
        .map_err(|source| {
            tracing::warn!(report = %kind, error = %source, "report could not be written");
            ReportError::WriteFailed {
                stage: ReportStage::Composed,
                source,
            }
        })?;
    enter(kind, ReportStage::Written);

    let handle = ArtifactHandle {
        kind,
        suggested_name: suggested_name(&data, generated_at),
        path,
    };

    tracing::info!(
        report = %kind,
        user = %principal.username,
        records = data.record_count(),
        path = %handle.path.display(),
        "report generated"
    );
    enter(kind, ReportStage::Delivered);

    Ok(handle)
}

/// Grade certificates are also open to the student the enrollment belongs to.
async fn authorize_request<'p>(
    source: &dyn ReportSource,
    request: &ReportRequest,
    requester: Option<&'p Principal>,
) -> Result<&'p Principal, ReportError> {
    let denied = match authorize(requester, request.kind.permission()) {
        Ok(()) => None,
        Err(err) => Some(err),
    };

    let principal = requester.ok_or(AuthzError::Unauthorized)?;
    let Some(denied) = denied else {
        return Ok(principal);
    };

    if let (ReportKind::Grades, Some(student_id), Some(enrollment_id)) =
        (request.kind, principal.student_id, request.filters.enrollment_id)
    {
        let owner = source
            .enrollment_owner(enrollment_id)
            .await
            .map_err(|err| ReportError::fetch(ReportStage::Requested, err))?;
        if owner == Some(student_id) {
            return Ok(principal);
        }
    }

    Err(denied.into())
}

async fn fetch_with_retry(
    source: &dyn ReportSource,
    request: &ReportRequest,
    now: NaiveDateTime,
) -> Result<ReportData, ReportError> {
    match fetch(source, request, now).await {
        Err(err) if err.is_transient() => {
            tracing::warn!(report = %request.kind, error = %err, "transient fetch failure, retrying once");
            tokio::time::sleep(FETCH_RETRY_DELAY).await;
            fetch(source, request, now).await
        }
        other => other,
    }
    .map_err(|err| ReportError::fetch(ReportStage::Authorized, err))
}

async fn fetch(source: &dyn ReportSource, request: &ReportRequest, now: NaiveDateTime) -> Result<ReportData, FetchError> {
    let filters = &request.filters;
    let data = match request.kind {
        ReportKind::Students => {
            let roster = source.student_roster(filters.career_id, filters.active).await?;
            ReportData::Students {
                records: roster.records,
                career: roster.career,
                active: filters.active,
            }
        }
        ReportKind::Grades => {
            let enrollment_id = filters
                .enrollment_id
                .ok_or_else(|| FetchError::NotFound("enrollment".to_string()))?;
            ReportData::Grades(source.grade_sheet(enrollment_id).await?)
        }
        ReportKind::Instructors => ReportData::Instructors(source.instructors().await?),
        ReportKind::Careers => ReportData::Careers(source.careers().await?),
        ReportKind::Enrollments => {
            let year = filters.year.unwrap_or_else(|| now.year());
            ReportData::Enrollments {
                year,
                records: source.enrollments(year).await?,
            }
        }
    };
    Ok(data)
}

/// Download name offered to the caller, distinct from the storage name.
pub fn suggested_name(data: &ReportData, generated_at: NaiveDateTime) -> String {
    let day = generated_at.format("%Y%m%d");
    match data {
        ReportData::Students { .. } => format!("reporte_estudiantes_{day}.pdf"),
        ReportData::Grades(sheet) => {
            let code = sheet
                .student_code
                .clone()
                .unwrap_or_else(|| sheet.enrollment_id.to_string());
            format!("certificado_notas_{code}.pdf")
        }
        ReportData::Instructors(_) => format!("reporte_docentes_{day}.pdf"),
        ReportData::Careers(_) => format!("reporte_carreras_{day}.pdf"),
        ReportData::Enrollments { year, .. } => format!("reporte_inscripciones_{year}.pdf"),
    }
}

/// Validates kind-specific requirements before the pipeline runs.
pub fn validate_request(request: &ReportRequest) -> Result<(), ReportError> {
    if request.kind == ReportKind::Grades && request.filters.enrollment_id.is_none() {
        return Err(ReportError::InvalidRequest(
            "grade certificates need an enrollment id".to_string(),
        ));
    }
    if let Some(year) = request.filters.year {
        if !(1900..=9999).contains(&year) {
            return Err(ReportError::InvalidRequest(format!("year {year} is out of range")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::RoleGrant;
    use crate::reports::source::{
        CareerRecord, EnrollmentRecord, GradeSheet, InstructorRecord, StudentRecord, StudentRoster,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        students: Vec<StudentRecord>,
        transient_failures: AtomicUsize,
        calls: AtomicUsize,
        owner: Option<i64>,
    }

    #[async_trait]
    impl ReportSource for FakeSource {
        async fn student_roster(&self, career_id: Option<i64>, _active: Option<bool>) -> Result<StudentRoster, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.transient_failures.load(Ordering::SeqCst) > 0 {
                self.transient_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(FetchError::Transient(sqlx::Error::PoolTimedOut));
            }
            let career = match career_id {
                Some(1) => Some("Contaduría".to_string()),
                Some(id) => return Err(FetchError::NotFound(format!("career {id}"))),
                None => None,
            };
            Ok(StudentRoster {
                career,
                records: self.students.clone(),
            })
        }

        async fn enrollment_owner(&self, _enrollment_id: i64) -> Result<Option<i64>, FetchError> {
            Ok(self.owner)
        }

        async fn grade_sheet(&self, enrollment_id: i64) -> Result<GradeSheet, FetchError> {
            Ok(GradeSheet {
                enrollment_id,
                student_id: self.owner.unwrap_or_default(),
                student_code: Some("EST-009".to_string()),
                ..GradeSheet::default()
            })
        }

        async fn instructors(&self) -> Result<Vec<InstructorRecord>, FetchError> {
            Ok(Vec::new())
        }

        async fn careers(&self) -> Result<Vec<CareerRecord>, FetchError> {
            Ok(Vec::new())
        }

        async fn enrollments(&self, _year: i32) -> Result<Vec<EnrollmentRecord>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn secretary() -> Principal {
        Principal::new(2, "secretaria").with_role(
            RoleGrant::new(2, "Secretaria").with_permissions([permissions::VIEW_STUDENTS]),
        )
    }

    #[tokio::test]
    async fn anonymous_requests_fail_before_fetching() {
        let source = FakeSource::default();
        let dir = tempfile::tempdir().unwrap();
        let request = ReportRequest::new(ReportKind::Students, ReportFilters::default());

        let err = generate_report(&source, &ReportConfig::new(dir.path()), &request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Authz(AuthzError::Unauthorized)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_permission_is_forbidden() {
        let source = FakeSource::default();
        let dir = tempfile::tempdir().unwrap();
        let request = ReportRequest::new(ReportKind::Careers, ReportFilters::default());

        let err = generate_report(&source, &ReportConfig::new(dir.path()), &request, Some(&secretary()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Authz(AuthzError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn transient_fetch_failure_is_retried_once() {
        let source = FakeSource {
            transient_failures: AtomicUsize::new(1),
            ..FakeSource::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let request = ReportRequest::new(ReportKind::Students, ReportFilters::default());

        let handle = generate_report_at(&source, &ReportConfig::new(dir.path()), &request, Some(&secretary()), now())
            .await
            .unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.suggested_name, "reporte_estudiantes_20250301.pdf");
        assert!(handle.path.exists());
    }

    #[tokio::test]
    async fn repeated_transient_failure_gives_up() {
        let source = FakeSource {
            transient_failures: AtomicUsize::new(2),
            ..FakeSource::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let request = ReportRequest::new(ReportKind::Students, ReportFilters::default());

        let err = generate_report(&source, &ReportConfig::new(dir.path()), &request, Some(&secretary()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::FetchFailed {
                stage: ReportStage::Authorized,
                ..
            }
        ));
        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn unknown_career_filter_is_not_found() {
        let source = FakeSource::default();
        let dir = tempfile::tempdir().unwrap();
        let request = ReportRequest::new(
            ReportKind::Students,
            ReportFilters {
                career_id: Some(99),
                ..ReportFilters::default()
            },
        );

        let err = generate_report(&source, &ReportConfig::new(dir.path()), &request, Some(&secretary()))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotFound(_)));
    }

    #[tokio::test]
    async fn students_may_download_their_own_certificate() {
        let source = FakeSource {
            owner: Some(9),
            ..FakeSource::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig::new(dir.path());
        let request = ReportRequest::new(
            ReportKind::Grades,
            ReportFilters {
                enrollment_id: Some(4),
                ..ReportFilters::default()
            },
        );

        let owner = Principal::new(9, "est9").with_student(9);
        let handle = generate_report(&source, &config, &request, Some(&owner)).await.unwrap();
        assert_eq!(handle.suggested_name, "certificado_notas_EST-009.pdf");

        let stranger = Principal::new(10, "est10").with_student(10);
        let err = generate_report(&source, &config, &request, Some(&stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Authz(AuthzError::Forbidden { .. })));
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        let err = ReportError::fetch(ReportStage::Authorized, FetchError::NotFound("enrollment 3".into()));
        assert_eq!(err.to_string(), "enrollment 3 not found");
    }

    #[test]
    fn kinds_parse_in_both_languages() {
        assert_eq!("students".parse::<ReportKind>(), Ok(ReportKind::Students));
        assert_eq!("Inscripciones".parse::<ReportKind>(), Ok(ReportKind::Enrollments));
        assert!("dashboard".parse::<ReportKind>().is_err());
    }

    #[test]
    fn grade_requests_need_an_enrollment() {
        let request = ReportRequest::new(ReportKind::Grades, ReportFilters::default());
        assert!(matches!(validate_request(&request), Err(ReportError::InvalidRequest(_))));
    }
}
