//! Summary statistics computed over a fetched report snapshot.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::source::{GradeSheet, ReportData};

/// Lowest final grade (0-100 scale) that counts as a pass.
pub const PASSING_GRADE: f64 = 51.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GradeOutcome {
    Approved,
    Failed,
    Pending,
}

impl GradeOutcome {
    pub fn label(self) -> &'static str {
        match self {
            GradeOutcome::Approved => "Aprobado",
            GradeOutcome::Failed => "Reprobado",
            GradeOutcome::Pending => "Pendiente",
        }
    }
}

/// Mean of the partials that are present; `None` when none are.
pub fn average(partials: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = partials.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// An explicit final grade wins, otherwise the partial average stands in.
pub fn final_grade(explicit: Option<f64>, partials: &[Option<f64>]) -> Option<f64> {
    explicit.or_else(|| average(partials))
}

pub fn classify(final_grade: Option<f64>) -> GradeOutcome {
    match final_grade {
        Some(grade) if grade >= PASSING_GRADE => GradeOutcome::Approved,
        Some(_) => GradeOutcome::Failed,
        None => GradeOutcome::Pending,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

impl ActivityCounts {
    pub fn tally(flags: impl IntoIterator<Item = bool>) -> Self {
        flags.into_iter().fold(Self::default(), |mut acc, active| {
            acc.total += 1;
            if active {
                acc.active += 1;
            } else {
                acc.inactive += 1;
            }
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeResult {
    pub final_grade: Option<f64>,
    pub outcome: GradeOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradeSummary {
    pub lines: Vec<GradeResult>,
    pub approved: usize,
    pub failed: usize,
    pub pending: usize,
    /// Mean of the graded finals. Pending lines do not participate.
    pub general_average: Option<f64>,
}

impl GradeSummary {
    pub fn total(&self) -> usize {
        self.lines.len()
    }
}

pub fn summarize_grades(sheet: &GradeSheet) -> GradeSummary {
    let mut summary = GradeSummary::default();
    let mut graded = Vec::new();

    for line in &sheet.lines {
        let final_grade = final_grade(line.final_grade, &line.partials());
        let outcome = classify(final_grade);
        match outcome {
            GradeOutcome::Approved => summary.approved += 1,
            GradeOutcome::Failed => summary.failed += 1,
            GradeOutcome::Pending => summary.pending += 1,
        }
        if let Some(grade) = final_grade {
            graded.push(Some(grade));
        }
        summary.lines.push(GradeResult { final_grade, outcome });
    }

    summary.general_average = average(&graded);
    summary
}

/// Canonical display order for enrollment statuses.
pub const ENROLLMENT_STATUSES: [&str; 4] = ["Preinscrito", "Matriculado", "Rechazado", "Anulado"];

/// Per-status counts in canonical order; unknown statuses follow alphabetically.
/// Statuses with no enrollment are omitted.
pub fn count_by_status<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts = std::collections::BTreeMap::<&str, usize>::new();
    for status in statuses {
        *counts.entry(status).or_default() += 1;
    }

    let mut ordered: Vec<(String, usize)> = ENROLLMENT_STATUSES
        .iter()
        .filter_map(|status| counts.remove(status).map(|n| (status.to_string(), n)))
        .collect();
    ordered.extend(counts.into_iter().map(|(status, n)| (status.to_string(), n)));
    ordered
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportSummary {
    Students(ActivityCounts),
    Grades(GradeSummary),
    Instructors { active: usize },
    Careers { careers: usize, students: i64 },
    Enrollments { by_status: Vec<(String, usize)>, total: usize },
}

/// Computes the aggregates for one snapshot. Pure, so two runs over the
/// same data always agree.
pub fn summarize(data: &ReportData) -> ReportSummary {
    match data {
        ReportData::Students { records, .. } => {
            ReportSummary::Students(ActivityCounts::tally(records.iter().map(|r| r.active)))
        }
        ReportData::Grades(sheet) => ReportSummary::Grades(summarize_grades(sheet)),
        ReportData::Instructors(records) => ReportSummary::Instructors {
            active: records.len(),
        },
        ReportData::Careers(records) => ReportSummary::Careers {
            careers: records.len(),
            students: records.iter().map(|c| c.students).sum(),
        },
        ReportData::Enrollments { records, .. } => ReportSummary::Enrollments {
            by_status: count_by_status(records.iter().map(|r| r.status.as_str())),
            total: records.len(),
        },
    }
}
