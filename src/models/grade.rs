use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::reports::aggregate::{self, GradeOutcome};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Grade {
    pub id: i64,
    pub enrollment_id: i64,
    pub section_id: i64,
    pub first_partial: Option<f64>,
    pub second_partial: Option<f64>,
    pub third_partial: Option<f64>,
    pub final_grade: Option<f64>,
    pub average: Option<f64>,
    pub remarks: Option<String>,
    /// Abierto, Cerrado or Revisado
    pub status: String,
    pub outcome: GradeOutcome,
    pub recorded_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbGrade {
    pub id: i64,
    pub enrollment_id: i64,
    pub section_id: i64,
    pub first_partial: Option<f64>,
    pub second_partial: Option<f64>,
    pub third_partial: Option<f64>,
    pub final_grade: Option<f64>,
    pub average: Option<f64>,
    pub remarks: Option<String>,
    pub status: String,
    pub recorded_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const GRADE_COLUMNS: &str = "id, enrollment_id, section_id, first_partial, second_partial, third_partial, final_grade, average, remarks, status, recorded_at, updated_at";

impl From<DbGrade> for Grade {
    fn from(db: DbGrade) -> Self {
        Grade {
            id: db.id,
            enrollment_id: db.enrollment_id,
            section_id: db.section_id,
            first_partial: db.first_partial,
            second_partial: db.second_partial,
            third_partial: db.third_partial,
            final_grade: db.final_grade,
            average: db.average,
            remarks: db.remarks,
            status: db.status,
            outcome: aggregate::classify(db.final_grade),
            recorded_at: db.recorded_at,
            updated_at: db.updated_at,
        }
    }
}

/// Partial scores plus an optional explicit final, checked and resolved
/// into the stored `average` and `final_grade`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradeScores {
    pub partials: [Option<f64>; 3],
    pub explicit_final: Option<f64>,
}

impl GradeScores {
    pub fn new(partials: [Option<f64>; 3], explicit_final: Option<f64>) -> Self {
        Self {
            partials,
            explicit_final,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let labelled = [
            ("first_partial", self.partials[0]),
            ("second_partial", self.partials[1]),
            ("third_partial", self.partials[2]),
            ("final_grade", self.explicit_final),
        ];

        for (field, value) in labelled {
            if let Some(score) = value {
                if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
                    return Err(AppError::bad_request(format!(
                        "{field} must be between {MIN_SCORE} and {MAX_SCORE}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn average(&self) -> Option<f64> {
        aggregate::average(&self.partials)
    }

    pub fn final_grade(&self) -> Option<f64> {
        aggregate::final_grade(self.explicit_final, &self.partials)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GradeCreateRequest {
    pub enrollment_id: i64,
    pub section_id: i64,
    #[schema(example = 70.0)]
    pub first_partial: Option<f64>,
    pub second_partial: Option<f64>,
    pub third_partial: Option<f64>,
    /// Taken as-is when present, otherwise the partials' average
    pub final_grade: Option<f64>,
    pub remarks: Option<String>,
    pub status: Option<String>,
}

impl GradeCreateRequest {
    pub fn scores(&self) -> GradeScores {
        GradeScores::new(
            [self.first_partial, self.second_partial, self.third_partial],
            self.final_grade,
        )
    }
}

/// Omitted partials keep their stored value. The final grade is recomputed
/// from the average when a partial changes, unless given explicitly; an
/// update touching no score keeps the stored final.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GradeUpdateRequest {
    pub section_id: Option<i64>,
    pub first_partial: Option<f64>,
    pub second_partial: Option<f64>,
    pub third_partial: Option<f64>,
    pub final_grade: Option<f64>,
    pub remarks: Option<String>,
    pub status: Option<String>,
}

impl GradeUpdateRequest {
    pub fn merged_scores(&self, current: &DbGrade) -> GradeScores {
        let partials = [
            self.first_partial.or(current.first_partial),
            self.second_partial.or(current.second_partial),
            self.third_partial.or(current.third_partial),
        ];
        let explicit_final = if self.touches_partials() {
            self.final_grade
        } else {
            self.final_grade.or(current.final_grade)
        };
        GradeScores::new(partials, explicit_final)
    }

    fn touches_partials(&self) -> bool {
        [self.first_partial, self.second_partial, self.third_partial]
            .iter()
            .any(Option::is_some)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct GradeListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub enrollment_id: Option<i64>,
    pub section_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_defaults_to_partial_average() {
        let scores = GradeScores::new([Some(60.0), Some(70.0), None], None);
        assert_eq!(scores.average(), Some(65.0));
        assert_eq!(scores.final_grade(), Some(65.0));
    }

    #[test]
    fn explicit_final_wins() {
        let scores = GradeScores::new([Some(30.0), Some(40.0), Some(50.0)], Some(55.0));
        assert_eq!(scores.average(), Some(40.0));
        assert_eq!(scores.final_grade(), Some(55.0));
    }

    #[test]
    fn nothing_recorded_stays_empty() {
        let scores = GradeScores::default();
        assert_eq!(scores.average(), None);
        assert_eq!(scores.final_grade(), None);
        assert!(scores.validate().is_ok());
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        assert!(GradeScores::new([Some(101.0), None, None], None).validate().is_err());
        assert!(GradeScores::new([None, Some(-1.0), None], None).validate().is_err());
        assert!(GradeScores::new([None, None, None], Some(f64::NAN)).validate().is_err());
        assert!(GradeScores::new([Some(0.0), Some(100.0), None], Some(100.0)).validate().is_ok());
    }

    #[test]
    fn update_keeps_stored_partials() {
        let current = DbGrade {
            id: 1,
            enrollment_id: 1,
            section_id: 1,
            first_partial: Some(40.0),
            second_partial: Some(60.0),
            third_partial: None,
            final_grade: Some(50.0),
            average: Some(50.0),
            remarks: None,
            status: "Abierto".into(),
            recorded_at: Utc::now(),
            updated_at: None,
        };
        let update = GradeUpdateRequest {
            third_partial: Some(80.0),
            ..GradeUpdateRequest::default()
        };

        let scores = update.merged_scores(&current);
        assert_eq!(scores.final_grade(), Some(60.0));
        assert_eq!(aggregate::classify(scores.final_grade()), GradeOutcome::Approved);
    }

    #[test]
    fn update_without_scores_keeps_hand_entered_final() {
        let current = DbGrade {
            id: 2,
            enrollment_id: 1,
            section_id: 1,
            first_partial: Some(40.0),
            second_partial: Some(40.0),
            third_partial: None,
            final_grade: Some(60.0),
            average: Some(40.0),
            remarks: None,
            status: "Abierto".into(),
            recorded_at: Utc::now(),
            updated_at: None,
        };
        let update = GradeUpdateRequest {
            remarks: Some("revisado".into()),
            ..GradeUpdateRequest::default()
        };

        let scores = update.merged_scores(&current);
        assert_eq!(scores.average(), Some(40.0));
        assert_eq!(scores.final_grade(), Some(60.0));
    }
}
