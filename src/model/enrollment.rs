use crate::model::classroom::Classroom;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Dropped,
}

/// Enrollment joined with its classroom, as read from storage.
#[derive(Debug, sqlx::FromRow)]
pub struct EnrollmentRow {
    pub id: u64,
    pub student_id: u64,
    pub classroom_id: u64,
    pub status: String,
    pub enrolled_at: DateTime<Utc>,
    pub title: String,
    pub subject: String,
    pub teacher_id: u64,
    pub teacher_name: String,
    pub classroom_created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: u64,
    pub student_id: u64,
    pub classroom_id: u64,
    pub status: EnrollmentStatus,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub enrolled_at: DateTime<Utc>,
    pub classroom: Classroom,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = strum::ParseError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            student_id: row.student_id,
            classroom_id: row.classroom_id,
            status: row.status.parse()?,
            enrolled_at: row.enrolled_at,
            classroom: Classroom {
                id: row.classroom_id,
                title: row.title,
                subject: row.subject,
                teacher_id: row.teacher_id,
                teacher_name: row.teacher_name,
                created_at: row.classroom_created_at,
            },
        })
    }
}

/// Returns the active enrollment for `classroom_id`, if the student has one.
pub fn active_enrollment_for(enrollments: &[Enrollment], classroom_id: u64) -> Option<&Enrollment> {
    enrollments
        .iter()
        .find(|e| e.classroom_id == classroom_id && e.status == EnrollmentStatus::Active)
}
