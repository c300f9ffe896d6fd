use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "CSE-3A")]
    pub title: String,
    #[schema(example = "Operating Systems")]
    pub subject: String,
    #[schema(example = 4)]
    pub teacher_id: u64,
    #[schema(example = "R. Sharma")]
    pub teacher_name: String,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateClassroom {
    #[schema(example = "CSE-3A")]
    pub title: String,
    #[schema(example = "Operating Systems")]
    pub subject: String,
}

/// Columns a classroom update may touch.
pub const UPDATABLE_COLUMNS: &[&str] = &["title", "subject"];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollStudent {
    #[schema(example = 12)]
    pub student_id: u64,
}
