use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role_id: u8,
    pub is_active: bool,
}

/// Public view of an account, never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = "Asha Verma")]
    pub name: String,
    #[schema(example = "asha@ace.edu", format = "email")]
    pub email: String,
    #[schema(example = "student")]
    pub role: String,
    #[schema(example = "AV")]
    pub avatar_initials: String,
}

impl UserProfile {
    pub fn new(id: u64, name: &str, email: &str, role: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            avatar_initials: initials(name),
        }
    }
}

/// First letter of the first two words, upper-cased.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

/// A student as listed on a classroom roster.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: u64,
    pub name: String,
    pub email: String,
    #[schema(example = "active")]
    pub status: String,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub enrolled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initials_use_first_two_words() {
        assert_eq!(initials("asha verma"), "AV");
        assert_eq!(initials("  Ravi  "), "R");
        assert_eq!(initials("Mary Jane Watson"), "MJ");
        assert_eq!(initials(""), "");
    }
}
