use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Teaching days, in display order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display, AsRefStr, EnumIter,
    ToSchema,
)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

/// Hourly slots of the teaching day, in display order.
pub const TIME_SLOTS: &[&str] = &[
    "08:00 - 09:00",
    "09:00 - 10:00",
    "10:00 - 11:00",
    "11:00 - 12:00",
    "12:00 - 01:00",
    "01:00 - 02:00",
    "02:00 - 03:00",
    "03:00 - 04:00",
];

pub const BREAK_SLOTS: &[&str] = &["12:00 - 01:00"];

pub fn slot_index(slot: &str) -> Option<usize> {
    TIME_SLOTS.iter().position(|s| *s == slot)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub id: u64,
    pub teacher_id: u64,
    #[schema(example = "Monday")]
    pub day: String,
    #[schema(example = "09:00 - 10:00")]
    pub time_slot: String,
    #[schema(example = "Operating Systems")]
    pub subject_name: String,
    #[schema(example = "CSE-3A")]
    pub class_name: String,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSlot {
    #[schema(example = "Monday")]
    pub day: String,
    #[schema(example = "09:00 - 10:00")]
    pub time_slot: String,
    #[schema(example = "Operating Systems")]
    pub subject_name: String,
    #[schema(example = "CSE-3A")]
    pub class_name: String,
}

impl UpsertSlot {
    pub fn validate(&self) -> Result<Weekday, ApiError> {
        let day = Weekday::from_str(self.day.trim())
            .map_err(|_| ApiError::bad_request("day must be one of Monday..Saturday"))?;

        let slot = self.time_slot.trim();
        if slot_index(slot).is_none() {
            return Err(ApiError::bad_request(format!(
                "timeSlot must be one of: {}",
                TIME_SLOTS.join(", ")
            )));
        }
        if BREAK_SLOTS.contains(&slot) {
            return Err(ApiError::bad_request("Cannot schedule a class during the break"));
        }

        if self.subject_name.trim().is_empty() || self.class_name.trim().is_empty() {
            return Err(ApiError::bad_request("subjectName and className are required"));
        }

        Ok(day)
    }
}

/// Orders entries by weekday then slot; unknown values sort last.
pub fn sort_grid(slots: &mut [TimetableSlot]) {
    slots.sort_by_key(|s| {
        (
            Weekday::from_str(&s.day).map(|d| d as usize).unwrap_or(usize::MAX),
            slot_index(&s.time_slot).unwrap_or(usize::MAX),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    fn upsert(day: &str, slot: &str) -> UpsertSlot {
        UpsertSlot {
            day: day.to_string(),
            time_slot: slot.to_string(),
            subject_name: "Networks".to_string(),
            class_name: "CSE-2B".to_string(),
        }
    }

    fn slot(id: u64, day: &str, time_slot: &str) -> TimetableSlot {
        TimetableSlot {
            id,
            teacher_id: 4,
            day: day.to_string(),
            time_slot: time_slot.to_string(),
            subject_name: "Networks".to_string(),
            class_name: "CSE-2B".to_string(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn six_teaching_days() {
        let days: Vec<String> = Weekday::iter().map(|d| d.to_string()).collect();
        assert_eq!(days.first().map(String::as_str), Some("Monday"));
        assert_eq!(days.last().map(String::as_str), Some("Saturday"));
        assert_eq!(days.len(), 6);
    }

    #[test]
    fn accepts_regular_slot() {
        assert_eq!(upsert("Wednesday", "10:00 - 11:00").validate(), Ok(Weekday::Wednesday));
    }

    #[test]
    fn rejects_sunday_break_and_unknown_slot() {
        assert!(upsert("Sunday", "10:00 - 11:00").validate().is_err());
        assert_eq!(
            upsert("Monday", "12:00 - 01:00").validate(),
            Err(ApiError::bad_request("Cannot schedule a class during the break"))
        );
        assert!(upsert("Monday", "10:30 - 11:30").validate().is_err());
    }

    #[test]
    fn rejects_blank_subject() {
        let mut payload = upsert("Monday", "08:00 - 09:00");
        payload.subject_name = " ".to_string();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn grid_sorts_by_day_then_slot() {
        let mut grid = vec![
            slot(1, "Friday", "08:00 - 09:00"),
            slot(2, "Monday", "03:00 - 04:00"),
            slot(3, "Monday", "08:00 - 09:00"),
            slot(4, "Tuesday", "01:00 - 02:00"),
        ];
        sort_grid(&mut grid);
        let ids: Vec<u64> = grid.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }
}
