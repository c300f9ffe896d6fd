use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: u64,
    pub classroom_id: u64,
    pub teacher_id: u64,
    pub student_id: u64,
    pub class_name: String,
    pub subject_name: String,
    pub attendance_date: NaiveDate,
    pub status: String,
    pub time_slot: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub classroom_id: u64,
    pub teacher_id: u64,
    pub student_id: u64,
    #[schema(example = "CSE-3A")]
    pub class_name: String,
    #[schema(example = "Operating Systems")]
    pub subject_name: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(example = "09:00 - 10:00")]
    pub time_slot: Option<String>,
    pub remarks: Option<String>,
    #[schema(example = "2026-01-01T09:05:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(example = "2026-01-01T09:05:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = strum::ParseError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            classroom_id: row.classroom_id,
            teacher_id: row.teacher_id,
            student_id: row.student_id,
            class_name: row.class_name,
            subject_name: row.subject_name,
            date: row.attendance_date,
            status: row.status.parse()?,
            time_slot: row.time_slot,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Summary derived from raw records on every request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatistics {
    #[schema(example = 10)]
    pub total_classes: u32,
    #[schema(example = 7)]
    pub present_count: u32,
    #[schema(example = 2)]
    pub late_count: u32,
    #[schema(example = 1)]
    pub absent_count: u32,
    #[schema(example = 70)]
    pub attendance_percentage: u32,
}

impl AttendanceStatistics {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut stats = Self::default();
        for status in statuses {
            stats.total_classes += 1;
            match status {
                AttendanceStatus::Present => stats.present_count += 1,
                AttendanceStatus::Late => stats.late_count += 1,
                AttendanceStatus::Absent => stats.absent_count += 1,
            }
        }
        stats.attendance_percentage = attendance_percentage(stats.present_count, stats.total_classes);
        stats
    }

    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        Self::from_statuses(records.iter().map(|r| r.status))
    }
}

/// `round(present / total * 100)` with halves rounded up; 0 for an empty set.
pub fn attendance_percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (present, total) = (u64::from(present), u64::from(total));
    ((present * 200 + total) / (total * 2)) as u32
}

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::bad_request(format!("{field} must be a date in YYYY-MM-DD format")))
}

/// Inclusive date filter; either bound may be open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Blank parameters count as absent.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ApiError> {
        let bound = |field: &str, raw: Option<&str>| -> Result<Option<NaiveDate>, ApiError> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => parse_date(field, s).map(Some),
                None => Ok(None),
            }
        };

        let range = Self {
            start: bound("startDate", start)?,
            end: bound("endDate", end)?,
        };

        if let (Some(s), Some(e)) = (range.start, range.end) {
            if s > e {
                return Err(ApiError::bad_request("startDate cannot be after endDate"));
            }
        }

        Ok(range)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    #[schema(example = 12)]
    pub student_id: u64,
    pub status: AttendanceStatus,
    #[schema(example = "Arrived after roll call")]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttendance {
    #[schema(example = 7)]
    pub classroom_id: u64,
    /// Must match the caller when present.
    #[schema(example = 4)]
    pub teacher_id: Option<u64>,
    #[schema(example = "2026-01-01", format = "date")]
    pub date: String,
    /// Must match the classroom title when present.
    #[schema(example = "CSE-3A")]
    pub class_name: Option<String>,
    /// Defaults to the classroom subject.
    #[schema(example = "Operating Systems")]
    pub subject_name: Option<String>,
    #[schema(example = "09:00 - 10:00")]
    pub time_slot: Option<String>,
    pub entries: Vec<AttendanceEntry>,
}

/// Checks that need no storage access: date format, non-empty roster and
/// one entry per student.
pub fn validate_submission(payload: &SubmitAttendance) -> Result<NaiveDate, ApiError> {
    let date = parse_date("date", &payload.date)?;

    if payload.entries.is_empty() {
        return Err(ApiError::bad_request("At least one attendance entry is required"));
    }

    let mut seen = HashSet::with_capacity(payload.entries.len());
    for entry in &payload.entries {
        if !seen.insert(entry.student_id) {
            return Err(ApiError::bad_request(format!(
                "Student {} appears more than once",
                entry.student_id
            )));
        }
    }

    if let Some(subject) = &payload.subject_name {
        if subject.trim().is_empty() {
            return Err(ApiError::bad_request("subjectName must not be blank"));
        }
    }

    Ok(date)
}

/// Student ids in the roster that are not actively enrolled, in roster order.
pub fn unenrolled_students(entries: &[AttendanceEntry], enrolled: &HashSet<u64>) -> Vec<u64> {
    entries
        .iter()
        .map(|e| e.student_id)
        .filter(|id| !enrolled.contains(id))
        .collect()
}

/// Splits an upsert of `submitted` rows into (created, updated) counts.
///
/// MySQL reports 1 affected row per insert and 2 per row changed through
/// `ON DUPLICATE KEY UPDATE`; every update bumps `updated_at`, so no row
/// is ever reported unchanged.
pub fn amendment_counts(submitted: usize, rows_affected: u64) -> (usize, usize) {
    let extra = usize::try_from(rows_affected).unwrap_or(usize::MAX);
    let updated = extra.saturating_sub(submitted).min(submitted);
    (submitted - updated, updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn record(id: u64, date: &str, status: AttendanceStatus) -> AttendanceRecord {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        AttendanceRecord {
            id,
            classroom_id: 1,
            teacher_id: 2,
            student_id: 3,
            class_name: "C1".to_string(),
            subject_name: "Physics".to_string(),
            date: d(date),
            status,
            time_slot: None,
            remarks: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn entry(student_id: u64, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id,
            status,
            remarks: None,
        }
    }

    fn submission(date: &str, entries: Vec<AttendanceEntry>) -> SubmitAttendance {
        SubmitAttendance {
            classroom_id: 1,
            teacher_id: None,
            date: date.to_string(),
            class_name: None,
            subject_name: None,
            time_slot: None,
            entries,
        }
    }

    #[test]
    fn seven_present_two_late_one_absent() {
        use AttendanceStatus::*;
        let mut statuses = vec![Present; 7];
        statuses.extend([Late, Late, Absent]);

        let stats = AttendanceStatistics::from_statuses(statuses);
        assert_eq!(
            stats,
            AttendanceStatistics {
                total_classes: 10,
                present_count: 7,
                late_count: 2,
                absent_count: 1,
                attendance_percentage: 70,
            }
        );
    }

    #[test]
    fn empty_set_has_zero_percentage() {
        let stats = AttendanceStatistics::from_records(&[]);
        assert_eq!(stats, AttendanceStatistics::default());
    }

    #[test]
    fn counts_partition_total() {
        use AttendanceStatus::*;
        let records: Vec<_> = [Present, Late, Absent, Absent, Present, Late, Late]
            .into_iter()
            .enumerate()
            .map(|(i, s)| record(i as u64, "2026-02-01", s))
            .collect();

        let stats = AttendanceStatistics::from_records(&records);
        assert_eq!(
            stats.present_count + stats.late_count + stats.absent_count,
            stats.total_classes
        );
        assert_eq!(stats.total_classes, 7);
    }

    #[test]
    fn percentage_rounds_to_nearest_integer() {
        assert_eq!(attendance_percentage(3, 4), 75);
        assert_eq!(attendance_percentage(2, 3), 67);
        assert_eq!(attendance_percentage(1, 3), 33);
        assert_eq!(attendance_percentage(1, 8), 13);
        assert_eq!(attendance_percentage(0, 5), 0);
        assert_eq!(attendance_percentage(5, 5), 100);
        assert_eq!(attendance_percentage(0, 0), 0);
    }

    #[test]
    fn late_does_not_count_as_present() {
        use AttendanceStatus::*;
        let stats = AttendanceStatistics::from_statuses([Late, Late, Present, Present]);
        assert_eq!(stats.attendance_percentage, 50);
    }

    #[test]
    fn stored_status_must_be_known() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let row = AttendanceRow {
            id: 1,
            classroom_id: 1,
            teacher_id: 2,
            student_id: 3,
            class_name: "C1".to_string(),
            subject_name: "Physics".to_string(),
            attendance_date: d("2026-01-01"),
            status: "excused".to_string(),
            time_slot: None,
            remarks: None,
            created_at: at,
            updated_at: at,
        };
        assert!(AttendanceRecord::try_from(row).is_err());
    }

    #[test]
    fn date_range_parses_both_bounds() {
        let range = DateRange::parse(Some("2026-03-01"), Some(" 2026-03-31 ")).unwrap();
        assert_eq!(range.start, Some(d("2026-03-01")));
        assert_eq!(range.end, Some(d("2026-03-31")));

        let single_day = DateRange::parse(Some("2026-03-05"), Some("2026-03-05")).unwrap();
        assert_eq!(single_day.start, single_day.end);
    }

    #[test]
    fn date_range_bounds_are_independent() {
        let from = DateRange::parse(Some("2026-03-01"), None).unwrap();
        assert_eq!(from.start, Some(d("2026-03-01")));
        assert_eq!(from.end, None);

        let open = DateRange::parse(Some(""), Some("  ")).unwrap();
        assert_eq!(open, DateRange::default());
    }

    #[test]
    fn date_range_rejects_bad_input() {
        assert!(matches!(
            DateRange::parse(Some("2026-13-01"), None),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            DateRange::parse(Some("2026-03-02"), Some("2026-03-01")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn submission_requires_entries_and_valid_date() {
        use AttendanceStatus::*;
        assert!(validate_submission(&submission("2026-01-10", vec![])).is_err());
        assert!(validate_submission(&submission("10/01/2026", vec![entry(1, Present)])).is_err());
        assert_eq!(
            validate_submission(&submission("2026-01-10", vec![entry(1, Present)])).unwrap(),
            d("2026-01-10")
        );
    }

    #[test]
    fn submission_rejects_duplicate_students() {
        use AttendanceStatus::*;
        let payload = submission("2026-01-10", vec![entry(1, Present), entry(2, Late), entry(1, Absent)]);
        assert_eq!(
            validate_submission(&payload),
            Err(ApiError::bad_request("Student 1 appears more than once"))
        );
    }

    #[test]
    fn submission_rejects_blank_subject() {
        use AttendanceStatus::*;
        let mut payload = submission("2026-01-10", vec![entry(1, Present)]);
        payload.subject_name = Some("   ".to_string());
        assert!(validate_submission(&payload).is_err());
    }

    #[test]
    fn unenrolled_students_keep_roster_order() {
        use AttendanceStatus::*;
        let entries = vec![entry(5, Present), entry(1, Present), entry(9, Absent), entry(2, Late)];
        let enrolled: HashSet<u64> = [1, 2].into_iter().collect();
        assert_eq!(unenrolled_students(&entries, &enrolled), vec![5, 9]);
    }

    #[test]
    fn resubmission_counts_come_from_affected_rows() {
        // three fresh rows
        assert_eq!(amendment_counts(3, 3), (3, 0));
        // one insert, two rows overwritten
        assert_eq!(amendment_counts(3, 5), (1, 2));
        // whole roster resubmitted
        assert_eq!(amendment_counts(3, 6), (0, 3));
    }

    #[test]
    fn affected_row_counts_out_of_range_are_clamped() {
        assert_eq!(amendment_counts(3, 0), (3, 0));
        assert_eq!(amendment_counts(3, 99), (0, 3));
    }

    #[test]
    fn status_wire_format_is_lowercase() {
        let json = serde_json::to_string(&AttendanceStatus::Late).unwrap();
        assert_eq!(json, "\"late\"");
        assert_eq!(AttendanceStatus::Present.as_ref(), "present");
        assert_eq!("absent".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Absent));
    }
}
