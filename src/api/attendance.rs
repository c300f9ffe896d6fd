use crate::{
    api::classroom::{fetch_active_enrollments, load_classroom},
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        attendance::{
            AttendanceRecord, AttendanceRow, AttendanceStatistics, DateRange, SubmitAttendance,
            amendment_counts, parse_date, unenrolled_students, validate_submission,
        },
        classroom::Classroom,
        enrollment::{Enrollment, EnrollmentStatus, active_enrollment_for},
        role::Role,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::collections::HashSet;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const RECORD_COLUMNS: &str = "id, classroom_id, teacher_id, student_id, class_name, subject_name, \
                              attendance_date, status, time_slot, remarks, created_at, updated_at";

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StudentAttendanceQuery {
    /// Student whose attendance is requested (required)
    pub student_id: Option<u64>,
    /// Classroom to report on; omit to list enrollments only
    pub classroom_id: Option<u64>,
    /// Inclusive lower bound, YYYY-MM-DD
    pub start_date: Option<String>,
    /// Inclusive upper bound, YYYY-MM-DD
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceResponse {
    pub success: bool,
    pub attendance_records: Vec<AttendanceRecord>,
    pub enrollments: Vec<Enrollment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<AttendanceStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom: Option<Classroom>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Select a classroom to view attendance")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SessionQuery {
    pub classroom_id: u64,
    /// Session day, YYYY-MM-DD
    pub date: String,
    /// Defaults to the classroom subject
    pub subject_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionAttendanceResponse {
    pub classroom: Classroom,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub subject_name: String,
    pub attendance_records: Vec<AttendanceRecord>,
    pub statistics: AttendanceStatistics,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttendanceResponse {
    #[schema(example = "Attendance saved")]
    pub message: String,
    pub classroom_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub subject_name: String,
    pub created: usize,
    pub updated: usize,
}

/// Students may only look at their own attendance.
fn authorize_student_view(auth: &AuthUser, student_id: u64) -> Result<(), ApiError> {
    if auth.role == Role::Student && auth.user_id != student_id {
        return Err(ApiError::forbidden("Students may only view their own attendance"));
    }
    Ok(())
}

/// Only classrooms among the student's active enrollments may be viewed.
pub fn authorize_classroom(enrollments: &[Enrollment], classroom_id: u64) -> Result<&Enrollment, ApiError> {
    active_enrollment_for(enrollments, classroom_id)
        .ok_or_else(|| ApiError::forbidden("Student not enrolled in this classroom"))
}

fn into_records(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>, ApiError> {
    rows.into_iter()
        .map(AttendanceRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            error!(error = %e, "Stored attendance status is invalid");
            ApiError::internal()
        })
}

/// Records of one student in one classroom, newest first; each date bound is
/// inclusive and applies only when present.
fn student_records_query(
    student_id: u64,
    classroom_id: u64,
    range: DateRange,
) -> QueryBuilder<'static, MySql> {
    let mut query: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM attendance_records WHERE student_id = "));
    query.push_bind(student_id);
    query.push(" AND classroom_id = ");
    query.push_bind(classroom_id);

    if let Some(start) = range.start {
        query.push(" AND attendance_date >= ");
        query.push_bind(start);
    }
    if let Some(end) = range.end {
        query.push(" AND attendance_date <= ");
        query.push_bind(end);
    }

    query.push(" ORDER BY attendance_date DESC, created_at DESC, id DESC");
    query
}

async fn fetch_student_records(
    pool: &MySqlPool,
    student_id: u64,
    classroom_id: u64,
    range: DateRange,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let rows = student_records_query(student_id, classroom_id, range)
        .build_query_as::<AttendanceRow>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            error!(error = %e, student_id, classroom_id, "Error fetching student attendance");
            ApiError::Internal("Failed to fetch attendance data".to_string())
        })?;

    into_records(rows)
}

/// Without a selected classroom only the enrollments are returned, with a hint.
fn student_view(
    enrollments: Vec<Enrollment>,
    selected: Option<(Classroom, Vec<AttendanceRecord>)>,
) -> StudentAttendanceResponse {
    match selected {
        None => StudentAttendanceResponse {
            success: true,
            attendance_records: Vec::new(),
            enrollments,
            statistics: None,
            classroom: None,
            message: Some("Select a classroom to view attendance".to_string()),
        },
        Some((classroom, records)) => StudentAttendanceResponse {
            success: true,
            statistics: Some(AttendanceStatistics::from_records(&records)),
            attendance_records: records,
            enrollments,
            classroom: Some(classroom),
            message: None,
        },
    }
}

/// A student's attendance in one classroom, with statistics
#[utoipa::path(
    get,
    path = "/api/v1/attendance/student",
    params(StudentAttendanceQuery),
    responses(
        (status = 200, description = "Attendance records and statistics", body = StudentAttendanceResponse),
        (status = 400, description = "Student ID is required, or a date is malformed", body = Object, example = json!({
            "error": "Student ID is required"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Student not enrolled in this classroom", body = Object, example = json!({
            "error": "Student not enrolled in this classroom"
        })),
        (status = 500, description = "Failed to fetch attendance data")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn student_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StudentAttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let student_id = query
        .student_id
        .ok_or_else(|| ApiError::bad_request("Student ID is required"))?;
    authorize_student_view(&auth, student_id)?;
    let range = DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;

    let enrollments = fetch_active_enrollments(pool.get_ref(), student_id).await?;

    let Some(classroom_id) = query.classroom_id else {
        return Ok(HttpResponse::Ok().json(student_view(enrollments, None)));
    };

    let classroom = authorize_classroom(&enrollments, classroom_id)?.classroom.clone();
    if auth.role == Role::Teacher {
        auth.require_classroom_owner(classroom.teacher_id)?;
    }

    let records = fetch_student_records(pool.get_ref(), student_id, classroom_id, range).await?;

    Ok(HttpResponse::Ok().json(student_view(enrollments, Some((classroom, records)))))
}

/// Submit (or amend) attendance for one class session
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    request_body = SubmitAttendance,
    responses(
        (status = 200, description = "Attendance saved; existing records for the session are overwritten", body = SubmitAttendanceResponse),
        (status = 400, description = "Invalid roster or date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the classroom's teacher"),
        (status = 404, description = "Classroom not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn submit_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitAttendance>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher_or_admin()?;
    if auth.role == Role::Teacher && payload.teacher_id.is_some_and(|id| id != auth.user_id) {
        return Err(ApiError::forbidden("teacherId does not match the signed-in teacher"));
    }
    let date = validate_submission(&payload)?;

    let classroom = load_classroom(pool.get_ref(), payload.classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;

    if let Some(class_name) = &payload.class_name {
        if class_name.trim() != classroom.title {
            return Err(ApiError::bad_request("className does not match the classroom"));
        }
    }

    let subject_name = payload
        .subject_name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&classroom.subject)
        .to_string();
    let classroom_id = classroom.id;

    let enrolled: HashSet<u64> = sqlx::query_scalar::<_, u64>(
        "SELECT student_id FROM classroom_enrollments WHERE classroom_id = ? AND status = ?",
    )
    .bind(classroom_id)
    .bind(EnrollmentStatus::Active.as_ref())
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, classroom_id, "Failed to load enrolled students");
        ApiError::internal()
    })?
    .into_iter()
    .collect();

    let outsiders = unenrolled_students(&payload.entries, &enrolled);
    if !outsiders.is_empty() {
        let ids: Vec<String> = outsiders.iter().map(u64::to_string).collect();
        return Err(ApiError::bad_request(format!(
            "Students not enrolled in this classroom: {}",
            ids.join(", ")
        )));
    }

    let time_slot = payload
        .time_slot
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut upsert: QueryBuilder<MySql> = QueryBuilder::new(
        "INSERT INTO attendance_records \
         (classroom_id, teacher_id, student_id, class_name, subject_name, attendance_date, status, time_slot, remarks) ",
    );
    upsert.push_values(&payload.entries, |mut row, entry| {
        row.push_bind(classroom_id)
            .push_bind(classroom.teacher_id)
            .push_bind(entry.student_id)
            .push_bind(&classroom.title)
            .push_bind(&subject_name)
            .push_bind(date)
            .push_bind(entry.status.as_ref())
            .push_bind(time_slot)
            .push_bind(entry.remarks.as_deref().map(str::trim).filter(|r| !r.is_empty()));
    });
    upsert.push(
        " ON DUPLICATE KEY UPDATE \
         status = VALUES(status), \
         time_slot = VALUES(time_slot), \
         remarks = VALUES(remarks), \
         classroom_id = VALUES(classroom_id), \
         updated_at = CURRENT_TIMESTAMP(3)",
    );

    let done = upsert.build().execute(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, classroom_id, %date, "Failed to save attendance");
        ApiError::internal()
    })?;

    let (created, updated) = amendment_counts(payload.entries.len(), done.rows_affected());
    info!(
        classroom_id,
        teacher_id = classroom.teacher_id,
        %date,
        subject = %subject_name,
        created,
        updated,
        "Attendance saved"
    );

    Ok(HttpResponse::Ok().json(SubmitAttendanceResponse {
        message: "Attendance saved".to_string(),
        classroom_id,
        date,
        subject_name,
        created,
        updated,
    }))
}

/// Records of one class session, for the owning teacher
#[utoipa::path(
    get,
    path = "/api/v1/attendance/session",
    params(SessionQuery),
    responses(
        (status = 200, description = "Records of the session", body = SessionAttendanceResponse),
        (status = 400, description = "Malformed date"),
        (status = 403, description = "Not the classroom's teacher"),
        (status = 404, description = "Classroom not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn session_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SessionQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher_or_admin()?;
    let date = parse_date("date", &query.date)?;

    let classroom = load_classroom(pool.get_ref(), query.classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;

    let subject_name = query
        .subject_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&classroom.subject)
        .to_string();

    let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM attendance_records
        WHERE classroom_id = ?
        AND attendance_date = ?
        AND subject_name = ?
        ORDER BY student_id
        "#
    ))
    .bind(classroom.id)
    .bind(date)
    .bind(&subject_name)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, classroom_id = classroom.id, %date, "Failed to fetch session attendance");
        ApiError::internal()
    })?;

    let records = into_records(rows)?;
    let statistics = AttendanceStatistics::from_records(&records);

    Ok(HttpResponse::Ok().json(SessionAttendanceResponse {
        classroom,
        date,
        subject_name,
        attendance_records: records,
        statistics,
    }))
}
