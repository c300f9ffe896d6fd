use crate::api::attendance::{
    SessionAttendanceResponse, StudentAttendanceResponse, SubmitAttendanceResponse,
};
use crate::auth::handlers::LoginResponse;
use crate::model::attendance::{
    AttendanceEntry, AttendanceRecord, AttendanceStatistics, AttendanceStatus, SubmitAttendance,
};
use crate::model::classroom::{Classroom, CreateClassroom, EnrollStudent};
use crate::model::enrollment::{Enrollment, EnrollmentStatus};
use crate::model::timetable::{TimetableSlot, UpsertSlot, Weekday};
use crate::model::user::{RosterEntry, UserProfile};
use crate::models::{LoginReqDto, RegisterReq};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ACE Campus API",
        version = "0.1.0",
        description = r#"
## ACE Campus

Backend for the ACE Campus student, teacher and admin dashboards.

### Key Features
- **Attendance**
  - Teachers submit or amend a class session's roster
  - Students view their attendance per classroom with present/late/absent statistics
- **Classrooms**
  - Create and rename classrooms, enroll and drop students
- **Timetable**
  - Weekly Monday to Saturday grid of hourly slots

### Security
All `/api/v1` endpoints need a **JWT Bearer** token from `/auth/login`.
Students only see classrooms they are actively enrolled in; teachers only
manage their own classrooms.

### Response Format
- JSON, camelCase field names
- Errors are `{"error": "..."}`
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::attendance::student_attendance,
        crate::api::attendance::submit_attendance,
        crate::api::attendance::session_attendance,

        crate::api::classroom::create_classroom,
        crate::api::classroom::list_classrooms,
        crate::api::classroom::get_classroom,
        crate::api::classroom::update_classroom,
        crate::api::classroom::list_students,
        crate::api::classroom::enroll_student,
        crate::api::classroom::drop_student,

        crate::api::timetable::get_timetable,
        crate::api::timetable::upsert_slot,
        crate::api::timetable::delete_slot
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            UserProfile,
            AttendanceStatus,
            AttendanceEntry,
            SubmitAttendance,
            SubmitAttendanceResponse,
            AttendanceRecord,
            AttendanceStatistics,
            StudentAttendanceResponse,
            SessionAttendanceResponse,
            Classroom,
            CreateClassroom,
            EnrollStudent,
            Enrollment,
            EnrollmentStatus,
            RosterEntry,
            Weekday,
            TimetableSlot,
            UpsertSlot
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Attendance", description = "Attendance recording and reporting"),
        (name = "Classroom", description = "Classrooms and enrollments"),
        (name = "Timetable", description = "Teacher timetables"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
