use crate::{
    auth::auth::AuthUser,
    db::is_duplicate_key,
    error::ApiError,
    model::{
        classroom::{Classroom, CreateClassroom, EnrollStudent, UPDATABLE_COLUMNS},
        enrollment::{Enrollment, EnrollmentRow, EnrollmentStatus, active_enrollment_for},
        role::Role,
        user::RosterEntry,
    },
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, web};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};

const CLASSROOM_COLUMNS: &str = "id, title, subject, teacher_id, teacher_name, created_at";

/// Active enrollments of a student, newest first, each with its classroom.
pub async fn fetch_active_enrollments(
    pool: &MySqlPool,
    student_id: u64,
) -> Result<Vec<Enrollment>, ApiError> {
    let rows = sqlx::query_as::<_, EnrollmentRow>(
        r#"
        SELECT
            e.id,
            e.student_id,
            e.classroom_id,
            e.status,
            e.enrolled_at,
            c.title,
            c.subject,
            c.teacher_id,
            c.teacher_name,
            c.created_at AS classroom_created_at
        FROM classroom_enrollments e
        JOIN classrooms c ON c.id = e.classroom_id
        WHERE e.student_id = ?
        AND e.status = ?
        ORDER BY e.enrolled_at DESC, e.id DESC
        "#,
    )
    .bind(student_id)
    .bind(EnrollmentStatus::Active.as_ref())
    .fetch_all(pool)
    .await
    .map_err(|e| {
        error!(error = %e, student_id, "Failed to fetch enrollments");
        ApiError::internal()
    })?;

    rows.into_iter()
        .map(Enrollment::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            error!(error = %e, student_id, "Stored enrollment status is invalid");
            ApiError::internal()
        })
}

pub async fn load_classroom(pool: &MySqlPool, classroom_id: u64) -> Result<Classroom, ApiError> {
    sqlx::query_as::<_, Classroom>(&format!(
        "SELECT {CLASSROOM_COLUMNS} FROM classrooms WHERE id = ?"
    ))
    .bind(classroom_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        error!(error = %e, classroom_id, "Failed to fetch classroom");
        ApiError::internal()
    })?
    .ok_or_else(|| ApiError::not_found("Classroom not found"))
}

fn require_non_blank(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::bad_request(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// Updatable classroom columns only take non-blank strings.
fn require_text_columns(body: &Value) -> Result<(), ApiError> {
    for column in UPDATABLE_COLUMNS {
        match body.get(*column) {
            None => {}
            Some(Value::String(value)) => require_non_blank(column, value)?,
            Some(_) => return Err(ApiError::bad_request(format!("{column} must be a string"))),
        }
    }
    Ok(())
}

/// Create a classroom owned by the calling teacher
#[utoipa::path(
    post,
    path = "/api/v1/classrooms",
    request_body = CreateClassroom,
    responses(
        (status = 201, description = "Classroom created", body = Classroom),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Teacher only"),
        (status = 409, description = "Title already used by this teacher")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn create_classroom(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateClassroom>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher()?;
    require_non_blank("title", &payload.title)?;
    require_non_blank("subject", &payload.subject)?;

    let result = sqlx::query(
        r#"
        INSERT INTO classrooms (title, subject, teacher_id, teacher_name)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(payload.title.trim())
    .bind(payload.subject.trim())
    .bind(auth.user_id)
    .bind(&auth.name)
    .execute(pool.get_ref())
    .await;

    let classroom_id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::Conflict(
                "You already have a classroom with this title".to_string(),
            ));
        }
        Err(e) => {
            error!(error = %e, teacher_id = auth.user_id, "Failed to create classroom");
            return Err(ApiError::internal());
        }
    };

    info!(classroom_id, teacher_id = auth.user_id, "Classroom created");
    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    Ok(HttpResponse::Created().json(classroom))
}

/// List classrooms visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/classrooms",
    responses(
        (status = 200, description = "Teachers get their own classrooms, admins all, students their enrolled ones", body = [Classroom]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn list_classrooms(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let classrooms = match auth.role {
        Role::Student => fetch_active_enrollments(pool.get_ref(), auth.user_id)
            .await?
            .into_iter()
            .map(|e| e.classroom)
            .collect(),
        Role::Teacher => sqlx::query_as::<_, Classroom>(&format!(
            "SELECT {CLASSROOM_COLUMNS} FROM classrooms WHERE teacher_id = ? ORDER BY title"
        ))
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, teacher_id = auth.user_id, "Failed to list classrooms");
            ApiError::internal()
        })?,
        Role::Admin => sqlx::query_as::<_, Classroom>(&format!(
            "SELECT {CLASSROOM_COLUMNS} FROM classrooms ORDER BY teacher_name, title"
        ))
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list classrooms");
            ApiError::internal()
        })?,
    };

    Ok(HttpResponse::Ok().json(json!({ "classrooms": classrooms })))
}

/// Classroom details
#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}",
    params(("classroom_id" = u64, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Classroom found", body = Classroom),
        (status = 403, description = "Not the owner and not enrolled"),
        (status = 404, description = "Classroom not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn get_classroom(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let classroom_id = path.into_inner();

    if auth.role == Role::Student {
        let enrollments = fetch_active_enrollments(pool.get_ref(), auth.user_id).await?;
        return match active_enrollment_for(&enrollments, classroom_id) {
            Some(enrollment) => Ok(HttpResponse::Ok().json(&enrollment.classroom)),
            None => Err(ApiError::forbidden("Student not enrolled in this classroom")),
        };
    }

    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;
    Ok(HttpResponse::Ok().json(classroom))
}

/// Rename a classroom or change its subject
#[utoipa::path(
    put,
    path = "/api/v1/classrooms/{classroom_id}",
    params(("classroom_id" = u64, Path, description = "Classroom ID")),
    request_body(content = Object, description = "Any of `title`, `subject`", example = json!({"title": "CSE-3B"})),
    responses(
        (status = 200, description = "Classroom updated", body = Classroom),
        (status = 400, description = "Unknown or blank field"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Classroom not found"),
        (status = 409, description = "Title already used by this teacher")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn update_classroom(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher_or_admin()?;
    let classroom_id = path.into_inner();

    let update = build_update_sql("classrooms", &body, UPDATABLE_COLUMNS, "id", classroom_id)?;
    require_text_columns(&body)?;
    let new_title = update.string_value("title", &body);

    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;

    let storage_error = |e: sqlx::Error| {
        error!(error = %e, classroom_id, "Failed to update classroom");
        ApiError::internal()
    };

    let mut tx = pool.begin().await.map_err(storage_error)?;

    match execute_update(&mut *tx, update).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::Conflict(
                "Teacher already has a classroom with this title".to_string(),
            ));
        }
        Err(e) => return Err(storage_error(e)),
    }

    // keep the denormalized class name on attendance in step with the title
    if let Some(title) = new_title.filter(|t| *t != classroom.title) {
        let moved = sqlx::query("UPDATE attendance_records SET class_name = ? WHERE classroom_id = ?")
            .bind(&title)
            .bind(classroom_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        info!(classroom_id, records = moved.rows_affected(), "Renamed class on attendance records");
    }

    tx.commit().await.map_err(storage_error)?;

    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    Ok(HttpResponse::Ok().json(classroom))
}

/// Students enrolled in a classroom
#[utoipa::path(
    get,
    path = "/api/v1/classrooms/{classroom_id}/students",
    params(("classroom_id" = u64, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Roster, active students first", body = [RosterEntry]),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Classroom not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn list_students(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher_or_admin()?;
    let classroom_id = path.into_inner();

    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;

    let roster = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT u.id AS student_id, u.name, u.email, e.status, e.enrolled_at
        FROM classroom_enrollments e
        JOIN users u ON u.id = e.student_id
        WHERE e.classroom_id = ?
        ORDER BY e.status = 'active' DESC, u.name
        "#,
    )
    .bind(classroom_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, classroom_id, "Failed to fetch roster");
        ApiError::internal()
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "classroom": classroom,
        "students": roster,
    })))
}

/// Enroll a student (re-activates a dropped enrollment)
#[utoipa::path(
    post,
    path = "/api/v1/classrooms/{classroom_id}/students",
    params(("classroom_id" = u64, Path, description = "Classroom ID")),
    request_body = EnrollStudent,
    responses(
        (status = 200, description = "Student enrolled", body = Object, example = json!({"message": "Student enrolled"})),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Classroom or student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn enroll_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<EnrollStudent>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher_or_admin()?;
    let classroom_id = path.into_inner();
    let student_id = payload.student_id;

    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;

    let is_student = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE id = ? AND role_id = ? AND is_active = TRUE",
    )
    .bind(student_id)
    .bind(Role::Student.id())
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, student_id, "Failed to look up student");
        ApiError::internal()
    })?;

    if is_student == 0 {
        return Err(ApiError::not_found("Student not found"));
    }

    sqlx::query(
        r#"
        INSERT INTO classroom_enrollments (classroom_id, student_id, status)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE status = VALUES(status)
        "#,
    )
    .bind(classroom_id)
    .bind(student_id)
    .bind(EnrollmentStatus::Active.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, classroom_id, student_id, "Failed to enroll student");
        ApiError::internal()
    })?;

    info!(classroom_id, student_id, "Student enrolled");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Student enrolled",
        "classroomId": classroom_id,
        "studentId": student_id,
    })))
}

/// Drop a student from a classroom; their attendance history is kept
#[utoipa::path(
    delete,
    path = "/api/v1/classrooms/{classroom_id}/students/{student_id}",
    params(
        ("classroom_id" = u64, Path, description = "Classroom ID"),
        ("student_id" = u64, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student dropped", body = Object, example = json!({"message": "Student dropped"})),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Classroom"
)]
pub async fn drop_student(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher_or_admin()?;
    let (classroom_id, student_id) = path.into_inner();

    let classroom = load_classroom(pool.get_ref(), classroom_id).await?;
    auth.require_classroom_owner(classroom.teacher_id)?;

    let result = sqlx::query(
        r#"
        UPDATE classroom_enrollments
        SET status = ?
        WHERE classroom_id = ?
        AND student_id = ?
        AND status = ?
        "#,
    )
    .bind(EnrollmentStatus::Dropped.as_ref())
    .bind(classroom_id)
    .bind(student_id)
    .bind(EnrollmentStatus::Active.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, classroom_id, student_id, "Failed to drop student");
        ApiError::internal()
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Active enrollment not found"));
    }

    info!(classroom_id, student_id, "Student dropped");
    Ok(HttpResponse::Ok().json(json!({ "message": "Student dropped" })))
}

#[cfg(test)]
mod tests {
    use super::require_text_columns;
    use crate::api::attendance::tests::{app, bearer, error_of};
    use crate::error::ApiError;
    use crate::model::role::Role;
    use actix_web::http::StatusCode;
    use actix_web::test::{TestRequest, call_service};
    use serde_json::json;

    #[actix_web::test]
    async fn students_cannot_create_classrooms() {
        let app = app!();
        let req = TestRequest::post()
            .uri("/api/v1/classrooms")
            .insert_header(bearer(1, Role::Student))
            .set_json(json!({ "title": "CSE-3A", "subject": "Operating Systems" }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn blank_title_is_bad_request() {
        let app = app!();
        let req = TestRequest::post()
            .uri("/api/v1/classrooms")
            .insert_header(bearer(4, Role::Teacher))
            .set_json(json!({ "title": "   ", "subject": "Operating Systems" }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(resp).await, "title must not be empty");
    }

    #[actix_web::test]
    async fn update_refuses_columns_outside_whitelist() {
        let app = app!();
        let req = TestRequest::put()
            .uri("/api/v1/classrooms/7")
            .insert_header(bearer(4, Role::Teacher))
            .set_json(json!({ "teacher_id": 5 }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(resp).await, "Field 'teacher_id' cannot be updated");
    }

    #[actix_web::test]
    async fn students_cannot_manage_rosters() {
        let app = app!();
        let req = TestRequest::delete()
            .uri("/api/v1/classrooms/7/students/1")
            .insert_header(bearer(1, Role::Student))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn text_columns_must_be_strings() {
        assert!(require_text_columns(&json!({ "title": "CSE-3B" })).is_ok());
        assert!(require_text_columns(&json!({ "subject": "Compilers" })).is_ok());
        assert_eq!(
            require_text_columns(&json!({ "title": 2024 })),
            Err(ApiError::bad_request("title must be a string"))
        );
        assert!(require_text_columns(&json!({ "subject": true })).is_err());
        assert!(require_text_columns(&json!({ "title": " " })).is_err());
    }

    #[actix_web::test]
    async fn numeric_title_is_bad_request() {
        let app = app!();
        let req = TestRequest::put()
            .uri("/api/v1/classrooms/7")
            .insert_header(bearer(4, Role::Teacher))
            .set_json(json!({ "title": 2024 }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(resp).await, "title must be a string");
    }
}
