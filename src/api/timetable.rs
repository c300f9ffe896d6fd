use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        role::Role,
        timetable::{BREAK_SLOTS, TIME_SLOTS, TimetableSlot, UpsertSlot, sort_grid},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TimetableQuery {
    /// Defaults to the calling teacher
    pub teacher_id: Option<u64>,
}

/// Resolves whose timetable is requested; only teachers have a default.
fn target_teacher(auth: &AuthUser, requested: Option<u64>) -> Result<u64, ApiError> {
    match (requested, auth.role) {
        (Some(id), _) => Ok(id),
        (None, Role::Teacher) => Ok(auth.user_id),
        (None, _) => Err(ApiError::bad_request("teacherId is required")),
    }
}

/// Weekly timetable of a teacher
#[utoipa::path(
    get,
    path = "/api/v1/timetable",
    params(TimetableQuery),
    responses(
        (status = 200, description = "Entries ordered by weekday then slot", body = Object, example = json!({
            "teacherId": 4,
            "timeSlots": ["08:00 - 09:00", "09:00 - 10:00"],
            "breakSlots": ["12:00 - 01:00"],
            "entries": []
        })),
        (status = 400, description = "teacherId is required")
    ),
    security(("bearer_auth" = [])),
    tag = "Timetable"
)]
pub async fn get_timetable(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimetableQuery>,
) -> Result<HttpResponse, ApiError> {
    let teacher_id = target_teacher(&auth, query.teacher_id)?;

    let mut entries = sqlx::query_as::<_, TimetableSlot>(
        r#"
        SELECT id, teacher_id, day, time_slot, subject_name, class_name, updated_at
        FROM timetable_slots
        WHERE teacher_id = ?
        "#,
    )
    .bind(teacher_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, teacher_id, "Failed to fetch timetable");
        ApiError::internal()
    })?;

    sort_grid(&mut entries);

    Ok(HttpResponse::Ok().json(json!({
        "teacherId": teacher_id,
        "timeSlots": TIME_SLOTS,
        "breakSlots": BREAK_SLOTS,
        "entries": entries,
    })))
}

/// Create or replace the entry of one (day, slot) cell
#[utoipa::path(
    put,
    path = "/api/v1/timetable",
    request_body = UpsertSlot,
    responses(
        (status = 200, description = "Slot saved", body = Object, example = json!({"message": "Timetable slot saved"})),
        (status = 400, description = "Unknown day or slot, or the break slot"),
        (status = 403, description = "Teacher only")
    ),
    security(("bearer_auth" = [])),
    tag = "Timetable"
)]
pub async fn upsert_slot(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpsertSlot>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher()?;
    let day = payload.validate()?;

    sqlx::query(
        r#"
        INSERT INTO timetable_slots (teacher_id, day, time_slot, subject_name, class_name)
        VALUES (?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            subject_name = VALUES(subject_name),
            class_name = VALUES(class_name)
        "#,
    )
    .bind(auth.user_id)
    .bind(day.as_ref())
    .bind(payload.time_slot.trim())
    .bind(payload.subject_name.trim())
    .bind(payload.class_name.trim())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, teacher_id = auth.user_id, "Failed to save timetable slot");
        ApiError::internal()
    })?;

    info!(teacher_id = auth.user_id, %day, slot = payload.time_slot.trim(), "Timetable slot saved");
    Ok(HttpResponse::Ok().json(json!({ "message": "Timetable slot saved" })))
}

/// Remove one of the caller's timetable entries
#[utoipa::path(
    delete,
    path = "/api/v1/timetable/{slot_id}",
    params(("slot_id" = u64, Path, description = "Timetable entry ID")),
    responses(
        (status = 200, description = "Slot removed"),
        (status = 403, description = "Teacher only"),
        (status = 404, description = "Slot not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Timetable"
)]
pub async fn delete_slot(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_teacher()?;
    let slot_id = path.into_inner();

    let result = sqlx::query("DELETE FROM timetable_slots WHERE id = ? AND teacher_id = ?")
        .bind(slot_id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, slot_id, "Failed to delete timetable slot");
            ApiError::internal()
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Timetable slot not found"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Timetable slot removed" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::tests::user;

    #[test]
    fn teachers_default_to_their_own_grid() {
        assert_eq!(target_teacher(&user(4, Role::Teacher), None), Ok(4));
        assert_eq!(target_teacher(&user(4, Role::Teacher), Some(9)), Ok(9));
    }

    #[test]
    fn others_must_name_a_teacher() {
        assert!(target_teacher(&user(1, Role::Student), None).is_err());
        assert_eq!(target_teacher(&user(1, Role::Student), Some(4)), Ok(4));
        assert!(target_teacher(&user(2, Role::Admin), None).is_err());
    }
}
