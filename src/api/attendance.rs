use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::ServiceError;
use crate::geo::Coordinates;
use crate::model::attendance::{AttendanceStatus, ClassAttendance, StaffAttendance};
use crate::service::attendance::{self, GeofencePolicy};

fn policy(config: &Config) -> GeofencePolicy {
    GeofencePolicy {
        radius_m: config.geofence_radius_m,
        allow_unfenced: config.allow_unfenced_clock_in,
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ClockInRequest {
    #[schema(example = 9.0010)]
    pub latitude: Option<f64>,
    #[schema(example = 38.7000)]
    pub longitude: Option<f64>,
}

/// Geofenced clock-in for the calling teacher.
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 200, description = "Clocked in"),
        (status = 403, description = "Outside the branch geofence"),
        (status = 409, description = "Already clocked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    clock: web::Data<dyn Clock>,
    config: web::Data<Config>,
    body: web::Json<ClockInRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_teacher()?;

    let claimed = match (body.latitude, body.longitude) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
        _ => None,
    };

    attendance::clock_in(
        pool.get_ref(),
        clock.get_ref(),
        policy(&config),
        auth.user_id,
        claimed,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Clocked In Successfully!"
    })))
}

/// Clock-out for the calling teacher.
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out"),
        (status = 409, description = "Not clocked in, or already clocked out")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    clock: web::Data<dyn Clock>,
) -> actix_web::Result<HttpResponse> {
    auth.require_teacher()?;

    attendance::clock_out(pool.get_ref(), clock.get_ref(), auth.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Clocked Out. Good job!"
    })))
}

/// Clears an accidental clock-out so the shift keeps running.
#[utoipa::path(
    put,
    path = "/api/attendance/{id}/resume",
    params(("id", description = "Attendance record ID")),
    responses(
        (status = 200, description = "Check-out cleared"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn resume(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    attendance::resume(pool.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Shift resumed"
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct CorrectTimesRequest {
    #[schema(example = "08:30")]
    pub check_in: String,
    #[schema(example = "17:00")]
    pub check_out: Option<String>,
}

/// Administrative correction of a record's times, anchored to its date.
#[utoipa::path(
    put,
    path = "/api/attendance/{id}/times",
    request_body = CorrectTimesRequest,
    params(("id", description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance log updated"),
        (status = 400, description = "Bad time format or check-out before check-in"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn correct_times(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<CorrectTimesRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    attendance::correct_times(
        pool.get_ref(),
        path.into_inner(),
        &body.check_in,
        body.check_out.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Attendance Log Updated"
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct ManualAttendanceRequest {
    pub user_id: i64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub check_in: String,
    #[schema(example = "17:00")]
    pub check_out: Option<String>,
}

/// Backfills an attendance record for a past date.
#[utoipa::path(
    post,
    path = "/api/attendance/manual",
    request_body = ManualAttendanceRequest,
    responses(
        (status = 200, description = "Attendance added"),
        (status = 409, description = "Record already exists for that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn manual_add(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<ManualAttendanceRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    attendance::manual_add(
        pool.get_ref(),
        body.user_id,
        body.date,
        &body.check_in,
        body.check_out.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Attendance Added Manually"
    })))
}

#[derive(Deserialize, IntoParams)]
pub struct StaffAttendanceFilter {
    pub user_id: Option<i64>,
    #[param(value_type = Option<String>, example = "2026-03-02")]
    pub date: Option<NaiveDate>,
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(StaffAttendanceFilter),
    responses((status = 200, body = Vec<StaffAttendance>)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_staff(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<StaffAttendanceFilter>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, StaffAttendance>(
        r#"
        SELECT id, user_id, date, status, check_in, check_out
        FROM staff_attendance
        WHERE (? IS NULL OR user_id = ?) AND (? IS NULL OR date = ?)
        ORDER BY date DESC, user_id
        "#,
    )
    .bind(query.user_id)
    .bind(query.user_id)
    .bind(query.date)
    .bind(query.date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Deserialize, IntoParams)]
pub struct SheetQuery {
    #[param(value_type = String, example = "2026-03-02")]
    pub date: NaiveDate,
}

/// Returns the saved class sheet for one day.
#[utoipa::path(
    get,
    path = "/api/attendance/sheet",
    params(SheetQuery),
    responses((status = 200, body = Vec<ClassAttendance>)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn sheet_for_date(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<SheetQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, ClassAttendance>(
        r#"
        SELECT id, enrollment_id, date, status, recorded_by
        FROM class_attendance
        WHERE date = ?
        ORDER BY enrollment_id
        "#,
    )
    .bind(query.date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Deserialize, ToSchema)]
pub struct SheetEntry {
    pub enrollment_id: i64,
    pub status: AttendanceStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct SheetRequest {
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub entries: Vec<SheetEntry>,
}

/// Saves a full day's class attendance sheet in one transaction.
#[utoipa::path(
    post,
    path = "/api/attendance/sheet",
    request_body = SheetRequest,
    responses((status = 200, description = "Attendance saved")),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn submit_sheet(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<SheetRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let entries: Vec<(i64, AttendanceStatus)> = body
        .entries
        .iter()
        .map(|e| (e.enrollment_id, e.status))
        .collect();

    attendance::submit_sheet(pool.get_ref(), body.date, &entries, &auth.email).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Attendance Saved"
    })))
}
