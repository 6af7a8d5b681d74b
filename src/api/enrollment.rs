use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ServiceError;
use crate::model::enrollment::Enrollment;
use crate::service::enrollment;

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub student_id: i64,
    pub course_id: i64,
    pub shift_id: i64,
    pub pricing_plan_id: i64,
    #[schema(example = json!(["mon", "wed", "fri"]))]
    pub days: Vec<String>,
}

/// Enrolls a student; the selected weekday count must match the plan.
#[utoipa::path(
    post,
    path = "/api/enrollments",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Student enrolled"),
        (status = 400, description = "Day selection does not match the plan"),
        (status = 409, description = "Already enrolled in this course and shift")
    ),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn create(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<EnrollRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let id = enrollment::enroll(
        pool.get_ref(),
        body.student_id,
        body.course_id,
        body.shift_id,
        body.pricing_plan_id,
        &body.days,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "id": id,
        "message": "Student Enrolled Successfully!"
    })))
}

#[derive(Deserialize, IntoParams)]
pub struct EnrollmentFilter {
    pub student_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/enrollments",
    params(EnrollmentFilter),
    responses((status = 200, body = Vec<Enrollment>)),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<EnrollmentFilter>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, student_id, course_id, shift_id, pricing_plan_id,
               selected_days, is_active
        FROM enrollments
        WHERE (? IS NULL OR student_id = ?)
        ORDER BY id
        "#,
    )
    .bind(query.student_id)
    .bind(query.student_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateEnrollmentRequest {
    pub pricing_plan_id: i64,
    #[schema(example = json!(["tue", "thu"]))]
    pub days: Vec<String>,
}

#[utoipa::path(
    put,
    path = "/api/enrollments/{id}",
    request_body = UpdateEnrollmentRequest,
    params(("id", description = "Enrollment ID")),
    responses(
        (status = 200, description = "Enrollment updated"),
        (status = 400, description = "Day selection does not match the plan"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn update(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<UpdateEnrollmentRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    enrollment::update(
        pool.get_ref(),
        path.into_inner(),
        body.pricing_plan_id,
        &body.days,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Enrollment Updated"
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct EnrollmentActiveRequest {
    pub active: bool,
}

#[utoipa::path(
    put,
    path = "/api/enrollments/{id}/active",
    request_body = EnrollmentActiveRequest,
    params(("id", description = "Enrollment ID")),
    responses(
        (status = 200, description = "Active flag updated"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Enrollments"
)]
pub async fn set_active(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<EnrollmentActiveRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    enrollment::set_active(pool.get_ref(), path.into_inner(), body.active).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Enrollment Updated"
    })))
}
