use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::chapa::PaymentGateway;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::ServiceError;
use crate::model::payroll::PayrollRecord;
use crate::service::payroll;

#[derive(Deserialize, ToSchema)]
pub struct PeriodRequest {
    #[schema(example = 3)]
    pub month: i64,
    #[schema(example = 2026)]
    pub year: i64,
}

/// Creates PENDING payroll rows for active teachers missing one this
/// period. Safe to re-run; only the missing teachers are added.
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = PeriodRequest,
    responses(
        (status = 200, description = "Rows added (possibly zero)"),
        (status = 400, description = "Invalid period or no active teachers")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    body: web::Json<PeriodRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let added = payroll::generate(pool.get_ref(), body.month, body.year).await?;

    let message = if added == 0 {
        "Payroll list is already up to date.".to_string()
    } else {
        format!("Added {added} new teachers to the payroll.")
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "added": added,
        "message": message
    })))
}

/// Pays every pending row for the period; partial failure is reported in
/// the counts, not as an error.
#[utoipa::path(
    post,
    path = "/api/payroll/disburse",
    request_body = PeriodRequest,
    responses(
        (status = 200, body = payroll::DisbursementSummary),
        (status = 404, description = "Nothing pending for this period")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn disburse(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    gateway: web::Data<dyn PaymentGateway>,
    clock: web::Data<dyn Clock>,
    config: web::Data<Config>,
    body: web::Json<PeriodRequest>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let summary = payroll::bulk_disburse(
        pool.get_ref(),
        gateway.get_ref(),
        clock.get_ref(),
        &config.currency,
        body.month,
        body.year,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "message": format!(
            "Payout Complete. Success: {}, Failed: {}",
            summary.succeeded, summary.failed
        )
    })))
}

/// Marks one payroll row as paid outside the gateway.
#[utoipa::path(
    put,
    path = "/api/payroll/{id}/paid",
    params(("id", description = "Payroll record ID")),
    responses(
        (status = 200, description = "Marked as paid"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn mark_paid(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    clock: web::Data<dyn Clock>,
    path: web::Path<i64>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    payroll::mark_paid(pool.get_ref(), clock.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Payment Marked as Sent"
    })))
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
    #[schema(example = 3)]
    pub month: Option<i64>,
    #[schema(example = 2026)]
    pub year: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses((status = 200, body = PaginatedPayrollResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    // Widen before multiplying; u32 page values can overflow the product.
    let offset = (i64::from(page) - 1) * i64::from(per_page);
    let month = query.month.unwrap_or(-1);
    let year = query.year.unwrap_or(-1);

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payroll WHERE (? < 0 OR month = ?) AND (? < 0 OR year = ?)",
    )
    .bind(month)
    .bind(month)
    .bind(year)
    .bind(year)
    .fetch_one(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    let data = sqlx::query_as::<_, PayrollRecord>(
        r#"
        SELECT id, teacher_id, month, year, amount, status, paid_at, transfer_ref
        FROM payroll
        WHERE (? < 0 OR month = ?) AND (? < 0 OR year = ?)
        ORDER BY year DESC, month DESC, teacher_id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(month)
    .bind(month)
    .bind(year)
    .bind(year)
    .bind(per_page as i64)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}
