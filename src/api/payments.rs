use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::chapa::PaymentGateway;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::ServiceError;
use crate::model::payment::{Payment, PaymentStatus};
use crate::model::role::Role;
use crate::service::payment::{self, InitiatePayment};

#[derive(Deserialize, ToSchema)]
pub struct InitiateRequest {
    pub student_id: i64,
    #[schema(example = 1500.0)]
    pub amount: f64,
    #[schema(example = 3)]
    pub month: i64,
    #[schema(example = 2026)]
    pub year: i64,
    #[schema(example = "March tuition")]
    pub reason: String,
}

/// Starts a tuition payment and returns the gateway checkout URL.
/// Students may only pay for themselves.
#[utoipa::path(
    post,
    path = "/api/payments/initiate",
    request_body = InitiateRequest,
    responses(
        (status = 200, description = "Checkout URL issued"),
        (status = 400, description = "Invalid amount or missing contact"),
        (status = 502, description = "Gateway rejected the transaction")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    gateway: web::Data<dyn PaymentGateway>,
    clock: web::Data<dyn Clock>,
    config: web::Data<Config>,
    body: web::Json<InitiateRequest>,
) -> actix_web::Result<HttpResponse> {
    let student_id = match auth.role {
        Role::Student => auth.user_id,
        _ => {
            auth.require_admin()?;
            body.student_id
        }
    };

    let checkout_url = payment::initiate(
        pool.get_ref(),
        gateway.get_ref(),
        clock.get_ref(),
        &config.public_base_url,
        &config.currency,
        InitiatePayment {
            student_id,
            amount: body.amount,
            month: body.month,
            year: body.year,
            reason: body.reason.clone(),
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "checkout_url": checkout_url
    })))
}

#[derive(Deserialize, IntoParams)]
pub struct PaymentFilter {
    pub student_id: Option<i64>,
}

/// Lists payments. Students see their own; admins may filter by student.
#[utoipa::path(
    get,
    path = "/api/payments",
    params(PaymentFilter),
    responses((status = 200, body = Vec<Payment>)),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<PaymentFilter>,
) -> actix_web::Result<HttpResponse> {
    let student_id = match auth.role {
        Role::Student => Some(auth.user_id),
        _ => {
            auth.require_admin()?;
            query.student_id
        }
    };

    let rows = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, student_id, amount, month, year, reason, tx_ref,
               status, gateway_ref, created_at
        FROM payments
        WHERE (? IS NULL OR student_id = ?)
        ORDER BY created_at DESC
        "#,
    )
    .bind(student_id)
    .bind(student_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(rows))
}

fn status_response(status: PaymentStatus) -> HttpResponse {
    match status {
        PaymentStatus::Success => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "status": status,
            "message": "Payment Verified Successfully!"
        })),
        _ => HttpResponse::Ok().json(serde_json::json!({
            "success": false,
            "status": status,
            "message": "Payment Failed or Pending."
        })),
    }
}

/// Re-checks a transaction against the gateway.
#[utoipa::path(
    post,
    path = "/api/payments/{tx_ref}/verify",
    params(("tx_ref", description = "Transaction reference")),
    responses(
        (status = 200, description = "Verification result"),
        (status = 404, description = "Unknown transaction reference")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    gateway: web::Data<dyn PaymentGateway>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    auth.require_admin()?;

    let status = payment::verify(pool.get_ref(), gateway.get_ref(), &path.into_inner()).await?;
    Ok(status_response(status))
}

#[derive(Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub tx_ref: String,
}

/// Gateway webhook / payer return endpoint; both trigger verification of
/// the referenced transaction. Unauthenticated by design: the gateway and
/// the payer's browser land here.
#[utoipa::path(
    get,
    path = "/payments/callback",
    params(CallbackQuery),
    responses(
        (status = 200, description = "Verification result"),
        (status = 404, description = "Unknown transaction reference")
    ),
    tag = "Payments"
)]
pub async fn callback(
    pool: web::Data<SqlitePool>,
    gateway: web::Data<dyn PaymentGateway>,
    query: web::Query<CallbackQuery>,
) -> actix_web::Result<HttpResponse> {
    let status = payment::verify(pool.get_ref(), gateway.get_ref(), &query.tx_ref).await?;
    Ok(status_response(status))
}
