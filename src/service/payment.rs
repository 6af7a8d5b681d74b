//! Tuition payment initiation and reconciliation.
//!
//! A payment row is written PENDING before the gateway is contacted, so a
//! crash mid-call still leaves a traceable record. Only `verify` may move a
//! payment to SUCCESS or FAILED; the initiation path never does, because the
//! gateway is the source of truth for whether money moved.

use sqlx::SqlitePool;
use tracing::{error, info};
use uuid::Uuid;

use crate::chapa::{
    Customization, InitializeRequest, PaymentGateway, sanitize_description,
};
use crate::clock::Clock;
use crate::error::ServiceError;
use crate::model::payment::PaymentStatus;

pub struct InitiatePayment {
    pub student_id: i64,
    pub amount: f64,
    pub month: i64,
    pub year: i64,
    pub reason: String,
}

fn new_tx_ref(clock: &dyn Clock) -> String {
    let suffix = Uuid::new_v4().to_simple().to_string();
    format!("TX-{}-{}", clock.now().timestamp_millis(), &suffix[..8])
}

/// Creates a PENDING payment and asks the gateway for a checkout URL.
/// Returns the URL the payer should be redirected to. On gateway rejection
/// the record stays PENDING and the gateway's own message is surfaced.
pub async fn initiate(
    pool: &SqlitePool,
    gateway: &dyn PaymentGateway,
    clock: &dyn Clock,
    base_url: &str,
    currency: &str,
    req: InitiatePayment,
) -> Result<String, ServiceError> {
    if !(req.amount > 0.0) {
        return Err(ServiceError::Validation(format!(
            "Invalid amount ({} {currency})",
            req.amount
        )));
    }

    let (email, full_name) = sqlx::query_as::<_, (String, String)>(
        "SELECT email, full_name FROM users WHERE id = ? AND role = 'STUDENT'",
    )
    .bind(req.student_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::NotFound("Student not found".to_string()))?;

    if email.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Student email is missing".to_string(),
        ));
    }

    let tx_ref = new_tx_ref(clock);

    sqlx::query(
        r#"
        INSERT INTO payments (student_id, amount, month, year, reason, tx_ref, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 'PENDING', ?)
        "#,
    )
    .bind(req.student_id)
    .bind(req.amount)
    .bind(req.month)
    .bind(req.year)
    .bind(&req.reason)
    .bind(&tx_ref)
    .bind(clock.now())
    .execute(pool)
    .await?;

    let mut names = full_name.split_whitespace();
    let first_name = names.next().unwrap_or("Student").to_string();
    let last_name = names.next().unwrap_or("User").to_string();

    let reply = gateway
        .initialize(InitializeRequest {
            amount: req.amount,
            currency: currency.to_string(),
            email,
            first_name,
            last_name,
            tx_ref: tx_ref.clone(),
            callback_url: format!("{base_url}/payments/callback?tx_ref={tx_ref}"),
            return_url: format!("{base_url}/payments/return?tx_ref={tx_ref}"),
            customization: Customization {
                title: "Tuition Payment".to_string(),
                description: sanitize_description(&req.reason),
            },
        })
        .await
        .map_err(|e| {
            error!(%tx_ref, error = %e, "Gateway initialization call failed");
            ServiceError::Gateway(e.to_string())
        })?;

    if !reply.success {
        error!(%tx_ref, message = %reply.message, "Gateway rejected initialization");
        return Err(ServiceError::Gateway(reply.message));
    }

    let checkout_url = reply
        .checkout_url
        .ok_or_else(|| ServiceError::Gateway("Gateway returned no checkout URL".to_string()))?;

    info!(%tx_ref, "Payment initialized");
    Ok(checkout_url)
}

/// Reconciles a payment against the gateway's verify endpoint and returns
/// the resulting status. Idempotent: an already-SUCCESS payment is left
/// untouched without another gateway round trip.
pub async fn verify(
    pool: &SqlitePool,
    gateway: &dyn PaymentGateway,
    tx_ref: &str,
) -> Result<PaymentStatus, ServiceError> {
    let (status,): (PaymentStatus,) =
        sqlx::query_as("SELECT status FROM payments WHERE tx_ref = ?")
            .bind(tx_ref)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Unknown transaction reference".to_string())
            })?;

    if status == PaymentStatus::Success {
        return Ok(PaymentStatus::Success);
    }

    let reply = gateway.verify(tx_ref).await.map_err(|e| {
        error!(%tx_ref, error = %e, "Gateway verification call failed");
        ServiceError::Gateway(e.to_string())
    })?;

    if reply.success {
        sqlx::query("UPDATE payments SET status = 'SUCCESS', gateway_ref = ? WHERE tx_ref = ?")
            .bind(&reply.reference)
            .bind(tx_ref)
            .execute(pool)
            .await?;
        info!(%tx_ref, "Payment verified");
        Ok(PaymentStatus::Success)
    } else {
        sqlx::query("UPDATE payments SET status = 'FAILED' WHERE tx_ref = ?")
            .bind(tx_ref)
            .execute(pool)
            .await?;
        info!(%tx_ref, "Payment marked failed");
        Ok(PaymentStatus::Failed)
    }
}
