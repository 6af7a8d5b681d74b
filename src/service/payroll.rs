//! Payroll generation and disbursement.
//!
//! Generation is additive and idempotent: it inserts PENDING rows only for
//! active teachers that have none for the period, so re-running it after
//! hiring picks up the new teachers without duplicating anyone. Disbursement
//! fans out one transfer per teacher; failures are counted, never cascaded.

use futures::future::join_all;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::chapa::{PaymentGateway, TransferRequest};
use crate::clock::Clock;
use crate::error::ServiceError;
use crate::model::payroll::PayrollStatus;

fn check_period(month: i64, year: i64) -> Result<(), ServiceError> {
    if !(1..=12).contains(&month) || !(2000..=2100).contains(&year) {
        return Err(ServiceError::Validation(format!(
            "Invalid payroll period {month}/{year}"
        )));
    }
    Ok(())
}

/// Inserts PENDING payroll rows for every active teacher that has none for
/// (month, year). Returns how many rows were added; zero means the list was
/// already up to date.
pub async fn generate(pool: &SqlitePool, month: i64, year: i64) -> Result<u64, ServiceError> {
    check_period(month, year)?;

    let teachers = sqlx::query_as::<_, (i64, f64)>(
        "SELECT id, base_salary FROM users WHERE role = 'TEACHER' AND is_active = 1",
    )
    .fetch_all(pool)
    .await?;

    if teachers.is_empty() {
        return Err(ServiceError::Validation(
            "No active teachers found.".to_string(),
        ));
    }

    let existing: HashSet<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT teacher_id FROM payroll WHERE month = ? AND year = ?",
    )
    .bind(month)
    .bind(year)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    let missing: Vec<_> = teachers
        .into_iter()
        .filter(|(id, _)| !existing.contains(id))
        .collect();

    if missing.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for (teacher_id, base_salary) in &missing {
        sqlx::query(
            r#"
            INSERT INTO payroll (teacher_id, month, year, amount, status)
            VALUES (?, ?, ?, ?, 'PENDING')
            "#,
        )
        .bind(teacher_id)
        .bind(month)
        .bind(year)
        .bind(base_salary)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(month, year, added = missing.len(), "Payroll generated");
    Ok(missing.len() as u64)
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize, utoipa::ToSchema)]
pub struct DisbursementSummary {
    pub succeeded: u32,
    pub failed: u32,
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    id: i64,
    amount: f64,
    teacher_id: i64,
    full_name: String,
    bank_account_number: Option<String>,
    bank_code: Option<String>,
}

/// Pays every PENDING payroll row for the period. Transfers run
/// concurrently and independently; a teacher with missing bank details or a
/// rejected transfer is counted as failed and their row stays PENDING.
/// Partial failure is the expected steady state, not an error.
pub async fn bulk_disburse(
    pool: &SqlitePool,
    gateway: &dyn PaymentGateway,
    clock: &dyn Clock,
    currency: &str,
    month: i64,
    year: i64,
) -> Result<DisbursementSummary, ServiceError> {
    check_period(month, year)?;

    let pending = sqlx::query_as::<_, PendingRow>(
        r#"
        SELECT p.id, p.amount, u.id AS teacher_id, u.full_name,
               u.bank_account_number, u.bank_code
        FROM payroll p
        JOIN users u ON u.id = p.teacher_id
        WHERE p.month = ? AND p.year = ? AND p.status = 'PENDING'
        "#,
    )
    .bind(month)
    .bind(year)
    .fetch_all(pool)
    .await?;

    if pending.is_empty() {
        return Err(ServiceError::NotFound(
            "No pending payrolls found for this month.".to_string(),
        ));
    }

    let transfers = pending.into_iter().map(|row| async move {
        let (account_number, bank_code) = match (&row.bank_account_number, &row.bank_code) {
            (Some(acc), Some(code)) if !acc.is_empty() && !code.is_empty() => {
                (acc.clone(), code.clone())
            }
            _ => {
                warn!(teacher = %row.full_name, "Skipping transfer: missing bank details");
                return false;
            }
        };

        // Deterministic reference so a retried period stays traceable.
        let reference = format!("SALARY-{}-{}-{}", year, month, row.teacher_id);

        let reply = match gateway
            .transfer(TransferRequest {
                account_name: row.full_name.clone(),
                account_number,
                amount: row.amount,
                currency: currency.to_string(),
                bank_code,
                reference: reference.clone(),
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(teacher = %row.full_name, error = %e, "Transfer call failed");
                return false;
            }
        };

        if !reply.success {
            error!(teacher = %row.full_name, message = %reply.message, "Transfer rejected");
            return false;
        }

        let transfer_ref = reply.reference.unwrap_or(reference);
        let updated = sqlx::query(
            r#"
            UPDATE payroll
            SET status = 'PROCESSED', paid_at = ?, transfer_ref = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(clock.now())
        .bind(&transfer_ref)
        .bind(row.id)
        .execute(pool)
        .await;

        match updated {
            Ok(_) => true,
            Err(e) => {
                error!(payroll_id = row.id, error = %e, "Failed to record transfer");
                false
            }
        }
    });

    let mut summary = DisbursementSummary::default();
    for ok in join_all(transfers).await {
        if ok {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
    }

    info!(
        month,
        year,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Payout complete"
    );
    Ok(summary)
}

/// Manually marks a single payroll row as paid, for transfers settled
/// outside the gateway.
pub async fn mark_paid(
    pool: &SqlitePool,
    clock: &dyn Clock,
    payroll_id: i64,
) -> Result<(), ServiceError> {
    let (status,): (PayrollStatus,) =
        sqlx::query_as("SELECT status FROM payroll WHERE id = ?")
            .bind(payroll_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Payroll record not found".to_string()))?;

    if status == PayrollStatus::Processed {
        return Err(ServiceError::Conflict("Already processed.".to_string()));
    }

    sqlx::query("UPDATE payroll SET status = 'PROCESSED', paid_at = ? WHERE id = ?")
        .bind(clock.now())
        .bind(payroll_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testutil::{MockGateway, seed_teacher_with_bank, seed_user, test_pool};
    use chrono::{TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 3, 31, 9, 0, 0).unwrap())
    }

    async fn payroll_rows(pool: &SqlitePool, month: i64, year: i64) -> Vec<(i64, PayrollStatus)> {
        sqlx::query_as(
            "SELECT teacher_id, status FROM payroll WHERE month = ? AND year = ? ORDER BY teacher_id",
        )
        .bind(month)
        .bind(year)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[actix_web::test]
    async fn generate_twice_adds_no_duplicates() {
        let pool = test_pool().await;
        seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946").await;
        seed_teacher_with_bank(&pool, "Sara Bekele", "sara@school.test", "1000456", "946").await;

        assert_eq!(generate(&pool, 3, 2026).await.unwrap(), 2);
        assert_eq!(generate(&pool, 3, 2026).await.unwrap(), 0);
        assert_eq!(payroll_rows(&pool, 3, 2026).await.len(), 2);
    }

    #[actix_web::test]
    async fn generate_picks_up_teachers_hired_later() {
        let pool = test_pool().await;
        seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946").await;
        assert_eq!(generate(&pool, 3, 2026).await.unwrap(), 1);

        seed_teacher_with_bank(&pool, "Sara Bekele", "sara@school.test", "1000456", "946").await;
        assert_eq!(generate(&pool, 3, 2026).await.unwrap(), 1);
        assert_eq!(payroll_rows(&pool, 3, 2026).await.len(), 2);
    }

    #[actix_web::test]
    async fn generate_skips_inactive_teachers() {
        let pool = test_pool().await;
        let active =
            seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946")
                .await;
        let inactive = seed_user(&pool, "TEACHER", "Old Teacher", "old@school.test", None).await;
        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(inactive)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(generate(&pool, 3, 2026).await.unwrap(), 1);
        assert_eq!(payroll_rows(&pool, 3, 2026).await, vec![(active, PayrollStatus::Pending)]);
    }

    #[actix_web::test]
    async fn generate_rejects_a_bad_period() {
        let pool = test_pool().await;
        let err = generate(&pool, 13, 2026).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[actix_web::test]
    async fn disburse_counts_partial_failures_without_blocking_others() {
        let pool = test_pool().await;
        let paid_a =
            seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946")
                .await;
        let paid_b =
            seed_teacher_with_bank(&pool, "Sara Bekele", "sara@school.test", "1000456", "946")
                .await;
        // Third teacher never entered bank details.
        let unpaid = seed_user(&pool, "TEACHER", "Ruth Alemu", "ruth@school.test", None).await;

        generate(&pool, 3, 2026).await.unwrap();

        let gw = MockGateway::default();
        let summary = bulk_disburse(&pool, &gw, &clock(), "ETB", 3, 2026).await.unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let rows = payroll_rows(&pool, 3, 2026).await;
        let status_of = |id| rows.iter().find(|(t, _)| *t == id).unwrap().1;
        assert_eq!(status_of(paid_a), PayrollStatus::Processed);
        assert_eq!(status_of(paid_b), PayrollStatus::Processed);
        assert_eq!(status_of(unpaid), PayrollStatus::Pending);
    }

    #[actix_web::test]
    async fn disburse_records_the_gateway_transfer_reference() {
        let pool = test_pool().await;
        let teacher =
            seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946")
                .await;
        generate(&pool, 3, 2026).await.unwrap();

        let gw = MockGateway::default();
        bulk_disburse(&pool, &gw, &clock(), "ETB", 3, 2026).await.unwrap();

        let (transfer_ref,): (Option<String>,) =
            sqlx::query_as("SELECT transfer_ref FROM payroll WHERE teacher_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(
            transfer_ref.as_deref(),
            Some(format!("CHAPA-SALARY-2026-3-{teacher}").as_str())
        );
    }

    #[actix_web::test]
    async fn rejected_transfer_leaves_the_row_pending() {
        let pool = test_pool().await;
        let teacher =
            seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946")
                .await;
        generate(&pool, 3, 2026).await.unwrap();

        let gw = MockGateway {
            failing_account: Some("1000123".to_string()),
            ..MockGateway::default()
        };
        let summary = bulk_disburse(&pool, &gw, &clock(), "ETB", 3, 2026).await.unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);

        assert_eq!(
            payroll_rows(&pool, 3, 2026).await,
            vec![(teacher, PayrollStatus::Pending)]
        );
    }

    #[actix_web::test]
    async fn unreachable_gateway_counts_the_transfer_as_failed() {
        let pool = test_pool().await;
        let teacher =
            seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946")
                .await;
        generate(&pool, 3, 2026).await.unwrap();

        let gw = MockGateway {
            unreachable: true,
            ..MockGateway::default()
        };
        let summary = bulk_disburse(&pool, &gw, &clock(), "ETB", 3, 2026).await.unwrap();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);

        assert_eq!(
            payroll_rows(&pool, 3, 2026).await,
            vec![(teacher, PayrollStatus::Pending)]
        );
    }

    #[actix_web::test]
    async fn disburse_with_nothing_pending_is_not_found() {
        let pool = test_pool().await;
        let gw = MockGateway::default();
        let err = bulk_disburse(&pool, &gw, &clock(), "ETB", 3, 2026).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn mark_paid_transitions_once() {
        let pool = test_pool().await;
        seed_teacher_with_bank(&pool, "Abel Tesfaye", "abel@school.test", "1000123", "946").await;
        generate(&pool, 3, 2026).await.unwrap();

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM payroll LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();

        mark_paid(&pool, &clock(), id).await.unwrap();
        let err = mark_paid(&pool, &clock(), id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
