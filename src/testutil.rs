//! Shared test fixtures: an in-memory migrated database, seed helpers and
//! a scriptable payment gateway.

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::chapa::{
    GatewayError, GatewayReply, InitializeRequest, PaymentGateway, TransferRequest,
};

pub async fn test_pool() -> SqlitePool {
    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub async fn seed_branch(
    pool: &SqlitePool,
    name: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> i64 {
    sqlx::query("INSERT INTO branches (name, location, latitude, longitude) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind("Addis Ababa")
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn seed_user(
    pool: &SqlitePool,
    role: &str,
    full_name: &str,
    email: &str,
    branch_id: Option<i64>,
) -> i64 {
    sqlx::query(
        "INSERT INTO users (full_name, email, password, role, branch_id) VALUES (?, ?, 'x', ?, ?)",
    )
    .bind(full_name)
    .bind(email)
    .bind(role)
    .bind(branch_id)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn seed_teacher_with_bank(
    pool: &SqlitePool,
    full_name: &str,
    email: &str,
    account: &str,
    bank_code: &str,
) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO users (full_name, email, password, role, base_salary,
                           bank_name, bank_account_number, bank_code)
        VALUES (?, ?, 'x', 'TEACHER', 8000.0, 'CBE', ?, ?)
        "#,
    )
    .bind(full_name)
    .bind(email)
    .bind(account)
    .bind(bank_code)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Creates a course, shift and pricing plan; returns their ids.
pub async fn seed_academics(pool: &SqlitePool, days_per_week: i64) -> (i64, i64, i64) {
    let course = sqlx::query("INSERT INTO courses (name) VALUES ('Mathematics')")
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
    let shift = sqlx::query(
        "INSERT INTO shifts (name, start_time, end_time) VALUES ('Morning', '08:00', '12:00')",
    )
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();
    let plan = sqlx::query(
        "INSERT INTO pricing_plans (name, duration_months, days_per_week) VALUES ('Standard', 3, ?)",
    )
    .bind(days_per_week)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();

    (course, shift, plan)
}

/// Enrolls a student with a fresh course/shift/plan; returns the enrollment id.
pub async fn seed_enrollment(pool: &SqlitePool, student_id: i64) -> i64 {
    let (course, shift, plan) = seed_academics(pool, 1).await;
    sqlx::query(
        r#"
        INSERT INTO enrollments (student_id, course_id, shift_id, pricing_plan_id, selected_days)
        VALUES (?, ?, ?, ?, 'mon')
        "#,
    )
    .bind(student_id)
    .bind(course)
    .bind(shift)
    .bind(plan)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Gateway double with scriptable outcomes. Transfers against
/// `failing_account` are rejected the way Chapa rejects an invalid account;
/// `unreachable` makes every call fail in transit before the gateway answers.
pub struct MockGateway {
    pub initialize_success: bool,
    pub verify_success: bool,
    pub failing_account: Option<String>,
    pub unreachable: bool,
    pub verify_calls: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            initialize_success: true,
            verify_success: true,
            failing_account: None,
            unreachable: false,
            verify_calls: AtomicUsize::new(0),
        }
    }
}

impl MockGateway {
    fn check_reachable(&self) -> Result<(), GatewayError> {
        if self.unreachable {
            Err(GatewayError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize(&self, req: InitializeRequest) -> Result<GatewayReply, GatewayError> {
        self.check_reachable()?;
        if self.initialize_success {
            Ok(GatewayReply {
                success: true,
                message: "Hosted Link".to_string(),
                checkout_url: Some(format!("https://checkout.test/{}", req.tx_ref)),
                reference: None,
            })
        } else {
            Ok(GatewayReply {
                success: false,
                message: "Invalid currency".to_string(),
                checkout_url: None,
                reference: None,
            })
        }
    }

    async fn verify(&self, _tx_ref: &str) -> Result<GatewayReply, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(GatewayReply {
            success: self.verify_success,
            message: if self.verify_success {
                "Payment details".to_string()
            } else {
                "Transaction not found".to_string()
            },
            checkout_url: None,
            reference: Some("CH-REF-001".to_string()),
        })
    }

    async fn transfer(&self, req: TransferRequest) -> Result<GatewayReply, GatewayError> {
        self.check_reachable()?;
        if self.failing_account.as_deref() == Some(req.account_number.as_str()) {
            return Ok(GatewayReply {
                success: false,
                message: "Insufficient balance".to_string(),
                checkout_url: None,
                reference: None,
            });
        }
        Ok(GatewayReply {
            success: true,
            message: "Transfer queued".to_string(),
            checkout_url: None,
            reference: Some(format!("CHAPA-{}", req.reference)),
        })
    }
}
