use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

/// A tuition payment. Created PENDING before the gateway is contacted;
/// only the verification path may move it to SUCCESS or FAILED.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Payment {
    pub id: i64,
    pub student_id: i64,
    pub amount: f64,
    pub month: i64,
    pub year: i64,
    pub reason: String,
    pub tx_ref: String,
    pub status: PaymentStatus,
    /// The gateway's own transaction identifier, recorded on verification.
    pub gateway_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
