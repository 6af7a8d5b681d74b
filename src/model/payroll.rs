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
pub enum PayrollStatus {
    Pending,
    Processed,
}

/// One disbursement row per (teacher, month, year).
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct PayrollRecord {
    pub id: i64,
    pub teacher_id: i64,
    pub month: i64,
    pub year: i64,
    pub amount: f64,
    pub status: PayrollStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub transfer_ref: Option<String>,
}
