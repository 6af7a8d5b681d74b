use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// One row per (date, user); the unique constraint on that pair is what
/// makes concurrent clock-ins safe.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct StaffAttendance {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
}

/// Shared by staff rows (clock-ins always record PRESENT) and class sheets.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

/// Per-enrollment daily status, keyed by (date, enrollment).
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct ClassAttendance {
    pub id: i64,
    pub enrollment_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub recorded_by: String,
}
