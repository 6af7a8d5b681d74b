use serde::{Deserialize, Serialize};

/// Links a student to a course, shift and pricing plan. `selected_days`
/// holds lowercase three-letter weekday codes joined by commas; its count
/// must equal the plan's `days_per_week`.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub shift_id: i64,
    pub pricing_plan_id: i64,
    pub selected_days: String,
    pub is_active: bool,
}
