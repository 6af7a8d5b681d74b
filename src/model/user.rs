use serde::{Deserialize, Serialize};

use super::role::Role;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    #[schema(write_only)]
    pub password: String,
    pub role: Role,
    pub branch_id: Option<i64>,
    pub base_salary: f64,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_code: Option<String>,
    pub is_active: bool,
}
