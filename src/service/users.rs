//! User administration: account creation, teacher financial details and
//! guarded deletion. A person with attendance, payment or payroll history
//! is never hard-deleted.

use sqlx::SqlitePool;

use crate::auth::password::hash_password;
use crate::error::ServiceError;
use crate::model::role::Role;

pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: Role,
    pub branch_id: Option<i64>,
}

pub async fn create_user(pool: &SqlitePool, user: NewUser) -> Result<i64, ServiceError> {
    if user.full_name.trim().len() < 2 {
        return Err(ServiceError::Validation("Full name is required".to_string()));
    }
    if user.email.trim().is_empty() || !user.email.contains('@') {
        return Err(ServiceError::Validation("A valid email is required".to_string()));
    }
    if user.password.len() < 6 {
        return Err(ServiceError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let hashed = hash_password(&user.password);

    let result = sqlx::query(
        r#"
        INSERT INTO users (full_name, email, phone, password, role, branch_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.full_name.trim())
    .bind(user.email.trim())
    .bind(&user.phone)
    .bind(&hashed)
    .bind(user.role)
    .bind(user.branch_id)
    .execute(pool)
    .await
    .map_err(|e| ServiceError::on_unique(e, "Email already in use."))?;

    Ok(result.last_insert_rowid())
}

/// Sets a teacher's base salary and banking details used by disbursement.
pub async fn update_financials(
    pool: &SqlitePool,
    teacher_id: i64,
    base_salary: f64,
    bank_name: &str,
    bank_account_number: &str,
    bank_code: &str,
) -> Result<(), ServiceError> {
    if base_salary < 0.0 {
        return Err(ServiceError::Validation("Salary cannot be negative".to_string()));
    }

    let result = sqlx::query(
        r#"
        UPDATE users
        SET base_salary = ?, bank_name = ?, bank_account_number = ?, bank_code = ?
        WHERE id = ? AND role = 'TEACHER'
        "#,
    )
    .bind(base_salary)
    .bind(bank_name)
    .bind(bank_account_number)
    .bind(bank_code)
    .bind(teacher_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("Teacher not found".to_string()));
    }
    Ok(())
}

pub async fn set_active(pool: &SqlitePool, user_id: i64, active: bool) -> Result<(), ServiceError> {
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("User not found".to_string()));
    }
    Ok(())
}

async fn count(pool: &SqlitePool, sql: &str, id: i64) -> Result<i64, ServiceError> {
    Ok(sqlx::query_scalar::<_, i64>(sql).bind(id).fetch_one(pool).await?)
}

/// Deletes a user unless dependent records reference them.
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<(), ServiceError> {
    let dependents = count(
        pool,
        "SELECT COUNT(*) FROM staff_attendance WHERE user_id = ?",
        user_id,
    )
    .await?
        + count(pool, "SELECT COUNT(*) FROM payments WHERE student_id = ?", user_id).await?
        + count(pool, "SELECT COUNT(*) FROM payroll WHERE teacher_id = ?", user_id).await?
        + count(pool, "SELECT COUNT(*) FROM enrollments WHERE student_id = ?", user_id).await?;

    if dependents > 0 {
        return Err(ServiceError::Conflict(
            "Cannot delete: attendance or payment records exist for this user.".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("User not found".to_string()));
    }
    Ok(())
}
