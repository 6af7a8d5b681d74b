//! Student enrollment into (course, shift, pricing plan) with selected
//! weekdays. The number of distinct weekdays must match the plan's
//! days-per-week, otherwise scheduling and billing drift apart.

use chrono::Weekday;
use sqlx::SqlitePool;

use crate::error::ServiceError;

/// Parses and canonicalizes weekday codes ("mon", "Tuesday", ...) into the
/// stored comma-joined lowercase form, rejecting duplicates.
fn canonical_days(days: &[String]) -> Result<Vec<String>, ServiceError> {
    let mut seen = Vec::new();
    for raw in days {
        let day: Weekday = raw
            .parse()
            .map_err(|_| ServiceError::Validation(format!("Invalid weekday '{raw}'")))?;
        if seen.contains(&day) {
            return Err(ServiceError::Validation(format!(
                "Weekday '{raw}' selected twice"
            )));
        }
        seen.push(day);
    }
    Ok(seen.iter().map(|d| d.to_string().to_lowercase()).collect())
}

async fn plan_days_per_week(pool: &SqlitePool, plan_id: i64) -> Result<i64, ServiceError> {
    sqlx::query_scalar::<_, i64>("SELECT days_per_week FROM pricing_plans WHERE id = ?")
        .bind(plan_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Pricing plan not found".to_string()))
}

fn check_day_count(selected: usize, required: i64) -> Result<(), ServiceError> {
    if selected as i64 != required {
        return Err(ServiceError::Validation(format!(
            "Select exactly {required} day(s) for this plan."
        )));
    }
    Ok(())
}

pub async fn enroll(
    pool: &SqlitePool,
    student_id: i64,
    course_id: i64,
    shift_id: i64,
    pricing_plan_id: i64,
    days: &[String],
) -> Result<i64, ServiceError> {
    let required = plan_days_per_week(pool, pricing_plan_id).await?;
    let canonical = canonical_days(days)?;
    check_day_count(canonical.len(), required)?;

    let result = sqlx::query(
        r#"
        INSERT INTO enrollments (student_id, course_id, shift_id, pricing_plan_id, selected_days)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .bind(shift_id)
    .bind(pricing_plan_id)
    .bind(canonical.join(","))
    .execute(pool)
    .await
    .map_err(|e| {
        ServiceError::on_unique(e, "Student is already enrolled in this course and shift.")
    })?;

    Ok(result.last_insert_rowid())
}

/// Changes an enrollment's plan and selected days together, re-validating
/// the day count against the new plan.
pub async fn update(
    pool: &SqlitePool,
    enrollment_id: i64,
    pricing_plan_id: i64,
    days: &[String],
) -> Result<(), ServiceError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments WHERE id = ?")
        .bind(enrollment_id)
        .fetch_one(pool)
        .await?;
    if exists == 0 {
        return Err(ServiceError::NotFound("Enrollment not found".to_string()));
    }

    let required = plan_days_per_week(pool, pricing_plan_id).await?;
    let canonical = canonical_days(days)?;
    check_day_count(canonical.len(), required)?;

    sqlx::query("UPDATE enrollments SET pricing_plan_id = ?, selected_days = ? WHERE id = ?")
        .bind(pricing_plan_id)
        .bind(canonical.join(","))
        .bind(enrollment_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Toggles whether the enrollment counts toward scheduling and billing.
pub async fn set_active(
    pool: &SqlitePool,
    enrollment_id: i64,
    active: bool,
) -> Result<(), ServiceError> {
    let result = sqlx::query("UPDATE enrollments SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(enrollment_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("Enrollment not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_academics, seed_user, test_pool};

    fn days(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[actix_web::test]
    async fn enrollment_requires_the_plan_day_count() {
        let pool = test_pool().await;
        let student = seed_user(&pool, "STUDENT", "Liya Haile", "liya@school.test", None).await;
        // Plan requires 3 days per week.
        let (course, shift, plan) = seed_academics(&pool, 3).await;

        let err = enroll(&pool, student, course, shift, plan, &days(&["mon", "wed"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        enroll(&pool, student, course, shift, plan, &days(&["mon", "wed", "fri"]))
            .await
            .unwrap();

        let stored: String =
            sqlx::query_scalar("SELECT selected_days FROM enrollments WHERE student_id = ?")
                .bind(student)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored, "mon,wed,fri");
    }

    #[actix_web::test]
    async fn duplicate_and_unknown_weekdays_are_rejected() {
        let pool = test_pool().await;
        let student = seed_user(&pool, "STUDENT", "Liya Haile", "liya@school.test", None).await;
        let (course, shift, plan) = seed_academics(&pool, 2).await;

        let err = enroll(&pool, student, course, shift, plan, &days(&["mon", "mon"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = enroll(&pool, student, course, shift, plan, &days(&["mon", "someday"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[actix_web::test]
    async fn re_enrolling_the_same_combination_conflicts() {
        let pool = test_pool().await;
        let student = seed_user(&pool, "STUDENT", "Liya Haile", "liya@school.test", None).await;
        let (course, shift, plan) = seed_academics(&pool, 1).await;

        enroll(&pool, student, course, shift, plan, &days(&["sat"]))
            .await
            .unwrap();
        let err = enroll(&pool, student, course, shift, plan, &days(&["sun"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[actix_web::test]
    async fn update_revalidates_against_the_new_plan() {
        let pool = test_pool().await;
        let student = seed_user(&pool, "STUDENT", "Liya Haile", "liya@school.test", None).await;
        let (course, shift, plan) = seed_academics(&pool, 1).await;
        let id = enroll(&pool, student, course, shift, plan, &days(&["sat"]))
            .await
            .unwrap();

        let (_, _, bigger_plan) = seed_academics(&pool, 2).await;
        let err = update(&pool, id, bigger_plan, &days(&["sat"])).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        update(&pool, id, bigger_plan, &days(&["sat", "sun"])).await.unwrap();
    }

    #[actix_web::test]
    async fn set_active_toggles_and_checks_existence() {
        let pool = test_pool().await;
        let student = seed_user(&pool, "STUDENT", "Liya Haile", "liya@school.test", None).await;
        let (course, shift, plan) = seed_academics(&pool, 1).await;
        let id = enroll(&pool, student, course, shift, plan, &days(&["sat"]))
            .await
            .unwrap();

        set_active(&pool, id, false).await.unwrap();
        let active: bool =
            sqlx::query_scalar("SELECT is_active FROM enrollments WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(!active);

        let err = set_active(&pool, 9999, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
