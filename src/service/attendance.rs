//! Staff clock-in/clock-out ledger and the class attendance sheet.
//!
//! At most one staff row exists per (date, user); the unique constraint in
//! the schema is the authoritative guard, so two racing clock-ins resolve
//! to one insert and one conflict. All day keys are UTC dates taken from
//! the injected clock.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::clock::Clock;
use crate::error::ServiceError;
use crate::geo::{self, Coordinates};
use crate::model::attendance::AttendanceStatus;

#[derive(Debug, Clone, Copy)]
pub struct GeofencePolicy {
    pub radius_m: f64,
    /// Clock-in behavior at a branch with no coordinates on file: allow
    /// (skip the check) or reject.
    pub allow_unfenced: bool,
}

#[derive(sqlx::FromRow)]
struct ClockInTarget {
    branch_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

pub async fn clock_in(
    pool: &SqlitePool,
    clock: &dyn Clock,
    policy: GeofencePolicy,
    user_id: i64,
    claimed: Option<Coordinates>,
) -> Result<(), ServiceError> {
    let target = sqlx::query_as::<_, ClockInTarget>(
        r#"
        SELECT b.name AS branch_name, b.latitude, b.longitude
        FROM users u
        LEFT JOIN branches b ON b.id = u.branch_id
        WHERE u.id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

    let branch_name = target
        .branch_name
        .ok_or_else(|| ServiceError::Validation("You are not assigned to a branch.".to_string()))?;

    match (target.latitude, target.longitude) {
        (Some(lat), Some(lng)) => {
            let claimed = claimed.ok_or_else(|| {
                ServiceError::Validation("Location unavailable".to_string())
            })?;

            let check = geo::evaluate(Coordinates::new(lat, lng), claimed, policy.radius_m)
                .ok_or_else(|| ServiceError::Validation("Location unavailable".to_string()))?;

            if !check.within {
                return Err(ServiceError::TooFarAway {
                    branch: branch_name,
                    distance_m: check.distance_m,
                });
            }
        }
        _ => {
            if !policy.allow_unfenced {
                return Err(ServiceError::Validation(format!(
                    "{branch_name} has no geofence configured; clock-in is disabled."
                )));
            }
        }
    }

    // The existence check and the insert must be atomic; the unique index
    // on (date, user_id) settles concurrent attempts. Day key and timestamp
    // come from one clock reading so they cannot straddle midnight.
    let now = clock.now();
    let today = now.date_naive();
    sqlx::query(
        r#"
        INSERT INTO staff_attendance (user_id, date, status, check_in)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(today)
    .bind(AttendanceStatus::Present)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| ServiceError::on_unique(e, "Already clocked in."))?;

    info!(user_id, %today, "Clock-in recorded");
    Ok(())
}

pub async fn clock_out(
    pool: &SqlitePool,
    clock: &dyn Clock,
    user_id: i64,
) -> Result<(), ServiceError> {
    let record = sqlx::query_as::<_, (i64, Option<DateTime<Utc>>)>(
        "SELECT id, check_out FROM staff_attendance WHERE user_id = ? AND date = ?",
    )
    .bind(user_id)
    .bind(clock.today())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::Conflict("You haven't clocked in yet!".to_string()))?;

    if record.1.is_some() {
        return Err(ServiceError::Conflict("Already clocked out.".to_string()));
    }

    let result =
        sqlx::query("UPDATE staff_attendance SET check_out = ? WHERE id = ? AND check_out IS NULL")
            .bind(clock.now())
            .bind(record.0)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::Conflict("Already clocked out.".to_string()));
    }

    Ok(())
}

/// Clears an accidental clock-out so the shift counts as still running.
/// Administrative escape hatch; no guard beyond the record existing.
pub async fn resume(pool: &SqlitePool, attendance_id: i64) -> Result<(), ServiceError> {
    let result = sqlx::query("UPDATE staff_attendance SET check_out = NULL WHERE id = ?")
        .bind(attendance_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound(
            "Attendance record not found".to_string(),
        ));
    }

    Ok(())
}

fn parse_hhmm(value: &str) -> Result<NaiveTime, ServiceError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ServiceError::Validation(format!("Invalid time '{value}' (expected HH:MM)")))
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_time(time), Utc)
}

/// Overwrites the check-in/check-out of an existing record from HH:MM
/// strings, anchored to the record's stored date. A check-out at or before
/// the check-in is rejected.
pub async fn correct_times(
    pool: &SqlitePool,
    attendance_id: i64,
    check_in: &str,
    check_out: Option<&str>,
) -> Result<(), ServiceError> {
    let (date,) = sqlx::query_as::<_, (NaiveDate,)>(
        "SELECT date FROM staff_attendance WHERE id = ?",
    )
    .bind(attendance_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::NotFound("Attendance record not found".to_string()))?;

    let new_check_in = at(date, parse_hhmm(check_in)?);
    let new_check_out = match check_out {
        Some(s) if !s.is_empty() => {
            let out = at(date, parse_hhmm(s)?);
            if out <= new_check_in {
                return Err(ServiceError::Validation(
                    "Check-out must be after check-in".to_string(),
                ));
            }
            Some(out)
        }
        _ => None,
    };

    sqlx::query("UPDATE staff_attendance SET check_in = ?, check_out = ? WHERE id = ?")
        .bind(new_check_in)
        .bind(new_check_out)
        .bind(attendance_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Backfills a full attendance record for a past date.
pub async fn manual_add(
    pool: &SqlitePool,
    user_id: i64,
    date: NaiveDate,
    check_in: &str,
    check_out: Option<&str>,
) -> Result<(), ServiceError> {
    let check_in_ts = at(date, parse_hhmm(check_in)?);
    let check_out_ts = match check_out {
        Some(s) if !s.is_empty() => {
            let out = at(date, parse_hhmm(s)?);
            if out <= check_in_ts {
                return Err(ServiceError::Validation(
                    "Check-out must be after check-in".to_string(),
                ));
            }
            Some(out)
        }
        _ => None,
    };

    sqlx::query(
        r#"
        INSERT INTO staff_attendance (user_id, date, status, check_in, check_out)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(AttendanceStatus::Present)
    .bind(check_in_ts)
    .bind(check_out_ts)
    .execute(pool)
    .await
    .map_err(|e| ServiceError::on_unique(e, "Attendance record already exists for this date."))?;

    Ok(())
}

/// Saves a full day's class sheet in one transaction: one upsert per
/// enrollment, keyed by (date, enrollment).
pub async fn submit_sheet(
    pool: &SqlitePool,
    date: NaiveDate,
    entries: &[(i64, AttendanceStatus)],
    recorded_by: &str,
) -> Result<(), ServiceError> {
    let mut tx = pool.begin().await?;

    for (enrollment_id, status) in entries {
        sqlx::query(
            r#"
            INSERT INTO class_attendance (enrollment_id, date, status, recorded_by)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (date, enrollment_id) DO UPDATE SET status = excluded.status
            "#,
        )
        .bind(enrollment_id)
        .bind(date)
        .bind(status)
        .bind(recorded_by)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(%date, entries = entries.len(), "Attendance sheet saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testutil::{seed_branch, seed_user, test_pool};
    use chrono::TimeZone;

    fn fenced_policy() -> GeofencePolicy {
        GeofencePolicy {
            radius_m: 50.0,
            allow_unfenced: true,
        }
    }

    fn noon() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap())
    }

    async fn seed_fenced_teacher(pool: &SqlitePool) -> i64 {
        let branch = seed_branch(pool, "Bole Campus", Some(9.0), Some(38.7)).await;
        seed_user(pool, "TEACHER", "Abel Tesfaye", "abel@school.test", Some(branch)).await
    }

    #[actix_web::test]
    async fn clock_in_inside_the_fence_succeeds() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;

        clock_in(
            &pool,
            &noon(),
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.00005, 38.7000)),
        )
        .await
        .unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM staff_attendance WHERE user_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[actix_web::test]
    async fn clock_in_outside_the_fence_reports_the_distance() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;

        let err = clock_in(
            &pool,
            &noon(),
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.0010, 38.7000)),
        )
        .await
        .unwrap_err();

        match err {
            ServiceError::TooFarAway { branch, distance_m } => {
                assert_eq!(branch, "Bole Campus");
                assert!(distance_m >= 100.0, "got {distance_m}");
            }
            other => panic!("expected TooFarAway, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn clock_in_without_location_at_fenced_branch_is_rejected() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;

        let err = clock_in(&pool, &noon(), fenced_policy(), teacher, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[actix_web::test]
    async fn second_clock_in_on_the_same_day_conflicts() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let loc = Some(Coordinates::new(9.00005, 38.7000));

        clock_in(&pool, &noon(), fenced_policy(), teacher, loc)
            .await
            .unwrap();
        let err = clock_in(&pool, &noon(), fenced_policy(), teacher, loc)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[actix_web::test]
    async fn concurrent_clock_ins_yield_exactly_one_success() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let clock = noon();
        let loc = Some(Coordinates::new(9.00005, 38.7000));

        let (a, b) = futures::join!(
            clock_in(&pool, &clock, fenced_policy(), teacher, loc),
            clock_in(&pool, &clock, fenced_policy(), teacher, loc),
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM staff_attendance WHERE user_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[actix_web::test]
    async fn unfenced_branch_follows_the_configured_policy() {
        let pool = test_pool().await;
        let branch = seed_branch(&pool, "Adama Campus", None, None).await;
        let teacher = seed_user(&pool, "TEACHER", "Sara Bekele", "sara@school.test", Some(branch)).await;

        let deny = GeofencePolicy {
            radius_m: 50.0,
            allow_unfenced: false,
        };
        let err = clock_in(&pool, &noon(), deny, teacher, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let allow = GeofencePolicy {
            radius_m: 50.0,
            allow_unfenced: true,
        };
        clock_in(&pool, &noon(), allow, teacher, None).await.unwrap();
    }

    #[actix_web::test]
    async fn clock_in_without_a_branch_is_rejected() {
        let pool = test_pool().await;
        let teacher = seed_user(&pool, "TEACHER", "Ruth Alemu", "ruth@school.test", None).await;

        let err = clock_in(&pool, &noon(), fenced_policy(), teacher, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[actix_web::test]
    async fn clock_out_requires_a_clock_in_and_happens_once() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let clock = noon();

        let err = clock_out(&pool, &clock, teacher).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        clock_in(
            &pool,
            &clock,
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.00005, 38.7000)),
        )
        .await
        .unwrap();

        clock_out(&pool, &clock, teacher).await.unwrap();
        let err = clock_out(&pool, &clock, teacher).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[actix_web::test]
    async fn resume_clears_the_check_out() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let clock = noon();

        clock_in(
            &pool,
            &clock,
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.00005, 38.7000)),
        )
        .await
        .unwrap();
        clock_out(&pool, &clock, teacher).await.unwrap();

        let (id,): (i64,) =
            sqlx::query_as("SELECT id FROM staff_attendance WHERE user_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();
        resume(&pool, id).await.unwrap();

        // Shift is running again, so clocking out works a second time.
        clock_out(&pool, &clock, teacher).await.unwrap();
    }

    #[actix_web::test]
    async fn resume_of_an_unknown_record_is_not_found() {
        let pool = test_pool().await;
        let err = resume(&pool, 999).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn correction_rebuilds_timestamps_from_the_record_date() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let clock = noon();

        clock_in(
            &pool,
            &clock,
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.00005, 38.7000)),
        )
        .await
        .unwrap();
        let (id,): (i64,) =
            sqlx::query_as("SELECT id FROM staff_attendance WHERE user_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();

        correct_times(&pool, id, "08:30", Some("17:00")).await.unwrap();

        let (check_in, check_out): (DateTime<Utc>, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT check_in, check_out FROM staff_attendance WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(check_in, Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap());
        assert_eq!(
            check_out,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 17, 0, 0).unwrap())
        );
    }

    #[actix_web::test]
    async fn correction_rejects_check_out_before_check_in() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let clock = noon();

        clock_in(
            &pool,
            &clock,
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.00005, 38.7000)),
        )
        .await
        .unwrap();
        let (id,): (i64,) =
            sqlx::query_as("SELECT id FROM staff_attendance WHERE user_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();

        let err = correct_times(&pool, id, "17:00", Some("08:30")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[actix_web::test]
    async fn manual_add_conflicts_with_an_existing_day() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let date = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();

        manual_add(&pool, teacher, date, "09:00", Some("17:00"))
            .await
            .unwrap();
        let err = manual_add(&pool, teacher, date, "09:00", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[actix_web::test]
    async fn sheet_upserts_are_transactional_and_rerunnable() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;
        let student = seed_user(&pool, "STUDENT", "Kebede Worku", "kebede@school.test", None).await;
        let enrollment = crate::testutil::seed_enrollment(&pool, student).await;
        let _ = teacher;

        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        submit_sheet(&pool, date, &[(enrollment, AttendanceStatus::Present)], "ADMIN")
            .await
            .unwrap();
        submit_sheet(&pool, date, &[(enrollment, AttendanceStatus::Absent)], "ADMIN")
            .await
            .unwrap();

        let (count, status): (i64, AttendanceStatus) = {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM class_attendance WHERE enrollment_id = ?")
                    .bind(enrollment)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            let (status,): (AttendanceStatus,) =
                sqlx::query_as("SELECT status FROM class_attendance WHERE enrollment_id = ?")
                    .bind(enrollment)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            (count, status)
        };
        assert_eq!(count, 1);
        assert_eq!(status, AttendanceStatus::Absent);
    }

    #[actix_web::test]
    async fn clock_in_stores_a_decodable_present_status() {
        let pool = test_pool().await;
        let teacher = seed_fenced_teacher(&pool).await;

        clock_in(
            &pool,
            &noon(),
            fenced_policy(),
            teacher,
            Some(Coordinates::new(9.00005, 38.7000)),
        )
        .await
        .unwrap();

        let (status,): (AttendanceStatus,) =
            sqlx::query_as("SELECT status FROM staff_attendance WHERE user_id = ?")
                .bind(teacher)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, AttendanceStatus::Present);
    }
}
