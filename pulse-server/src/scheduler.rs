//! Recurring course re-assignment
//!
//! A completed assignment with `intervalDays` is re-issued once its
//! completion is older than the interval, unless the employee already holds
//! a newer assignment for the same course and company. Each pass is
//! independent: a failed run is logged and the next tick tries again.

use chrono::{DateTime, Duration, Utc};
use pulse_common::db::models::CourseAssignment;
use pulse_common::Result;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::db;

/// Whether `assignment` is due for a fresh copy at `now`
///
/// `siblings` are all assignments of the same (employee, course, company).
pub fn is_due(assignment: &CourseAssignment, siblings: &[CourseAssignment], now: DateTime<Utc>) -> bool {
    let (Some(interval_days), Some(completed_at)) = (assignment.interval_days, assignment.completed_at) else {
        return false;
    };
    if !assignment.is_completed() || interval_days <= 0 {
        return false;
    }
    if completed_at + Duration::days(interval_days) > now {
        return false;
    }

    // Skip when already re-issued: an open sibling or one created after this completion
    !siblings.iter().any(|other| {
        other.id != assignment.id
            && (!other.is_completed() || other.created_at.map_or(false, |c| c >= completed_at))
    })
}

/// Run one re-assignment pass; returns the number of assignments created
pub async fn run_reassignment_pass(pool: &SqlitePool, now: DateTime<Utc>) -> Result<usize> {
    let candidates = db::assignments::list_recurring_completed(pool).await?;
    let mut created = 0;

    for assignment in candidates {
        let siblings = db::assignments::list_for_enrollment(
            pool,
            &assignment.employee_id,
            &assignment.course_id,
            &assignment.company_id,
        )
        .await?;
        if !is_due(&assignment, &siblings, now) {
            continue;
        }

        let Some(course) = db::courses::get(pool, &assignment.course_id).await? else {
            debug!(
                "Not re-assigning {}: course {} no longer exists",
                assignment.id, assignment.course_id
            );
            continue;
        };

        let fresh = CourseAssignment::new(
            &assignment.employee_id,
            &assignment.course_id,
            &assignment.company_id,
            assignment.interval_days,
            now,
        );
        if !db::assignments::insert(pool, &fresh).await? {
            debug!(
                "Not re-assigning {}: an open assignment was created concurrently",
                assignment.id
            );
            continue;
        }
        created += 1;

        info!(
            "Re-assigned course {} to employee {} (previous assignment {})",
            course.id, fresh.employee_id, assignment.id
        );

        let message = format!("The course \"{}\" is due again", course.title);
        if let Err(e) =
            db::notifications::create(pool, &fresh.employee_id, "assignment.recurring", &message, now).await
        {
            warn!("Failed to notify {} of re-assignment: {}", fresh.employee_id, e);
        }
        if let Err(e) = db::activities::record(
            pool,
            &fresh.company_id,
            None,
            "assignment.recurring",
            Some(&course.title),
            now,
        )
        .await
        {
            warn!("Failed to record re-assignment activity: {}", e);
        }
    }

    Ok(created)
}

/// Spawn the periodic job; it stops when `cancel` fires
pub fn spawn_reassignment_job(
    pool: SqlitePool,
    interval: std::time::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Re-assignment job running every {:?}", interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Re-assignment job stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match run_reassignment_pass(&pool, Utc::now()).await {
                        Ok(0) => debug!("Re-assignment pass: nothing due"),
                        Ok(n) => info!("Re-assignment pass created {} assignment(s)", n),
                        Err(e) => error!("Re-assignment pass failed: {}", e),
                    }
                }
            }
        }
    })
}
