//! Course assignments

use pulse_common::db::models::{AssignmentStatus, CourseAssignment};
use pulse_common::Result;
use sqlx::{Sqlite, SqlitePool};

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<CourseAssignment>> {
    let assignment =
        sqlx::query_as::<_, CourseAssignment>("SELECT * FROM course_assignments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(assignment)
}

/// Insert a new assignment; accepts the pool or an open transaction
///
/// Returns `false` without writing when the enrollment already has an open
/// assignment (enforced by the `idx_assignments_one_open` index).
pub async fn insert<'e, E>(executor: E, assignment: &CourseAssignment) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let lesson_progress = serde_json::to_string(&assignment.lesson_progress)?;
    let final_quiz_result = serde_json::to_string(&assignment.final_quiz_result)?;

    let result = sqlx::query(
        r#"
        INSERT INTO course_assignments (
            id, employee_id, course_id, company_id, status, lesson_progress,
            final_quiz_result, interval_days, created_at, completed_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&assignment.id)
    .bind(&assignment.employee_id)
    .bind(&assignment.course_id)
    .bind(&assignment.company_id)
    .bind(assignment.status)
    .bind(lesson_progress)
    .bind(final_quiz_result)
    .bind(assignment.interval_days)
    .bind(assignment.created_at)
    .bind(assignment.completed_at)
    .bind(assignment.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Persist the progress fields after a state-machine transition
///
/// Compare-and-swap on `revision`: returns `false` when another writer
/// updated the row since `assignment` was loaded.
pub async fn save_progress(pool: &SqlitePool, assignment: &CourseAssignment) -> Result<bool> {
    let lesson_progress = serde_json::to_string(&assignment.lesson_progress)?;
    let final_quiz_result = serde_json::to_string(&assignment.final_quiz_result)?;

    let result = sqlx::query(
        r#"
        UPDATE course_assignments
        SET status = ?, lesson_progress = ?, final_quiz_result = ?,
            completed_at = ?, updated_at = ?, revision = revision + 1
        WHERE id = ? AND revision = ?
        "#,
    )
    .bind(assignment.status)
    .bind(lesson_progress)
    .bind(final_quiz_result)
    .bind(assignment.completed_at)
    .bind(assignment.updated_at)
    .bind(&assignment.id)
    .bind(assignment.revision)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<CourseAssignment>> {
    let assignments = sqlx::query_as::<_, CourseAssignment>(
        "SELECT * FROM course_assignments ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}

pub async fn list_for_company(pool: &SqlitePool, company_id: &str) -> Result<Vec<CourseAssignment>> {
    let assignments = sqlx::query_as::<_, CourseAssignment>(
        "SELECT * FROM course_assignments WHERE company_id = ? ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}

pub async fn list_for_employee(pool: &SqlitePool, employee_id: &str) -> Result<Vec<CourseAssignment>> {
    let assignments = sqlx::query_as::<_, CourseAssignment>(
        "SELECT * FROM course_assignments WHERE employee_id = ? ORDER BY created_at DESC",
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}

/// Every assignment for one (employee, course, company)
pub async fn list_for_enrollment(
    pool: &SqlitePool,
    employee_id: &str,
    course_id: &str,
    company_id: &str,
) -> Result<Vec<CourseAssignment>> {
    let assignments = sqlx::query_as::<_, CourseAssignment>(
        r#"
        SELECT * FROM course_assignments
        WHERE employee_id = ? AND course_id = ? AND company_id = ?
        "#,
    )
    .bind(employee_id)
    .bind(course_id)
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}

pub async fn employee_has_course(pool: &SqlitePool, employee_id: &str, course_id: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_assignments WHERE employee_id = ? AND course_id = ?",
    )
    .bind(employee_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn count_for_course(pool: &SqlitePool, course_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_assignments WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Completed assignments that carry a re-assignment interval
pub async fn list_recurring_completed(pool: &SqlitePool) -> Result<Vec<CourseAssignment>> {
    let assignments = sqlx::query_as::<_, CourseAssignment>(
        r#"
        SELECT * FROM course_assignments
        WHERE status = ? AND interval_days IS NOT NULL AND interval_days > 0
        "#,
    )
    .bind(AssignmentStatus::Completed)
    .fetch_all(pool)
    .await?;
    Ok(assignments)
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM course_assignments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}
