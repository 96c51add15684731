//! Course catalogue

use pulse_common::db::models::{Course, CourseStatus};
use pulse_common::Result;
use sqlx::SqlitePool;

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Course>> {
    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(course)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY title")
        .fetch_all(pool)
        .await?;
    Ok(courses)
}

/// Published global courses plus the company's own published ones
pub async fn list_for_company(pool: &SqlitePool, company_id: &str) -> Result<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT * FROM courses
        WHERE status = ? AND (is_company_specific = 0 OR company_id = ?)
        ORDER BY title
        "#,
    )
    .bind(CourseStatus::Published)
    .bind(company_id)
    .fetch_all(pool)
    .await?;
    Ok(courses)
}

/// Courses the employee holds at least one assignment for
pub async fn list_for_employee(pool: &SqlitePool, employee_id: &str) -> Result<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT * FROM courses
        WHERE id IN (SELECT course_id FROM course_assignments WHERE employee_id = ?)
        ORDER BY title
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?;
    Ok(courses)
}

/// Insert or fully replace a course document
pub async fn save(pool: &SqlitePool, course: &Course) -> Result<()> {
    let lessons = serde_json::to_string(&course.lessons)?;
    let final_quiz = serde_json::to_string(&course.final_quiz)?;

    sqlx::query(
        r#"
        INSERT INTO courses (
            id, title, description, lessons, final_quiz, status,
            is_company_specific, company_id, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            lessons = excluded.lessons,
            final_quiz = excluded.final_quiz,
            status = excluded.status,
            is_company_specific = excluded.is_company_specific,
            company_id = excluded.company_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&course.id)
    .bind(&course.title)
    .bind(&course.description)
    .bind(lessons)
    .bind(final_quiz)
    .bind(course.status)
    .bind(course.is_company_specific)
    .bind(&course.company_id)
    .bind(&course.created_by)
    .bind(course.created_at)
    .bind(course.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}
