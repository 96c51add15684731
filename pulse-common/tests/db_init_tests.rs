//! Tests for database initialization and migrations
//!
//! - Database file and parent folders created on first run
//! - Reopening an existing database is harmless
//! - Schema version recorded after migrations
//! - JSON document columns round-trip through the models

use chrono::Utc;
use pulse_common::db::init::init_database;
use pulse_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use pulse_common::db::models::{
    AssignmentStatus, Course, CourseAssignment, CourseStatus, Lesson, LessonProgress,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("pulse.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("pulse.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();

    let version = get_schema_version(&pool).await.unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();

    for table in [
        "settings",
        "users",
        "memberships",
        "companies",
        "courses",
        "course_assignments",
        "inquiries",
        "notifications",
        "activities",
        "tokens",
        "outbound_emails",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_document_columns_round_trip() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO companies (id, name, plan, status, created_at, updated_at) VALUES ('c1', 'Acme', 'trial', 'active', ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO users (id, email, name, role, status, created_at, updated_at) VALUES ('u1', 'e@acme.test', 'Emp', 'EMPLOYEE', 'active', ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();

    let lessons = vec![Lesson {
        id: "l1".to_string(),
        title: "Intro".to_string(),
        content: "Welcome".to_string(),
        quiz: None,
    }];
    sqlx::query(
        "INSERT INTO courses (id, title, lessons, status, created_at, updated_at) VALUES ('k1', 'Safety', ?, 'published', ?, ?)",
    )
    .bind(serde_json::to_string(&lessons).unwrap())
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();

    let course: Course = sqlx::query_as("SELECT * FROM courses WHERE id = 'k1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(course.lessons, lessons);
    assert!(course.final_quiz.is_none());
    assert_eq!(course.status, CourseStatus::Published);

    let progress = vec![LessonProgress {
        lesson_id: "l1".to_string(),
        completed: true,
        completed_at: Some(now),
        quiz_result: None,
    }];
    sqlx::query(
        "INSERT INTO course_assignments (id, employee_id, course_id, company_id, status, lesson_progress, updated_at) VALUES ('a1', 'u1', 'k1', 'c1', 'in-progress', ?, ?)",
    )
    .bind(serde_json::to_string(&progress).unwrap())
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();

    let assignment: CourseAssignment =
        sqlx::query_as("SELECT * FROM course_assignments WHERE id = 'a1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::InProgress);
    assert_eq!(assignment.lesson_progress.len(), 1);
    assert!(assignment.final_quiz_result.is_none());
    // Legacy rows may lack a creation time
    assert!(assignment.created_at.is_none());
}

#[tokio::test]
async fn test_email_migration_lowercases_addresses() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("pulse.db");
    let pool = init_database(&db_path).await.unwrap();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO users (id, email, name, role, created_at, updated_at) VALUES ('u1', ' Mixed@Case.Test', 'M', 'EMPLOYEE', ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();

    // Force the email migration (and everything after it) to run again on next open
    sqlx::query("DELETE FROM schema_version WHERE version >= 2")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = 'u1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(email, "mixed@case.test");
}

#[tokio::test]
async fn test_one_open_assignment_per_enrollment() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("pulse.db")).await.unwrap();
    let now = Utc::now();

    sqlx::query("INSERT INTO companies (id, name, plan, status, created_at, updated_at) VALUES ('co', 'Co', 'trial', 'active', ?, ?)")
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO users (id, email, name, role, created_at, updated_at) VALUES ('u1', 'u1@co.test', 'U', 'EMPLOYEE', ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();

    let insert = |id: &'static str, status: &'static str| {
        sqlx::query(
            "INSERT INTO course_assignments (id, employee_id, course_id, company_id, status, updated_at) VALUES (?, 'u1', 'c1', 'co', ?, ?)",
        )
        .bind(id)
        .bind(status)
        .bind(now)
    };

    insert("a1", "completed").execute(&pool).await.unwrap();
    insert("a2", "not-started").execute(&pool).await.unwrap();
    // A second open row for the same enrollment is rejected
    assert!(insert("a3", "in-progress").execute(&pool).await.is_err());
    // Completed history is unrestricted
    insert("a4", "completed").execute(&pool).await.unwrap();

    let revision: i64 = sqlx::query_scalar("SELECT revision FROM course_assignments WHERE id = 'a2'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(revision, 0);
}
