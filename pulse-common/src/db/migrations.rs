//! Database schema migrations
//!
//! Versioned migrations tracked in `schema_version`. Each migration is
//! idempotent and runs at most once per database.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?, CURRENT_TIMESTAMP)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = get_schema_version(pool).await?;

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    info!(
        "Migrating database schema from v{} to v{}",
        current, CURRENT_SCHEMA_VERSION
    );

    if current < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    if current < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
    }

    Ok(())
}

/// v1: baseline schema created by `create_schema`
async fn migrate_v1(_pool: &SqlitePool) -> Result<()> {
    info!("Migration v1: baseline schema");
    Ok(())
}

/// v2: emails are matched case-insensitively; normalize stored addresses
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let updated = sqlx::query("UPDATE users SET email = lower(trim(email)) WHERE email != lower(trim(email))")
        .execute(pool)
        .await?
        .rows_affected();

    info!("Migration v2: normalized {} user email(s)", updated);
    Ok(())
}

/// v3: concurrent writers on course assignments
///
/// - `revision` is bumped on every progress write; writers compare it to
///   detect a concurrent update.
/// - A partial unique index allows at most one open assignment per
///   (employee, course, company). Pre-existing duplicates are removed first,
///   keeping the oldest row.
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    let has_revision: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('course_assignments') WHERE name = 'revision'",
    )
    .fetch_one(pool)
    .await?;
    if has_revision == 0 {
        sqlx::query("ALTER TABLE course_assignments ADD COLUMN revision INTEGER NOT NULL DEFAULT 0")
            .execute(pool)
            .await?;
    }

    let removed = sqlx::query(
        r#"
        DELETE FROM course_assignments
        WHERE status != 'completed'
          AND rowid NOT IN (
            SELECT MIN(rowid) FROM course_assignments
            WHERE status != 'completed'
            GROUP BY employee_id, course_id, company_id
          )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();
    if removed > 0 {
        warn!("Migration v3: removed {} duplicate open assignment(s)", removed);
    }

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_one_open
        ON course_assignments(employee_id, course_id, company_id)
        WHERE status != 'completed'
        "#,
    )
    .execute(pool)
    .await?;

    info!("Migration v3: assignment revision column and open-enrollment index");
    Ok(())
}
