//! Per-company audit trail

use chrono::{DateTime, Utc};
use pulse_common::db::models::Activity;
use pulse_common::{uuid_utils, Result};
use sqlx::SqlitePool;

pub async fn record(
    pool: &SqlitePool,
    company_id: &str,
    user_id: Option<&str>,
    action: &str,
    detail: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO activities (id, company_id, user_id, action, detail, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_utils::new_id())
    .bind(company_id)
    .bind(user_id)
    .bind(action)
    .bind(detail)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_recent(pool: &SqlitePool, company_id: &str, limit: i64) -> Result<Vec<Activity>> {
    let activities = sqlx::query_as::<_, Activity>(
        "SELECT * FROM activities WHERE company_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(company_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(activities)
}
