//! Outbound email records

use chrono::{DateTime, Utc};
use pulse_common::{uuid_utils, Result};
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEmail {
    pub id: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    pool: &SqlitePool,
    recipient: &str,
    subject: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO outbound_emails (id, recipient, subject, body, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid_utils::new_id())
    .bind(recipient)
    .bind(subject)
    .bind(body)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Messages sent to `recipient`, newest first
pub async fn list_for_recipient(pool: &SqlitePool, recipient: &str) -> Result<Vec<OutboundEmail>> {
    let emails = sqlx::query_as::<_, OutboundEmail>(
        "SELECT * FROM outbound_emails WHERE recipient = ? ORDER BY created_at DESC",
    )
    .bind(recipient)
    .fetch_all(pool)
    .await?;
    Ok(emails)
}
