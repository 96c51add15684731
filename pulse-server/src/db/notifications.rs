//! In-app notifications

use chrono::{DateTime, Utc};
use pulse_common::db::models::Notification;
use pulse_common::{uuid_utils, Result};
use sqlx::SqlitePool;

pub async fn create(
    pool: &SqlitePool,
    user_id: &str,
    kind: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Notification> {
    let notification = Notification {
        id: uuid_utils::new_id(),
        user_id: user_id.to_string(),
        kind: kind.to_string(),
        message: message.to_string(),
        read: false,
        created_at: now,
    };

    sqlx::query(
        "INSERT INTO notifications (id, user_id, kind, message, read, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.id)
    .bind(&notification.user_id)
    .bind(&notification.kind)
    .bind(&notification.message)
    .bind(notification.read)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    Ok(notification)
}

pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC LIMIT 100",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(notifications)
}

/// Mark one of the user's notifications read; false when it is not theirs
pub async fn mark_read(pool: &SqlitePool, id: &str, user_id: &str) -> Result<bool> {
    let updated = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let updated = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated)
}
