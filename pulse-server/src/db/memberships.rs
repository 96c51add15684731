//! Company memberships
//!
//! A user may belong to several companies; `(user_id, company_id)` is unique.

use chrono::{DateTime, Utc};
use pulse_common::db::models::{Membership, MembershipStatus, Role, UserStatus};
use pulse_common::{uuid_utils, Result};
use serde::Serialize;
use sqlx::SqlitePool;

/// Employee listing row: user joined with the membership
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub department: Option<String>,
    pub user_status: UserStatus,
    pub membership_status: MembershipStatus,
    pub joined_at: DateTime<Utc>,
}

/// Create or update the membership of `user_id` in `company_id`
pub async fn upsert(
    pool: &SqlitePool,
    user_id: &str,
    company_id: &str,
    role: Role,
    status: MembershipStatus,
    now: DateTime<Utc>,
) -> Result<Membership> {
    sqlx::query(
        r#"
        INSERT INTO memberships (id, user_id, company_id, role, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, company_id) DO UPDATE SET
            role = excluded.role,
            status = excluded.status
        "#,
    )
    .bind(uuid_utils::new_id())
    .bind(user_id)
    .bind(company_id)
    .bind(role)
    .bind(status)
    .bind(now)
    .execute(pool)
    .await?;

    let membership = sqlx::query_as::<_, Membership>(
        "SELECT * FROM memberships WHERE user_id = ? AND company_id = ?",
    )
    .bind(user_id)
    .bind(company_id)
    .fetch_one(pool)
    .await?;

    Ok(membership)
}

pub async fn get(pool: &SqlitePool, user_id: &str, company_id: &str) -> Result<Option<Membership>> {
    let membership = sqlx::query_as::<_, Membership>(
        "SELECT * FROM memberships WHERE user_id = ? AND company_id = ?",
    )
    .bind(user_id)
    .bind(company_id)
    .fetch_optional(pool)
    .await?;
    Ok(membership)
}

pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Membership>> {
    let memberships = sqlx::query_as::<_, Membership>(
        "SELECT * FROM memberships WHERE user_id = ? ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(memberships)
}

/// Active memberships, oldest first
pub async fn active_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Membership>> {
    let memberships = sqlx::query_as::<_, Membership>(
        "SELECT * FROM memberships WHERE user_id = ? AND status = ? ORDER BY created_at",
    )
    .bind(user_id)
    .bind(MembershipStatus::Active)
    .fetch_all(pool)
    .await?;
    Ok(memberships)
}

pub async fn set_status(
    pool: &SqlitePool,
    user_id: &str,
    company_id: &str,
    status: MembershipStatus,
) -> Result<bool> {
    let updated = sqlx::query("UPDATE memberships SET status = ? WHERE user_id = ? AND company_id = ?")
        .bind(status)
        .bind(user_id)
        .bind(company_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

/// EMPLOYEE members of a company, excluding removed ones
pub async fn list_employees(pool: &SqlitePool, company_id: &str) -> Result<Vec<MemberRow>> {
    let rows = sqlx::query_as::<_, MemberRow>(
        r#"
        SELECT u.id, u.email, u.name, u.department,
               u.status AS user_status,
               m.status AS membership_status,
               m.created_at AS joined_at
        FROM memberships m
        JOIN users u ON u.id = m.user_id
        WHERE m.company_id = ? AND m.role = ? AND m.status != ?
        ORDER BY u.name
        "#,
    )
    .bind(company_id)
    .bind(Role::Employee)
    .bind(MembershipStatus::Removed)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Active EMPLOYEE member counts keyed by company id
pub async fn active_employee_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let counts = sqlx::query_as::<_, (String, i64)>(
        "SELECT company_id, COUNT(*) FROM memberships WHERE role = ? AND status = ? GROUP BY company_id",
    )
    .bind(Role::Employee)
    .bind(MembershipStatus::Active)
    .fetch_all(pool)
    .await?;
    Ok(counts)
}
