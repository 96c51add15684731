//! User accounts

use chrono::{DateTime, Utc};
use pulse_common::config::BootstrapAdmin;
use pulse_common::db::models::{Role, User, UserStatus};
use pulse_common::{uuid_utils, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Emails are stored trimmed and lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub role: Role,
    pub department: Option<&'a str>,
    pub status: UserStatus,
    /// Empty until the invite is accepted
    pub password_hash: String,
    pub active_company_id: Option<&'a str>,
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

pub async fn insert(pool: &SqlitePool, new_user: &NewUser<'_>, now: DateTime<Utc>) -> Result<User> {
    let user = User {
        id: uuid_utils::new_id(),
        email: normalize_email(new_user.email),
        name: new_user.name.trim().to_string(),
        role: new_user.role,
        department: new_user.department.map(|d| d.trim().to_string()),
        status: new_user.status,
        active_company_id: new_user.active_company_id.map(str::to_string),
        password_hash: new_user.password_hash.clone(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, name, role, department, status,
            active_company_id, password_hash, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.role)
    .bind(&user.department)
    .bind(user.status)
    .bind(&user.active_company_id)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;

    Ok(user)
}

pub async fn set_password(pool: &SqlitePool, id: &str, password_hash: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Complete an invitation: set name and password, mark active
pub async fn activate(
    pool: &SqlitePool,
    id: &str,
    name: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET name = ?, password_hash = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(name.trim())
    .bind(password_hash)
    .bind(UserStatus::Active)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_active_company(
    pool: &SqlitePool,
    id: &str,
    company_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE users SET active_company_id = ?, updated_at = ? WHERE id = ?")
        .bind(company_id)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_by_role(pool: &SqlitePool, role: Role) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Create the configured ADMIN account unless an admin already exists
///
/// Returns true when an account was created.
pub async fn ensure_bootstrap_admin(
    pool: &SqlitePool,
    admin: &BootstrapAdmin,
    now: DateTime<Utc>,
) -> Result<bool> {
    if count_by_role(pool, Role::Admin).await? > 0 {
        return Ok(false);
    }

    let password_hash = pulse_common::api::hash_password(&admin.password)?;
    let new_user = NewUser {
        email: &admin.email,
        name: "Administrator",
        role: Role::Admin,
        department: None,
        status: UserStatus::Active,
        password_hash,
        active_company_id: None,
    };
    let user = insert(pool, &new_user, now).await?;
    info!("Created bootstrap admin account {}", user.email);
    Ok(true)
}
