//! Single-use invite and password-reset tokens
//!
//! Only the SHA-256 digest of a token is stored; the raw value travels in
//! the emailed link.

use chrono::{DateTime, Duration, Utc};
use pulse_common::api::{digest_token, generate_token};
use pulse_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Invitations stay valid for a week
pub const INVITE_TTL_HOURS: i64 = 7 * 24;

/// Password reset links stay valid for an hour
pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum TokenPurpose {
    Invite,
    PasswordReset,
}

impl TokenPurpose {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenPurpose::Invite => Duration::hours(INVITE_TTL_HOURS),
            TokenPurpose::PasswordReset => Duration::hours(PASSWORD_RESET_TTL_HOURS),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRecord {
    pub token_hash: String,
    pub purpose: TokenPurpose,
    pub user_id: String,
    pub company_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Store a fresh token and return its raw value
pub async fn issue(
    pool: &SqlitePool,
    purpose: TokenPurpose,
    user_id: &str,
    company_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String> {
    let token = generate_token();

    sqlx::query(
        r#"
        INSERT INTO tokens (token_hash, purpose, user_id, company_id, expires_at, used_at, created_at)
        VALUES (?, ?, ?, ?, ?, NULL, ?)
        "#,
    )
    .bind(digest_token(&token))
    .bind(purpose)
    .bind(user_id)
    .bind(company_id)
    .bind(now + purpose.ttl())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Redeem a token: returns its record when unused, unexpired and of the
/// expected purpose, marking it used in the same step
pub async fn consume(
    pool: &SqlitePool,
    purpose: TokenPurpose,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<TokenRecord>> {
    let token_hash = digest_token(token.trim());

    let record = sqlx::query_as::<_, TokenRecord>(
        "SELECT * FROM tokens WHERE token_hash = ? AND purpose = ?",
    )
    .bind(&token_hash)
    .bind(purpose)
    .fetch_optional(pool)
    .await?;

    let record = match record {
        Some(r) if r.used_at.is_none() && r.expires_at > now => r,
        _ => return Ok(None),
    };

    // Guard against a concurrent redemption of the same token
    let claimed = sqlx::query("UPDATE tokens SET used_at = ? WHERE token_hash = ? AND used_at IS NULL")
        .bind(now)
        .bind(&token_hash)
        .execute(pool)
        .await?
        .rows_affected();

    if claimed == 0 {
        return Ok(None);
    }
    Ok(Some(record))
}
