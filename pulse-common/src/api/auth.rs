//! Session tokens signed with the server secret
//!
//! # Token format
//!
//! `<user_id>.<expires_at_ms>.<signature>` where the signature is the
//! HMAC-SHA256 (64 hex chars) of the canonical claims JSON, keyed with the
//! session secret:
//!
//! 1. Build `{"exp": <expires_at_ms>, "sub": "<user_id>"}`
//! 2. Convert to canonical JSON (sorted keys, no whitespace)
//! 3. HMAC-SHA256 with the session secret, rendered as lowercase hex
//!
//! Verification decodes the hex and compares in constant time through
//! `Mac::verify_slice`.
//!
//! The secret lives in the `settings` table under `session_secret` unless
//! supplied by configuration. Invite and password-reset tokens are random
//! values whose SHA-256 digest is what gets stored.
//!
//! This module holds pure functions and database operations only; the axum
//! middleware lives in pulse-server.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

type HmacSha256 = Hmac<Sha256>;

// ========================================
// Error Types
// ========================================

/// Session token validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not `<user>.<expiry>.<signature>`
    Malformed,

    /// Token expired at the given epoch milliseconds
    Expired { expired_at: i64 },

    /// Signature does not match the claims
    InvalidSignature,

    /// Secret could not key the MAC
    InvalidSecret,

    /// Database error loading the secret
    DatabaseError(String),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed session token"),
            TokenError::Expired { expired_at } => {
                write!(f, "Session token expired at {}", expired_at)
            }
            TokenError::InvalidSignature => write!(f, "Invalid session token signature"),
            TokenError::InvalidSecret => write!(f, "Session secret cannot key HMAC-SHA256"),
            TokenError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for TokenError {}

/// Verified contents of a session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: String,
    pub expires_at_ms: i64,
}

// ========================================
// Secret Management
// ========================================

/// Load the session secret from database settings, generating one if absent
pub async fn load_session_secret(db: &SqlitePool) -> Result<String, TokenError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'session_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| TokenError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) if !value.is_empty() => Ok(value),
        _ => initialize_session_secret(db).await,
    }
}

/// Generate and store a new random session secret
pub async fn initialize_session_secret(db: &SqlitePool) -> Result<String, TokenError> {
    let secret = generate_token();

    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES ('session_secret', ?, CURRENT_TIMESTAMP)",
    )
    .bind(&secret)
    .execute(db)
    .await
    .map_err(|e| TokenError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Session Tokens
// ========================================

/// Issue a token for `user_id` valid for `ttl` from `now`
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use pulse_common::api::auth::{issue_session_token, verify_session_token};
///
/// let now = Utc::now();
/// let token = issue_session_token("user-1", Duration::hours(1), "secret", now).unwrap();
/// let claims = verify_session_token(&token, "secret", now).unwrap();
/// assert_eq!(claims.user_id, "user-1");
/// ```
pub fn issue_session_token(
    user_id: &str,
    ttl: Duration,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    let expires_at_ms = (now + ttl).timestamp_millis();
    let signature = claims_mac(user_id, expires_at_ms, secret)?.finalize().into_bytes();
    Ok(format!("{}.{}.{}", user_id, expires_at_ms, hex::encode(signature)))
}

/// Verify signature and expiry of a session token
pub fn verify_session_token(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<SessionClaims, TokenError> {
    let mut parts = token.splitn(3, '.');
    let (user_id, expiry, signature) = match (parts.next(), parts.next(), parts.next()) {
        (Some(u), Some(e), Some(s)) if !u.is_empty() && !s.is_empty() => (u, e, s),
        _ => return Err(TokenError::Malformed),
    };
    let expires_at_ms: i64 = expiry.parse().map_err(|_| TokenError::Malformed)?;

    let signature = hex::decode(signature).map_err(|_| TokenError::InvalidSignature)?;
    claims_mac(user_id, expires_at_ms, secret)?
        .verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    if now.timestamp_millis() >= expires_at_ms {
        return Err(TokenError::Expired {
            expired_at: expires_at_ms,
        });
    }

    Ok(SessionClaims {
        user_id: user_id.to_string(),
        expires_at_ms,
    })
}

/// MAC over the canonical claims, ready to finalize or verify
fn claims_mac(user_id: &str, expires_at_ms: i64, secret: &str) -> Result<HmacSha256, TokenError> {
    let claims = json!({ "sub": user_id, "exp": expires_at_ms });
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidSecret)?;
    mac.update(to_canonical_json(&claims).as_bytes());
    Ok(mac)
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// # Examples
///
/// ```
/// use pulse_common::api::auth::to_canonical_json;
/// use serde_json::json;
///
/// let canonical = to_canonical_json(&json!({"z": 3, "a": 1}));
/// assert_eq!(canonical, "{\"a\":1,\"z\":3}");
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("\"{}\":{}", k, to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

// ========================================
// One-time Tokens
// ========================================

/// 32 random bytes as 64 hex chars, for invite/reset links and secrets
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in place of a one-time token
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ========================================
// Tests
// ========================================
