//! Session authentication middleware
//!
//! Accepts the session token from `Authorization: Bearer <token>` or the
//! `pulse_session` cookie. A valid token for an active account yields a
//! [`Session`] request extension; anything else is 401.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use pulse_common::api::{verify_session_token, TokenError};
use pulse_common::db::models::UserStatus;
use tracing::debug;

use crate::db;
use crate::error::ApiError;
use crate::session::Session;
use crate::AppState;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "pulse_session";

/// Session token from the bearer header, falling back to the cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a freshly issued token
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// `Set-Cookie` value that clears the session
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Authentication middleware
///
/// Applied to protected routes only; `/health` and the login/recovery
/// endpoints do not use it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or_else(ApiError::unauthorized)?;

    let claims = verify_session_token(&token, &state.session_secret, pulse_common::time::now())
        .map_err(|e| {
            match &e {
                TokenError::Expired { .. } => debug!("Rejected expired session token"),
                other => debug!("Rejected session token: {}", other),
            }
            ApiError::unauthorized()
        })?;

    let user = db::users::get(&state.db, &claims.user_id)
        .await?
        .filter(|u| u.status == UserStatus::Active)
        .ok_or_else(ApiError::unauthorized)?;

    let session = Session::load(&state.db, &user).await?;
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
