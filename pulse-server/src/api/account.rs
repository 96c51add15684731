//! Account endpoints: login, invitations, password management, profile

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use pulse_common::api::{hash_password, issue_session_token, validate_password_strength, verify_password, MessageResponse};
use pulse_common::db::models::{Membership, MembershipStatus, User, UserStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::{clear_session_cookie, session_cookie};
use crate::db;
use crate::db::tokens::TokenPurpose;
use crate::error::{ApiError, ApiResult};
use crate::mail;
use crate::notify;
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued session plus the account it belongs to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchCompanyRequest {
    pub company_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub active_company_id: Option<String>,
    pub memberships: Vec<Membership>,
}

/// Issue a token for `user` and attach it as a cookie
fn start_session(state: &AppState, user: User) -> ApiResult<impl IntoResponse> {
    let token = issue_session_token(
        &user.id,
        state.config.session_ttl,
        &state.session_secret,
        pulse_common::time::now(),
    )
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cookie = session_cookie(&token, state.config.session_ttl.num_seconds());
    Ok(([(header::SET_COOKIE, cookie)], Json(AuthResponse { token, user })))
}

/// POST /api/auth/login
///
/// **Request:** `{"email": "...", "password": "..."}`
/// **Response:** `{"token": "...", "user": {...}}` plus a `pulse_session` cookie
///
/// **Errors:**
/// - 401 Unauthorized: unknown email, wrong password, or account not active
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = db::users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }
    if user.status != UserStatus::Active {
        return Err(ApiError::Unauthorized("Account is not active".to_string()));
    }

    info!("User {} logged in", user.email);
    start_session(&state, user)
}

/// POST /api/auth/logout
///
/// Tokens are stateless; this only clears the cookie.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::new("Logged out")),
    )
}

/// POST /api/auth/forgot-password
///
/// Always answers 200 so the endpoint does not reveal which accounts exist.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let reply = MessageResponse::new("If the account exists, a reset link has been sent");

    let Some(user) = db::users::find_by_email(&state.db, &req.email).await? else {
        return Ok(Json(reply));
    };
    if user.status == UserStatus::Disabled {
        return Ok(Json(reply));
    }

    let token = db::tokens::issue(
        &state.db,
        TokenPurpose::PasswordReset,
        &user.id,
        None,
        pulse_common::time::now(),
    )
    .await?;
    mail::send_best_effort(
        state.mailer.as_ref(),
        mail::password_reset(&user.email, &state.config.public_base_url, &token),
    )
    .await;

    info!("Password reset requested for {}", user.email);
    Ok(Json(reply))
}

/// POST /api/auth/reset-password
///
/// **Errors:**
/// - 400 Bad Request: weak password, or invalid/expired/used token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // Check the password before burning the token
    validate_password_strength(&req.password)?;

    let now = pulse_common::time::now();
    let record = db::tokens::consume(&state.db, TokenPurpose::PasswordReset, &req.token, now)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".to_string()))?;

    let password_hash = hash_password(&req.password)?;
    db::users::set_password(&state.db, &record.user_id, &password_hash, now).await?;

    info!("Password reset completed for user {}", record.user_id);
    Ok(Json(MessageResponse::new("Password updated")))
}

/// POST /api/auth/accept-invite
///
/// Activates the invited account and its membership, then signs the user in.
pub async fn accept_invite(
    State(state): State<AppState>,
    Json(req): Json<AcceptInviteRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    validate_password_strength(&req.password)?;

    let now = pulse_common::time::now();
    let record = db::tokens::consume(&state.db, TokenPurpose::Invite, &req.token, now)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired invitation".to_string()))?;

    let user = db::users::get(&state.db, &record.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    if user.status == UserStatus::Disabled {
        return Err(ApiError::BadRequest("Account is disabled".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    db::users::activate(&state.db, &user.id, &req.name, &password_hash, now).await?;

    if let Some(company_id) = record.company_id.as_deref() {
        db::memberships::set_status(&state.db, &user.id, company_id, MembershipStatus::Active).await?;
        if user.active_company_id.is_none() {
            db::users::set_active_company(&state.db, &user.id, Some(company_id), now).await?;
        }
        notify::record_activity(&state, company_id, Some(&user.id), "member.joined", Some(&user.email)).await;

        // Let the company account know
        match db::companies::get(&state.db, company_id).await {
            Ok(Some(company)) => {
                if let Some(owner) = company.company_account.as_deref().filter(|o| *o != user.id) {
                    let message = format!("{} accepted the invitation", req.name.trim());
                    notify::notify_user(&state, owner, "member.joined", &message).await;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load company {} after invite: {}", company_id, e),
        }
    }

    let user = db::users::get(&state.db, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    info!("User {} accepted invitation", user.email);
    start_session(&state, user)
}

/// GET /api/me
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MeResponse>> {
    let user = db::users::get(&state.db, &session.user_id)
        .await?
        .ok_or_else(ApiError::unauthorized)?;
    let memberships = db::memberships::list_for_user(&state.db, &session.user_id).await?;

    Ok(Json(MeResponse {
        user,
        active_company_id: session.company_id,
        memberships,
    }))
}

/// POST /api/me/active-company
///
/// Switch which company a multi-company user acts for.
pub async fn switch_company(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SwitchCompanyRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let membership = db::memberships::get(&state.db, &session.user_id, &req.company_id).await?;
    if !matches!(membership, Some(m) if m.status == MembershipStatus::Active) {
        return Err(ApiError::Forbidden("Not an active member of that company".to_string()));
    }

    db::users::set_active_company(
        &state.db,
        &session.user_id,
        Some(&req.company_id),
        pulse_common::time::now(),
    )
    .await?;
    Ok(Json(MessageResponse::new("Active company updated")))
}

/// POST /api/auth/change-password
///
/// **Errors:**
/// - 400 Bad Request: current password wrong or new password too weak
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let user = db::users::get(&state.db, &session.user_id)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
    }
    validate_password_strength(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    db::users::set_password(&state.db, &user.id, &password_hash, pulse_common::time::now()).await?;

    info!("User {} changed password", user.email);
    Ok(Json(MessageResponse::new("Password updated")))
}

/// Login and account-recovery routes (no session required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/accept-invite", post(accept_invite))
}

/// Routes for the signed-in user
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/me/active-company", post(switch_company))
        .route("/api/auth/change-password", post(change_password))
}
