//! Public demo-request form

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db;
use crate::db::inquiries::NewInquiry;
use crate::error::{ApiError, ApiResult};
use crate::invites::is_plausible_email;
use crate::mail;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DemoRequest {
    pub name: String,
    pub email: String,
    pub company: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DemoResponse {
    pub id: String,
    pub message: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/demo-request
///
/// **Request:** `{"name", "email", "company", "phone"?, "message"?}`
/// **Response:** 201 `{"id": "...", "message": "..."}`
///
/// **Behavior:**
/// 1. Validate required fields
/// 2. Store the inquiry (authoritative)
/// 3. Email the sales inbox and the requester (best-effort)
pub async fn create_demo_request(
    State(state): State<AppState>,
    Json(req): Json<DemoRequest>,
) -> ApiResult<(StatusCode, Json<DemoResponse>)> {
    let name = req.name.trim();
    let company = req.company.trim();
    if name.is_empty() || company.is_empty() {
        return Err(ApiError::BadRequest("Name and company are required".to_string()));
    }
    if !is_plausible_email(&req.email) {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }

    let inquiry = db::inquiries::insert(
        &state.db,
        NewInquiry {
            name: name.to_string(),
            email: req.email.trim().to_string(),
            company: company.to_string(),
            phone: non_blank(req.phone),
            message: non_blank(req.message),
        },
        pulse_common::time::now(),
    )
    .await?;

    info!("Demo request {} from {} ({})", inquiry.id, inquiry.email, inquiry.company);

    match state.config.admin_notification_email.as_deref() {
        Some(admin_email) => {
            mail::send_best_effort(
                state.mailer.as_ref(),
                mail::demo_request_notice(
                    admin_email,
                    &inquiry.name,
                    &inquiry.email,
                    &inquiry.company,
                    inquiry.message.as_deref(),
                ),
            )
            .await;
        }
        None => debug!("No admin notification address configured; skipping notice"),
    }
    mail::send_best_effort(
        state.mailer.as_ref(),
        mail::demo_request_confirmation(&inquiry.email, &inquiry.name),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(DemoResponse {
            id: inquiry.id,
            message: "Thanks! We'll be in touch shortly.".to_string(),
        }),
    ))
}

pub fn demo_routes() -> Router<AppState> {
    Router::new().route("/api/demo-request", post(create_demo_request))
}
