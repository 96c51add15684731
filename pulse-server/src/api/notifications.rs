//! Notification inbox of the signed-in user

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use pulse_common::db::models::Notification;
use serde::Serialize;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub updated: u64,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<NotificationList>> {
    let notifications = db::notifications::list_for_user(&state.db, &session.user_id).await?;
    let unread = notifications.iter().filter(|n| !n.read).count();
    Ok(Json(NotificationList { notifications, unread }))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !db::notifications::mark_read(&state.db, &id, &session.user_id).await? {
        return Err(ApiError::not_found("Notification"));
    }
    Ok(Json(serde_json::json!({ "id": id, "read": true })))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<ReadAllResponse>> {
    let updated = db::notifications::mark_all_read(&state.db, &session.user_id).await?;
    Ok(Json(ReadAllResponse { updated }))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/:id/read", post(mark_read))
}
