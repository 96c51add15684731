//! Best-effort side effects
//!
//! Notifications and activity entries accompany a primary mutation but
//! never abort it: failures are logged and swallowed.

use chrono::Utc;
use tracing::warn;

use crate::db;
use crate::AppState;

pub async fn notify_user(state: &AppState, user_id: &str, kind: &str, message: &str) {
    if let Err(e) = db::notifications::create(&state.db, user_id, kind, message, Utc::now()).await {
        warn!("Failed to create {} notification for {}: {}", kind, user_id, e);
    }
}

pub async fn record_activity(
    state: &AppState,
    company_id: &str,
    user_id: Option<&str>,
    action: &str,
    detail: Option<&str>,
) {
    if let Err(e) = db::activities::record(&state.db, company_id, user_id, action, detail, Utc::now()).await {
        warn!("Failed to record activity {} for company {}: {}", action, company_id, e);
    }
}
