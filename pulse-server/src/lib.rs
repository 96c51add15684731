//! pulse-server library
//!
//! HTTP API for the Pulse learning-management platform. Exposed as a
//! library so integration tests can drive the real router.

use axum::Router;
use pulse_common::config::ServerConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod invites;
pub mod mail;
pub mod notify;
pub mod reports;
pub mod scheduler;
pub mod session;

pub use crate::error::{ApiError, ApiResult};
pub use crate::session::Session;

use crate::mail::{Mailer, OutboxMailer};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved server configuration
    pub config: Arc<ServerConfig>,
    /// Key signing session tokens
    pub session_secret: Arc<str>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Create state with the outbox mailer
    pub fn new(db: SqlitePool, config: ServerConfig, session_secret: impl Into<Arc<str>>) -> Self {
        let mailer = Arc::new(OutboxMailer::new(db.clone()));
        Self {
            db,
            config: Arc::new(config),
            session_secret: session_secret.into(),
            mailer,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

/// Build application router
///
/// Health, login and the other account-recovery endpoints are public;
/// everything else sits behind the session middleware.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    // Protected routes (require a session)
    let protected = Router::new()
        .merge(api::account::session_routes())
        .merge(api::notifications::notification_routes())
        .merge(api::courses::course_routes())
        .merge(api::admin::admin_routes())
        .merge(api::company::company_routes())
        .merge(api::employee::employee_routes())
        .merge(api::assignments::assignment_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .merge(api::health_routes())
        .merge(api::account::public_routes())
        .merge(api::demo::demo_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
