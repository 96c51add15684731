//! Outbound mail
//!
//! Handlers talk to the [`Mailer`] trait. The shipped [`OutboxMailer`]
//! records each message in `outbound_emails` and logs it; a relay process
//! (or a future SMTP implementation) delivers from there.

use async_trait::async_trait;
use pulse_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// Mailer writing to the `outbound_emails` table
#[derive(Clone)]
pub struct OutboxMailer {
    db: SqlitePool,
}

impl OutboxMailer {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: Email) -> Result<()> {
        db::outbox::insert(
            &self.db,
            &email.to,
            &email.subject,
            &email.body,
            pulse_common::time::now(),
        )
        .await?;
        info!("Queued email to {}: {}", email.to, email.subject);
        Ok(())
    }
}

/// Send without failing the caller; errors are logged
pub async fn send_best_effort(mailer: &dyn Mailer, email: Email) {
    let to = email.to.clone();
    if let Err(e) = mailer.send(email).await {
        warn!("Failed to send email to {}: {}", to, e);
    }
}

// ========================================
// Message builders
// ========================================

pub fn invitation(to: &str, company_name: &str, base_url: &str, token: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You're invited to join {} on Pulse", company_name),
        body: format!(
            "You have been invited to join {} on Pulse.\n\n\
             Accept the invitation: {}/accept-invite?token={}\n\n\
             This link expires in 7 days.",
            company_name, base_url, token
        ),
    }
}

/// Sent when an already-active user is added to another company
pub fn added_to_company(to: &str, company_name: &str, base_url: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You've been added to {} on Pulse", company_name),
        body: format!(
            "Your Pulse account now has access to {}.\n\nSign in: {}/login",
            company_name, base_url
        ),
    }
}

pub fn password_reset(to: &str, base_url: &str, token: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Reset your Pulse password".to_string(),
        body: format!(
            "A password reset was requested for this account.\n\n\
             Choose a new password: {}/reset-password?token={}\n\n\
             This link expires in 1 hour. If you did not ask for it, ignore this email.",
            base_url, token
        ),
    }
}

pub fn demo_request_notice(to: &str, name: &str, email: &str, company: &str, message: Option<&str>) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("New demo request from {}", company),
        body: format!(
            "Name: {}\nEmail: {}\nCompany: {}\n\n{}",
            name,
            email,
            company,
            message.unwrap_or("")
        ),
    }
}

pub fn demo_request_confirmation(to: &str, name: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Thanks for your interest in Pulse".to_string(),
        body: format!(
            "Hi {},\n\nThanks for requesting a demo. Our team will contact you shortly.",
            name
        ),
    }
}
