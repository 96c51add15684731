//! Inviting users into a company
//!
//! Shared by the admin (company account) and company (employee) invite
//! endpoints. New or still-invited users receive a single-use token by
//! email; users who already have an active account are added directly.

use pulse_common::db::models::{Company, Membership, MembershipStatus, Role, User, UserStatus};
use serde::Serialize;
use tracing::info;

use crate::db;
use crate::db::tokens::TokenPurpose;
use crate::db::users::NewUser;
use crate::error::{ApiError, ApiResult};
use crate::mail;
use crate::notify;
use crate::AppState;

#[derive(Debug)]
pub struct InviteRequest<'a> {
    pub company: &'a Company,
    pub email: &'a str,
    pub name: &'a str,
    pub department: Option<&'a str>,
    pub role: Role,
    /// User id of whoever sent the invite
    pub invited_by: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteOutcome {
    pub user: User,
    pub membership: Membership,
}

/// Minimal shape check; delivery is the real test
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}

pub async fn invite_member(state: &AppState, req: InviteRequest<'_>) -> ApiResult<InviteOutcome> {
    if !is_plausible_email(req.email) {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let now = pulse_common::time::now();
    let company = req.company;

    let existing = db::users::find_by_email(&state.db, req.email).await?;
    if let Some(user) = &existing {
        if user.role != req.role {
            return Err(ApiError::Conflict(format!(
                "{} is already registered with a different role",
                user.email
            )));
        }
        if user.status == UserStatus::Disabled {
            return Err(ApiError::Conflict(format!("{} is disabled", user.email)));
        }
        if let Some(membership) = db::memberships::get(&state.db, &user.id, &company.id).await? {
            if membership.status == MembershipStatus::Active {
                return Err(ApiError::Conflict(format!(
                    "{} is already a member of {}",
                    user.email, company.name
                )));
            }
        }
    }

    let outcome = match existing {
        Some(user) if user.status == UserStatus::Active => {
            let membership = db::memberships::upsert(
                &state.db,
                &user.id,
                &company.id,
                req.role,
                MembershipStatus::Active,
                now,
            )
            .await?;
            if user.active_company_id.is_none() {
                db::users::set_active_company(&state.db, &user.id, Some(&company.id), now).await?;
            }

            let message = format!("You now have access to {}", company.name);
            notify::notify_user(state, &user.id, "company.added", &message).await;
            mail::send_best_effort(
                state.mailer.as_ref(),
                mail::added_to_company(&user.email, &company.name, &state.config.public_base_url),
            )
            .await;

            InviteOutcome { user, membership }
        }
        existing => {
            let user = match existing {
                Some(user) => user,
                None => {
                    let new_user = NewUser {
                        email: req.email,
                        name: req.name,
                        role: req.role,
                        department: req.department,
                        status: UserStatus::Invited,
                        password_hash: String::new(),
                        active_company_id: Some(&company.id),
                    };
                    db::users::insert(&state.db, &new_user, now).await?
                }
            };
            let membership = db::memberships::upsert(
                &state.db,
                &user.id,
                &company.id,
                req.role,
                MembershipStatus::Invited,
                now,
            )
            .await?;

            let token = db::tokens::issue(&state.db, TokenPurpose::Invite, &user.id, Some(&company.id), now).await?;
            mail::send_best_effort(
                state.mailer.as_ref(),
                mail::invitation(&user.email, &company.name, &state.config.public_base_url, &token),
            )
            .await;

            InviteOutcome { user, membership }
        }
    };

    info!(
        "Invited {} to company {} as {}",
        outcome.user.email, company.id, req.role
    );
    notify::record_activity(
        state,
        &company.id,
        Some(req.invited_by),
        "member.invited",
        Some(&outcome.user.email),
    )
    .await;

    Ok(outcome)
}
