//! Authenticated request context
//!
//! The auth middleware builds a [`Session`] once per request and stores it
//! as a request extension; handlers take it with `Extension<Session>` and
//! pass the company scope explicitly to repositories.

use pulse_common::db::models::{Membership, Role, User};
use pulse_common::Result;
use sqlx::SqlitePool;

use crate::db;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub email: String,
    pub name: String,
    /// Company the user currently acts for (None for admins and users
    /// without an active membership)
    pub company_id: Option<String>,
}

impl Session {
    /// Build the session for an authenticated user
    pub async fn load(pool: &SqlitePool, user: &User) -> Result<Self> {
        let company_id = match user.role {
            Role::Admin => None,
            Role::Company | Role::Employee => {
                let memberships = db::memberships::active_for_user(pool, &user.id).await?;
                select_company(user.active_company_id.as_deref(), &memberships)
            }
        };

        Ok(Self {
            user_id: user.id.clone(),
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
            company_id,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        self.require_role(Role::Admin)
    }

    pub fn require_employee(&self) -> ApiResult<()> {
        self.require_role(Role::Employee)
    }

    /// Company id for a COMPANY user; 403 for any other role or when the
    /// account has no active company
    pub fn require_company(&self) -> ApiResult<&str> {
        self.require_role(Role::Company)?;
        self.company_id
            .as_deref()
            .ok_or_else(|| ApiError::Forbidden("No active company for this account".to_string()))
    }

    fn require_role(&self, role: Role) -> ApiResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

/// The legacy `activeCompanyId` wins when it names an active membership,
/// otherwise the oldest active membership
pub fn select_company(preferred: Option<&str>, active: &[Membership]) -> Option<String> {
    preferred
        .and_then(|id| active.iter().find(|m| m.company_id == id))
        .or_else(|| active.first())
        .map(|m| m.company_id.clone())
}
