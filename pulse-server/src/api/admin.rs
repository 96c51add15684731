//! Platform administration endpoints (ADMIN only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use pulse_common::db::models::{
    Company, CompanyPlan, CompanyStatus, CourseStatus, Inquiry, InquiryStatus, Role, User,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::db;
use crate::db::memberships::MemberRow;
use crate::error::{ApiError, ApiResult};
use crate::invites::{self, InviteOutcome, InviteRequest};
use crate::reports::{self, CompanyRisk, CompletionStats};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    #[serde(default)]
    pub plan: Option<CompanyPlan>,
    #[serde(default)]
    pub status: Option<CompanyStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompanyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plan: Option<CompanyPlan>,
    #[serde(default)]
    pub status: Option<CompanyStatus>,
}

#[derive(Debug, Deserialize)]
pub struct InviteCompanyAccountRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInquiryRequest {
    pub status: InquiryStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    #[serde(flatten)]
    pub company: Company,
    pub employee_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: Company,
    pub employees: Vec<MemberRow>,
    pub stats: CompletionStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub total_companies: usize,
    pub active_companies: usize,
    pub total_users: usize,
    pub total_employees: usize,
    pub total_courses: usize,
    pub published_courses: usize,
    pub companies_at_risk: usize,
    #[serde(flatten)]
    pub assignments: CompletionStats,
}

/// GET /api/admin/companies
pub async fn list_companies(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<CompanySummary>>> {
    session.require_admin()?;
    let counts: HashMap<String, i64> = db::memberships::active_employee_counts(&state.db)
        .await?
        .into_iter()
        .collect();
    let companies = db::companies::list(&state.db)
        .await?
        .into_iter()
        .map(|company| CompanySummary {
            employee_count: counts.get(&company.id).copied().unwrap_or(0),
            company,
        })
        .collect();
    Ok(Json(companies))
}

/// POST /api/admin/companies
pub async fn create_company(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateCompanyRequest>,
) -> ApiResult<(StatusCode, Json<Company>)> {
    session.require_admin()?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Company name is required".to_string()));
    }

    let company = db::companies::insert(
        &state.db,
        &req.name,
        req.plan.unwrap_or(CompanyPlan::Trial),
        req.status.unwrap_or(CompanyStatus::Active),
        pulse_common::time::now(),
    )
    .await?;

    info!("Company {} ({}) created", company.name, company.id);
    Ok((StatusCode::CREATED, Json(company)))
}

async fn load_company(state: &AppState, id: &str) -> ApiResult<Company> {
    db::companies::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))
}

/// GET /api/admin/companies/:id
pub async fn get_company(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<CompanyDetail>> {
    session.require_admin()?;
    let company = load_company(&state, &id).await?;
    let employees = db::memberships::list_employees(&state.db, &id).await?;
    let assignments = db::assignments::list_for_company(&state.db, &id).await?;

    Ok(Json(CompanyDetail {
        company,
        employees,
        stats: CompletionStats::from_assignments(&assignments),
    }))
}

/// PUT /api/admin/companies/:id
pub async fn update_company(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCompanyRequest>,
) -> ApiResult<Json<Company>> {
    session.require_admin()?;
    let mut company = load_company(&state, &id).await?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("Company name cannot be empty".to_string()));
        }
        company.name = name.trim().to_string();
    }
    if let Some(plan) = req.plan {
        company.plan = plan;
    }
    if let Some(status) = req.status {
        company.status = status;
    }
    company.updated_at = pulse_common::time::now();
    db::companies::update(&state.db, &company).await?;

    info!("Company {} updated", company.id);
    Ok(Json(company))
}

/// DELETE /api/admin/companies/:id
///
/// Memberships, assignments and activity of the company are removed with it.
pub async fn delete_company(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    session.require_admin()?;
    if !db::companies::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Company"));
    }
    info!("Company {} deleted by {}", id, session.email);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/companies/:id/invite
///
/// Invites the COMPANY account user and records it as the company's owner.
pub async fn invite_company_account(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<InviteCompanyAccountRequest>,
) -> ApiResult<(StatusCode, Json<InviteOutcome>)> {
    session.require_admin()?;
    let company = load_company(&state, &id).await?;

    let outcome = invites::invite_member(
        &state,
        InviteRequest {
            company: &company,
            email: &req.email,
            name: &req.name,
            department: None,
            role: Role::Company,
            invited_by: &session.user_id,
        },
    )
    .await?;

    db::companies::set_company_account(&state.db, &company.id, &outcome.user.id, pulse_common::time::now())
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<User>>> {
    session.require_admin()?;
    Ok(Json(db::users::list(&state.db).await?))
}

/// GET /api/admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<AdminDashboard>> {
    session.require_admin()?;
    let now = pulse_common::time::now();

    let companies = db::companies::list(&state.db).await?;
    let users = db::users::list(&state.db).await?;
    let courses = db::courses::list(&state.db).await?;
    let assignments = db::assignments::list(&state.db).await?;
    let at_risk = reports::companies_at_risk(&state.db, now).await?;

    Ok(Json(AdminDashboard {
        total_companies: companies.len(),
        active_companies: companies
            .iter()
            .filter(|c| c.status == CompanyStatus::Active)
            .count(),
        total_users: users.len(),
        total_employees: users.iter().filter(|u| u.role == Role::Employee).count(),
        total_courses: courses.len(),
        published_courses: courses
            .iter()
            .filter(|c| c.status == CourseStatus::Published)
            .count(),
        companies_at_risk: at_risk.len(),
        assignments: CompletionStats::from_assignments(&assignments),
    }))
}

/// GET /api/admin/companies-at-risk
///
/// Companies with at least one at-risk or overdue employee, worst first.
pub async fn companies_at_risk(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<CompanyRisk>>> {
    session.require_admin()?;
    let report = reports::companies_at_risk(&state.db, pulse_common::time::now()).await?;
    Ok(Json(report))
}

/// GET /api/admin/inquiries
pub async fn list_inquiries(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<Inquiry>>> {
    session.require_admin()?;
    Ok(Json(db::inquiries::list(&state.db).await?))
}

/// PUT /api/admin/inquiries/:id
pub async fn update_inquiry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<UpdateInquiryRequest>,
) -> ApiResult<Json<Inquiry>> {
    session.require_admin()?;
    let inquiry = db::inquiries::set_status(&state.db, &id, req.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Inquiry"))?;
    Ok(Json(inquiry))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/companies", get(list_companies).post(create_company))
        .route(
            "/api/admin/companies/:id",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/api/admin/companies/:id/invite", post(invite_company_account))
        .route("/api/admin/companies-at-risk", get(companies_at_risk))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/inquiries", get(list_inquiries))
        .route("/api/admin/inquiries/:id", put(update_inquiry))
}
