//! Company endpoints (COMPANY role, scoped to the active company)

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use pulse_common::db::models::{
    Activity, CourseAssignment, CourseStatus, MembershipStatus, Role,
};
use pulse_common::progress;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::db;
use crate::db::memberships::MemberRow;
use crate::error::{ApiError, ApiResult};
use crate::invites::{self, InviteOutcome, InviteRequest};
use crate::notify;
use crate::reports::{self, CompletionStats, EmployeeRisk};
use crate::session::Session;
use crate::AppState;

/// Activity entries returned by the feed
const ACTIVITY_FEED_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct InviteEmployeeRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentsRequest {
    pub course_id: String,
    pub employee_ids: Vec<String>,
    #[serde(default)]
    pub interval_days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentsResponse {
    pub created: Vec<CourseAssignment>,
    /// Employees that already hold an open assignment for the course
    pub skipped: Vec<String>,
}

/// Assignment with the names a listing needs
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: CourseAssignment,
    pub course_title: Option<String>,
    pub employee_name: Option<String>,
    pub progress: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDashboard {
    pub total_employees: usize,
    pub at_risk_employees: usize,
    pub overdue_employees: usize,
    #[serde(flatten)]
    pub assignments: CompletionStats,
}

/// GET /api/company/employees
pub async fn list_employees(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<MemberRow>>> {
    let company_id = session.require_company()?;
    Ok(Json(db::memberships::list_employees(&state.db, company_id).await?))
}

/// POST /api/company/employees/invite
pub async fn invite_employee(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<InviteEmployeeRequest>,
) -> ApiResult<(StatusCode, Json<InviteOutcome>)> {
    let company_id = session.require_company()?;
    let company = db::companies::get(&state.db, company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;

    let outcome = invites::invite_member(
        &state,
        InviteRequest {
            company: &company,
            email: &req.email,
            name: &req.name,
            department: req.department.as_deref(),
            role: Role::Employee,
            invited_by: &session.user_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// DELETE /api/company/employees/:id
///
/// Marks the membership removed; the account and its history are kept.
pub async fn remove_employee(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(employee_id): Path<String>,
) -> ApiResult<StatusCode> {
    let company_id = session.require_company()?;
    let membership = db::memberships::get(&state.db, &employee_id, company_id)
        .await?
        .filter(|m| m.role == Role::Employee && m.status != MembershipStatus::Removed)
        .ok_or_else(|| ApiError::not_found("Employee"))?;

    db::memberships::set_status(&state.db, &membership.user_id, company_id, MembershipStatus::Removed)
        .await?;

    info!("Employee {} removed from company {}", employee_id, company_id);
    notify::record_activity(&state, company_id, Some(&session.user_id), "member.removed", Some(&employee_id))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/company/employees-at-risk
///
/// Employees with at least one at-risk or overdue assignment, worst first.
pub async fn employees_at_risk(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<EmployeeRisk>>> {
    let company_id = session.require_company()?;
    let report =
        reports::company_employees_at_risk(&state.db, company_id, pulse_common::time::now()).await?;
    Ok(Json(report))
}

/// GET /api/company/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<CompanyDashboard>> {
    let company_id = session.require_company()?;
    let now = pulse_common::time::now();

    let employees = db::memberships::list_employees(&state.db, company_id).await?;
    let assignments = db::assignments::list_for_company(&state.db, company_id).await?;
    let at_risk = reports::company_employees_at_risk(&state.db, company_id, now).await?;
    let tally = reports::employee_tally(&at_risk);

    Ok(Json(CompanyDashboard {
        total_employees: employees
            .iter()
            .filter(|e| e.membership_status == MembershipStatus::Active)
            .count(),
        at_risk_employees: tally.at_risk,
        overdue_employees: tally.overdue,
        assignments: CompletionStats::from_assignments(&assignments),
    }))
}

/// GET /api/company/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<AssignmentView>>> {
    let company_id = session.require_company()?;
    let assignments = db::assignments::list_for_company(&state.db, company_id).await?;
    let courses = db::courses::list(&state.db).await?;
    let employees = db::memberships::list_employees(&state.db, company_id).await?;

    let views = assignments
        .into_iter()
        .map(|assignment| {
            let course = courses.iter().find(|c| c.id == assignment.course_id);
            AssignmentView {
                course_title: course.map(|c| c.title.clone()),
                employee_name: employees
                    .iter()
                    .find(|e| e.id == assignment.employee_id)
                    .map(|e| e.name.clone()),
                progress: course
                    .map(|c| progress::summarize(&assignment, c).progress)
                    .unwrap_or(0),
                assignment,
            }
        })
        .collect();
    Ok(Json(views))
}

/// POST /api/company/assignments
///
/// **Request:** `{"courseId": "...", "employeeIds": [...], "intervalDays"?: n}`
/// **Response:** 201 `{"created": [...], "skipped": [...]}`
///
/// All new assignments are written in one transaction. An employee whose
/// open assignment already exists (or is inserted concurrently) is skipped.
///
/// **Errors:**
/// - 400 Bad Request: no employees, bad interval, or an id that is not an active employee
/// - 404 Not Found: course unknown or not available to the company
pub async fn create_assignments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateAssignmentsRequest>,
) -> ApiResult<(StatusCode, Json<CreateAssignmentsResponse>)> {
    let company_id = session.require_company()?;
    if req.employee_ids.is_empty() {
        return Err(ApiError::BadRequest("employeeIds must not be empty".to_string()));
    }
    if matches!(req.interval_days, Some(days) if days <= 0) {
        return Err(ApiError::BadRequest("intervalDays must be positive".to_string()));
    }

    let course = db::courses::get(&state.db, &req.course_id)
        .await?
        .filter(|c| {
            c.status == CourseStatus::Published
                && (!c.is_company_specific || c.company_id.as_deref() == Some(company_id))
        })
        .ok_or_else(|| ApiError::not_found("Course"))?;

    let active: HashSet<String> = db::memberships::list_employees(&state.db, company_id)
        .await?
        .into_iter()
        .filter(|e| e.membership_status == MembershipStatus::Active)
        .map(|e| e.id)
        .collect();

    let mut requested: Vec<&str> = Vec::new();
    for id in &req.employee_ids {
        if !active.contains(id) {
            return Err(ApiError::BadRequest(format!("{} is not an active employee", id)));
        }
        if !requested.contains(&id.as_str()) {
            requested.push(id.as_str());
        }
    }

    let now = pulse_common::time::now();
    let mut created = Vec::new();
    let mut skipped = Vec::new();
    let mut tx = state.db.begin().await?;
    for employee_id in requested {
        let assignment = CourseAssignment::new(employee_id, &course.id, company_id, req.interval_days, now);
        if db::assignments::insert(&mut *tx, &assignment).await? {
            created.push(assignment);
        } else {
            skipped.push(employee_id.to_string());
        }
    }
    tx.commit().await?;

    info!(
        "Assigned course {} to {} employee(s) in company {} ({} skipped)",
        course.id,
        created.len(),
        company_id,
        skipped.len()
    );

    let message = format!("You have been assigned \"{}\"", course.title);
    for assignment in &created {
        notify::notify_user(&state, &assignment.employee_id, "assignment.created", &message).await;
    }
    if !created.is_empty() {
        notify::record_activity(
            &state,
            company_id,
            Some(&session.user_id),
            "assignment.created",
            Some(&format!("{} x{}", course.title, created.len())),
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(CreateAssignmentsResponse { created, skipped })))
}

/// DELETE /api/company/assignments/:id
pub async fn delete_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let company_id = session.require_company()?;
    let assignment = db::assignments::get(&state.db, &id)
        .await?
        .filter(|a| a.company_id == company_id)
        .ok_or_else(|| ApiError::not_found("Assignment"))?;

    db::assignments::delete(&state.db, &assignment.id).await?;
    info!("Assignment {} deleted from company {}", id, company_id);
    notify::record_activity(&state, company_id, Some(&session.user_id), "assignment.deleted", Some(&id))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/company/reports/export
///
/// CSV progress report, one row per assignment, with the risk column.
pub async fn export_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    let company_id = session.require_company()?;
    let csv = reports::company_progress_csv(&state.db, company_id, pulse_common::time::now()).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"progress-report.csv\"".to_string(),
            ),
        ],
        csv,
    ))
}

/// GET /api/company/activities
pub async fn list_activities(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<Activity>>> {
    let company_id = session.require_company()?;
    Ok(Json(
        db::activities::list_recent(&state.db, company_id, ACTIVITY_FEED_LIMIT).await?,
    ))
}

pub fn company_routes() -> Router<AppState> {
    Router::new()
        .route("/api/company/employees", get(list_employees))
        .route("/api/company/employees/invite", post(invite_employee))
        .route("/api/company/employees/:id", delete(remove_employee))
        .route("/api/company/employees-at-risk", get(employees_at_risk))
        .route("/api/company/dashboard", get(dashboard))
        .route(
            "/api/company/assignments",
            get(list_assignments).post(create_assignments),
        )
        .route("/api/company/assignments/:id", delete(delete_assignment))
        .route("/api/company/reports/export", get(export_report))
        .route("/api/company/activities", get(list_activities))
}
