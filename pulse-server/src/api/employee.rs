//! Employee endpoints: own assignments and dashboard

use axum::{extract::State, routing::get, Extension, Json, Router};
use pulse_common::db::models::{AssignmentStatus, CourseAssignment};
use pulse_common::progress::{self, ProgressSummary};
use serde::Serialize;
use std::collections::HashMap;

use crate::db;
use crate::error::ApiResult;
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeAssignment {
    #[serde(flatten)]
    pub assignment: CourseAssignment,
    pub course_title: String,
    pub course_description: Option<String>,
    pub summary: ProgressSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDashboard {
    pub total_assignments: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    /// Mean of the assignments' progress percentages
    pub average_progress: u32,
}

/// The caller's assignments joined with their courses
///
/// Assignments whose course has been deleted are left out.
async fn load_own_assignments(state: &AppState, employee_id: &str) -> ApiResult<Vec<EmployeeAssignment>> {
    let assignments = db::assignments::list_for_employee(&state.db, employee_id).await?;
    let courses: HashMap<String, _> = db::courses::list_for_employee(&state.db, employee_id)
        .await?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

    Ok(assignments
        .into_iter()
        .filter_map(|assignment| {
            let course = courses.get(&assignment.course_id)?;
            Some(EmployeeAssignment {
                course_title: course.title.clone(),
                course_description: course.description.clone(),
                summary: progress::summarize(&assignment, course),
                assignment,
            })
        })
        .collect())
}

/// GET /api/employee/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<EmployeeAssignment>>> {
    session.require_employee()?;
    Ok(Json(load_own_assignments(&state, &session.user_id).await?))
}

/// GET /api/employee/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<EmployeeDashboard>> {
    session.require_employee()?;
    let assignments = load_own_assignments(&state, &session.user_id).await?;
    Ok(Json(dashboard_from(&assignments)))
}

fn dashboard_from(assignments: &[EmployeeAssignment]) -> EmployeeDashboard {
    let count = |status: AssignmentStatus| {
        assignments
            .iter()
            .filter(|a| a.assignment.status == status)
            .count()
    };
    let average_progress = if assignments.is_empty() {
        0
    } else {
        let sum: u32 = assignments.iter().map(|a| a.summary.progress).sum();
        (f64::from(sum) / assignments.len() as f64).round() as u32
    };

    EmployeeDashboard {
        total_assignments: assignments.len(),
        completed: count(AssignmentStatus::Completed),
        in_progress: count(AssignmentStatus::InProgress),
        not_started: count(AssignmentStatus::NotStarted),
        average_progress,
    }
}

pub fn employee_routes() -> Router<AppState> {
    Router::new()
        .route("/api/employee/assignments", get(list_assignments))
        .route("/api/employee/dashboard", get(dashboard))
}
