//! Risk and completion reports
//!
//! Every report classifies assignments through
//! [`pulse_common::risk::classify`], computed fresh per request. Assignments
//! whose course or employee no longer exists are skipped.

use chrono::{DateTime, Utc};
use pulse_common::db::models::{AssignmentStatus, Company, Course, CourseAssignment, User};
use pulse_common::progress;
use pulse_common::risk::{self, RiskInput, RiskLevel, RiskTally};
use pulse_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

use crate::db;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRisk {
    pub assignment_id: String,
    pub course_id: String,
    pub course_title: String,
    pub status: AssignmentStatus,
    pub progress: u32,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub risk: RiskLevel,
    pub created_at: Option<DateTime<Utc>>,
    pub days_open: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRisk {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    /// Worst level over the employee's flagged assignments
    pub status: RiskLevel,
    pub assignments: Vec<AssignmentRisk>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRisk {
    pub id: String,
    pub name: String,
    pub status: RiskLevel,
    pub at_risk_employees: usize,
    pub overdue_employees: usize,
    pub employees: Vec<EmployeeRisk>,
}

/// Assignment counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    pub total_assignments: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    /// Percentage of assignments completed, one decimal
    pub completion_rate: f64,
}

impl CompletionStats {
    pub fn from_assignments<'a, I>(assignments: I) -> Self
    where
        I: IntoIterator<Item = &'a CourseAssignment>,
    {
        let mut stats = Self::default();
        for assignment in assignments {
            stats.total_assignments += 1;
            match assignment.status {
                AssignmentStatus::Completed => stats.completed += 1,
                AssignmentStatus::InProgress => stats.in_progress += 1,
                AssignmentStatus::NotStarted => stats.not_started += 1,
            }
        }
        if stats.total_assignments > 0 {
            let rate = stats.completed as f64 * 100.0 / stats.total_assignments as f64;
            stats.completion_rate = (rate * 10.0).round() / 10.0;
        }
        stats
    }
}

/// Flagged (at-risk or overdue) assignments grouped by employee
///
/// Employees are ordered overdue first, then at-risk, then by name.
pub fn employee_risks(
    assignments: &[CourseAssignment],
    courses: &HashMap<String, Course>,
    users: &HashMap<String, User>,
    now: DateTime<Utc>,
) -> Vec<EmployeeRisk> {
    let mut by_employee: HashMap<&str, Vec<AssignmentRisk>> = HashMap::new();

    for assignment in assignments {
        let Some(course) = courses.get(&assignment.course_id) else {
            debug!(
                "Skipping assignment {}: course {} not found",
                assignment.id, assignment.course_id
            );
            continue;
        };
        if !users.contains_key(&assignment.employee_id) {
            debug!(
                "Skipping assignment {}: employee {} not found",
                assignment.id, assignment.employee_id
            );
            continue;
        }

        let level = match risk::classify(&RiskInput::from_assignment(assignment, course), now) {
            Some(level) if level.is_at_risk() => level,
            _ => continue,
        };

        let summary = progress::summarize(assignment, course);
        by_employee
            .entry(assignment.employee_id.as_str())
            .or_default()
            .push(AssignmentRisk {
                assignment_id: assignment.id.clone(),
                course_id: course.id.clone(),
                course_title: course.title.clone(),
                status: assignment.status,
                progress: summary.progress,
                completed_lessons: summary.completed_lessons,
                total_lessons: summary.total_lessons,
                risk: level,
                created_at: assignment.created_at,
                days_open: assignment
                    .created_at
                    .map(|c| pulse_common::time::whole_days_since(c, now))
                    .unwrap_or(0),
            });
    }

    let mut employees: Vec<EmployeeRisk> = by_employee
        .into_iter()
        .filter_map(|(employee_id, assignments)| {
            let user = users.get(employee_id)?;
            Some(EmployeeRisk {
                id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                department: user.department.clone(),
                status: risk::worst(assignments.iter().map(|a| a.risk)),
                assignments,
            })
        })
        .collect();

    employees.sort_by(|a, b| b.status.cmp(&a.status).then_with(|| a.name.cmp(&b.name)));
    employees
}

/// Roll employee risks up into one company entry; `None` when nobody is flagged
/// Employees per worst level
pub fn employee_tally(employees: &[EmployeeRisk]) -> RiskTally {
    employees.iter().map(|e| e.status).collect()
}

pub fn company_risk(company: &Company, employees: Vec<EmployeeRisk>) -> Option<CompanyRisk> {
    if employees.is_empty() {
        return None;
    }
    let tally = employee_tally(&employees);
    Some(CompanyRisk {
        id: company.id.clone(),
        name: company.name.clone(),
        status: risk::worst(employees.iter().map(|e| e.status)),
        at_risk_employees: tally.at_risk,
        overdue_employees: tally.overdue,
        employees,
    })
}

async fn course_map(pool: &SqlitePool) -> Result<HashMap<String, Course>> {
    Ok(db::courses::list(pool)
        .await?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect())
}

async fn user_map(pool: &SqlitePool) -> Result<HashMap<String, User>> {
    Ok(db::users::list(pool)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect())
}

/// Flagged employees of one company
pub async fn company_employees_at_risk(
    pool: &SqlitePool,
    company_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<EmployeeRisk>> {
    let assignments = db::assignments::list_for_company(pool, company_id).await?;
    let courses = course_map(pool).await?;
    let users = user_map(pool).await?;
    Ok(employee_risks(&assignments, &courses, &users, now))
}

/// Companies with at least one flagged employee, worst first
pub async fn companies_at_risk(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<CompanyRisk>> {
    let companies = db::companies::list(pool).await?;
    let courses = course_map(pool).await?;
    let users = user_map(pool).await?;

    let mut by_company: HashMap<String, Vec<CourseAssignment>> = HashMap::new();
    for assignment in db::assignments::list(pool).await? {
        by_company
            .entry(assignment.company_id.clone())
            .or_default()
            .push(assignment);
    }

    let mut flagged: Vec<CompanyRisk> = companies
        .iter()
        .filter_map(|company| {
            let assignments = by_company.get(&company.id)?;
            company_risk(company, employee_risks(assignments, &courses, &users, now))
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.status
            .cmp(&a.status)
            .then_with(|| (b.at_risk_employees + b.overdue_employees).cmp(&(a.at_risk_employees + a.overdue_employees)))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(flagged)
}

// ========================================
// CSV export
// ========================================

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "Employee")]
    employee: &'a str,
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Department")]
    department: &'a str,
    #[serde(rename = "Course")]
    course: &'a str,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Progress (%)")]
    progress: u32,
    #[serde(rename = "Lessons Completed")]
    completed_lessons: usize,
    #[serde(rename = "Total Lessons")]
    total_lessons: usize,
    #[serde(rename = "Assigned")]
    assigned: String,
    #[serde(rename = "Completed")]
    completed: String,
    #[serde(rename = "Risk")]
    risk: &'static str,
}

/// Progress report for every assignment of a company, as CSV text
pub fn render_progress_csv(
    assignments: &[CourseAssignment],
    courses: &HashMap<String, Course>,
    users: &HashMap<String, User>,
    now: DateTime<Utc>,
) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for assignment in assignments {
        let (Some(course), Some(user)) = (
            courses.get(&assignment.course_id),
            users.get(&assignment.employee_id),
        ) else {
            debug!("Skipping assignment {} in export: dangling reference", assignment.id);
            continue;
        };

        let summary = progress::summarize(assignment, course);
        let risk = match risk::classify(&RiskInput::from_assignment(assignment, course), now) {
            Some(level) => level.as_str(),
            None if assignment.is_completed() => "completed",
            None => "unknown",
        };

        writer
            .serialize(ReportRow {
                employee: &user.name,
                email: &user.email,
                department: user.department.as_deref().unwrap_or(""),
                course: &course.title,
                status: assignment.status.as_str(),
                progress: summary.progress,
                completed_lessons: summary.completed_lessons,
                total_lessons: summary.total_lessons,
                assigned: format_date(assignment.created_at),
                completed: format_date(assignment.completed_at),
                risk,
            })
            .map_err(|e| Error::Internal(format!("CSV write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV not UTF-8: {}", e)))
}

pub async fn company_progress_csv(pool: &SqlitePool, company_id: &str, now: DateTime<Utc>) -> Result<String> {
    let assignments = db::assignments::list_for_company(pool, company_id).await?;
    let courses = course_map(pool).await?;
    let users = user_map(pool).await?;
    render_progress_csv(&assignments, &courses, &users, now)
}

fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
