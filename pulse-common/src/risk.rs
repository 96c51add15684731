//! Assignment risk classification
//!
//! The single implementation of the on-track / at-risk / overdue rule used by
//! every report (admin, company, CSV export).
//!
//! # Rules
//!
//! - Completed assignments are excluded from risk consideration.
//! - Assignments without a creation timestamp are excluded.
//! - Older than [`OVERDUE_AFTER_DAYS`] → `overdue`, regardless of progress.
//! - Older than [`AT_RISK_AFTER_DAYS`] with less than half of the lessons
//!   completed → `at-risk`.
//! - Everything else is `on-track`.
//!
//! Employees and companies take the worst level of what they contain;
//! `overdue` dominates `at-risk`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{AssignmentStatus, Course, CourseAssignment};
use crate::progress::completed_lesson_count;

/// Assignments older than this many days and not completed are overdue
pub const OVERDUE_AFTER_DAYS: i64 = 14;

/// Assignments older than this many days below half progress are at risk
pub const AT_RISK_AFTER_DAYS: i64 = 5;

/// Ordered so that `max()` yields the dominant level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    OnTrack,
    AtRisk,
    Overdue,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::OnTrack => "on-track",
            RiskLevel::AtRisk => "at-risk",
            RiskLevel::Overdue => "overdue",
        }
    }

    /// `at-risk` and `overdue` both count as "at risk" in reports
    pub fn is_at_risk(&self) -> bool {
        !matches!(self, RiskLevel::OnTrack)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the classifier looks at, detached from storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskInput {
    pub status: AssignmentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_lessons: usize,
    pub completed_lessons: usize,
}

impl RiskInput {
    pub fn from_assignment(assignment: &CourseAssignment, course: &Course) -> Self {
        Self {
            status: assignment.status,
            created_at: assignment.created_at,
            completed_at: assignment.completed_at,
            total_lessons: course.total_lessons(),
            completed_lessons: completed_lesson_count(assignment, course),
        }
    }
}

/// Lesson completion as a percentage; 0 when the course has no lessons
pub fn progress_percent(completed_lessons: usize, total_lessons: usize) -> f64 {
    if total_lessons == 0 {
        return 0.0;
    }
    completed_lessons.min(total_lessons) as f64 * 100.0 / total_lessons as f64
}

/// Classify one assignment at `now`
///
/// Returns `None` when the assignment is excluded from the risk scan
/// (completed, or no creation timestamp).
pub fn classify(input: &RiskInput, now: DateTime<Utc>) -> Option<RiskLevel> {
    if input.status == AssignmentStatus::Completed || input.completed_at.is_some() {
        return None;
    }
    let created_at = input.created_at?;
    let age = now - created_at;

    if age > Duration::days(OVERDUE_AFTER_DAYS) {
        return Some(RiskLevel::Overdue);
    }

    if age > Duration::days(AT_RISK_AFTER_DAYS)
        && progress_percent(input.completed_lessons, input.total_lessons) < 50.0
    {
        return Some(RiskLevel::AtRisk);
    }

    Some(RiskLevel::OnTrack)
}

/// Dominant level of a group (employee over assignments, company over employees)
///
/// An empty group is on track.
pub fn worst<I>(levels: I) -> RiskLevel
where
    I: IntoIterator<Item = RiskLevel>,
{
    levels.into_iter().max().unwrap_or(RiskLevel::OnTrack)
}

/// Per-level counts for a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskTally {
    pub on_track: usize,
    pub at_risk: usize,
    pub overdue: usize,
}

impl RiskTally {
    pub fn add(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::OnTrack => self.on_track += 1,
            RiskLevel::AtRisk => self.at_risk += 1,
            RiskLevel::Overdue => self.overdue += 1,
        }
    }

    pub fn flagged(&self) -> usize {
        self.at_risk + self.overdue
    }
}

impl FromIterator<RiskLevel> for RiskTally {
    fn from_iter<I: IntoIterator<Item = RiskLevel>>(levels: I) -> Self {
        let mut tally = Self::default();
        for level in levels {
            tally.add(level);
        }
        tally
    }
}
