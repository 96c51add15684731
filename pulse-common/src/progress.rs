//! Assignment progress state machine
//!
//! Pure transitions over a [`CourseAssignment`] and its [`Course`]; callers
//! load both, apply a transition, and persist the assignment.
//!
//! - Lesson completion creates or replaces the lesson's progress entry, so
//!   repeating it never double-counts.
//! - An assignment completes once every lesson is done and, when the course
//!   has a final quiz, a passing final quiz result is stored.
//! - A completed assignment never leaves `completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{AssignmentStatus, Course, CourseAssignment, LessonProgress, Quiz, QuizResult};
use crate::risk::progress_percent;
use crate::{Error, Result};

/// Quiz answers as submitted by the learner
///
/// Either raw `answers` (graded against the quiz) or a precomputed `score`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub answers: Option<Vec<usize>>,
    /// Only consulted when there is no quiz definition to grade against
    #[serde(default)]
    pub passed: Option<bool>,
}

impl QuizSubmission {
    pub fn with_score(score: u32) -> Self {
        Self {
            score: Some(score),
            ..Self::default()
        }
    }

    /// Grade against `quiz` (when known) into a stored result
    pub fn grade(&self, quiz: Option<&Quiz>, now: DateTime<Utc>) -> Result<QuizResult> {
        let score = match (quiz, &self.answers, self.score) {
            (Some(quiz), Some(answers), _) => quiz.score_answers(answers),
            (_, _, Some(score)) => {
                if score > 100 {
                    return Err(Error::InvalidInput(format!(
                        "quiz score must be between 0 and 100, got {}",
                        score
                    )));
                }
                score
            }
            _ => {
                return Err(Error::InvalidInput(
                    "quiz result requires a score or answers".to_string(),
                ))
            }
        };

        let passed = match quiz {
            Some(quiz) => quiz.is_passing(score),
            None => self.passed.unwrap_or(score >= 70),
        };

        Ok(QuizResult {
            score,
            passed,
            submitted_at: now,
        })
    }
}

/// Response shape of the progress endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    /// Rounded completion percentage
    pub progress: u32,
    pub status: AssignmentStatus,
    pub completed_lessons: usize,
    pub total_lessons: usize,
}

/// Lessons of `course` that the assignment has completed
///
/// Progress entries for lessons no longer in the course are ignored.
pub fn completed_lesson_count(assignment: &CourseAssignment, course: &Course) -> usize {
    course
        .lessons
        .iter()
        .filter(|lesson| {
            assignment
                .lesson_progress
                .iter()
                .any(|p| p.lesson_id == lesson.id && p.completed)
        })
        .count()
}

pub fn all_lessons_complete(assignment: &CourseAssignment, course: &Course) -> bool {
    completed_lesson_count(assignment, course) == course.total_lessons()
}

pub fn summarize(assignment: &CourseAssignment, course: &Course) -> ProgressSummary {
    let completed_lessons = completed_lesson_count(assignment, course);
    let total_lessons = course.total_lessons();
    ProgressSummary {
        progress: progress_percent(completed_lessons, total_lessons).round() as u32,
        status: assignment.status,
        completed_lessons,
        total_lessons,
    }
}

/// `not-started` → `in-progress`; returns whether anything changed
pub fn start(assignment: &mut CourseAssignment, now: DateTime<Utc>) -> bool {
    if assignment.status != AssignmentStatus::NotStarted {
        return false;
    }
    assignment.status = AssignmentStatus::InProgress;
    assignment.updated_at = now;
    true
}

/// Mark `lesson_id` complete, optionally recording its quiz result
pub fn complete_lesson(
    assignment: &mut CourseAssignment,
    course: &Course,
    lesson_id: &str,
    submission: Option<&QuizSubmission>,
    now: DateTime<Utc>,
) -> Result<ProgressSummary> {
    let lesson = course
        .lesson(lesson_id)
        .ok_or_else(|| Error::NotFound(format!("lesson {} in course {}", lesson_id, course.id)))?;

    let quiz_result = submission
        .map(|s| s.grade(lesson.quiz.as_ref(), now))
        .transpose()?;

    match assignment
        .lesson_progress
        .iter_mut()
        .find(|p| p.lesson_id == lesson_id)
    {
        Some(entry) => {
            if !entry.completed {
                entry.completed = true;
                entry.completed_at = Some(now);
            }
            if quiz_result.is_some() {
                entry.quiz_result = quiz_result;
            }
        }
        None => assignment.lesson_progress.push(LessonProgress {
            lesson_id: lesson_id.to_string(),
            completed: true,
            completed_at: Some(now),
            quiz_result,
        }),
    }

    if assignment.status == AssignmentStatus::NotStarted {
        assignment.status = AssignmentStatus::InProgress;
    }
    refresh_completion(assignment, course, now);
    assignment.updated_at = now;

    Ok(summarize(assignment, course))
}

/// Result of a final quiz attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalQuizOutcome {
    #[serde(flatten)]
    pub summary: ProgressSummary,
    pub passed: bool,
}

/// Record a final quiz attempt; a pass completes the assignment
pub fn complete_final_quiz(
    assignment: &mut CourseAssignment,
    course: &Course,
    submission: &QuizSubmission,
    now: DateTime<Utc>,
) -> Result<FinalQuizOutcome> {
    let quiz = course
        .final_quiz
        .as_ref()
        .ok_or_else(|| Error::InvalidInput(format!("course {} has no final quiz", course.id)))?;

    // Already completed: keep the result that completed it
    if assignment.is_completed() {
        let passed = assignment
            .final_quiz_result
            .as_ref()
            .map(|r| r.passed)
            .unwrap_or(true);
        return Ok(FinalQuizOutcome {
            summary: summarize(assignment, course),
            passed,
        });
    }

    if !all_lessons_complete(assignment, course) {
        return Err(Error::InvalidState(
            "all lessons must be completed before the final quiz".to_string(),
        ));
    }

    let result = submission.grade(Some(quiz), now)?;
    let passed = result.passed;
    assignment.final_quiz_result = Some(result);
    assignment.status = AssignmentStatus::InProgress;
    refresh_completion(assignment, course, now);
    assignment.updated_at = now;

    Ok(FinalQuizOutcome {
        summary: summarize(assignment, course),
        passed,
    })
}

fn refresh_completion(assignment: &mut CourseAssignment, course: &Course, now: DateTime<Utc>) {
    if assignment.is_completed() {
        return;
    }
    let final_quiz_ok = match course.final_quiz {
        None => true,
        Some(_) => assignment
            .final_quiz_result
            .as_ref()
            .map(|r| r.passed)
            .unwrap_or(false),
    };
    if all_lessons_complete(assignment, course) && final_quiz_ok {
        assignment.status = AssignmentStatus::Completed;
        assignment.completed_at = assignment.completed_at.or(Some(now));
    }
}
