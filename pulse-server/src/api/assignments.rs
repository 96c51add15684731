//! Assignment detail and progress endpoints
//!
//! Reads are open to the owning employee, COMPANY users of the owning
//! company and admins. Progress writes are owner-only.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use pulse_common::db::models::{Course, CourseAssignment, Role};
use pulse_common::progress::{self, FinalQuizOutcome, ProgressSummary, QuizSubmission};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::notify;
use crate::session::Session;
use crate::AppState;

/// Attempts at a progress write before answering 409
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompleteRequest {
    pub lesson_id: String,
    #[serde(default)]
    pub quiz_result: Option<QuizSubmission>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentDetail {
    pub assignment: CourseAssignment,
    pub course: Course,
    pub summary: ProgressSummary,
}

/// Whether `session` may read `assignment`
pub fn can_read(session: &Session, assignment: &CourseAssignment) -> bool {
    match session.role {
        Role::Admin => true,
        Role::Company => session.company_id.as_deref() == Some(assignment.company_id.as_str()),
        Role::Employee => session.user_id == assignment.employee_id,
    }
}

async fn load_assignment(state: &AppState, id: &str) -> ApiResult<CourseAssignment> {
    db::assignments::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment"))
}

async fn load_course(state: &AppState, assignment: &CourseAssignment) -> ApiResult<Course> {
    db::courses::get(&state.db, &assignment.course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))
}

/// Assignment and course for a progress write by its owner
async fn load_owned(
    state: &AppState,
    session: &Session,
    id: &str,
) -> ApiResult<(CourseAssignment, Course)> {
    session.require_employee()?;
    let assignment = load_assignment(state, id).await?;
    if assignment.employee_id != session.user_id {
        return Err(ApiError::Forbidden("Not your assignment".to_string()));
    }
    let course = load_course(state, &assignment).await?;
    Ok((assignment, course))
}

/// The assignment changed under us on every attempt
fn write_conflict(id: &str) -> ApiError {
    warn!("Assignment {} still contended after {} attempts", id, MAX_WRITE_ATTEMPTS);
    ApiError::Conflict("Assignment was updated concurrently, retry the request".to_string())
}

/// Side effects of a transition into `completed`
async fn on_completed(state: &AppState, assignment: &CourseAssignment, course: &Course) {
    info!(
        "Assignment {} completed (employee {}, course {})",
        assignment.id, assignment.employee_id, course.id
    );
    notify::record_activity(
        state,
        &assignment.company_id,
        Some(&assignment.employee_id),
        "assignment.completed",
        Some(&course.title),
    )
    .await;

    let owner = match db::companies::get(&state.db, &assignment.company_id).await {
        Ok(company) => company.and_then(|c| c.company_account),
        Err(e) => {
            warn!("Failed to load company {}: {}", assignment.company_id, e);
            None
        }
    };
    if let Some(owner) = owner {
        let name = match db::users::get(&state.db, &assignment.employee_id).await {
            Ok(Some(user)) => user.name,
            _ => assignment.employee_id.clone(),
        };
        let message = format!("{} completed \"{}\"", name, course.title);
        notify::notify_user(state, &owner, "assignment.completed", &message).await;
    }
}

/// GET /api/course-assignment/assignment/:id
///
/// **Errors:**
/// - 403 Forbidden: caller is not the owner, the owning company, or an admin
/// - 404 Not Found: unknown assignment or its course was deleted
pub async fn get_assignment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<AssignmentDetail>> {
    let assignment = load_assignment(&state, &id).await?;
    if !can_read(&session, &assignment) {
        return Err(ApiError::forbidden());
    }
    let course = load_course(&state, &assignment).await?;

    Ok(Json(AssignmentDetail {
        summary: progress::summarize(&assignment, &course),
        assignment,
        course,
    }))
}

/// POST /api/course-assignment/assignment/:id/start
///
/// Progress writes are compare-and-swap on the assignment revision. A write
/// that loses the race re-reads the assignment and replays the transition.
pub async fn start(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressSummary>> {
    let (mut assignment, course) = load_owned(&state, &session, &id).await?;

    for _ in 0..MAX_WRITE_ATTEMPTS {
        if !progress::start(&mut assignment, pulse_common::time::now()) {
            return Ok(Json(progress::summarize(&assignment, &course)));
        }
        if db::assignments::save_progress(&state.db, &assignment).await? {
            info!("Assignment {} started", assignment.id);
            return Ok(Json(progress::summarize(&assignment, &course)));
        }
        debug!("Assignment {} changed before start was saved; retrying", id);
        assignment = load_assignment(&state, &id).await?;
    }
    Err(write_conflict(&id))
}

/// POST /api/course-assignment/assignment/:id/lesson-complete
///
/// **Request:** `{"lessonId": "...", "quizResult"?: {"score": n} | {"answers": [...]}}`
/// **Response:** `{"progress": n, "status": "...", "completedLessons": n, "totalLessons": n}`
///
/// Completing the same lesson twice is harmless. Concurrent completions of
/// different lessons are all kept.
///
/// **Errors:**
/// - 409 Conflict: the assignment kept changing between read and write
pub async fn lesson_complete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<LessonCompleteRequest>,
) -> ApiResult<Json<ProgressSummary>> {
    let (mut assignment, course) = load_owned(&state, &session, &id).await?;

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let was_completed = assignment.is_completed();
        let summary = progress::complete_lesson(
            &mut assignment,
            &course,
            &req.lesson_id,
            req.quiz_result.as_ref(),
            pulse_common::time::now(),
        )?;

        if db::assignments::save_progress(&state.db, &assignment).await? {
            if !was_completed && assignment.is_completed() {
                on_completed(&state, &assignment, &course).await;
            }
            return Ok(Json(summary));
        }
        debug!("Assignment {} changed before lesson {} was saved; retrying", id, req.lesson_id);
        assignment = load_assignment(&state, &id).await?;
    }
    Err(write_conflict(&id))
}

/// POST /api/course-assignment/assignment/:id/final-quiz-complete
///
/// **Errors:**
/// - 400 Bad Request: course has no final quiz, lessons unfinished, or bad score
/// - 409 Conflict: the assignment kept changing between read and write
pub async fn final_quiz_complete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(submission): Json<QuizSubmission>,
) -> ApiResult<Json<FinalQuizOutcome>> {
    let (mut assignment, course) = load_owned(&state, &session, &id).await?;

    for _ in 0..MAX_WRITE_ATTEMPTS {
        let was_completed = assignment.is_completed();
        let outcome = progress::complete_final_quiz(
            &mut assignment,
            &course,
            &submission,
            pulse_common::time::now(),
        )?;
        if was_completed {
            return Ok(Json(outcome));
        }

        if db::assignments::save_progress(&state.db, &assignment).await? {
            if assignment.is_completed() {
                on_completed(&state, &assignment, &course).await;
            }
            return Ok(Json(outcome));
        }
        debug!("Assignment {} changed before the final quiz was saved; retrying", id);
        assignment = load_assignment(&state, &id).await?;
    }
    Err(write_conflict(&id))
}

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/course-assignment/assignment/:id", get(get_assignment))
        .route("/api/course-assignment/assignment/:id/start", post(start))
        .route(
            "/api/course-assignment/assignment/:id/lesson-complete",
            post(lesson_complete),
        )
        .route(
            "/api/course-assignment/assignment/:id/final-quiz-complete",
            post(final_quiz_complete),
        )
}
