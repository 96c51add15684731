//! Course catalogue endpoints
//!
//! Reading follows role visibility:
//! - ADMIN: every course
//! - COMPANY: published global courses plus its own company-specific ones
//! - EMPLOYEE: courses they hold an assignment for
//!
//! Authoring (create, update, delete, publish) is ADMIN only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use pulse_common::db::models::{Course, CourseStatus, Lesson, Quiz, Role};
use pulse_common::uuid_utils;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::session::Session;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonInput {
    /// Generated when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub quiz: Option<Quiz>,
}

/// Create / update payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub lessons: Vec<LessonInput>,
    #[serde(default)]
    pub final_quiz: Option<Quiz>,
    #[serde(default)]
    pub is_company_specific: bool,
    #[serde(default)]
    pub company_id: Option<String>,
}

fn validate_quiz(quiz: &Quiz, label: &str) -> ApiResult<()> {
    if quiz.questions.is_empty() {
        return Err(ApiError::BadRequest(format!("{}: at least one question is required", label)));
    }
    if quiz.passing_score > 100 {
        return Err(ApiError::BadRequest(format!(
            "{}: passingScore must be between 0 and 100",
            label
        )));
    }
    for (i, question) in quiz.questions.iter().enumerate() {
        if question.question.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{}: question {} is empty", label, i + 1)));
        }
        if question.correct_option >= question.options.len() {
            return Err(ApiError::BadRequest(format!(
                "{}: question {} has no option {}",
                label,
                i + 1,
                question.correct_option
            )));
        }
    }
    Ok(())
}

/// Check a payload and turn its lessons into stored lessons
pub fn validate_course_input(input: &CourseInput) -> ApiResult<Vec<Lesson>> {
    if input.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    if input.is_company_specific && input.company_id.as_deref().map_or(true, |c| c.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "Company-specific courses need a companyId".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut lessons = Vec::with_capacity(input.lessons.len());
    for (i, lesson) in input.lessons.iter().enumerate() {
        if lesson.title.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("Lesson {} needs a title", i + 1)));
        }
        let id = lesson
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(uuid_utils::new_id);
        if !seen.insert(id.clone()) {
            return Err(ApiError::BadRequest(format!("Duplicate lesson id {}", id)));
        }
        if let Some(quiz) = &lesson.quiz {
            validate_quiz(quiz, &format!("Lesson {}", i + 1))?;
        }
        lessons.push(Lesson {
            id,
            title: lesson.title.trim().to_string(),
            content: lesson.content.clone(),
            quiz: lesson.quiz.clone(),
        });
    }

    if let Some(quiz) = &input.final_quiz {
        validate_quiz(quiz, "Final quiz")?;
    }

    Ok(lessons)
}

async fn ensure_company_exists(state: &AppState, input: &CourseInput) -> ApiResult<Option<String>> {
    if !input.is_company_specific {
        return Ok(None);
    }
    let company_id = input.company_id.clone().unwrap_or_default();
    if db::companies::get(&state.db, &company_id).await?.is_none() {
        return Err(ApiError::BadRequest(format!("Company {} does not exist", company_id)));
    }
    Ok(Some(company_id))
}

/// Whether `session` may read `course`
pub async fn can_view(state: &AppState, session: &Session, course: &Course) -> ApiResult<bool> {
    Ok(match session.role {
        Role::Admin => true,
        Role::Company => {
            course.status == CourseStatus::Published
                && (!course.is_company_specific
                    || (course.company_id.is_some() && course.company_id == session.company_id))
        }
        Role::Employee => {
            db::assignments::employee_has_course(&state.db, &session.user_id, &course.id).await?
        }
    })
}

/// GET /api/courses
pub async fn list_courses(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<Course>>> {
    let courses = match session.role {
        Role::Admin => db::courses::list(&state.db).await?,
        Role::Company => {
            let company_id = session.require_company()?;
            db::courses::list_for_company(&state.db, company_id).await?
        }
        Role::Employee => db::courses::list_for_employee(&state.db, &session.user_id).await?,
    };
    Ok(Json(courses))
}

/// GET /api/courses/:id
///
/// 404 both for missing courses and for courses the caller may not see.
pub async fn get_course(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<Course>> {
    let course = db::courses::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    if !can_view(&state, &session, &course).await? {
        return Err(ApiError::not_found("Course"));
    }
    Ok(Json(course))
}

/// POST /api/courses
pub async fn create_course(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(input): Json<CourseInput>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    session.require_admin()?;
    let lessons = validate_course_input(&input)?;
    let company_id = ensure_company_exists(&state, &input).await?;

    let now = pulse_common::time::now();
    let course = Course {
        id: uuid_utils::new_id(),
        title: input.title.trim().to_string(),
        description: input.description,
        lessons,
        final_quiz: input.final_quiz,
        status: CourseStatus::Draft,
        is_company_specific: input.is_company_specific,
        company_id,
        created_by: Some(session.user_id.clone()),
        created_at: now,
        updated_at: now,
    };
    db::courses::save(&state.db, &course).await?;

    info!("Course {} created by {}", course.id, session.email);
    Ok((StatusCode::CREATED, Json(course)))
}

/// PUT /api/courses/:id
///
/// Replaces the course content; publication status is kept.
pub async fn update_course(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Json<Course>> {
    session.require_admin()?;
    let mut course = db::courses::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    let lessons = validate_course_input(&input)?;
    let company_id = ensure_company_exists(&state, &input).await?;

    course.title = input.title.trim().to_string();
    course.description = input.description;
    course.lessons = lessons;
    course.final_quiz = input.final_quiz;
    course.is_company_specific = input.is_company_specific;
    course.company_id = company_id;
    course.updated_at = pulse_common::time::now();
    db::courses::save(&state.db, &course).await?;

    info!("Course {} updated by {}", course.id, session.email);
    Ok(Json(course))
}

/// DELETE /api/courses/:id
///
/// **Errors:**
/// - 409 Conflict: the course still has assignments
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    session.require_admin()?;
    if db::assignments::count_for_course(&state.db, &id).await? > 0 {
        return Err(ApiError::Conflict(
            "Course has assignments and cannot be deleted".to_string(),
        ));
    }
    if !db::courses::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Course"));
    }
    info!("Course {} deleted by {}", id, session.email);
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status(state: &AppState, session: &Session, id: &str, status: CourseStatus) -> ApiResult<Json<Course>> {
    session.require_admin()?;
    let mut course = db::courses::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    if status == CourseStatus::Published && course.lessons.is_empty() {
        return Err(ApiError::BadRequest("Cannot publish a course without lessons".to_string()));
    }
    course.status = status;
    course.updated_at = pulse_common::time::now();
    db::courses::save(&state.db, &course).await?;
    info!("Course {} set to {:?}", course.id, status);
    Ok(Json(course))
}

/// POST /api/courses/:id/publish
pub async fn publish_course(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<Course>> {
    set_status(&state, &session, &id, CourseStatus::Published).await
}

/// POST /api/courses/:id/unpublish
pub async fn unpublish_course(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<Course>> {
    set_status(&state, &session, &id, CourseStatus::Draft).await
}

pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/api/courses", get(list_courses).post(create_course))
        .route(
            "/api/courses/:id",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/api/courses/:id/publish", post(publish_course))
        .route("/api/courses/:id/unpublish", post(unpublish_course))
}
