//! Integration tests for pulse-server API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Login, invitation acceptance and the session cookie
//! - Company risk reports and CSV export
//! - Assignment progress transitions over HTTP
//! - Bulk assignment creation
//! - Concurrent progress writes and bulk assignment
//! - Demo requests and queued mail
//! - Course deletion guard
//! - Recurring re-assignment against a real database

mod helpers;

use axum::http::{header, StatusCode};
use chrono::Duration;
use helpers::{extract_json, extract_text, request, TestApp, TEST_PASSWORD};
use pulse_common::db::models::AssignmentStatus;
use pulse_server::{db, scheduler};
use serde_json::json;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "pulse-server");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_login_sets_cookie_and_cookie_authenticates() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/auth/login",
            None,
            json!({"email": "ADMIN@pulse.test ", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("session cookie");
    assert!(cookie.starts_with("pulse_session="));

    let body = extract_json(response).await;
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("passwordHash").is_none());

    let pair = cookie.split(';').next().unwrap().to_string();
    let me = app
        .send(
            axum::http::Request::builder()
                .uri("/api/me")
                .header(header::COOKIE, pair)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/auth/login",
            None,
            json!({"email": "admin@pulse.test", "password": "wrong-password-1"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response).await;
    assert!(body["error"].is_string());
}

// =============================================================================
// Risk reports
// =============================================================================

#[tokio::test]
async fn test_employees_at_risk_requires_company_role() {
    let app = TestApp::new().await;

    let response = app.get("/api/company/employees-at-risk", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/api/company/employees-at-risk", Some(&app.alice)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .get("/api/company/employees-at-risk", Some(&app.acme_owner))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_employees_at_risk_report() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;

    // Alice: 20 days old, untouched → overdue; Bob: 6 days, no progress → at risk
    app.seed_assignment(&app.alice, &course, &app.acme, 20).await;
    app.seed_assignment(&app.bob, &course, &app.acme, 6).await;
    // Other tenant must not leak into Acme's report
    app.seed_assignment(&app.carol, &course, &app.globex, 30).await;

    let response = app
        .get("/api/company/employees-at-risk", Some(&app.acme_owner))
        .await;
    let body = extract_json(response).await;
    let employees = body.as_array().expect("array");

    assert_eq!(employees.len(), 2);
    assert_eq!(employees[0]["name"], "Alice");
    assert_eq!(employees[0]["status"], "overdue");
    assert_eq!(employees[1]["name"], "Bob");
    assert_eq!(employees[1]["status"], "at-risk");
    assert_eq!(employees[1]["assignments"][0]["courseTitle"], "Safety");
}

#[tokio::test]
async fn test_company_dashboard_risk_counts() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    app.seed_assignment(&app.alice, &course, &app.acme, 20).await;
    app.seed_assignment(&app.bob, &course, &app.acme, 6).await;
    app.seed_assignment(&app.carol, &course, &app.globex, 30).await;

    let response = app.get("/api/company/dashboard", Some(&app.acme_owner)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["totalEmployees"], 2);
    assert_eq!(body["atRiskEmployees"], 1);
    assert_eq!(body["overdueEmployees"], 1);
    assert_eq!(body["totalAssignments"], 2);
}

#[tokio::test]
async fn test_companies_at_risk_admin_only() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    app.seed_assignment(&app.carol, &course, &app.globex, 30).await;

    let response = app
        .get("/api/admin/companies-at-risk", Some(&app.acme_owner))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/admin/companies-at-risk", Some(&app.admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    let companies = body.as_array().expect("array");
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0]["name"], "Globex");
    assert_eq!(companies[0]["overdueEmployees"], 1);
}

#[tokio::test]
async fn test_csv_export() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    app.seed_assignment(&app.alice, &course, &app.acme, 20).await;

    let response = app
        .get("/api/company/reports/export", Some(&app.acme_owner))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/csv"));
    assert!(response.headers().contains_key(header::CONTENT_DISPOSITION));

    let text = extract_text(response).await;
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Employee,Email,Department,Course"));
    let row = lines.next().expect("one data row");
    assert!(row.starts_with("Alice,alice@acme.test"));
    assert!(row.ends_with("overdue"));
}

// =============================================================================
// Progress
// =============================================================================

#[tokio::test]
async fn test_lesson_complete_response_shape() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    let assignment = app.seed_assignment(&app.alice, &course, &app.acme, 0).await;
    let uri = format!("/api/course-assignment/assignment/{}/lesson-complete", assignment.id);

    let response = app.post(&uri, Some(&app.alice), json!({"lessonId": "l1"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body, json!({"progress": 50, "status": "in-progress", "completedLessons": 1, "totalLessons": 2}));

    // Repeating a lesson does not double-count
    let body = extract_json(app.post(&uri, Some(&app.alice), json!({"lessonId": "l1"})).await).await;
    assert_eq!(body["completedLessons"], 1);

    let body = extract_json(app.post(&uri, Some(&app.alice), json!({"lessonId": "l2"})).await).await;
    assert_eq!(body["progress"], 100);
    assert_eq!(body["status"], "completed");

    let stored = db::assignments::get(&app.pool, &assignment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::Completed);
    assert!(stored.completed_at.is_some());

    // The company account hears about it
    let notes = db::notifications::list_for_user(&app.pool, &app.acme_owner.id).await.unwrap();
    assert!(notes.iter().any(|n| n.kind == "assignment.completed"));
}

#[tokio::test]
async fn test_progress_writes_are_owner_only() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    let assignment = app.seed_assignment(&app.alice, &course, &app.acme, 0).await;
    let uri = format!("/api/course-assignment/assignment/{}/lesson-complete", assignment.id);

    let response = app.post(&uri, Some(&app.bob), json!({"lessonId": "l1"})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post(&uri, Some(&app.acme_owner), json!({"lessonId": "l1"})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post(&uri, Some(&app.alice), json!({"lessonId": "missing"})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_final_quiz_gates_completion() {
    let app = TestApp::new().await;
    let course = app.seed_course("Compliance", None, true).await;
    let assignment = app.seed_assignment(&app.alice, &course, &app.acme, 0).await;
    let base = format!("/api/course-assignment/assignment/{}", assignment.id);

    // Lessons first
    let response = app
        .post(&format!("{}/final-quiz-complete", base), Some(&app.alice), json!({"answers": [1]}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    for lesson in ["l1", "l2"] {
        app.post(&format!("{}/lesson-complete", base), Some(&app.alice), json!({"lessonId": lesson}))
            .await;
    }
    let detail = extract_json(app.get(&base, Some(&app.alice)).await).await;
    assert_eq!(detail["summary"]["status"], "in-progress");

    let failed = extract_json(
        app.post(&format!("{}/final-quiz-complete", base), Some(&app.alice), json!({"answers": [0]}))
            .await,
    )
    .await;
    assert_eq!(failed["passed"], false);
    assert_eq!(failed["status"], "in-progress");

    let passed = extract_json(
        app.post(&format!("{}/final-quiz-complete", base), Some(&app.alice), json!({"answers": [1]}))
            .await,
    )
    .await;
    assert_eq!(passed["passed"], true);
    assert_eq!(passed["status"], "completed");
    assert_eq!(passed["progress"], 100);
}

#[tokio::test]
async fn test_stale_progress_write_is_refused() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    let seeded = app.seed_assignment(&app.alice, &course, &app.acme, 0).await;

    let mut first = db::assignments::get(&app.pool, &seeded.id).await.unwrap().unwrap();
    let mut second = first.clone();

    first.status = AssignmentStatus::InProgress;
    assert!(db::assignments::save_progress(&app.pool, &first).await.unwrap());

    // Loaded before the first write landed
    second.status = AssignmentStatus::Completed;
    assert!(!db::assignments::save_progress(&app.pool, &second).await.unwrap());

    let stored = db::assignments::get(&app.pool, &seeded.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::InProgress);
    assert_eq!(stored.revision, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lesson_completions_are_all_kept() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;

    for _ in 0..10 {
        let assignment = app.seed_assignment(&app.bob, &course, &app.acme, 0).await;
        let uri = format!("/api/course-assignment/assignment/{}/lesson-complete", assignment.id);

        let (first, second) = tokio::join!(
            app.post(&uri, Some(&app.bob), json!({"lessonId": "l1"})),
            app.post(&uri, Some(&app.bob), json!({"lessonId": "l2"})),
        );
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);

        let stored = db::assignments::get(&app.pool, &assignment.id).await.unwrap().unwrap();
        assert_eq!(stored.lesson_progress.len(), 2);
        assert_eq!(stored.status, AssignmentStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    // One completion notice per assignment, not one per request
    let notes = db::notifications::list_for_user(&app.pool, &app.acme_owner.id).await.unwrap();
    assert_eq!(notes.iter().filter(|n| n.kind == "assignment.completed").count(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_start_and_lesson_complete() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    let assignment = app.seed_assignment(&app.alice, &course, &app.acme, 0).await;
    let base = format!("/api/course-assignment/assignment/{}", assignment.id);

    let start_url = format!("{}/start", base);
    let lesson_url = format!("{}/lesson-complete", base);
    let (started, lesson) = tokio::join!(
        app.post(&start_url, Some(&app.alice), json!({})),
        app.post(&lesson_url, Some(&app.alice), json!({"lessonId": "l1"})),
    );
    assert_eq!(started.status(), StatusCode::OK);
    assert_eq!(lesson.status(), StatusCode::OK);

    let stored = db::assignments::get(&app.pool, &assignment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::InProgress);
    assert!(stored.lesson_progress.iter().any(|p| p.lesson_id == "l1"));
}

// =============================================================================
// Assignments
// =============================================================================

#[tokio::test]
async fn test_bulk_assign_skips_open_assignments() {
    let app = TestApp::new().await;
    let course = app.seed_course("Onboarding", Some(&app.acme), false).await;
    app.seed_assignment(&app.alice, &course, &app.acme, 1).await;

    let response = app
        .post(
            "/api/company/assignments",
            Some(&app.acme_owner),
            json!({"courseId": course.id, "employeeIds": [app.alice.id, app.bob.id]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response).await;
    assert_eq!(body["created"].as_array().unwrap().len(), 1);
    assert_eq!(body["created"][0]["employeeId"], app.bob.id);
    assert_eq!(body["skipped"], json!([app.alice.id]));

    // Globex cannot assign Acme's private course, nor to Acme's employees
    let response = app
        .post(
            "/api/company/assignments",
            Some(&app.globex_owner),
            json!({"courseId": course.id, "employeeIds": [app.carol.id]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let shared = app.seed_course("Shared", None, false).await;
    let response = app
        .post(
            "/api/company/assignments",
            Some(&app.globex_owner),
            json!({"courseId": shared.id, "employeeIds": [app.alice.id]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bulk_assign_creates_one_open_assignment() {
    let app = TestApp::new().await;

    for round in 0..10 {
        let course = app.seed_course(&format!("Onboarding {}", round), Some(&app.acme), false).await;
        let body = json!({"courseId": course.id, "employeeIds": [app.alice.id]});

        let (first, second) = tokio::join!(
            app.post("/api/company/assignments", Some(&app.acme_owner), body.clone()),
            app.post("/api/company/assignments", Some(&app.acme_owner), body.clone()),
        );
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::CREATED);

        let (first, second) = (extract_json(first).await, extract_json(second).await);
        let created = first["created"].as_array().unwrap().len() + second["created"].as_array().unwrap().len();
        let skipped = first["skipped"].as_array().unwrap().len() + second["skipped"].as_array().unwrap().len();
        assert_eq!((created, skipped), (1, 1));

        let open = db::assignments::list_for_enrollment(&app.pool, &app.alice.id, &course.id, &app.acme.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| !a.is_completed())
            .count();
        assert_eq!(open, 1);
    }
}

#[tokio::test]
async fn test_employee_dashboard() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    app.seed_assignment(&app.alice, &course, &app.acme, 0).await;

    let response = app.get("/api/employee/dashboard", Some(&app.alice)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["totalAssignments"], 1);
    assert_eq!(body["notStarted"], 1);

    let response = app.get("/api/employee/dashboard", Some(&app.acme_owner)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Invitations
// =============================================================================

#[tokio::test]
async fn test_invite_then_accept() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/company/employees/invite",
            Some(&app.acme_owner),
            json!({"email": "Dave@Acme.test", "name": "Dave", "department": "Sales"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response).await;
    assert_eq!(body["user"]["status"], "invited");
    assert_eq!(body["membership"]["status"], "invited");

    let mail = db::outbox::list_for_recipient(&app.pool, "dave@acme.test").await.unwrap();
    assert_eq!(mail.len(), 1);
    let token = mail[0]
        .body
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .expect("token in invitation")
        .to_string();

    let response = app
        .post(
            "/api/auth/accept-invite",
            None,
            json!({"token": token, "name": "Dave D.", "password": "new-password-9"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["user"]["status"], "active");
    assert_eq!(body["user"]["name"], "Dave D.");

    // Single use
    let response = app
        .post(
            "/api/auth/accept-invite",
            None,
            json!({"token": token, "name": "Dave", "password": "new-password-9"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let employees = extract_json(app.get("/api/company/employees", Some(&app.acme_owner)).await).await;
    let dave = employees
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["email"] == "dave@acme.test")
        .expect("dave listed");
    assert_eq!(dave["membershipStatus"], "active");
}

#[tokio::test]
async fn test_invite_existing_member_conflicts() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/company/employees/invite",
            Some(&app.acme_owner),
            json!({"email": "alice@acme.test", "name": "Alice"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// =============================================================================
// Demo requests
// =============================================================================

#[tokio::test]
async fn test_demo_request_queues_mail() {
    let app = TestApp::with_config(|config| {
        config.admin_notification_email = Some("sales@pulse.test".to_string());
    })
    .await;

    let response = app
        .post(
            "/api/demo-request",
            None,
            json!({"name": "Erin", "email": "erin@initech.test", "company": "Initech"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response).await;
    assert!(body["id"].is_string());

    let notice = db::outbox::list_for_recipient(&app.pool, "sales@pulse.test").await.unwrap();
    let confirmation = db::outbox::list_for_recipient(&app.pool, "erin@initech.test").await.unwrap();
    assert_eq!(notice.len(), 1);
    assert_eq!(confirmation.len(), 1);

    let inquiries = db::inquiries::list(&app.pool).await.unwrap();
    assert_eq!(inquiries.len(), 1);
}

#[tokio::test]
async fn test_demo_request_validation() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/demo-request",
            None,
            json!({"name": "Erin", "email": "not-an-email", "company": "Initech"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Courses
// =============================================================================

#[tokio::test]
async fn test_course_with_assignments_cannot_be_deleted() {
    let app = TestApp::new().await;
    let course = app.seed_course("Safety", None, false).await;
    app.seed_assignment(&app.alice, &course, &app.acme, 0).await;

    let response = app
        .delete(&format!("/api/courses/{}", course.id), &app.admin)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let unused = app.seed_course("Unused", None, false).await;
    let response = app
        .delete(&format!("/api/courses/{}", unused.id), &app.admin)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_company_cannot_see_other_tenants_course() {
    let app = TestApp::new().await;
    let course = app.seed_course("Acme only", Some(&app.acme), false).await;
    let uri = format!("/api/courses/{}", course.id);

    assert_eq!(app.get(&uri, Some(&app.acme_owner)).await.status(), StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&app.globex_owner)).await.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Scheduler
// =============================================================================

#[tokio::test]
async fn test_reassignment_pass() {
    let app = TestApp::new().await;
    let course = app.seed_course("Annual refresher", None, false).await;
    let now = pulse_common::time::now();

    let mut done = pulse_common::db::models::CourseAssignment::new(
        &app.alice.id,
        &course.id,
        &app.acme.id,
        Some(30),
        now - Duration::days(60),
    );
    done.status = AssignmentStatus::Completed;
    done.completed_at = Some(now - Duration::days(31));
    db::assignments::insert(&app.pool, &done).await.unwrap();

    assert_eq!(scheduler::run_reassignment_pass(&app.pool, now).await.unwrap(), 1);
    // Already re-issued; a second pass creates nothing
    assert_eq!(scheduler::run_reassignment_pass(&app.pool, now).await.unwrap(), 0);

    let all = db::assignments::list_for_employee(&app.pool, &app.alice.id).await.unwrap();
    assert_eq!(all.len(), 2);
    let fresh = all.iter().find(|a| a.id != done.id).unwrap();
    assert_eq!(fresh.status, AssignmentStatus::NotStarted);
    assert_eq!(fresh.interval_days, Some(30));

    let notes = db::notifications::list_for_user(&app.pool, &app.alice.id).await.unwrap();
    assert!(notes.iter().any(|n| n.kind == "assignment.recurring"));
}

#[tokio::test]
async fn test_unauthenticated_request_rejected() {
    let app = TestApp::new().await;
    let response = app
        .send(request("GET", "/api/me", Some("garbage".to_string()), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
