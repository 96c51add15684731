//! Shared fixtures for pulse-server integration tests
//!
//! Each test gets its own database in a temp directory, seeded with one
//! admin, two companies (each with a COMPANY account) and employees.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::Duration;
use pulse_common::api::issue_session_token;
use pulse_common::config::{ConfigOverrides, ServerConfig};
use pulse_common::db::init::init_database;
use pulse_common::db::models::{
    Company, CompanyPlan, CompanyStatus, Course, CourseAssignment, CourseStatus, Lesson,
    MembershipStatus, Quiz, QuizQuestion, Role, User, UserStatus,
};
use pulse_server::db::users::NewUser;
use pulse_server::{build_router, db, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "correct-horse-7";

pub struct TestApp {
    /// Keeps the database directory alive
    pub _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub admin: User,
    pub acme: Company,
    pub acme_owner: User,
    pub alice: User,
    pub bob: User,
    pub globex: Company,
    pub globex_owner: User,
    pub carol: User,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Seeded app with `tweak` applied to the default configuration
    pub async fn with_config(tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let pool = init_database(&dir.path().join("pulse.db"))
            .await
            .expect("database init");

        let mut config =
            ServerConfig::resolve(&ConfigOverrides::default(), None).expect("default config");
        config.public_base_url = "http://pulse.test".to_string();
        tweak(&mut config);

        let state = AppState::new(pool.clone(), config, TEST_SECRET);
        let now = pulse_common::time::now();

        let admin = insert_user(&pool, "admin@pulse.test", "Admin", Role::Admin, None, true).await;

        let acme = db::companies::insert(&pool, "Acme", CompanyPlan::Basic, CompanyStatus::Active, now)
            .await
            .expect("company");
        let acme_owner =
            insert_user(&pool, "owner@acme.test", "Acme Owner", Role::Company, Some(&acme.id), false).await;
        db::memberships::upsert(&pool, &acme_owner.id, &acme.id, Role::Company, MembershipStatus::Active, now)
            .await
            .expect("membership");
        db::companies::set_company_account(&pool, &acme.id, &acme_owner.id, now)
            .await
            .expect("company account");

        let alice = insert_user(&pool, "alice@acme.test", "Alice", Role::Employee, Some(&acme.id), false).await;
        let bob = insert_user(&pool, "bob@acme.test", "Bob", Role::Employee, Some(&acme.id), false).await;
        for user in [&alice, &bob] {
            db::memberships::upsert(&pool, &user.id, &acme.id, Role::Employee, MembershipStatus::Active, now)
                .await
                .expect("membership");
        }

        let globex = db::companies::insert(&pool, "Globex", CompanyPlan::Trial, CompanyStatus::Active, now)
            .await
            .expect("company");
        let globex_owner = insert_user(
            &pool,
            "owner@globex.test",
            "Globex Owner",
            Role::Company,
            Some(&globex.id),
            false,
        )
        .await;
        db::memberships::upsert(&pool, &globex_owner.id, &globex.id, Role::Company, MembershipStatus::Active, now)
            .await
            .expect("membership");
        let carol =
            insert_user(&pool, "carol@globex.test", "Carol", Role::Employee, Some(&globex.id), false).await;
        db::memberships::upsert(&pool, &carol.id, &globex.id, Role::Employee, MembershipStatus::Active, now)
            .await
            .expect("membership");

        Self {
            _dir: dir,
            pool,
            state,
            admin,
            acme,
            acme_owner,
            alice,
            bob,
            globex,
            globex_owner,
            carol,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bearer token for `user`
    pub fn token_for(&self, user: &User) -> String {
        issue_session_token(&user.id, Duration::hours(1), TEST_SECRET, pulse_common::time::now())
            .expect("session token")
    }

    /// Send a request through a fresh router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.expect("request")
    }

    pub async fn get(&self, uri: &str, user: Option<&User>) -> Response<Body> {
        self.send(request("GET", uri, user.map(|u| self.token_for(u)), None)).await
    }

    pub async fn post(&self, uri: &str, user: Option<&User>, body: Value) -> Response<Body> {
        self.send(request("POST", uri, user.map(|u| self.token_for(u)), Some(body)))
            .await
    }

    pub async fn delete(&self, uri: &str, user: &User) -> Response<Body> {
        self.send(request("DELETE", uri, Some(self.token_for(user)), None)).await
    }

    /// Published two-lesson course; `company` makes it company-specific
    pub async fn seed_course(&self, title: &str, company: Option<&Company>, final_quiz: bool) -> Course {
        let now = pulse_common::time::now();
        let course = Course {
            id: pulse_common::uuid_utils::new_id(),
            title: title.to_string(),
            description: Some(format!("{} course", title)),
            lessons: vec![
                Lesson {
                    id: "l1".to_string(),
                    title: "Introduction".to_string(),
                    content: "Welcome".to_string(),
                    quiz: None,
                },
                Lesson {
                    id: "l2".to_string(),
                    title: "Practice".to_string(),
                    content: "Exercises".to_string(),
                    quiz: None,
                },
            ],
            final_quiz: final_quiz.then(|| Quiz {
                questions: vec![QuizQuestion {
                    question: "Ready?".to_string(),
                    options: vec!["No".to_string(), "Yes".to_string()],
                    correct_option: 1,
                }],
                passing_score: 70,
            }),
            status: CourseStatus::Published,
            is_company_specific: company.is_some(),
            company_id: company.map(|c| c.id.clone()),
            created_by: Some(self.admin.id.clone()),
            created_at: now,
            updated_at: now,
        };
        db::courses::save(&self.pool, &course).await.expect("course");
        course
    }

    /// Assignment created `days_ago` days in the past
    pub async fn seed_assignment(
        &self,
        employee: &User,
        course: &Course,
        company: &Company,
        days_ago: i64,
    ) -> CourseAssignment {
        let created = pulse_common::time::now() - Duration::days(days_ago);
        let assignment = CourseAssignment::new(&employee.id, &course.id, &company.id, None, created);
        let inserted = db::assignments::insert(&self.pool, &assignment)
            .await
            .expect("assignment");
        assert!(inserted, "enrollment already has an open assignment");
        assignment
    }
}

async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    role: Role,
    company_id: Option<&str>,
    with_password: bool,
) -> User {
    // Hashing is slow in debug builds; only accounts that log in get one
    let password_hash = if with_password {
        pulse_common::api::hash_password(TEST_PASSWORD).expect("hash")
    } else {
        String::new()
    };
    db::users::insert(
        pool,
        &NewUser {
            email,
            name,
            role,
            department: Some("Operations"),
            status: UserStatus::Active,
            password_hash,
            active_company_id: company_id,
        },
        pulse_common::time::now(),
    )
    .await
    .expect("user")
}

/// Build a request with an optional bearer token and JSON body
pub fn request(method: &str, uri: &str, token: Option<String>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

pub async fn extract_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
