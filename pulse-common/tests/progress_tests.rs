//! End-to-end progress scenarios across the state machine and the risk classifier

use chrono::{Duration, TimeZone, Utc};
use pulse_common::db::models::{AssignmentStatus, Course, CourseAssignment, CourseStatus, Lesson, Quiz, QuizQuestion};
use pulse_common::progress::{self, QuizSubmission};
use pulse_common::risk::{classify, RiskInput, RiskLevel};

fn course(lessons: usize, final_quiz: Option<Quiz>) -> Course {
    let now = Utc::now();
    Course {
        id: "course-1".to_string(),
        title: "Workplace Safety".to_string(),
        description: None,
        lessons: (1..=lessons)
            .map(|i| Lesson {
                id: format!("l{}", i),
                title: format!("Lesson {}", i),
                content: String::new(),
                quiz: None,
            })
            .collect(),
        final_quiz,
        status: CourseStatus::Published,
        is_company_specific: false,
        company_id: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

fn one_question_quiz() -> Quiz {
    Quiz {
        questions: vec![QuizQuestion {
            question: "Where is the fire exit?".to_string(),
            options: vec!["North".to_string(), "South".to_string()],
            correct_option: 0,
        }],
        passing_score: 70,
    }
}

#[test]
fn test_all_lessons_next_day_completes_and_leaves_risk_scan() {
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let course = course(3, None);
    let mut assignment = CourseAssignment::new("emp", &course.id, "co", None, t);

    let next_day = t + Duration::days(1);
    for lesson in ["l1", "l2", "l3"] {
        progress::complete_lesson(&mut assignment, &course, lesson, None, next_day).unwrap();
    }

    assert_eq!(assignment.status, AssignmentStatus::Completed);
    assert_eq!(assignment.completed_at, Some(next_day));

    // A month later the assignment is still excluded
    let later = t + Duration::days(30);
    let input = RiskInput::from_assignment(&assignment, &course);
    assert_eq!(classify(&input, later), None);
}

#[test]
fn test_untouched_assignment_ages_into_overdue() {
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let course = course(10, None);
    let assignment = CourseAssignment::new("emp", &course.id, "co", None, t);
    let input = RiskInput::from_assignment(&assignment, &course);

    assert_eq!(classify(&input, t + Duration::days(2)), Some(RiskLevel::OnTrack));
    assert_eq!(classify(&input, t + Duration::days(6)), Some(RiskLevel::AtRisk));
    assert_eq!(classify(&input, t + Duration::days(15)), Some(RiskLevel::Overdue));
}

#[test]
fn test_final_quiz_gates_completion() {
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let course = course(2, Some(one_question_quiz()));
    let mut assignment = CourseAssignment::new("emp", &course.id, "co", None, t);

    // Quiz before lessons are done is refused
    let early = progress::complete_final_quiz(
        &mut assignment,
        &course,
        &QuizSubmission::with_score(100),
        t,
    );
    assert!(early.is_err());

    progress::complete_lesson(&mut assignment, &course, "l1", None, t).unwrap();
    let summary = progress::complete_lesson(&mut assignment, &course, "l2", None, t).unwrap();
    assert_eq!(summary.status, AssignmentStatus::InProgress);
    assert_eq!(summary.progress, 100);

    let failed = progress::complete_final_quiz(
        &mut assignment,
        &course,
        &QuizSubmission::with_score(40),
        t,
    )
    .unwrap();
    assert!(!failed.passed);
    assert_eq!(failed.summary.status, AssignmentStatus::InProgress);

    let passed = progress::complete_final_quiz(
        &mut assignment,
        &course,
        &QuizSubmission {
            answers: Some(vec![0]),
            ..QuizSubmission::default()
        },
        t,
    )
    .unwrap();
    assert!(passed.passed);
    assert_eq!(passed.summary.status, AssignmentStatus::Completed);
    assert_eq!(assignment.final_quiz_result.as_ref().map(|r| r.score), Some(100));
}
