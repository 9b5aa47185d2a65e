//! Enrollment state machine.
//!
//! A learner's record for one course moves through
//! `enrolled (0%) -> in-progress -> completed (100%)`.  Progress is always
//! derived: it is recomputed from the completion set and the course's live
//! lesson count on every update, never cached independently.  `completed`
//! is sticky — once a learner hits 100% the flag stays set even if the
//! course later gains lessons and the recomputed percentage drops.

use chrono::Utc;
use uuid::Uuid;

use microcourses_store::{CourseStatus, Database, Enrollment, StoreError};

use crate::error::ApiError;

/// Enroll a learner in a published course.
///
/// The up-front existence check produces the friendly `ALREADY_ENROLLED`
/// error; the store's `(user, course)` unique index is the backstop when
/// two requests race past it.
pub fn enroll(db: &Database, user_id: Uuid, course_id: Uuid) -> Result<Enrollment, ApiError> {
    let course = match db.get_course(course_id) {
        Ok(course) => course,
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("Course")),
        Err(e) => return Err(e.into()),
    };

    if course.status != CourseStatus::Published {
        return Err(ApiError::precondition(
            "COURSE_NOT_PUBLISHED",
            "Course is not published yet",
        ));
    }

    if db.find_enrollment(user_id, course_id)?.is_some() {
        return Err(already_enrolled());
    }

    let enrollment = Enrollment {
        id: Uuid::new_v4(),
        user_id,
        course_id,
        progress: 0,
        completed_lessons: Vec::new(),
        completed: false,
        enrolled_at: Utc::now(),
    };

    match db.create_enrollment(&enrollment) {
        Ok(()) => Ok(enrollment),
        Err(StoreError::Duplicate { .. }) => Err(already_enrolled()),
        Err(e) => Err(e.into()),
    }
}

fn already_enrolled() -> ApiError {
    ApiError::conflict("ALREADY_ENROLLED", "Already enrolled in this course")
}

/// Mark a lesson complete and recompute progress.
///
/// Completing an already-completed lesson is a no-op on the completion
/// set, so retries and double-clicks cannot move progress backwards or
/// forwards spuriously.
pub fn complete_lesson(
    db: &Database,
    user_id: Uuid,
    course_id: Uuid,
    lesson_id: Uuid,
) -> Result<Enrollment, ApiError> {
    let enrollment = match db.get_enrollment(user_id, course_id) {
        Ok(enrollment) => enrollment,
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("Enrollment")),
        Err(e) => return Err(e.into()),
    };

    let course = match db.get_course(course_id) {
        Ok(course) => course,
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("Course")),
        Err(e) => return Err(e.into()),
    };

    if !course.lessons.iter().any(|l| l.id == lesson_id) {
        return Err(ApiError::NotFound("Lesson"));
    }

    db.mark_lesson_completed(enrollment.id, lesson_id)?;

    let completed_lessons = db.completed_lesson_ids(enrollment.id)?;
    let progress = compute_progress(completed_lessons.len(), course.lessons.len());
    let completed = enrollment.completed || progress == 100;

    db.update_enrollment_progress(enrollment.id, progress, completed)?;

    Ok(Enrollment {
        progress,
        completed,
        completed_lessons,
        ..enrollment
    })
}

/// `round(100 * completed / total)`, with an empty course pinned at 0.
fn compute_progress(completed: usize, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth;
    use chrono::Utc;
    use microcourses_store::{Course, Lesson, NewLesson, Role, User};

    fn seed_user(db: &Database, role: Role) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: auth::hash_password("secret1"),
            role,
            approved_creator: role == Role::Creator,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id
    }

    fn seed_course(db: &Database, status: CourseStatus, lesson_count: usize) -> (Uuid, Vec<Lesson>) {
        let course = Course {
            id: Uuid::new_v4(),
            title: "Course".to_string(),
            description: "About things".to_string(),
            creator_id: seed_user(db, Role::Creator),
            status,
            next_lesson_index: 0,
            lessons: Vec::new(),
            created_at: Utc::now(),
        };
        db.create_course(&course).unwrap();

        let mut lessons = Vec::new();
        for i in 0..lesson_count {
            lessons.push(
                db.append_lesson(
                    course.id,
                    &NewLesson {
                        title: format!("Lesson {i}"),
                        content: "content".to_string(),
                        video_url: String::new(),
                        duration: 5,
                        transcript: String::new(),
                    },
                )
                .unwrap(),
            );
        }
        (course.id, lessons)
    }

    #[test]
    fn enroll_initializes_at_zero() {
        let db = Database::in_memory().unwrap();
        let learner = seed_user(&db, Role::Learner);
        let (course, _) = seed_course(&db, CourseStatus::Published, 2);

        let enrollment = enroll(&db, learner, course).unwrap();
        assert_eq!(enrollment.progress, 0);
        assert!(!enrollment.completed);
        assert!(enrollment.completed_lessons.is_empty());
    }

    #[test]
    fn enroll_requires_published_course() {
        let db = Database::in_memory().unwrap();
        let learner = seed_user(&db, Role::Learner);
        let (course, _) = seed_course(&db, CourseStatus::Pending, 1);

        let err = enroll(&db, learner, course).unwrap_err();
        assert_eq!(err.code(), "COURSE_NOT_PUBLISHED");

        let err = enroll(&db, learner, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn double_enroll_conflicts() {
        let db = Database::in_memory().unwrap();
        let learner = seed_user(&db, Role::Learner);
        let (course, _) = seed_course(&db, CourseStatus::Published, 1);

        enroll(&db, learner, course).unwrap();
        let err = enroll(&db, learner, course).unwrap_err();
        assert_eq!(err.code(), "ALREADY_ENROLLED");
        assert_eq!(db.count_enrollments_for_user(learner).unwrap(), 1);
    }

    #[test]
    fn two_lesson_walkthrough() {
        let db = Database::in_memory().unwrap();
        let learner = seed_user(&db, Role::Learner);
        let (course, lessons) = seed_course(&db, CourseStatus::Published, 2);

        enroll(&db, learner, course).unwrap();

        let e = complete_lesson(&db, learner, course, lessons[0].id).unwrap();
        assert_eq!(e.progress, 50);
        assert!(!e.completed);

        // Completing the same lesson again changes nothing.
        let e = complete_lesson(&db, learner, course, lessons[0].id).unwrap();
        assert_eq!(e.progress, 50);
        assert_eq!(e.completed_lessons.len(), 1);

        let e = complete_lesson(&db, learner, course, lessons[1].id).unwrap();
        assert_eq!(e.progress, 100);
        assert!(e.completed);
    }

    #[test]
    fn completed_never_reverts_when_lessons_are_added() {
        let db = Database::in_memory().unwrap();
        let learner = seed_user(&db, Role::Learner);
        let (course, lessons) = seed_course(&db, CourseStatus::Published, 1);

        enroll(&db, learner, course).unwrap();
        let e = complete_lesson(&db, learner, course, lessons[0].id).unwrap();
        assert!(e.completed);

        // The course grows after completion; progress is recomputed from
        // the live lesson count but the flag stays set.
        let late = db
            .append_lesson(
                course,
                &NewLesson {
                    title: "Late addition".to_string(),
                    content: "content".to_string(),
                    video_url: String::new(),
                    duration: 5,
                    transcript: String::new(),
                },
            )
            .unwrap();

        let e = complete_lesson(&db, learner, course, lessons[0].id).unwrap();
        assert_eq!(e.progress, 50);
        assert!(e.completed);

        let e = complete_lesson(&db, learner, course, late.id).unwrap();
        assert_eq!(e.progress, 100);
    }

    #[test]
    fn unknown_lesson_and_missing_enrollment_are_rejected() {
        let db = Database::in_memory().unwrap();
        let learner = seed_user(&db, Role::Learner);
        let (course, lessons) = seed_course(&db, CourseStatus::Published, 1);

        // No enrollment yet.
        let err = complete_lesson(&db, learner, course, lessons[0].id).unwrap_err();
        assert_eq!(err.to_string(), "Enrollment not found");

        enroll(&db, learner, course).unwrap();

        // A lesson id from a different course is not in this sequence.
        let (_, other_lessons) = seed_course(&db, CourseStatus::Published, 1);
        let err = complete_lesson(&db, learner, course, other_lessons[0].id).unwrap_err();
        assert_eq!(err.to_string(), "Lesson not found");
    }

    #[test]
    fn empty_course_progress_is_zero() {
        assert_eq!(compute_progress(0, 0), 0);
        assert_eq!(compute_progress(1, 3), 33);
        assert_eq!(compute_progress(2, 3), 67);
        assert_eq!(compute_progress(3, 3), 100);
    }
}
