//! Course authoring and the publication workflow.
//!
//! Creators move a course between `draft` and `pending`; only
//! [`set_course_status`] — the admin review decision — can take it to
//! `published` or `rejected`, so a draft can never jump straight to
//! published.

use chrono::Utc;
use uuid::Uuid;

use microcourses_store::{Course, CourseStatus, Database, NewLesson, StoreError};

use crate::auth::{self, AuthUser};
use crate::error::ApiError;

/// Create a course in `draft` for the given creator.
pub fn create_course(
    db: &Database,
    creator_id: Uuid,
    title: String,
    description: String,
) -> Result<Course, ApiError> {
    let course = Course {
        id: Uuid::new_v4(),
        title,
        description,
        creator_id,
        status: CourseStatus::Draft,
        next_lesson_index: 0,
        lessons: Vec::new(),
        created_at: Utc::now(),
    };
    db.create_course(&course)?;
    Ok(course)
}

/// Fields a creator may change on an existing course.
#[derive(Debug, Default)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Update course metadata.  Requires ownership (or admin).
///
/// Only `draft` and `pending` are reachable through this surface; any other
/// requested status value is ignored rather than rejected.
pub fn update_course(
    db: &Database,
    user: &AuthUser,
    course_id: Uuid,
    update: CourseUpdate,
) -> Result<Course, ApiError> {
    let mut course = get_course(db, course_id)?;
    auth::require_owner(user, course.creator_id)?;

    if let Some(title) = update.title.filter(|t| !t.is_empty()) {
        course.title = title;
    }
    if let Some(description) = update.description.filter(|d| !d.is_empty()) {
        course.description = description;
    }
    if let Some(status) = update.status.as_deref().and_then(CourseStatus::parse) {
        if matches!(status, CourseStatus::Draft | CourseStatus::Pending) {
            course.status = status;
        }
    }

    db.update_course(&course)?;
    Ok(course)
}

/// Lesson fields as submitted by the creator.
#[derive(Debug, Default)]
pub struct LessonInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub duration: Option<i64>,
    pub transcript: Option<String>,
}

/// Append a lesson to a course.  Requires ownership (or admin).  Returns
/// the updated course aggregate.
pub fn add_lesson(
    db: &Database,
    user: &AuthUser,
    course_id: Uuid,
    input: LessonInput,
) -> Result<Course, ApiError> {
    let course = get_course(db, course_id)?;
    auth::require_owner(user, course.creator_id)?;

    let (title, content) = match (
        input.title.filter(|t| !t.is_empty()),
        input.content.filter(|c| !c.is_empty()),
    ) {
        (Some(title), Some(content)) => (title, content),
        _ => return Err(ApiError::missing_fields("Please provide title and content")),
    };

    let transcript = match input.transcript.filter(|t| !t.trim().is_empty()) {
        Some(transcript) => transcript,
        None => auto_transcript(&content),
    };

    db.append_lesson(
        course.id,
        &NewLesson {
            title,
            content,
            video_url: input.video_url.unwrap_or_default(),
            duration: input.duration.unwrap_or(0),
            transcript,
        },
    )?;

    get_course(db, course.id)
}

/// Derive a transcript from the first 800 characters of the content.
fn auto_transcript(content: &str) -> String {
    let prefix: String = content.chars().take(800).collect();
    let ellipsis = if content.chars().count() > 800 { "..." } else { "" };
    format!("{prefix}{ellipsis}\n\n[Auto-generated transcript]")
}

/// Admin review decision: publish or reject a pending course.
pub fn set_course_status(
    db: &Database,
    course_id: Uuid,
    status_value: Option<&str>,
) -> Result<Course, ApiError> {
    let status = match status_value.and_then(CourseStatus::parse) {
        Some(status @ (CourseStatus::Published | CourseStatus::Rejected)) => status,
        _ => {
            return Err(ApiError::validation_field(
                "INVALID_STATUS",
                "Status must be either published or rejected",
                "status",
            ))
        }
    };

    let mut course = get_course(db, course_id)?;
    course.status = status;
    db.update_course(&course)?;
    Ok(course)
}

fn get_course(db: &Database, course_id: Uuid) -> Result<Course, ApiError> {
    match db.get_course(course_id) {
        Ok(course) => Ok(course),
        Err(StoreError::NotFound) => Err(ApiError::NotFound("Course")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microcourses_store::{Role, User};

    fn seed_user(db: &Database, role: Role, approved: bool) -> AuthUser {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "digest".to_string(),
            role,
            approved_creator: approved,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.into()
    }

    fn lesson_input(title: &str, content: &str) -> LessonInput {
        LessonInput {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            ..LessonInput::default()
        }
    }

    #[test]
    fn new_courses_start_in_draft() {
        let db = Database::in_memory().unwrap();
        let creator = seed_user(&db, Role::Creator, true);

        let course = create_course(
            &db,
            creator.id,
            "Rust 101".to_string(),
            "The basics".to_string(),
        )
        .unwrap();
        assert_eq!(course.status, CourseStatus::Draft);
        assert!(course.lessons.is_empty());
    }

    #[test]
    fn creators_cannot_self_publish() {
        let db = Database::in_memory().unwrap();
        let creator = seed_user(&db, Role::Creator, true);
        let course = create_course(&db, creator.id, "T".into(), "D".into()).unwrap();

        // Submitting for review works...
        let updated = update_course(
            &db,
            &creator,
            course.id,
            CourseUpdate {
                status: Some("pending".to_string()),
                ..CourseUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, CourseStatus::Pending);

        // ...but a requested "published" is ignored on this surface.
        let updated = update_course(
            &db,
            &creator,
            course.id,
            CourseUpdate {
                status: Some("published".to_string()),
                ..CourseUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, CourseStatus::Pending);
    }

    #[test]
    fn only_owner_or_admin_may_edit() {
        let db = Database::in_memory().unwrap();
        let owner = seed_user(&db, Role::Creator, true);
        let other = seed_user(&db, Role::Creator, true);
        let admin = seed_user(&db, Role::Admin, false);
        let course = create_course(&db, owner.id, "T".into(), "D".into()).unwrap();

        let err = add_lesson(&db, &other, course.id, lesson_input("L", "C")).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        add_lesson(&db, &owner, course.id, lesson_input("L1", "C1")).unwrap();
        let updated = add_lesson(&db, &admin, course.id, lesson_input("L2", "C2")).unwrap();
        assert_eq!(updated.lessons.len(), 2);
        assert_eq!(updated.lessons[1].order_index, 1);
    }

    #[test]
    fn lesson_requires_title_and_content() {
        let db = Database::in_memory().unwrap();
        let creator = seed_user(&db, Role::Creator, true);
        let course = create_course(&db, creator.id, "T".into(), "D".into()).unwrap();

        let err = add_lesson(
            &db,
            &creator,
            course.id,
            LessonInput {
                title: Some("only a title".to_string()),
                ..LessonInput::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "MISSING_FIELDS");
    }

    #[test]
    fn transcript_is_derived_when_absent() {
        let db = Database::in_memory().unwrap();
        let creator = seed_user(&db, Role::Creator, true);
        let course = create_course(&db, creator.id, "T".into(), "D".into()).unwrap();

        let short = add_lesson(&db, &creator, course.id, lesson_input("L", "short content"))
            .unwrap();
        assert_eq!(
            short.lessons[0].transcript,
            "short content\n\n[Auto-generated transcript]"
        );

        let long_content = "x".repeat(900);
        let long = add_lesson(
            &db,
            &creator,
            course.id,
            lesson_input("L2", &long_content),
        )
        .unwrap();
        let transcript = &long.lessons[1].transcript;
        assert!(transcript.starts_with(&"x".repeat(800)));
        assert!(transcript.contains("..."));

        // An explicit transcript is kept as-is.
        let explicit = add_lesson(
            &db,
            &creator,
            course.id,
            LessonInput {
                transcript: Some("my own words".to_string()),
                ..lesson_input("L3", "content")
            },
        )
        .unwrap();
        assert_eq!(explicit.lessons[2].transcript, "my own words");
    }

    #[test]
    fn admin_review_accepts_only_terminal_statuses() {
        let db = Database::in_memory().unwrap();
        let creator = seed_user(&db, Role::Creator, true);
        let course = create_course(&db, creator.id, "T".into(), "D".into()).unwrap();

        let err = set_course_status(&db, course.id, Some("draft")).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");
        let err = set_course_status(&db, course.id, None).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");

        let published = set_course_status(&db, course.id, Some("published")).unwrap();
        assert_eq!(published.status, CourseStatus::Published);
    }
}
