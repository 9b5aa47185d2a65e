//! Startup bootstrap: the admin account and an optional demo course.
//!
//! Bootstrap failures are logged and never abort startup.

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use microcourses_store::{Course, CourseStatus, Database, NewLesson, Role, User};

use crate::auth;
use crate::config::ServerConfig;

/// Ensure the configured admin account exists.
pub fn initialize_admin(db: &Database, config: &ServerConfig) {
    if let Err(e) = ensure_admin(db, &config.admin_email, &config.admin_password) {
        error!(error = %e, "Error initializing admin");
    }
}

fn ensure_admin(db: &Database, email: &str, password: &str) -> anyhow::Result<()> {
    if db.find_user_by_email(email)?.is_some() {
        info!("Admin user already exists");
        return Ok(());
    }

    db.create_user(&User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: auth::hash_password(password),
        role: Role::Admin,
        approved_creator: false,
        created_at: Utc::now(),
    })?;
    info!("Admin user created successfully");
    Ok(())
}

/// Seed one published demo course with two lessons, but only when the
/// store has no courses at all.
pub fn seed_demo_data(db: &Database, config: &ServerConfig) {
    if let Err(e) = seed_demo(db, &config.admin_email) {
        error!(error = %e, "Demo seed error");
    }
}

fn seed_demo(db: &Database, admin_email: &str) -> anyhow::Result<()> {
    if db.count_courses_by_status(None)? > 0 {
        return Ok(());
    }

    let Some(admin) = db.find_user_by_email(admin_email)? else {
        return Ok(());
    };

    let course = Course {
        id: Uuid::new_v4(),
        title: "Intro to MicroCourses".to_string(),
        description: "A quick sample course to demonstrate the LMS workflow.".to_string(),
        creator_id: admin.id,
        status: CourseStatus::Published,
        next_lesson_index: 0,
        lessons: Vec::new(),
        created_at: Utc::now(),
    };
    db.create_course(&course)?;

    db.append_lesson(
        course.id,
        &NewLesson {
            title: "Welcome".to_string(),
            content: "Welcome to the MicroCourses demo! This lesson explains the basics."
                .to_string(),
            video_url: String::new(),
            duration: 5,
            transcript: "Auto-generated transcript: Welcome to the MicroCourses demo!"
                .to_string(),
        },
    )?;
    db.append_lesson(
        course.id,
        &NewLesson {
            title: "Your First Steps".to_string(),
            content: "Enroll, complete lessons, and generate your certificate when done."
                .to_string(),
            video_url: String::new(),
            duration: 7,
            transcript:
                "Auto-generated transcript: Enroll, complete lessons, and generate your certificate."
                    .to_string(),
        },
    )?;

    info!("Seeded demo course");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bootstrap_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let config = ServerConfig::default();

        initialize_admin(&db, &config);
        initialize_admin(&db, &config);

        let admin = db
            .find_user_by_email(&config.admin_email)
            .unwrap()
            .expect("admin created");
        assert_eq!(admin.role, Role::Admin);
    }

    #[test]
    fn demo_seed_runs_once_and_needs_admin() {
        let db = Database::in_memory().unwrap();
        let config = ServerConfig::default();

        // Without an admin there is nothing to own the course.
        seed_demo_data(&db, &config);
        assert_eq!(db.count_courses_by_status(None).unwrap(), 0);

        initialize_admin(&db, &config);
        seed_demo_data(&db, &config);
        seed_demo_data(&db, &config);

        assert_eq!(db.count_courses_by_status(None).unwrap(), 1);
        let courses = db
            .list_courses_by_status(Some(CourseStatus::Published), 10, 0)
            .unwrap();
        assert_eq!(courses[0].lessons.len(), 2);
    }
}
