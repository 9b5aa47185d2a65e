//! CRUD operations for [`Enrollment`] records and their completion sets.
//!
//! The `(user, course)` uniqueness constraint lives in the schema, so two
//! racing enroll requests cannot both succeed; the loser gets a
//! [`StoreError::Duplicate`].  Completion-set insertion uses
//! `INSERT OR IGNORE`, making lesson completion naturally idempotent.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{one_row, translate_unique, Result, StoreError};
use crate::models::Enrollment;
use crate::row::{col_timestamp, col_uuid};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new enrollment.  A second enrollment for the same
    /// `(user, course)` pair is rejected with [`StoreError::Duplicate`].
    pub fn create_enrollment(&self, enrollment: &Enrollment) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO enrollments (id, user_id, course_id, progress, completed, enrolled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    enrollment.id.to_string(),
                    enrollment.user_id.to_string(),
                    enrollment.course_id.to_string(),
                    enrollment.progress,
                    enrollment.completed,
                    enrollment.enrolled_at.to_rfc3339(),
                ],
            )
            .map_err(translate_unique)?;
        Ok(())
    }

    /// Add a lesson to an enrollment's completion set.  Returns `true` if
    /// the lesson was newly inserted, `false` if it was already present.
    pub fn mark_lesson_completed(&self, enrollment_id: Uuid, lesson_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO enrollment_lessons (enrollment_id, lesson_id, completed_at)
             VALUES (?1, ?2, ?3)",
            params![
                enrollment_id.to_string(),
                lesson_id.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch the enrollment for a `(user, course)` pair.
    pub fn get_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let mut enrollment = self
            .conn()
            .query_row(
                "SELECT id, user_id, course_id, progress, completed, enrolled_at
                 FROM enrollments
                 WHERE user_id = ?1 AND course_id = ?2",
                params![user_id.to_string(), course_id.to_string()],
                row_to_enrollment,
            )
            .map_err(one_row)?;

        enrollment.completed_lessons = self.completed_lesson_ids(enrollment.id)?;
        Ok(enrollment)
    }

    /// Like [`Database::get_enrollment`] but `None` instead of an error when
    /// the pair has no enrollment.
    pub fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        match self.get_enrollment(user_id, course_id) {
            Ok(enrollment) => Ok(Some(enrollment)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The completion set of an enrollment, in insertion order.
    pub fn completed_lesson_ids(&self, enrollment_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn().prepare(
            "SELECT lesson_id FROM enrollment_lessons
             WHERE enrollment_id = ?1
             ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![enrollment_id.to_string()], |row| col_uuid(row, 0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// List a learner's enrollments, newest first.
    pub fn list_enrollments_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Enrollment>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, course_id, progress, completed, enrolled_at
             FROM enrollments
             WHERE user_id = ?1
             ORDER BY enrolled_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![user_id.to_string(), limit, offset], row_to_enrollment)?;

        let mut enrollments = Vec::new();
        for row in rows {
            let mut enrollment = row?;
            enrollment.completed_lessons = self.completed_lesson_ids(enrollment.id)?;
            enrollments.push(enrollment);
        }
        Ok(enrollments)
    }

    /// Count a learner's enrollments.
    pub fn count_enrollments_for_user(&self, user_id: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM enrollments WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Persist a recomputed progress value and completion flag.
    pub fn update_enrollment_progress(
        &self,
        enrollment_id: Uuid,
        progress: i64,
        completed: bool,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE enrollments SET progress = ?1, completed = ?2 WHERE id = ?3",
            params![progress, completed, enrollment_id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`Enrollment`] (completion set attached
/// separately).
fn row_to_enrollment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: col_uuid(row, 0)?,
        user_id: col_uuid(row, 1)?,
        course_id: col_uuid(row, 2)?,
        progress: row.get(3)?,
        completed_lessons: Vec::new(),
        completed: row.get(4)?,
        enrolled_at: col_timestamp(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, CourseStatus, Role, User};
    use chrono::Utc;

    fn seed_user(db: &Database, role: Role) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "digest".to_string(),
            role,
            approved_creator: role == Role::Creator,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id
    }

    fn seed_course(db: &Database) -> Uuid {
        let course = Course {
            id: Uuid::new_v4(),
            title: "Course".to_string(),
            description: "About things".to_string(),
            creator_id: seed_user(db, Role::Creator),
            status: CourseStatus::Published,
            next_lesson_index: 0,
            lessons: Vec::new(),
            created_at: Utc::now(),
        };
        db.create_course(&course).unwrap();
        course.id
    }

    fn enrollment(user_id: Uuid, course_id: Uuid) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            progress: 0,
            completed_lessons: Vec::new(),
            completed: false,
            enrolled_at: Utc::now(),
        }
    }

    #[test]
    fn one_enrollment_per_pair() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, Role::Learner);
        let course = seed_course(&db);

        db.create_enrollment(&enrollment(user, course)).unwrap();
        let err = db.create_enrollment(&enrollment(user, course)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));

        // A different course for the same user is fine.
        db.create_enrollment(&enrollment(user, seed_course(&db)))
            .unwrap();
        assert_eq!(db.count_enrollments_for_user(user).unwrap(), 2);
    }

    #[test]
    fn completion_set_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let e = enrollment(seed_user(&db, Role::Learner), seed_course(&db));
        db.create_enrollment(&e).unwrap();

        let lesson = Uuid::new_v4();
        assert!(db.mark_lesson_completed(e.id, lesson).unwrap());
        assert!(!db.mark_lesson_completed(e.id, lesson).unwrap());

        assert_eq!(db.completed_lesson_ids(e.id).unwrap(), vec![lesson]);
    }

    #[test]
    fn progress_update_round_trip() {
        let db = Database::in_memory().unwrap();
        let e = enrollment(seed_user(&db, Role::Learner), seed_course(&db));
        db.create_enrollment(&e).unwrap();

        db.update_enrollment_progress(e.id, 50, false).unwrap();
        let fetched = db.get_enrollment(e.user_id, e.course_id).unwrap();
        assert_eq!(fetched.progress, 50);
        assert!(!fetched.completed);

        assert!(matches!(
            db.update_enrollment_progress(Uuid::new_v4(), 10, false),
            Err(StoreError::NotFound)
        ));
    }
}
