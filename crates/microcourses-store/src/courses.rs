//! CRUD operations for [`Course`] aggregates and their owned lessons.
//!
//! Lessons are append-only.  The order index of a new lesson is reserved
//! from the course's `next_lesson_index` counter inside a single
//! transaction, so concurrent appends can never hand out the same index.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{one_row, Result, StoreError};
use crate::models::{Course, CourseStatus, InvalidEnumValue, Lesson, NewLesson};
use crate::row::{col_timestamp, col_uuid, conv_err};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new course.  Any lessons on the struct are ignored; lessons
    /// only enter the store through [`Database::append_lesson`].
    pub fn create_course(&self, course: &Course) -> Result<()> {
        self.conn().execute(
            "INSERT INTO courses (id, title, description, creator_id, status, next_lesson_index, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                course.id.to_string(),
                course.title,
                course.description,
                course.creator_id.to_string(),
                course.status.as_str(),
                course.next_lesson_index,
                course.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Append a lesson to a course, reserving its order index from the
    /// aggregate counter.  Returns the stored lesson.
    pub fn append_lesson(&self, course_id: Uuid, new: &NewLesson) -> Result<Lesson> {
        let tx = self.conn().unchecked_transaction()?;

        let next: i64 = tx
            .query_row(
                "SELECT next_lesson_index FROM courses WHERE id = ?1",
                params![course_id.to_string()],
                |row| row.get(0),
            )
            .map_err(one_row)?;

        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id,
            title: new.title.clone(),
            content: new.content.clone(),
            video_url: new.video_url.clone(),
            order_index: next,
            duration: new.duration,
            transcript: new.transcript.clone(),
        };

        tx.execute(
            "INSERT INTO lessons (id, course_id, title, content, video_url, order_index, duration, transcript)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                lesson.id.to_string(),
                lesson.course_id.to_string(),
                lesson.title,
                lesson.content,
                lesson.video_url,
                lesson.order_index,
                lesson.duration,
                lesson.transcript,
            ],
        )?;
        tx.execute(
            "UPDATE courses SET next_lesson_index = ?1 WHERE id = ?2",
            params![next + 1, course_id.to_string()],
        )?;

        tx.commit()?;
        Ok(lesson)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a course by id, lessons included in order.
    pub fn get_course(&self, id: Uuid) -> Result<Course> {
        let mut course = self
            .conn()
            .query_row(
                "SELECT id, title, description, creator_id, status, next_lesson_index, created_at
                 FROM courses
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_course,
            )
            .map_err(one_row)?;

        course.lessons = self.lessons_for_course(id)?;
        Ok(course)
    }

    /// All lessons of a course, ordered by their append index.
    pub fn lessons_for_course(&self, course_id: Uuid) -> Result<Vec<Lesson>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, course_id, title, content, video_url, order_index, duration, transcript
             FROM lessons
             WHERE course_id = ?1
             ORDER BY order_index ASC",
        )?;

        let rows = stmt.query_map(params![course_id.to_string()], row_to_lesson)?;

        let mut lessons = Vec::new();
        for row in rows {
            lessons.push(row?);
        }
        Ok(lessons)
    }

    /// List published courses, newest first, optionally filtered by a
    /// case-insensitive title/description search term.
    pub fn list_published_courses(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Course>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, description, creator_id, status, next_lesson_index, created_at
             FROM courses
             WHERE status = 'published'
               AND (?1 IS NULL OR title LIKE '%' || ?1 || '%' OR description LIKE '%' || ?1 || '%')
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![search, limit, offset], row_to_course)?;
        self.attach_lessons(rows)
    }

    /// Count published courses matching the search term.
    pub fn count_published_courses(&self, search: Option<&str>) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM courses
             WHERE status = 'published'
               AND (?1 IS NULL OR title LIKE '%' || ?1 || '%' OR description LIKE '%' || ?1 || '%')",
            params![search],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// List a creator's own courses, newest first.
    pub fn list_courses_by_creator(
        &self,
        creator_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Course>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, description, creator_id, status, next_lesson_index, created_at
             FROM courses
             WHERE creator_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(params![creator_id.to_string(), limit, offset], row_to_course)?;
        self.attach_lessons(rows)
    }

    /// Count a creator's courses.
    pub fn count_courses_by_creator(&self, creator_id: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM courses WHERE creator_id = ?1",
            params![creator_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// List courses for admin review, newest first.  `status = None` lists
    /// every course regardless of workflow state.
    pub fn list_courses_by_status(
        &self,
        status: Option<CourseStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Course>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, title, description, creator_id, status, next_lesson_index, created_at
             FROM courses
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(
            params![status.map(|s| s.as_str()), limit, offset],
            row_to_course,
        )?;
        self.attach_lessons(rows)
    }

    /// Count courses in a given workflow state (or all of them).
    pub fn count_courses_by_status(&self, status: Option<CourseStatus>) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM courses WHERE (?1 IS NULL OR status = ?1)",
            params![status.map(|s| s.as_str())],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Persist the mutable course metadata (title, description, status).
    pub fn update_course(&self, course: &Course) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE courses SET title = ?1, description = ?2, status = ?3 WHERE id = ?4",
            params![
                course.title,
                course.description,
                course.status.as_str(),
                course.id.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn attach_lessons(
        &self,
        rows: impl Iterator<Item = rusqlite::Result<Course>>,
    ) -> Result<Vec<Course>> {
        let mut courses = Vec::new();
        for row in rows {
            let mut course = row?;
            course.lessons = self.lessons_for_course(course.id)?;
            courses.push(course);
        }
        Ok(courses)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Course`] (lessons attached separately).
fn row_to_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    let status_str: String = row.get(4)?;
    let status = CourseStatus::parse(&status_str).ok_or_else(|| {
        conv_err(
            4,
            InvalidEnumValue {
                field: "status",
                value: status_str.clone(),
            },
        )
    })?;

    Ok(Course {
        id: col_uuid(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        creator_id: col_uuid(row, 3)?,
        status,
        next_lesson_index: row.get(5)?,
        lessons: Vec::new(),
        created_at: col_timestamp(row, 6)?,
    })
}

/// Map a `rusqlite::Row` to a [`Lesson`].
fn row_to_lesson(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: col_uuid(row, 0)?,
        course_id: col_uuid(row, 1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        video_url: row.get(4)?,
        order_index: row.get(5)?,
        duration: row.get(6)?,
        transcript: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use chrono::Utc;

    fn seed_creator(db: &Database) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "digest".to_string(),
            role: Role::Creator,
            approved_creator: true,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id
    }

    fn seed_course(db: &Database, status: CourseStatus) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            title: "Intro to Rust".to_string(),
            description: "Ownership and borrowing".to_string(),
            creator_id: seed_creator(db),
            status,
            next_lesson_index: 0,
            lessons: Vec::new(),
            created_at: Utc::now(),
        };
        db.create_course(&course).unwrap();
        course
    }

    fn lesson(title: &str) -> NewLesson {
        NewLesson {
            title: title.to_string(),
            content: "content".to_string(),
            video_url: String::new(),
            duration: 5,
            transcript: String::new(),
        }
    }

    #[test]
    fn append_assigns_indices_from_counter() {
        let db = Database::in_memory().unwrap();
        let course = seed_course(&db, CourseStatus::Draft);

        let a = db.append_lesson(course.id, &lesson("one")).unwrap();
        let b = db.append_lesson(course.id, &lesson("two")).unwrap();
        assert_eq!(a.order_index, 0);
        assert_eq!(b.order_index, 1);

        let fetched = db.get_course(course.id).unwrap();
        assert_eq!(fetched.next_lesson_index, 2);
        assert_eq!(
            fetched.lessons.iter().map(|l| l.order_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn append_to_missing_course_is_not_found() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.append_lesson(Uuid::new_v4(), &lesson("orphan")),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn published_listing_filters_and_searches() {
        let db = Database::in_memory().unwrap();
        let published = seed_course(&db, CourseStatus::Published);
        seed_course(&db, CourseStatus::Draft);

        assert_eq!(db.count_published_courses(None).unwrap(), 1);
        assert_eq!(db.count_published_courses(Some("rust")).unwrap(), 1);
        assert_eq!(db.count_published_courses(Some("haskell")).unwrap(), 0);

        let listed = db.list_published_courses(Some("rust"), 10, 0).unwrap();
        assert_eq!(listed, vec![published]);
    }

    #[test]
    fn update_course_persists_status() {
        let db = Database::in_memory().unwrap();
        let mut course = seed_course(&db, CourseStatus::Draft);

        course.status = CourseStatus::Pending;
        db.update_course(&course).unwrap();
        assert_eq!(db.get_course(course.id).unwrap().status, CourseStatus::Pending);
    }
}
