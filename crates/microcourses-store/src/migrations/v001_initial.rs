//! v001 -- Initial schema creation.
//!
//! Creates the seven core tables: `users`, `courses`, `lessons`,
//! `enrollments`, `enrollment_lessons`, `certificates`, and `sessions`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email            TEXT NOT NULL UNIQUE,
    password_hash    TEXT NOT NULL,
    role             TEXT NOT NULL,               -- learner | creator | admin
    approved_creator INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at       TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Courses
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS courses (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    title             TEXT NOT NULL,
    description       TEXT NOT NULL,
    creator_id        TEXT NOT NULL,              -- FK -> users(id)
    status            TEXT NOT NULL DEFAULT 'draft',
    next_lesson_index INTEGER NOT NULL DEFAULT 0, -- monotonic lesson counter
    created_at        TEXT NOT NULL,

    FOREIGN KEY (creator_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_courses_status_created
    ON courses(status, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_courses_creator ON courses(creator_id);

-- ----------------------------------------------------------------
-- Lessons (owned by their course, append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS lessons (
    id          TEXT PRIMARY KEY NOT NULL,        -- UUID v4
    course_id   TEXT NOT NULL,                    -- FK -> courses(id)
    title       TEXT NOT NULL,
    content     TEXT NOT NULL,
    video_url   TEXT NOT NULL DEFAULT '',
    order_index INTEGER NOT NULL,                 -- 0-based, never reassigned
    duration    INTEGER NOT NULL DEFAULT 0,       -- minutes
    transcript  TEXT NOT NULL DEFAULT '',

    FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
    UNIQUE (course_id, order_index)
);

CREATE INDEX IF NOT EXISTS idx_lessons_course
    ON lessons(course_id, order_index);

-- ----------------------------------------------------------------
-- Enrollments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS enrollments (
    id          TEXT PRIMARY KEY NOT NULL,        -- UUID v4
    user_id     TEXT NOT NULL,                    -- FK -> users(id)
    course_id   TEXT NOT NULL,                    -- FK -> courses(id)
    progress    INTEGER NOT NULL DEFAULT 0,       -- 0..=100, derived
    completed   INTEGER NOT NULL DEFAULT 0,       -- boolean 0/1, sticky
    enrolled_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (course_id) REFERENCES courses(id),
    UNIQUE (user_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_enrollments_user
    ON enrollments(user_id, enrolled_at DESC);

-- ----------------------------------------------------------------
-- Completed lessons per enrollment (idempotent set)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS enrollment_lessons (
    enrollment_id TEXT NOT NULL,                  -- FK -> enrollments(id)
    lesson_id     TEXT NOT NULL,
    completed_at  TEXT NOT NULL,

    PRIMARY KEY (enrollment_id, lesson_id),
    FOREIGN KEY (enrollment_id) REFERENCES enrollments(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Certificates
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS certificates (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id          TEXT NOT NULL,               -- FK -> users(id)
    course_id        TEXT NOT NULL,               -- FK -> courses(id)
    certificate_hash TEXT NOT NULL UNIQUE,
    issued_at        TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (course_id) REFERENCES courses(id),
    UNIQUE (user_id, course_id)
);

CREATE INDEX IF NOT EXISTS idx_certificates_user
    ON certificates(user_id, issued_at DESC);

-- ----------------------------------------------------------------
-- Sessions (bearer tokens)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,         -- 32 random bytes, hex
    user_id    TEXT NOT NULL,                     -- FK -> users(id)
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
