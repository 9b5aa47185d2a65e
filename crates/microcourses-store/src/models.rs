//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer; field names are camelCased on the wire to match the public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raised by row mappers when a stored enum value is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("invalid {field} value: {value}")]
pub struct InvalidEnumValue {
    pub field: &'static str,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account role.  Learners consume courses, creators author them, admins
/// review courses and approve creators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Learner,
    Creator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Learner => "learner",
            Role::Creator => "creator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "learner" => Some(Role::Learner),
            "creator" => Some(Role::Creator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Course status
// ---------------------------------------------------------------------------

/// Publication workflow state of a course.
///
/// `Draft -> Pending` is a creator action; `Pending -> Published/Rejected`
/// is an admin decision.  Only published courses accept enrollments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Pending,
    Published,
    Rejected,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Pending => "pending",
            CourseStatus::Published => "published",
            CourseStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<CourseStatus> {
        match value {
            "draft" => Some(CourseStatus::Draft),
            "pending" => Some(CourseStatus::Pending),
            "published" => Some(CourseStatus::Published),
            "rejected" => Some(CourseStatus::Rejected),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.  The password digest never leaves the process.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub approved_creator: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Course & Lesson
// ---------------------------------------------------------------------------

/// A course aggregate: metadata plus its owned, ordered lessons.
///
/// `next_lesson_index` is a monotonic counter reserved inside the append
/// transaction; lesson order indices come from it, never from the transient
/// lesson count, so indices are stable and never reassigned.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub creator_id: Uuid,
    pub status: CourseStatus,
    #[serde(skip_serializing)]
    pub next_lesson_index: i64,
    pub lessons: Vec<Lesson>,
    pub created_at: DateTime<Utc>,
}

/// A lesson embedded in a course.  Lessons are append-only; `order_index`
/// is assigned at creation and never changes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content: String,
    pub video_url: String,
    pub order_index: i64,
    /// Duration in minutes.
    pub duration: i64,
    pub transcript: String,
}

/// Lesson fields supplied by the caller; id and order index are assigned by
/// the store at append time.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub title: String,
    pub content: String,
    pub video_url: String,
    pub duration: i64,
    pub transcript: String,
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// Per-learner-per-course progress record.  Unique on `(user, course)`.
///
/// `progress` is derived from the completion set and the course's live
/// lesson count; `completed` becomes true at 100% and never reverts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress: i64,
    pub completed_lessons: Vec<Uuid>,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Proof of course completion.  Immutable once created; unique per
/// `(user, course)` pair and by hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub certificate_hash: String,
    pub issued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An opaque bearer token resolving to a user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
