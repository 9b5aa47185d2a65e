//! # microcourses-store
//!
//! SQLite persistence for the MicroCourses LMS backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model.  Uniqueness rules that the workflow layer relies on — one
//! enrollment and one certificate per `(user, course)` pair, unique emails,
//! unique certificate hashes — are enforced by the schema itself, so racing
//! writers are rejected with a [`StoreError::Duplicate`] instead of silently
//! overwriting each other.

pub mod certificates;
pub mod courses;
pub mod database;
pub mod enrollments;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod users;

mod error;
mod row;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
