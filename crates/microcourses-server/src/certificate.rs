//! Certificate issuance.
//!
//! One-shot conversion of a completed enrollment into an immutable
//! certificate.  Preconditions are checked in a fixed order, each with its
//! own error; the store's uniqueness constraints on `(user, course)` and on
//! the hash are the correctness guarantee when two requests race past the
//! existence check (the idempotency cache is the primary defense against
//! plain retries).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use microcourses_store::{Certificate, Database, StoreError};

use crate::error::ApiError;

const CERTIFICATE_HASH_CONTEXT: &str = "microcourses v1 certificate hash";

/// Issue a certificate for a completed enrollment.
pub fn issue_certificate(
    db: &Database,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Certificate, ApiError> {
    let enrollment = match db.get_enrollment(user_id, course_id) {
        Ok(enrollment) => enrollment,
        Err(StoreError::NotFound) => return Err(ApiError::NotFound("Enrollment")),
        Err(e) => return Err(e.into()),
    };

    if !enrollment.completed || enrollment.progress < 100 {
        return Err(ApiError::precondition(
            "INCOMPLETE_COURSE",
            "Course must be completed to generate certificate",
        ));
    }

    if db.find_certificate(user_id, course_id)?.is_some() {
        return Err(certificate_exists());
    }

    // The course must still exist to be referenced by the certificate.
    if let Err(e) = db.get_course(course_id) {
        return Err(match e {
            StoreError::NotFound => ApiError::NotFound("Course"),
            other => other.into(),
        });
    }

    let issued_at = Utc::now();
    let certificate = Certificate {
        id: Uuid::new_v4(),
        user_id,
        course_id,
        certificate_hash: certificate_hash(user_id, course_id, issued_at),
        issued_at,
    };

    match db.create_certificate(&certificate) {
        Ok(()) => Ok(certificate),
        Err(StoreError::Duplicate { .. }) => Err(certificate_exists()),
        Err(e) => Err(e.into()),
    }
}

fn certificate_exists() -> ApiError {
    ApiError::conflict(
        "CERTIFICATE_EXISTS",
        "Certificate already generated for this course",
    )
}

/// Hash over (user, course, issuance time).  Collision-resistant and
/// non-reversible; doubles as the certificate's public identifier.
fn certificate_hash(user_id: Uuid, course_id: Uuid, issued_at: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new_derive_key(CERTIFICATE_HASH_CONTEXT);
    hasher.update(user_id.as_bytes());
    hasher.update(course_id.as_bytes());
    hasher.update(&issued_at.timestamp_millis().to_le_bytes());
    hasher.finalize().to_hex().to_string()
}
