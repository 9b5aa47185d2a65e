//! Authentication and the role/ownership authorization gate.
//!
//! Bearer tokens are opaque 32-byte random values resolved through the
//! `sessions` table.  Authentication always runs before any resource
//! lookup, so unauthenticated callers learn nothing about what exists.
//!
//! All role and ownership decisions go through the three gate functions
//! below rather than ad-hoc checks in handlers, so enforcement is uniform
//! and testable.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use rand::RngCore;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use microcourses_store::{Database, Role, Session, StoreError, User};

use crate::error::ApiError;

/// Authenticated caller identity as consumed by the workflow layer.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub approved_creator: bool,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            approved_creator: user.approved_creator,
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Resolve the request's bearer token to a user identity.
pub fn authenticate(db: &Database, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::unauthorized("Not authorized to access this route"))?;

    let session = db
        .find_session(token)?
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;

    if session.expires_at < Utc::now() {
        return Err(ApiError::unauthorized("Invalid token"));
    }

    match db.get_user(session.user_id) {
        Ok(user) => Ok(user.into()),
        Err(StoreError::NotFound) => Err(ApiError::unauthorized("User not found")),
        Err(e) => Err(e.into()),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

// ---------------------------------------------------------------------------
// Authorization gate
// ---------------------------------------------------------------------------

/// Allow the operation iff the caller's role is in `roles`.
pub fn authorize(user: &AuthUser, roles: &[Role]) -> Result<(), ApiError> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "User role {} is not authorized",
            user.role.as_str()
        )))
    }
}

/// Creators must be approved before authoring; other roles pass through.
///
/// The rejection is distinct from a role mismatch so clients can tell an
/// unapproved creator apart from a wrong-role caller.
pub fn require_approved_creator(user: &AuthUser) -> Result<(), ApiError> {
    if user.role == Role::Creator && !user.approved_creator {
        return Err(ApiError::Forbidden(
            "Creator account not approved yet".to_string(),
        ));
    }
    Ok(())
}

/// Ownership-scoped operations require the resource owner or an admin.
pub fn require_owner(user: &AuthUser, owner_id: Uuid) -> Result<(), ApiError> {
    if user.id == owner_id || user.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Not authorized to update this course".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

const SESSION_TOKEN_BYTES: usize = 32;

/// Mint a bearer token for `user_id` valid for `ttl_days`.
pub fn issue_session(db: &Database, user_id: Uuid, ttl_days: i64) -> Result<Session, ApiError> {
    let mut raw = [0u8; SESSION_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut raw);

    let now = Utc::now();
    let session = Session {
        token: hex::encode(raw),
        user_id,
        created_at: now,
        expires_at: now + Duration::days(ttl_days),
    };
    db.create_session(&session)?;
    Ok(session)
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

const PASSWORD_KDF_CONTEXT: &str = "microcourses v1 password digest";

/// Digest a password with a fresh random salt.  Stored as
/// `hex(salt)$hex(digest)`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let digest = password_digest(&salt, password);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

fn password_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(PASSWORD_KDF_CONTEXT);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Constant-time comparison of a candidate password against a stored
/// digest.  Malformed stored values simply fail verification.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };

    let digest = password_digest(&salt, password);
    expected.len() == digest.len() && digest.as_slice().ct_eq(expected.as_slice()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn learner() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "learner@example.com".to_string(),
            role: Role::Learner,
            approved_creator: false,
        }
    }

    fn seed_user(db: &Database, role: Role, approved: bool) -> AuthUser {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: hash_password("secret1"),
            role,
            approved_creator: approved,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.into()
    }

    #[test]
    fn password_round_trip() {
        let stored = hash_password("hunter22");
        assert!(verify_password(&stored, "hunter22"));
        assert!(!verify_password(&stored, "hunter23"));
        assert!(!verify_password("not-a-digest", "hunter22"));

        // Same password, fresh salt: different stored value.
        assert_ne!(stored, hash_password("hunter22"));
    }

    #[test]
    fn role_gate() {
        let user = learner();
        assert!(authorize(&user, &[Role::Learner]).is_ok());
        assert!(authorize(&user, &[Role::Creator, Role::Admin]).is_err());
    }

    #[test]
    fn unapproved_creator_is_distinct_from_role_mismatch() {
        let db = Database::in_memory().unwrap();
        let creator = seed_user(&db, Role::Creator, false);

        // Passes the role gate but fails the approval gate.
        assert!(authorize(&creator, &[Role::Creator, Role::Admin]).is_ok());
        let err = require_approved_creator(&creator).unwrap_err();
        assert_eq!(err.to_string(), "Creator account not approved yet");
    }

    #[test]
    fn ownership_gate_admits_owner_and_admin() {
        let db = Database::in_memory().unwrap();
        let owner = seed_user(&db, Role::Creator, true);
        let other = seed_user(&db, Role::Creator, true);
        let admin = seed_user(&db, Role::Admin, false);

        assert!(require_owner(&owner, owner.id).is_ok());
        assert!(require_owner(&admin, owner.id).is_ok());
        assert!(require_owner(&other, owner.id).is_err());
    }

    #[test]
    fn authenticate_resolves_valid_token() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, Role::Learner, false);
        let session = issue_session(&db, user.id, 30).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", session.token)).unwrap(),
        );

        let resolved = authenticate(&db, &headers).unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.role, Role::Learner);
    }

    #[test]
    fn authenticate_rejects_missing_expired_and_unknown_tokens() {
        let db = Database::in_memory().unwrap();
        let user = seed_user(&db, Role::Learner, false);

        // No header at all.
        assert!(authenticate(&db, &HeaderMap::new()).is_err());

        // Unknown token.
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer bogus"));
        assert!(authenticate(&db, &headers).is_err());

        // Expired session.
        let expired = issue_session(&db, user.id, -1).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", expired.token)).unwrap(),
        );
        assert!(authenticate(&db, &headers).is_err());
    }
}
