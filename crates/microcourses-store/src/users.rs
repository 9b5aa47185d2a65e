//! CRUD operations for [`User`] records.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{one_row, translate_unique, Result, StoreError};
use crate::models::{InvalidEnumValue, Role, User};
use crate::row::{col_timestamp, col_uuid, conv_err};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  A duplicate email is rejected with
    /// [`StoreError::Duplicate`].
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, password_hash, role, approved_creator, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.approved_creator,
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(translate_unique)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, email, password_hash, role, approved_creator, created_at
                 FROM users
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(one_row)
    }

    /// Look a user up by email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.conn().query_row(
            "SELECT id, email, password_hash, role, approved_creator, created_at
             FROM users
             WHERE email = ?1",
            params![email],
            row_to_user,
        ) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List creators awaiting approval, newest first.
    pub fn list_creator_applications(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, email, password_hash, role, approved_creator, created_at
             FROM users
             WHERE role = 'creator' AND approved_creator = 0
             ORDER BY created_at DESC
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit, offset], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Count creators awaiting approval.
    pub fn count_creator_applications(&self) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'creator' AND approved_creator = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Mark a creator account as approved and return the updated record.
    pub fn approve_creator(&self, id: Uuid) -> Result<User> {
        let affected = self.conn().execute(
            "UPDATE users SET approved_creator = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_user(id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_str: String = row.get(3)?;
    let role = Role::parse(&role_str).ok_or_else(|| {
        conv_err(
            3,
            InvalidEnumValue {
                field: "role",
                value: role_str.clone(),
            },
        )
    })?;

    Ok(User {
        id: col_uuid(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role,
        approved_creator: row.get(4)?,
        created_at: col_timestamp(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(email: &str, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "digest".to_string(),
            role,
            approved_creator: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_fetch_round_trip() {
        let db = Database::in_memory().unwrap();
        let u = user("alice@example.com", Role::Learner);
        db.create_user(&u).unwrap();

        let fetched = db.get_user(u.id).unwrap();
        assert_eq!(fetched, u);
        assert_eq!(
            db.find_user_by_email("alice@example.com").unwrap(),
            Some(u)
        );
        assert_eq!(db.find_user_by_email("nobody@example.com").unwrap(), None);
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = Database::in_memory().unwrap();
        db.create_user(&user("dup@example.com", Role::Learner))
            .unwrap();

        let err = db
            .create_user(&user("dup@example.com", Role::Creator))
            .unwrap_err();
        match err {
            StoreError::Duplicate { field } => assert_eq!(field, "email"),
            other => panic!("expected Duplicate, got {other:?}"),
        }
    }

    #[test]
    fn approve_creator_flips_flag() {
        let db = Database::in_memory().unwrap();
        let u = user("creator@example.com", Role::Creator);
        db.create_user(&u).unwrap();

        assert_eq!(db.count_creator_applications().unwrap(), 1);
        let approved = db.approve_creator(u.id).unwrap();
        assert!(approved.approved_creator);
        assert_eq!(db.count_creator_applications().unwrap(), 0);

        assert!(matches!(
            db.approve_creator(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
