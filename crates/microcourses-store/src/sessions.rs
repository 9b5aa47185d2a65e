//! CRUD operations for [`Session`] records (bearer tokens).

use chrono::Utc;
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::Session;
use crate::row::{col_timestamp, col_uuid};

impl Database {
    /// Insert a new session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.user_id.to_string(),
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Resolve a bearer token to its session, if one exists.  Expiry is the
    /// caller's concern; expired rows are swept separately.
    pub fn find_session(&self, token: &str) -> Result<Option<Session>> {
        match self.conn().query_row(
            "SELECT token, user_id, created_at, expires_at
             FROM sessions
             WHERE token = ?1",
            params![token],
            row_to_session,
        ) {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete sessions whose expiry has passed.  Returns the number of rows
    /// removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(affected)
    }
}

/// Map a `rusqlite::Row` to a [`Session`].
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        token: row.get(0)?,
        user_id: col_uuid(row, 1)?,
        created_at: col_timestamp(row, 2)?,
        expires_at: col_timestamp(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use chrono::Duration;
    use uuid::Uuid;

    fn seed_user(db: &Database) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "digest".to_string(),
            role: Role::Learner,
            approved_creator: false,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id
    }

    fn session(db: &Database, token: &str, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            token: token.to_string(),
            user_id: seed_user(db),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[test]
    fn find_round_trip() {
        let db = Database::in_memory().unwrap();
        let s = session(&db, "tok-1", Duration::days(30));
        db.create_session(&s).unwrap();

        assert_eq!(db.find_session("tok-1").unwrap(), Some(s));
        assert_eq!(db.find_session("unknown").unwrap(), None);
    }

    #[test]
    fn purge_removes_only_expired() {
        let db = Database::in_memory().unwrap();
        let live = session(&db, "live", Duration::days(1));
        let dead = session(&db, "dead", Duration::days(-1));
        db.create_session(&live).unwrap();
        db.create_session(&dead).unwrap();

        assert_eq!(db.purge_expired_sessions().unwrap(), 1);
        assert!(db.find_session("live").unwrap().is_some());
        assert!(db.find_session("dead").unwrap().is_none());
    }
}
