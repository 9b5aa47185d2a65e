//! CRUD operations for [`Certificate`] records.
//!
//! Certificates are immutable.  The schema enforces one certificate per
//! `(user, course)` pair and global hash uniqueness, which is the final
//! backstop against duplicate issuance when two requests race past the
//! workflow's existence check.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{translate_unique, Result, StoreError};
use crate::models::Certificate;
use crate::row::{col_timestamp, col_uuid};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new certificate.  Duplicate `(user, course)` pairs and
    /// duplicate hashes are rejected with [`StoreError::Duplicate`].
    pub fn create_certificate(&self, certificate: &Certificate) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO certificates (id, user_id, course_id, certificate_hash, issued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    certificate.id.to_string(),
                    certificate.user_id.to_string(),
                    certificate.course_id.to_string(),
                    certificate.certificate_hash,
                    certificate.issued_at.to_rfc3339(),
                ],
            )
            .map_err(translate_unique)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Look up the certificate for a `(user, course)` pair, if issued.
    pub fn find_certificate(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Certificate>> {
        match self.conn().query_row(
            "SELECT id, user_id, course_id, certificate_hash, issued_at
             FROM certificates
             WHERE user_id = ?1 AND course_id = ?2",
            params![user_id.to_string(), course_id.to_string()],
            row_to_certificate,
        ) {
            Ok(certificate) => Ok(Some(certificate)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a learner's certificates, newest first.
    pub fn list_certificates_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Certificate>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, course_id, certificate_hash, issued_at
             FROM certificates
             WHERE user_id = ?1
             ORDER BY issued_at DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(
            params![user_id.to_string(), limit, offset],
            row_to_certificate,
        )?;

        let mut certificates = Vec::new();
        for row in rows {
            certificates.push(row?);
        }
        Ok(certificates)
    }

    /// Count a learner's certificates.
    pub fn count_certificates_for_user(&self, user_id: Uuid) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM certificates WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Certificate`].
fn row_to_certificate(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: col_uuid(row, 0)?,
        user_id: col_uuid(row, 1)?,
        course_id: col_uuid(row, 2)?,
        certificate_hash: row.get(3)?,
        issued_at: col_timestamp(row, 4)?,
    })
}
