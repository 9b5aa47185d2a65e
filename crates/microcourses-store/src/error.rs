use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// A write violated a uniqueness constraint.  `field` names the first
    /// offending column so the API layer can report it.
    #[error("{field} already exists")]
    Duplicate { field: String },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Translate SQLite `UNIQUE` violations into [`StoreError::Duplicate`] with
/// the offending column named.  Everything else passes through unchanged.
pub(crate) fn translate_unique(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            if let Some(cols) = msg.strip_prefix("UNIQUE constraint failed: ") {
                let first = cols.split(',').next().unwrap_or(cols).trim();
                let field = first.rsplit('.').next().unwrap_or(first).to_string();
                return StoreError::Duplicate { field };
            }
        }
    }
    StoreError::Sqlite(err)
}

/// Map `QueryReturnedNoRows` to [`StoreError::NotFound`].
pub(crate) fn one_row(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}
