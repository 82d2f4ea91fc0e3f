use thiserror::Error;

/// Uniform error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated, or a versioned update lost a race.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A stored document could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("DB lock poisoned: {0}")]
    Poisoned(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            _ => StoreError::Sqlite(err),
        }
    }
}
