use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// A UNIQUE, NOT NULL, CHECK or FOREIGN KEY constraint rejected the write.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),
}

impl DbError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, DbError::Integrity(_))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, msg)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                DbError::Integrity(msg.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => DbError::Sqlite(err),
        }
    }
}
