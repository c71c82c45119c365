pub mod auth;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod relations;

pub use error::{DbError, Result};

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database named by a `DATABASE_URL` style string.
    ///
    /// Accepts `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>` or a bare path.
    pub fn connect(url: &str) -> Result<Self> {
        match database_path(url)? {
            Some(path) => Self::open(&path),
            None => Self::open_in_memory(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self::init(Connection::open_in_memory()?)?;
        info!("In-memory database opened");
        Ok(db)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Cascading deletes depend on this
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// `None` means an in-memory database.
fn database_path(url: &str) -> Result<Option<PathBuf>> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);

    if rest.is_empty() || rest == ":memory:" {
        return Ok(None);
    }
    if rest.contains("://") {
        return Err(DbError::UnsupportedUrl(url.to_string()));
    }
    Ok(Some(PathBuf::from(rest)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::Database;
    use crate::models::{NewUser, UserRow};

    pub fn test_db() -> Database {
        Database::open_in_memory().expect("in-memory database")
    }

    /// Inserts a user with a placeholder password, the way fixtures do.
    pub fn add_user(db: &Database, username: &str) -> UserRow {
        let email = format!("{username}@test.com");
        db.create_user(&NewUser {
            email: &email,
            username,
            password: "HASHED_PASSWORD",
            image_url: None,
        })
        .expect("create user")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_forms() {
        assert_eq!(database_path("sqlite::memory:").unwrap(), None);
        assert_eq!(database_path("").unwrap(), None);
        assert_eq!(
            database_path("sqlite://warbler.db").unwrap(),
            Some(PathBuf::from("warbler.db"))
        );
        assert_eq!(
            database_path("sqlite:/tmp/warbler-test.db").unwrap(),
            Some(PathBuf::from("/tmp/warbler-test.db"))
        );
        assert_eq!(
            database_path("warbler.db").unwrap(),
            Some(PathBuf::from("warbler.db"))
        );
    }

    #[test]
    fn non_sqlite_urls_are_rejected() {
        let err = database_path("postgresql:///warbler-test").unwrap_err();
        assert!(matches!(err, DbError::UnsupportedUrl(_)));
    }
}
