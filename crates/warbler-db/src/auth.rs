use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::debug;

use crate::models::{NewUser, UserRow};
use crate::{Database, DbError, Result};

impl Database {
    /// Hash the password and create the user.
    ///
    /// A taken username or email comes back as [`DbError::Integrity`].
    pub fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        image_url: Option<&str>,
    ) -> Result<UserRow> {
        let password_hash = hash_password(password)?;

        self.create_user(&NewUser {
            email,
            username,
            password: &password_hash,
            image_url,
        })
    }

    /// Returns the user when `username` exists and `password` matches its hash.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<UserRow>> {
        let Some(user) = self.get_user_by_username(username)? else {
            debug!(username, "authenticate: no such user");
            return Ok(None);
        };

        if verify_password(password, &user.password) {
            Ok(Some(user))
        } else {
            debug!(username, "authenticate: password mismatch");
            Ok(None)
        }
    }
}

/// Argon2id with a random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Password(e.to_string()))?;
    Ok(hash.to_string())
}

/// A stored value that isn't a PHC hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_user, test_db};

    fn signup_testuser(db: &Database) -> UserRow {
        db.signup("testuser", "test@test.com", "HASHED_PASSWORD", None)
            .unwrap()
    }

    #[test]
    fn signup_hashes_password() {
        let db = test_db();
        let user = signup_testuser(&db);

        assert!(user.id > 0);
        assert_ne!(user.password, "HASHED_PASSWORD");
        assert!(user.password.starts_with("$argon2"));
    }

    #[test]
    fn authenticate_with_valid_credentials() {
        let db = test_db();
        let user = signup_testuser(&db);

        let found = db.authenticate("testuser", "HASHED_PASSWORD").unwrap();
        assert_eq!(found, Some(user));
    }

    #[test]
    fn authenticate_with_unknown_username() {
        let db = test_db();
        signup_testuser(&db);

        assert!(db.authenticate("testfaker", "HASHED_PASSWORD").unwrap().is_none());
    }

    #[test]
    fn authenticate_with_wrong_password() {
        let db = test_db();
        signup_testuser(&db);

        assert!(db.authenticate("testuser", "WRONG_PASSWORD").unwrap().is_none());
    }

    #[test]
    fn raw_password_never_authenticates() {
        let db = test_db();
        add_user(&db, "testuser");

        assert!(db.authenticate("testuser", "HASHED_PASSWORD").unwrap().is_none());
    }

    #[test]
    fn duplicate_signup_fails_and_keeps_first_user() {
        let db = test_db();
        let first = signup_testuser(&db);
        db.signup("test2user", "test2@test2.com", "HASHED_PASSWORD", None)
            .unwrap();

        let err = db
            .signup("testuser", "test@test.com", "HASHED_PASSWORD", None)
            .unwrap_err();
        assert!(err.is_integrity());
        assert_eq!(db.get_user(first.id).unwrap(), Some(first));
    }
}
