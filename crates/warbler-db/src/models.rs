//! Database row types. These map directly to SQLite rows and stay independent
//! of the HTML layer.

use std::fmt;

use chrono::{DateTime, Utc};

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.svg";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.svg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    /// Argon2 PHC string for accounts made through signup.
    pub password: String,
}

impl fmt::Display for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User #{}: {}, {}>", self.id, self.username, self.email)
    }
}

/// Insert payload. `password` is stored as given.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub image_url: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
}

/// A message joined with the author fields needed to render it.
#[derive(Debug, Clone)]
pub struct TimelineRow {
    pub message: MessageRow,
    pub author_username: String,
    pub author_image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeRow {
    pub id: i64,
    pub user_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}
