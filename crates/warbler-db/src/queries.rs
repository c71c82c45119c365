use chrono::Utc;
use rusqlite::{Connection, Row, params};

use crate::models::{
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, MessageRow, NewUser, ProfileUpdate, TimelineRow,
    UserRow, UserStats,
};
use crate::{Database, DbError, Result};

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.image_url, u.header_image_url, u.bio, u.location, u.password";

pub(crate) const TIMELINE_COLUMNS: &str =
    "m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url";

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUser<'_>) -> Result<UserRow> {
        let image_url = non_empty(new.image_url).unwrap_or(DEFAULT_IMAGE_URL);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, username, password, image_url) VALUES (?1, ?2, ?3, ?4)",
                params![new.email, new.username, new.password, image_url],
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or(DbError::NotFound("user"))
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1");
            conn.query_row(&sql, [username], user_from_row).optional()
        })
    }

    /// All users, or those whose username contains `q` (ASCII case-insensitive).
    pub fn search_users(&self, q: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| match non_empty(q) {
            Some(q) => {
                let sql = format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     WHERE u.username LIKE '%' || ?1 || '%' ESCAPE '\\'
                     ORDER BY u.username"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([escape_like(q)], user_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            None => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.username");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], user_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        })
    }

    pub fn update_user(&self, id: i64, update: &ProfileUpdate) -> Result<UserRow> {
        let image_url = non_empty(update.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL);
        let header_image_url =
            non_empty(update.header_image_url.as_deref()).unwrap_or(DEFAULT_HEADER_IMAGE_URL);

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET username = ?1, email = ?2, image_url = ?3, header_image_url = ?4,
                     bio = ?5, location = ?6
                 WHERE id = ?7",
                params![
                    update.username,
                    update.email,
                    image_url,
                    header_image_url,
                    non_empty(update.bio.as_deref()),
                    non_empty(update.location.as_deref()),
                    id
                ],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound("user"));
            }
            query_user_by_id(conn, id)?.ok_or(DbError::NotFound("user"))
        })
    }

    /// Deletes the user. Messages, follows and likes go with it.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound("user"));
            }
            Ok(())
        })
    }

    // -- Messages --

    pub fn create_message(&self, user_id: i64, text: &str) -> Result<MessageRow> {
        let timestamp = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (text, timestamp, user_id) VALUES (?1, ?2, ?3)",
                params![text, timestamp, user_id],
            )?;
            Ok(MessageRow {
                id: conn.last_insert_rowid(),
                text: text.to_string(),
                timestamp,
                user_id,
            })
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<TimelineRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIMELINE_COLUMNS} FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.id = ?1"
            );
            conn.query_row(&sql, [id], timeline_from_row).optional()
        })
    }

    /// Returns false when there was nothing to delete.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// A user's own messages, newest first.
    pub fn messages_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<TimelineRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIMELINE_COLUMNS} FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.user_id = ?1
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            );
            query_timeline(conn, &sql, params![user_id, limit])
        })
    }

    pub fn count_messages(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Messages by the user and by everyone they follow, newest first.
    pub fn home_feed(&self, user_id: i64, limit: u32) -> Result<Vec<TimelineRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIMELINE_COLUMNS} FROM messages m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.user_id = ?1
                    OR m.user_id IN (
                        SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1
                    )
                 ORDER BY m.timestamp DESC, m.id DESC
                 LIMIT ?2"
            );
            query_timeline(conn, &sql, params![user_id, limit])
        })
    }

    pub fn user_stats(&self, user_id: i64) -> Result<UserStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [user_id],
                |row| {
                    Ok(UserStats {
                        messages: row.get(0)?,
                        following: row.get(1)?,
                        followers: row.get(2)?,
                        likes: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    conn.query_row(&sql, [id], user_from_row).optional()
}

pub(crate) fn query_timeline(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<TimelineRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, timeline_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        image_url: row.get(3)?,
        header_image_url: row.get(4)?,
        bio: row.get(5)?,
        location: row.get(6)?,
        password: row.get(7)?,
    })
}

pub(crate) fn timeline_from_row(row: &Row<'_>) -> rusqlite::Result<TimelineRow> {
    Ok(TimelineRow {
        message: MessageRow {
            id: row.get(0)?,
            text: row.get(1)?,
            timestamp: row.get(2)?,
            user_id: row.get(3)?,
        },
        author_username: row.get(4)?,
        author_image_url: row.get(5)?,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Escape `LIKE` wildcards so `q` only ever matches literally.
fn escape_like(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_user, test_db};

    #[test]
    fn new_user_has_no_messages_or_followers() {
        let db = test_db();
        let u = add_user(&db, "testuser");

        assert!(u.id > 0);
        assert_eq!(db.count_messages(u.id).unwrap(), 0);
        assert!(db.followers(u.id).unwrap().is_empty());
        assert_eq!(u.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(u.header_image_url, DEFAULT_HEADER_IMAGE_URL);
    }

    #[test]
    fn user_display_format() {
        let db = test_db();
        let u = add_user(&db, "testuser");

        assert_eq!(
            u.to_string(),
            format!("<User #{}: testuser, testuser@test.com>", u.id)
        );
    }

    #[test]
    fn duplicate_username_is_an_integrity_error() {
        let db = test_db();
        add_user(&db, "testuser");

        let err = db
            .create_user(&NewUser {
                email: "other@test.com",
                username: "testuser",
                password: "HASHED_PASSWORD",
                image_url: None,
            })
            .unwrap_err();
        assert!(err.is_integrity(), "unexpected error: {err}");
    }

    #[test]
    fn duplicate_email_is_an_integrity_error() {
        let db = test_db();
        add_user(&db, "testuser");

        let err = db
            .create_user(&NewUser {
                email: "testuser@test.com",
                username: "someone-else",
                password: "HASHED_PASSWORD",
                image_url: None,
            })
            .unwrap_err();
        assert!(err.is_integrity());
        assert_eq!(db.search_users(None).unwrap().len(), 1);
    }

    #[test]
    fn message_belongs_to_user() {
        let db = test_db();
        let u = add_user(&db, "testuser");

        let msg = db.create_message(u.id, "test1 test2").unwrap();
        assert_eq!(msg.text, "test1 test2");
        assert_eq!(msg.user_id, u.id);

        let stored = db.get_message(msg.id).unwrap().unwrap();
        assert_eq!(stored.message.text, "test1 test2");
        assert_eq!(stored.author_username, "testuser");
    }

    #[test]
    fn two_messages_for_one_user() {
        let db = test_db();
        let u = add_user(&db, "testuser");

        db.create_message(u.id, "test1 test2").unwrap();
        db.create_message(u.id, "test3 test4").unwrap();

        assert_eq!(db.count_messages(u.id).unwrap(), 2);
        let messages = db.messages_for_user(u.id, 100).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message.text, "test3 test4");
    }

    #[test]
    fn message_requires_existing_user() {
        let db = test_db();
        let err = db.create_message(999, "orphan").unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn message_longer_than_140_chars_is_rejected() {
        let db = test_db();
        let u = add_user(&db, "testuser");

        let err = db.create_message(u.id, &"x".repeat(141)).unwrap_err();
        assert!(err.is_integrity());
        assert!(db.create_message(u.id, &"x".repeat(140)).is_ok());
    }

    #[test]
    fn deleting_user_cascades() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");
        let msg = db.create_message(u.id, "bye").unwrap();
        db.add_follow(u2.id, u.id).unwrap();
        db.add_like(u2.id, msg.id).unwrap();

        db.delete_user(u.id).unwrap();

        assert!(db.get_user(u.id).unwrap().is_none());
        assert!(db.get_message(msg.id).unwrap().is_none());
        assert!(db.following(u2.id).unwrap().is_empty());
        assert!(db.likes_for_user(u2.id).unwrap().is_empty());
        assert!(matches!(db.delete_user(u.id), Err(DbError::NotFound(_))));
    }

    #[test]
    fn home_feed_includes_followed_users_only() {
        let db = test_db();
        let me = add_user(&db, "me");
        let friend = add_user(&db, "friend");
        let stranger = add_user(&db, "stranger");
        db.add_follow(me.id, friend.id).unwrap();

        db.create_message(me.id, "mine").unwrap();
        db.create_message(friend.id, "friend's").unwrap();
        db.create_message(stranger.id, "stranger's").unwrap();

        let texts: Vec<String> = db
            .home_feed(me.id, 100)
            .unwrap()
            .into_iter()
            .map(|row| row.message.text)
            .collect();
        assert_eq!(texts, vec!["friend's".to_string(), "mine".to_string()]);
    }

    #[test]
    fn search_matches_username_substring() {
        let db = test_db();
        add_user(&db, "alice");
        add_user(&db, "malice");
        add_user(&db, "bob");

        let found: Vec<String> = db
            .search_users(Some("ALI"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(found, vec!["alice".to_string(), "malice".to_string()]);
        assert_eq!(db.search_users(Some("  ")).unwrap().len(), 3);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let db = test_db();
        add_user(&db, "alice");
        add_user(&db, "bob");
        add_user(&db, "snake_case");

        assert!(db.search_users(Some("%")).unwrap().is_empty());
        assert!(db.search_users(Some("\\")).unwrap().is_empty());

        let found: Vec<String> = db
            .search_users(Some("_"))
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(found, vec!["snake_case".to_string()]);
    }

    #[test]
    fn update_profile_fills_defaults() {
        let db = test_db();
        let u = add_user(&db, "testuser");

        let updated = db
            .update_user(
                u.id,
                &ProfileUpdate {
                    username: "renamed".into(),
                    email: "renamed@test.com".into(),
                    image_url: Some(String::new()),
                    header_image_url: None,
                    bio: Some("hello".into()),
                    location: Some("  ".into()),
                },
            )
            .unwrap();

        assert_eq!(updated.username, "renamed");
        assert_eq!(updated.image_url, DEFAULT_IMAGE_URL);
        assert_eq!(updated.header_image_url, DEFAULT_HEADER_IMAGE_URL);
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.location, None);
        assert_eq!(updated.password, u.password);
    }

    #[test]
    fn stats_count_every_relation() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");
        let msg = db.create_message(u2.id, "hi").unwrap();
        db.create_message(u.id, "hello").unwrap();
        db.add_follow(u.id, u2.id).unwrap();
        db.add_like(u.id, msg.id).unwrap();

        assert_eq!(
            db.user_stats(u.id).unwrap(),
            UserStats {
                messages: 1,
                following: 1,
                followers: 0,
                likes: 1,
            }
        );
        assert_eq!(db.user_stats(u2.id).unwrap().followers, 1);
    }
}
