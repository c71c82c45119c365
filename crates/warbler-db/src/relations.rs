use rusqlite::{Connection, params};

use crate::models::{LikeRow, TimelineRow, UserRow};
use crate::queries::{OptionalExt, TIMELINE_COLUMNS, USER_COLUMNS, query_timeline, user_from_row};
use crate::{Database, Result};

impl Database {
    // -- Follows --

    /// Following someone twice is a no-op.
    pub fn add_follow(&self, follower_id: i64, followed_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO follows (user_being_followed_id, user_following_id)
                 VALUES (?1, ?2)",
                params![followed_id, follower_id],
            )?;
            Ok(())
        })
    }

    pub fn remove_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![followed_id, follower_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Is `user` following `other`?
    pub fn is_following(&self, user: &UserRow, other: &UserRow) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, user.id, other.id))
    }

    /// Is `user` followed by `other`?
    pub fn is_followed_by(&self, user: &UserRow, other: &UserRow) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, other.id, user.id))
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 JOIN follows f ON f.user_following_id = u.id
                 WHERE f.user_being_followed_id = ?1
                 ORDER BY u.username"
            );
            query_users(conn, &sql, user_id)
        })
    }

    /// Users `user_id` follows.
    pub fn following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 JOIN follows f ON f.user_being_followed_id = u.id
                 WHERE f.user_following_id = ?1
                 ORDER BY u.username"
            );
            query_users(conn, &sql, user_id)
        })
    }

    pub fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            query_ids(
                conn,
                "SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1",
                user_id,
            )
        })
    }

    // -- Likes --

    pub fn add_like(&self, user_id: i64, message_id: i64) -> Result<LikeRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
            Ok(LikeRow {
                id: conn.last_insert_rowid(),
                user_id,
                message_id,
            })
        })
    }

    pub fn remove_like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                params![user_id, message_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Toggle a like: removes if it exists, inserts if not.
    /// Returns true when the like was added.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    params![user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;

            let added = match existing {
                Some(id) => {
                    tx.execute("DELETE FROM likes WHERE id = ?1", [id])?;
                    false
                }
                None => {
                    tx.execute(
                        "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                        params![user_id, message_id],
                    )?;
                    true
                }
            };

            tx.commit()?;
            Ok(added)
        })
    }

    pub fn likes_for_user(&self, user_id: i64) -> Result<Vec<LikeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, user_id, message_id FROM likes WHERE user_id = ?1 ORDER BY id")?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(LikeRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn liked_message_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            query_ids(conn, "SELECT message_id FROM likes WHERE user_id = ?1", user_id)
        })
    }

    /// Messages `user_id` has liked, most recently liked first.
    pub fn liked_messages(&self, user_id: i64) -> Result<Vec<TimelineRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIMELINE_COLUMNS} FROM likes l
                 JOIN messages m ON l.message_id = m.id
                 JOIN users u ON m.user_id = u.id
                 WHERE l.user_id = ?1
                 ORDER BY l.id DESC"
            );
            query_timeline(conn, &sql, [user_id])
        })
    }
}

fn follow_exists(conn: &Connection, follower_id: i64, followed_id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM follows WHERE user_following_id = ?1 AND user_being_followed_id = ?2",
            params![follower_id, followed_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn query_users(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_ids(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{add_user, test_db};

    #[test]
    fn is_following_detects_follow() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");

        db.add_follow(u.id, u2.id).unwrap();

        assert!(db.is_following(&u, &u2).unwrap());
        assert!(!db.is_following(&u2, &u).unwrap());
    }

    #[test]
    fn is_not_following_without_follow() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");

        assert!(!db.is_following(&u, &u2).unwrap());
    }

    #[test]
    fn is_followed_by_detects_follow() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");

        db.add_follow(u.id, u2.id).unwrap();

        assert!(db.is_followed_by(&u2, &u).unwrap());
        assert!(!db.is_followed_by(&u, &u2).unwrap());
    }

    #[test]
    fn is_not_followed_by_without_follow() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");

        assert!(!db.is_followed_by(&u2, &u).unwrap());
    }

    #[test]
    fn follower_and_following_lists() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");

        db.add_follow(u.id, u2.id).unwrap();
        db.add_follow(u.id, u2.id).unwrap();

        assert_eq!(db.following(u.id).unwrap(), vec![u2.clone()]);
        assert_eq!(db.followers(u2.id).unwrap(), vec![u.clone()]);
        assert_eq!(db.following_ids(u.id).unwrap(), vec![u2.id]);

        assert!(db.remove_follow(u.id, u2.id).unwrap());
        assert!(!db.remove_follow(u.id, u2.id).unwrap());
        assert!(db.followers(u2.id).unwrap().is_empty());
    }

    #[test]
    fn liked_message_shows_up_in_user_likes() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");
        let msg = db.create_message(u.id, "test1 test2").unwrap();

        let like = db.add_like(u2.id, msg.id).unwrap();
        assert!(like.id > 0);

        let likes = db.likes_for_user(u2.id).unwrap();
        assert_eq!(likes, vec![like]);
        assert!(likes.iter().any(|l| l.message_id == msg.id));

        let liked = db.liked_messages(u2.id).unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].message.id, msg.id);
    }

    #[test]
    fn liking_twice_is_an_integrity_error() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let msg = db.create_message(u.id, "hello").unwrap();
        let u2 = add_user(&db, "test2user");

        db.add_like(u2.id, msg.id).unwrap();
        assert!(db.add_like(u2.id, msg.id).unwrap_err().is_integrity());
    }

    #[test]
    fn toggle_like_adds_then_removes() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");
        let msg = db.create_message(u.id, "hello").unwrap();

        assert!(db.toggle_like(u2.id, msg.id).unwrap());
        assert_eq!(db.liked_message_ids(u2.id).unwrap(), vec![msg.id]);

        assert!(!db.toggle_like(u2.id, msg.id).unwrap());
        assert!(db.liked_message_ids(u2.id).unwrap().is_empty());
    }

    #[test]
    fn remove_like_reports_whether_a_like_existed() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");
        let msg = db.create_message(u.id, "hello").unwrap();

        assert!(!db.remove_like(u2.id, msg.id).unwrap());

        db.add_like(u2.id, msg.id).unwrap();
        assert!(db.remove_like(u2.id, msg.id).unwrap());
        assert!(db.liked_message_ids(u2.id).unwrap().is_empty());
        assert!(!db.remove_like(u2.id, msg.id).unwrap());
    }

    #[test]
    fn deleting_message_removes_its_likes() {
        let db = test_db();
        let u = add_user(&db, "testuser");
        let u2 = add_user(&db, "test2user");
        let msg = db.create_message(u.id, "hello").unwrap();
        db.add_like(u2.id, msg.id).unwrap();

        assert!(db.delete_message(msg.id).unwrap());
        assert!(db.likes_for_user(u2.id).unwrap().is_empty());
        assert!(!db.delete_message(msg.id).unwrap());
    }
}
