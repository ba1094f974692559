use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::{BackendError, BackendResult, RowStore};
use crate::db::models::{
    Comment, NewComment, NewNotification, NewPost, Notification, NotificationKind, Post, Profile,
};
use crate::state::DbPool;

const POST_COLUMNS: &str = "id, user_name, image_url, caption, likes, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, user_name, body, created_at";
const NOTIFICATION_COLUMNS: &str =
    "id, user_name, from_user, post_id, kind, body, read, created_at";

/// SQLite implementation of the row store
pub struct SqliteRowStore {
    pool: DbPool,
}

impl SqliteRowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Microsecond RFC 3339 in UTC sorts lexically in time order.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_name: row.get(1)?,
        image_url: row.get(2)?,
        caption: row.get(3)?,
        likes: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_name: row.get(2)?,
        body: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(4)?;
    let kind = kind
        .parse::<NotificationKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;

    Ok(Notification {
        id: row.get(0)?,
        user_name: row.get(1)?,
        from_user: row.get(2)?,
        post_id: row.get(3)?,
        kind,
        body: row.get(5)?,
        read: row.get(6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn list_posts(&self) -> BackendResult<Vec<Post>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, rowid DESC"
        ))?;
        let posts = stmt
            .query_map([], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn insert_post(&self, post: NewPost) -> BackendResult<Post> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        let post = conn.query_row(
            &format!(
                "INSERT INTO posts (id, user_name, image_url, caption, likes, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)
                 RETURNING {POST_COLUMNS}"
            ),
            params![id, post.user_name, post.image_url, post.caption, now_timestamp()],
            post_from_row,
        )?;
        Ok(post)
    }

    async fn set_post_likes(&self, post_id: &str, likes: i64) -> BackendResult<Post> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("UPDATE posts SET likes = ?2 WHERE id = ?1 RETURNING {POST_COLUMNS}"),
            params![post_id, likes],
            post_from_row,
        )
        .optional()?
        .ok_or_else(|| BackendError::NotFound(format!("post {post_id}")))
    }

    async fn delete_post(&self, post_id: &str, user_name: &str) -> BackendResult<u64> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM posts WHERE id = ?1 AND user_name = ?2",
            params![post_id, user_name],
        )?;
        Ok(rows as u64)
    }

    async fn list_comments(&self) -> BackendResult<Vec<Comment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments ORDER BY created_at ASC, rowid ASC"
        ))?;
        let comments = stmt
            .query_map([], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<Comment> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        let result = conn.query_row(
            &format!(
                "INSERT INTO comments (id, post_id, user_name, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING {COMMENT_COLUMNS}"
            ),
            params![id, comment.post_id, comment.user_name, comment.body, now_timestamp()],
            comment_from_row,
        );

        match result {
            Ok(comment) => Ok(comment),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(BackendError::NotFound(format!("post {}", comment.post_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_notifications(
        &self,
        user_name: &str,
        limit: usize,
    ) -> BackendResult<Vec<Notification>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_name = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let notifications = stmt
            .query_map(params![user_name, limit as i64], notification_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    async fn insert_notification(&self, notification: NewNotification) -> BackendResult<()> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();

        conn.execute(
            "INSERT INTO notifications (id, user_name, from_user, post_id, kind, body, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                id,
                notification.user_name,
                notification.from_user,
                notification.post_id,
                notification.kind.as_str(),
                notification.body,
                now_timestamp()
            ],
        )?;
        Ok(())
    }

    async fn mark_notifications_read(&self, user_name: &str) -> BackendResult<u64> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_name = ?1 AND read = 0",
            params![user_name],
        )?;
        Ok(rows as u64)
    }

    async fn find_profile(&self, user_name: &str) -> BackendResult<Option<Profile>> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                "SELECT user_name, avatar_url FROM profiles WHERE user_name = ?1",
                params![user_name],
                |row| {
                    Ok(Profile {
                        user_name: row.get(0)?,
                        avatar_url: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    async fn upsert_profile(&self, profile: Profile) -> BackendResult<Profile> {
        let conn = self.pool.get()?;
        let profile = conn.query_row(
            "INSERT INTO profiles (user_name, avatar_url, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_name) DO UPDATE SET
               avatar_url = excluded.avatar_url,
               updated_at = excluded.updated_at
             RETURNING user_name, avatar_url",
            params![profile.user_name, profile.avatar_url, now_timestamp()],
            |row| {
                Ok(Profile {
                    user_name: row.get(0)?,
                    avatar_url: row.get(1)?,
                })
            },
        )?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn store() -> SqliteRowStore {
        let pool = db::memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        SqliteRowStore::new(pool)
    }

    fn new_post(user_name: &str) -> NewPost {
        NewPost {
            user_name: user_name.to_string(),
            image_url: format!("/storage/images/{user_name}.png"),
            caption: None,
        }
    }

    #[tokio::test]
    async fn inserted_post_starts_with_zero_likes() {
        let store = store();
        let post = store.insert_post(new_post("alice")).await.unwrap();
        assert_eq!(post.user_name, "alice");
        assert_eq!(post.likes, 0);
        assert!(uuid::Uuid::parse_str(&post.id).is_ok());
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let store = store();
        let first = store.insert_post(new_post("alice")).await.unwrap();
        let second = store.insert_post(new_post("bob")).await.unwrap();

        let posts = store.list_posts().await.unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn set_post_likes_returns_updated_row() {
        let store = store();
        let post = store.insert_post(new_post("alice")).await.unwrap();
        let updated = store.set_post_likes(&post.id, 7).await.unwrap();
        assert_eq!(updated.likes, 7);
        assert_eq!(updated.id, post.id);
    }

    #[tokio::test]
    async fn set_post_likes_on_missing_post_is_not_found() {
        let store = store();
        let result = store.set_post_likes("missing", 1).await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_post_requires_matching_author() {
        let store = store();
        let post = store.insert_post(new_post("alice")).await.unwrap();

        assert_eq!(store.delete_post(&post.id, "mallory").await.unwrap(), 0);
        assert_eq!(store.list_posts().await.unwrap().len(), 1);

        assert_eq!(store.delete_post(&post.id, "alice").await.unwrap(), 1);
        assert!(store.list_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comments_are_listed_oldest_first() {
        let store = store();
        let post = store.insert_post(new_post("alice")).await.unwrap();
        for body in ["one", "two", "three"] {
            store
                .insert_comment(NewComment {
                    post_id: post.id.clone(),
                    user_name: "bob".to_string(),
                    body: body.to_string(),
                })
                .await
                .unwrap();
        }

        let bodies: Vec<_> = store
            .list_comments()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let store = store();
        let result = store
            .insert_comment(NewComment {
                post_id: "missing".to_string(),
                user_name: "bob".to_string(),
                body: "hello?".to_string(),
            })
            .await;
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn notifications_are_limited_and_scoped_to_recipient() {
        let store = store();
        for i in 0..5 {
            store
                .insert_notification(NewNotification {
                    user_name: "alice".to_string(),
                    from_user: format!("fan{i}"),
                    post_id: "p1".to_string(),
                    kind: NotificationKind::Like,
                    body: None,
                })
                .await
                .unwrap();
        }
        store
            .insert_notification(NewNotification {
                user_name: "bob".to_string(),
                from_user: "alice".to_string(),
                post_id: "p2".to_string(),
                kind: NotificationKind::Comment,
                body: Some("hi".to_string()),
            })
            .await
            .unwrap();

        let latest = store.list_notifications("alice", 3).await.unwrap();
        let senders: Vec<_> = latest.iter().map(|n| n.from_user.as_str()).collect();
        assert_eq!(senders, vec!["fan4", "fan3", "fan2"]);
        assert!(latest.iter().all(|n| !n.read));

        let bobs = store.list_notifications("bob", 30).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].kind, NotificationKind::Comment);
        assert_eq!(bobs[0].body.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn mark_read_only_touches_recipient_unread_rows() {
        let store = store();
        for recipient in ["alice", "alice", "bob"] {
            store
                .insert_notification(NewNotification {
                    user_name: recipient.to_string(),
                    from_user: "carol".to_string(),
                    post_id: "p1".to_string(),
                    kind: NotificationKind::Like,
                    body: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.mark_notifications_read("alice").await.unwrap(), 2);
        assert_eq!(store.mark_notifications_read("alice").await.unwrap(), 0);

        let bobs = store.list_notifications("bob", 30).await.unwrap();
        assert!(!bobs[0].read);
    }

    #[tokio::test]
    async fn upsert_profile_keeps_one_row_per_name() {
        let store = store();
        assert!(store.find_profile("alice").await.unwrap().is_none());

        for url in ["/storage/avatars/a.png", "/storage/avatars/b.png"] {
            store
                .upsert_profile(Profile {
                    user_name: "alice".to_string(),
                    avatar_url: Some(url.to_string()),
                })
                .await
                .unwrap();
        }

        let profile = store.find_profile("alice").await.unwrap().unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some("/storage/avatars/b.png"));

        let conn = store.pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
