//! The storage collaborator the app talks to: a row store holding the
//! `posts`, `comments`, `notifications` and `profiles` tables, and a blob
//! store holding the `images` and `avatars` buckets. The app never looks
//! past these traits.

mod blobs;
mod sqlite;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::{Comment, NewComment, NewNotification, NewPost, Notification, Post, Profile};
use crate::state::DbPool;

pub use self::blobs::{validate_key, FsBlobStore};
pub use self::sqlite::SqliteRowStore;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Row storage over the app's four tables.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> BackendResult<Vec<Post>>;

    /// Insert a post and return the stored row.
    async fn insert_post(&self, post: NewPost) -> BackendResult<Post>;

    /// Overwrite a post's like count and return the updated row.
    async fn set_post_likes(&self, post_id: &str, likes: i64) -> BackendResult<Post>;

    /// Delete a post only if it belongs to `user_name`. Returns rows deleted.
    async fn delete_post(&self, post_id: &str, user_name: &str) -> BackendResult<u64>;

    /// All comments, oldest first.
    async fn list_comments(&self) -> BackendResult<Vec<Comment>>;

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<Comment>;

    /// Most recent notifications addressed to `user_name`, newest first.
    async fn list_notifications(
        &self,
        user_name: &str,
        limit: usize,
    ) -> BackendResult<Vec<Notification>>;

    async fn insert_notification(&self, notification: NewNotification) -> BackendResult<()>;

    /// Set `read = true` on every unread notification of `user_name`.
    async fn mark_notifications_read(&self, user_name: &str) -> BackendResult<u64>;

    async fn find_profile(&self, user_name: &str) -> BackendResult<Option<Profile>>;

    /// Insert or overwrite the profile keyed by its user name.
    async fn upsert_profile(&self, profile: Profile) -> BackendResult<Profile>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Images,
    Avatars,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Images => "images",
            Bucket::Avatars => "avatars",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "images" => Ok(Bucket::Images),
            "avatars" => Ok(Bucket::Avatars),
            other => Err(BackendError::NotFound(format!("bucket {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Max-age in seconds, sent back as `Cache-Control` when the blob is served.
    pub cache_control: String,
    /// Overwrite an existing object under the same key.
    pub upsert: bool,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
    pub cache_control: String,
}

/// Blob storage addressed by bucket and `/`-separated key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        options: UploadOptions,
    ) -> BackendResult<()>;

    /// Publicly reachable URL of an object. Does not check that it exists.
    fn public_url(&self, bucket: Bucket, key: &str) -> String;

    async fn download(&self, bucket: Bucket, key: &str) -> BackendResult<Option<StoredBlob>>;
}

/// Handle to both halves of the backend, cheap to clone into each request.
#[derive(Clone)]
pub struct Backend {
    pub rows: Arc<dyn RowStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(rows: Arc<dyn RowStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { rows, blobs }
    }

    /// SQLite rows plus filesystem blobs rooted at `blob_root`, with public
    /// URLs prefixed by `public_base` (empty for same-origin paths).
    pub fn local(pool: DbPool, blob_root: PathBuf, public_base: impl Into<String>) -> Self {
        Self {
            rows: Arc::new(SqliteRowStore::new(pool.clone())),
            blobs: Arc::new(FsBlobStore::new(pool, blob_root, public_base)),
        }
    }
}
