#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use minigram::app::{ClientSettings, Identity, Session};
use minigram::backend::{
    Backend, BackendError, BackendResult, BlobStore, Bucket, FsBlobStore, RowStore,
    SqliteRowStore, StoredBlob, UploadOptions,
};
use minigram::db::{self, models::*};
use minigram::state::DbPool;

/// A throwaway database and blob directory.
pub struct TestBackend {
    pub dir: TempDir,
    pub pool: DbPool,
    pub rows: Arc<RecordingRows>,
    pub backend: Backend,
}

impl TestBackend {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::create_pool(&dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        let rows = Arc::new(RecordingRows::new(Arc::new(SqliteRowStore::new(
            pool.clone(),
        ))));
        let blobs = Arc::new(FsBlobStore::new(pool.clone(), dir.path().join("blobs"), ""));
        let backend = Backend::new(rows.clone(), blobs);

        Self {
            dir,
            pool,
            rows,
            backend,
        }
    }

    /// Same database, but every blob upload fails.
    pub fn with_broken_blobs(&self) -> Backend {
        Backend::new(self.rows.clone(), Arc::new(BrokenBlobs))
    }

    /// A session whose name was persisted earlier (locked).
    pub fn session_as(&self, name: &str) -> Session {
        Session::new(
            self.backend.clone(),
            Identity::restore(Some(name)),
            ClientSettings::default(),
        )
    }

    /// A session whose name is only typed into the form.
    pub fn session_typing(&self, typed: &str) -> Session {
        Session::new(
            self.backend.clone(),
            Identity::resolve(None, Some(typed)),
            ClientSettings::default(),
        )
    }

    /// Unread notification rows for `user_name`, straight from the database.
    pub fn unread_in_db(&self, user_name: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_name = ?1 AND read = 0",
            [user_name],
            |row| row.get(0),
        )
        .unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
    }
}

/// Row store wrapper that records which operations were called, and fails
/// the ones marked with [`RecordingRows::fail`].
pub struct RecordingRows {
    inner: Arc<dyn RowStore>,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingRows {
    pub fn new(inner: Arc<dyn RowStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every later `call` fail with an I/O error.
    pub fn fail(&self, call: &'static str) {
        self.failing.lock().unwrap().insert(call);
    }

    fn record(&self, call: &'static str) -> BackendResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(call) {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for RecordingRows {
    async fn list_posts(&self) -> BackendResult<Vec<Post>> {
        self.record("list_posts")?;
        self.inner.list_posts().await
    }

    async fn insert_post(&self, post: NewPost) -> BackendResult<Post> {
        self.record("insert_post")?;
        self.inner.insert_post(post).await
    }

    async fn set_post_likes(&self, post_id: &str, likes: i64) -> BackendResult<Post> {
        self.record("set_post_likes")?;
        self.inner.set_post_likes(post_id, likes).await
    }

    async fn delete_post(&self, post_id: &str, user_name: &str) -> BackendResult<u64> {
        self.record("delete_post")?;
        self.inner.delete_post(post_id, user_name).await
    }

    async fn list_comments(&self) -> BackendResult<Vec<Comment>> {
        self.record("list_comments")?;
        self.inner.list_comments().await
    }

    async fn insert_comment(&self, comment: NewComment) -> BackendResult<Comment> {
        self.record("insert_comment")?;
        self.inner.insert_comment(comment).await
    }

    async fn list_notifications(
        &self,
        user_name: &str,
        limit: usize,
    ) -> BackendResult<Vec<Notification>> {
        self.record("list_notifications")?;
        self.inner.list_notifications(user_name, limit).await
    }

    async fn insert_notification(&self, notification: NewNotification) -> BackendResult<()> {
        self.record("insert_notification")?;
        self.inner.insert_notification(notification).await
    }

    async fn mark_notifications_read(&self, user_name: &str) -> BackendResult<u64> {
        self.record("mark_notifications_read")?;
        self.inner.mark_notifications_read(user_name).await
    }

    async fn find_profile(&self, user_name: &str) -> BackendResult<Option<Profile>> {
        self.record("find_profile")?;
        self.inner.find_profile(user_name).await
    }

    async fn upsert_profile(&self, profile: Profile) -> BackendResult<Profile> {
        self.record("upsert_profile")?;
        self.inner.upsert_profile(profile).await
    }
}

pub struct BrokenBlobs;

#[async_trait]
impl BlobStore for BrokenBlobs {
    async fn upload(
        &self,
        _bucket: Bucket,
        _key: &str,
        _data: Bytes,
        _options: UploadOptions,
    ) -> BackendResult<()> {
        Err(BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("/storage/{bucket}/{key}")
    }

    async fn download(&self, _bucket: Bucket, _key: &str) -> BackendResult<Option<StoredBlob>> {
        Ok(None)
    }
}
