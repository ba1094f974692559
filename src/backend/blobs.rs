use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;
use url::Url;

use super::{BackendError, BackendResult, BlobStore, Bucket, StoredBlob, UploadOptions};
use crate::state::DbPool;

/// Filesystem blob store. Objects live at `<root>/<bucket>/<key>`; their
/// content type and cache hint are kept in the `blobs` table.
pub struct FsBlobStore {
    pool: DbPool,
    root: PathBuf,
    public_base: String,
}

impl FsBlobStore {
    pub fn new(pool: DbPool, root: PathBuf, public_base: impl Into<String>) -> Self {
        Self {
            pool,
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, bucket: Bucket, key: &str) -> PathBuf {
        let mut path = self.root.join(bucket.as_str());
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    fn exists(&self, bucket: Bucket, key: &str) -> BackendResult<bool> {
        let conn = self.pool.get()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM blobs WHERE bucket = ?1 AND key = ?2",
                params![bucket.as_str(), key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Keys are relative `/`-separated paths. Rejects anything that could step
/// outside the bucket directory.
pub fn validate_key(key: &str) -> BackendResult<()> {
    if key.is_empty() || key.contains('\\') || key.contains('\0') {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Percent-encoded absolute path for the given segments.
fn encoded_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut url = Url::parse("http://localhost/").ok()?;
    url.path_segments_mut().ok()?.clear().extend(segments);
    Some(url.path().to_string())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        data: Bytes,
        options: UploadOptions,
    ) -> BackendResult<()> {
        validate_key(key)?;

        if !options.upsert && self.exists(bucket, key)? {
            return Err(BackendError::Conflict(format!(
                "The resource already exists: {bucket}/{key}"
            )));
        }

        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;

        let content_type = options.content_type.unwrap_or_else(|| {
            mime_guess::from_path(key)
                .first_or_octet_stream()
                .to_string()
        });

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO blobs (bucket, key, content_type, cache_control, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(bucket, key) DO UPDATE SET
               content_type = excluded.content_type,
               cache_control = excluded.cache_control,
               size = excluded.size,
               created_at = excluded.created_at",
            params![
                bucket.as_str(),
                key,
                content_type,
                options.cache_control,
                data.len() as i64,
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;

        tracing::debug!("Stored blob {}/{} ({} bytes)", bucket, key, data.len());
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        let segments = ["storage", bucket.as_str()]
            .into_iter()
            .chain(key.split('/'));
        let path = encoded_path(segments)
            .unwrap_or_else(|| format!("/storage/{}/{}", bucket, key));
        format!("{}{}", self.public_base, path)
    }

    async fn download(&self, bucket: Bucket, key: &str) -> BackendResult<Option<StoredBlob>> {
        validate_key(key)?;

        let meta = {
            let conn = self.pool.get()?;
            conn.query_row(
                "SELECT content_type, cache_control FROM blobs WHERE bucket = ?1 AND key = ?2",
                params![bucket.as_str(), key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
        };

        let Some((content_type, cache_control)) = meta else {
            return Ok(None);
        };

        match tokio::fs::read(self.object_path(bucket, key)).await {
            Ok(data) => Ok(Some(StoredBlob {
                data: Bytes::from(data),
                content_type,
                cache_control,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Blob {}/{} has metadata but no file", bucket, key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
