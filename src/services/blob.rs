//! Filesystem-backed blob store.
//!
//! Blobs live under `blob_root/<key>`. "Presigned" URLs point at the server's own
//! `/blobs/{key}` route and carry an expiry timestamp; access control is done by
//! the route, which only lets a user touch keys under their own id.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::services::{BlobStore, PresignedUrl};
use anyhow::{anyhow, Context, Result};

/// Fresh key for a recording: `<owner>/<unix millis>-<uuid><ext>`.
pub fn recording_key(owner_id: &str, extension: &str) -> String {
    format!(
        "{}/{}-{}{}",
        owner_id,
        Utc::now().timestamp_millis(),
        Uuid::new_v4(),
        extension
    )
}

/// Whether `key` names a blob under the owner's prefix. A bare `"<owner>/"` does not.
pub fn owns_key(owner_id: &str, key: &str) -> bool {
    key.strip_prefix(owner_id)
        .and_then(|rest| rest.strip_prefix('/'))
        .map_or(false, |name| !name.is_empty())
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    url_expiry: Duration,
}

impl LocalBlobStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: PathBuf::from(&config.blob_root),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            url_expiry: Duration::seconds(config.url_expiry_secs as i64),
        }
    }

    /// Map a key to a path under the root, rejecting anything that could escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(anyhow!("Invalid blob key '{}'", key));
        }
        Ok(self.root.join(relative))
    }

    fn presign(&self, key: &str) -> Result<PresignedUrl> {
        self.resolve(key)?;
        Ok(PresignedUrl {
            url: format!("{}/{}", self.public_base_url, key),
            expires_at: Utc::now() + self.url_expiry,
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_url(&self, key: &str) -> Result<PresignedUrl> {
        self.presign(key)
    }

    async fn get_url(&self, key: &str) -> Result<PresignedUrl> {
        self.presign(key)
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create blob directory {}", parent.display()))?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write blob '{}'", key))?;

        tracing::debug!(key = %key, bytes = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn fetch_to_local(&self, key: &str, destination: &Path) -> Result<()> {
        let source = self.resolve(key)?;
        tokio::fs::copy(&source, destination)
            .await
            .with_context(|| format!("Failed to fetch blob '{}'", key))?;
        Ok(())
    }
}
