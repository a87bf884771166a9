//! Filesystem-backed store.
//!
//! Keys map to paths below a root directory, so a plain static file server
//! pointed at the same root can serve the redirect links.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mirror_core::{ByteStream, Error, ObjectInfo, RemoteStore, Result};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::spool::{STAGING_PREFIX, staging_path};

/// Filesystem-based store for single-node deployments.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Path of `key`. Keys escaping the root are rejected.
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(Error::NotFound(format!("invalid key: {}", key)));
        }
        Ok(self.root_dir.join(relative))
    }

    fn info(&self, path: &Path, metadata: &std::fs::Metadata) -> ObjectInfo {
        let key = path
            .strip_prefix(&self.root_dir)
            .unwrap_or(path)
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        let info = ObjectInfo::new(key, metadata.len());
        match metadata.modified() {
            Ok(modified) => info.with_last_modified(DateTime::<Utc>::from(modified)),
            Err(_) => info,
        }
    }
}

#[async_trait]
impl RemoteStore for FilesystemStore {
    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let path = self.key_path(key)?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(self.info(&path, &metadata))
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let path = self.key_path(key)?;
        let file = tokio::fs::File::open(&path).await?;
        let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(Error::from));
        Ok(Box::pin(stream))
    }

    async fn put(&self, key: &str, mut body: ByteStream) -> Result<u64> {
        let path = self.key_path(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::Internal(format!("key has no parent: {}", key)))?
            .to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;

        // Write next to the target and rename, so readers never see a partial object.
        let staging = staging_path(Some(parent)).await?;
        let mut file = tokio::fs::File::create(&staging).await?;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&staging, &path).await?;
        staging
            .keep()
            .map_err(|e| Error::Io(format!("Failed to persist {}: {}", path.display(), e)))?;
        debug!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        if !tokio::fs::try_exists(&self.root_dir).await? {
            return Ok(vec![]);
        }

        let prefix = prefix.trim_start_matches('/');
        let mut entries = vec![];
        let mut pending = vec![self.root_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                let staging = entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX);
                if !file_type.is_file() || staging {
                    continue;
                }

                let metadata = entry.metadata().await?;
                let info = self.info(&entry.path(), &metadata);
                if info.key.starts_with(prefix) {
                    entries.push(info);
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
