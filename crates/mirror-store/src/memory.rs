//! In-memory store for tests and local development.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mirror_core::{ByteStream, Error, ObjectInfo, RemoteStore, Result, collect_bytes, once_bytes};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Object {
    data: Bytes,
    modified: DateTime<Utc>,
}

/// A [`RemoteStore`] keeping every object in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Object>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly.
    pub async fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects.write().await.insert(
            key.to_string(),
            Object {
                data: data.into(),
                modified: Utc::now(),
            },
        );
    }

    /// Contents of `key`, if present.
    pub async fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn info(key: &str, object: &Object) -> ObjectInfo {
        ObjectInfo::new(key, object.data.len() as u64).with_last_modified(object.modified)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| Self::info(key, object))
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let data = self
            .contents(key)
            .await
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Ok(once_bytes(data))
    }

    async fn put(&self, key: &str, body: ByteStream) -> Result<u64> {
        // Collect first so a failed stream never replaces the old object.
        let data = collect_bytes(body).await?;
        let written = data.len() as u64;
        self.insert(key, data).await;
        Ok(written)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| Self::info(key, object))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_put_then_stat_and_get() {
        let store = MemoryStore::new();
        let written = store.put("a/b", once_bytes("hello")).await.expect("put");
        assert_eq!(written, 5);

        assert_eq!(store.stat("a/b").await.expect("stat").size, 5);
        let body = collect_bytes(store.get("a/b").await.expect("get")).await.expect("body");
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.stat("nope").await.unwrap_err().is_not_found());
        assert!(store.delete("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_put_keeps_previous_object() {
        let store = MemoryStore::new();
        store.insert("k", "old").await;

        let items: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"new")), Err(Error::Network("reset".into()))];
        let result = store.put("k", Box::pin(stream::iter(items))).await;

        assert!(result.is_err());
        assert_eq!(store.contents("k").await.as_deref(), Some(&b"old"[..]));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryStore::new();
        store.insert("example.com/a", "1").await;
        store.insert("example.com/b", "22").await;
        store.insert("example.org/c", "333").await;

        let keys: Vec<String> = store
            .list("example.com/")
            .await
            .expect("list")
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["example.com/a", "example.com/b"]);
    }
}
