//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the mirror core and its
//! adapters: the durable object store, the outbound HTTP client and the
//! function that turns a cache key into a public URL.

use crate::object::{ObjectInfo, OriginInfo, OriginResponse};
use crate::path::encode_path;
use crate::stream::ByteStream;
use crate::Result;
use async_trait::async_trait;
use http::{HeaderMap, Method};
use url::Url;

/// Durable key/value store with streamed values.
///
/// Only `stat` and `put` are used on the request path; the other operations
/// back the `cache` subcommands.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Metadata of `key`. Fails with [`Error::NotFound`](crate::Error::NotFound)
    /// when the object does not exist.
    async fn stat(&self, key: &str) -> Result<ObjectInfo>;

    /// Stream the contents of `key`.
    async fn get(&self, key: &str) -> Result<ByteStream>;

    /// Write `body` to `key`, replacing any existing object. Returns the
    /// number of bytes written.
    async fn put(&self, key: &str, body: ByteStream) -> Result<u64>;

    /// Delete `key`. Fails with `NotFound` when the object does not exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;
}

/// Outbound HTTP towards the origin.
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// HEAD `url`. Non-success statuses are errors.
    async fn head(&self, url: &Url) -> Result<OriginInfo>;

    /// GET `url`. Non-success statuses fail with
    /// [`Error::OriginStatus`](crate::Error::OriginStatus).
    async fn get(&self, url: &Url) -> Result<OriginResponse>;

    /// Send `method` to `url` with `headers` and return whatever the origin
    /// answered, whatever the status.
    async fn forward(&self, method: Method, url: &Url, headers: HeaderMap)
    -> Result<OriginResponse>;
}

/// Maps a cache key to the externally reachable URL of its cached copy.
///
/// `None` means caching is unavailable for this key.
pub trait LinkResolver: Send + Sync {
    fn resolve(&self, key: &str) -> Option<String>;
}

impl<F> LinkResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Resolves every key to `{base}/{key}`, with the key percent-encoded.
#[derive(Debug, Clone)]
pub struct PrefixLinks {
    base: String,
}

impl PrefixLinks {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

impl LinkResolver for PrefixLinks {
    fn resolve(&self, key: &str) -> Option<String> {
        Some(format!("{}/{}", self.base, encode_path(key.trim_start_matches('/'))))
    }
}
