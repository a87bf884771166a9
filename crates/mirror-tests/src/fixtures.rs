//! Fakes for the store and origin ports.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use mirror_cache::{CacheCoordinator, CoordinatorConfig};
use mirror_core::{
    ByteStream, Error, ObjectInfo, OriginClient, OriginInfo, OriginResponse, PrefixLinks,
    RemoteStore, Result, once_bytes,
};
use mirror_store::MemoryStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use url::Url;

/// Base URL cached objects are redirected to in tests.
pub const CDN_BASE: &str = "https://cdn.test";

/// Redirect target for `key` under [`CDN_BASE`].
pub fn cdn_link(key: &str) -> String {
    format!("{}/{}", CDN_BASE, key)
}

/// Coordinator over `store` and `origin`, redirecting to [`CDN_BASE`].
pub fn coordinator(
    store: Arc<RecordingStore>,
    origin: Arc<ScriptedOrigin>,
    config: CoordinatorConfig,
) -> Arc<CacheCoordinator> {
    Arc::new(CacheCoordinator::new(
        store,
        Arc::new(PrefixLinks::new(CDN_BASE)),
        origin,
        config,
    ))
}

/// In-memory store counting the calls made against it.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    stats: AtomicUsize,
    puts: AtomicUsize,
    fail_puts: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed `key` without counting a put.
    pub async fn seed(&self, key: &str, data: &'static [u8]) {
        self.inner.insert(key, data).await;
    }

    pub async fn contents(&self, key: &str) -> Option<Bytes> {
        self.inner.contents(key).await
    }

    /// Make every later put fail after being counted.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn stats(&self) -> usize {
        self.stats.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        self.inner.stat(key).await
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: ByteStream) -> Result<u64> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Store(format!("put {} refused", key)));
        }
        self.inner.put(key, body).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.inner.list(prefix).await
    }
}

/// How [`ScriptedOrigin`] answers HEAD probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadBehavior {
    /// Report the body length.
    BodySize,
    /// Report a fixed size, `None` meaning no Content-Length.
    Size(Option<u64>),
    /// Fail with a network error.
    Fail,
    /// Never answer.
    Hang,
}

/// Origin with scripted answers and call counters.
///
/// A gated origin holds every GET until [`ScriptedOrigin::release`].
pub struct ScriptedOrigin {
    body: Mutex<Bytes>,
    head: Mutex<HeadBehavior>,
    get_status: Mutex<StatusCode>,
    gate: Option<Semaphore>,
    get_started: Notify,
    heads: AtomicUsize,
    gets: AtomicUsize,
}

impl ScriptedOrigin {
    fn build(body: &'static [u8], gate: Option<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Bytes::from_static(body)),
            head: Mutex::new(HeadBehavior::BodySize),
            get_status: Mutex::new(StatusCode::OK),
            gate,
            get_started: Notify::new(),
            heads: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        })
    }

    pub fn new(body: &'static [u8]) -> Arc<Self> {
        Self::build(body, None)
    }

    pub fn gated(body: &'static [u8]) -> Arc<Self> {
        Self::build(body, Some(Semaphore::new(0)))
    }

    pub fn set_body(&self, body: &'static [u8]) {
        if let Ok(mut current) = self.body.lock() {
            *current = Bytes::from_static(body);
        }
    }

    pub fn set_head(&self, behavior: HeadBehavior) {
        if let Ok(mut current) = self.head.lock() {
            *current = behavior;
        }
    }

    pub fn set_get_status(&self, status: StatusCode) {
        if let Ok(mut current) = self.get_status.lock() {
            *current = status;
        }
    }

    /// Let held and future GETs through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    /// Wait until a GET has reached the origin.
    pub async fn wait_for_get(&self) {
        let notified = self.get_started.notified();
        if self.gets() > 0 {
            return;
        }
        notified.await;
    }

    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn body(&self) -> Bytes {
        self.body.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OriginClient for ScriptedOrigin {
    async fn head(&self, url: &Url) -> Result<OriginInfo> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        let behavior = self.head.lock().map(|b| *b).unwrap_or(HeadBehavior::Fail);
        match behavior {
            HeadBehavior::BodySize => Ok(OriginInfo {
                size: Some(self.body().len() as u64),
            }),
            HeadBehavior::Size(size) => Ok(OriginInfo { size }),
            HeadBehavior::Fail => Err(Error::Network(format!("connection refused: {}", url))),
            HeadBehavior::Hang => std::future::pending().await,
        }
    }

    async fn get(&self, url: &Url) -> Result<OriginResponse> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.get_started.notify_waiters();

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            permit.forget();
        }

        let status = self
            .get_status
            .lock()
            .map(|s| *s)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if !status.is_success() {
            return Err(Error::OriginStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = self.body();
        Ok(OriginResponse {
            status,
            headers: HeaderMap::new(),
            content_length: Some(body.len() as u64),
            body: once_bytes(body),
        })
    }

    async fn forward(&self, method: Method, url: &Url, _headers: HeaderMap) -> Result<OriginResponse> {
        Err(Error::Internal(format!("unexpected forward {} {}", method, url)))
    }
}

/// Origin that answers forwarded requests with a fixed chunked body.
///
/// The declared length is sent as is, so it may disagree with the body.
pub struct StreamingOrigin {
    chunks: Vec<&'static [u8]>,
    declared: Option<u64>,
    fail_after: bool,
}

impl StreamingOrigin {
    pub fn new(chunks: Vec<&'static [u8]>, declared: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            declared,
            fail_after: false,
        })
    }

    /// Like [`StreamingOrigin::new`], but the body errors after the last chunk.
    pub fn failing(chunks: Vec<&'static [u8]>) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            declared: None,
            fail_after: true,
        })
    }
}

#[async_trait]
impl OriginClient for StreamingOrigin {
    async fn head(&self, url: &Url) -> Result<OriginInfo> {
        Err(Error::Internal(format!("unexpected head {}", url)))
    }

    async fn get(&self, url: &Url) -> Result<OriginResponse> {
        Err(Error::Internal(format!("unexpected get {}", url)))
    }

    async fn forward(&self, _method: Method, url: &Url, _headers: HeaderMap) -> Result<OriginResponse> {
        let mut headers = HeaderMap::new();
        if let Some(length) = self.declared {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }

        let mut chunks: Vec<Result<Bytes>> = self
            .chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk)))
            .collect();
        if self.fail_after {
            chunks.push(Err(Error::Network(format!("connection reset: {}", url))));
        }

        Ok(OriginResponse {
            status: StatusCode::OK,
            headers,
            content_length: self.declared,
            body: Box::pin(futures::stream::iter(chunks)),
        })
    }
}
