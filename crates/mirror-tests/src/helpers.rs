//! Test helper functions and utilities.

use async_trait::async_trait;
use http::{HeaderMap, Method};
use mirror_cache::HttpOrigin;
use mirror_core::{OriginClient, OriginInfo, OriginResponse, Result};
use mirror_server::{AppState, build_app};
use reqwest::Client;
use reqwest::redirect::Policy;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use url::Url;

/// Start a mirror server for testing and return its address.
pub async fn start_test_server(
    state: AppState,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("test server failed: {}", err);
        }
    });

    Ok((addr, handle))
}

/// HTTP client that reports redirects instead of following them.
pub fn test_client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// Client for a running mirror.
pub struct MirrorTestClient {
    client: Client,
    base_url: String,
}

impl MirrorTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn request(&self, method: Method, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.request(method, self.url(path)).send().await
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.request(Method::GET, path).await
    }

    pub async fn head(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.request(Method::HEAD, path).await
    }

    /// Fetch the health document.
    pub async fn health(&self) -> anyhow::Result<serde_json::Value> {
        let resp = self.get("/-/health").await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

/// Real HTTP origin that sends every request to a local mock server,
/// keeping only the path of the requested URL.
pub struct LocalOrigin {
    inner: HttpOrigin,
    base: Url,
}

impl LocalOrigin {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        Ok(Self {
            inner: HttpOrigin::builder().build()?,
            base: Url::parse(base)?,
        })
    }

    fn rewrite(&self, url: &Url) -> Url {
        let mut target = self.base.clone();
        target.set_path(url.path());
        target
    }
}

#[async_trait]
impl OriginClient for LocalOrigin {
    async fn head(&self, url: &Url) -> Result<OriginInfo> {
        self.inner.head(&self.rewrite(url)).await
    }

    async fn get(&self, url: &Url) -> Result<OriginResponse> {
        self.inner.get(&self.rewrite(url)).await
    }

    async fn forward(&self, method: Method, url: &Url, headers: HeaderMap) -> Result<OriginResponse> {
        self.inner.forward(method, &self.rewrite(url), headers).await
    }
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut condition: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Assert that a future completes within a timeout.
pub async fn assert_completes_within<F, T>(future: F, timeout: std::time::Duration) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("Operation timed out")
}
