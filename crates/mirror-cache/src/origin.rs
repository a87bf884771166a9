//! reqwest-backed origin client.

use async_trait::async_trait;
use futures::StreamExt;
use http::{HeaderMap, Method};
use mirror_core::object::declared_length;
use mirror_core::{Error, OriginClient, OriginInfo, OriginResponse, Result};
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Origin client over HTTP(S).
#[derive(Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

/// Builder for [`HttpOrigin`].
#[derive(Debug, Clone, Default)]
pub struct HttpOriginBuilder {
    proxy: Option<String>,
    connect_timeout: Option<Duration>,
}

impl HttpOriginBuilder {
    /// Route every outbound connection through `proxy`
    /// (`http://`, `https://` or `socks5://`).
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Give up on origins that do not accept a connection within `timeout`.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpOrigin> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("httpmirror/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error(format!("stopped after {} redirects", MAX_REDIRECTS))
                } else {
                    debug!("Following redirect to {}", attempt.url());
                    attempt.follow()
                }
            }));

        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpOrigin { client })
    }
}

impl HttpOrigin {
    pub fn builder() -> HttpOriginBuilder {
        HttpOriginBuilder::default()
    }

    fn check_status(url: &Url, response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::OriginStatus {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn into_origin_response(response: reqwest::Response) -> OriginResponse {
        let status = response.status();
        let headers = response.headers().clone();
        let content_length = declared_length(&headers);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Network(e.to_string())));

        OriginResponse {
            status,
            headers,
            content_length,
            body: Box::pin(body),
        }
    }
}

#[async_trait]
impl OriginClient for HttpOrigin {
    async fn head(&self, url: &Url) -> Result<OriginInfo> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Self::check_status(url, &response)?;

        Ok(OriginInfo {
            size: declared_length(response.headers()),
        })
    }

    async fn get(&self, url: &Url) -> Result<OriginResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Self::check_status(url, &response)?;

        Ok(Self::into_origin_response(response))
    }

    async fn forward(
        &self,
        method: Method,
        url: &Url,
        headers: HeaderMap,
    ) -> Result<OriginResponse> {
        let response = self
            .client
            .request(method, url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self::into_origin_response(response))
    }
}
