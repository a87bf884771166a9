//! Bounded-time freshness probe against the origin.

use mirror_core::{Error, OriginClient, OriginInfo, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Whether a cached entry of `cached_size` bytes can be trusted given the
/// size the origin reports.
///
/// An empty cached entry is never trusted. An origin that does not declare a
/// size never invalidates a non-empty entry.
pub fn is_fresh(cached_size: u64, origin_size: Option<u64>) -> bool {
    cached_size != 0 && origin_size.is_none_or(|size| size == 0 || size == cached_size)
}

/// Issues HEAD probes bounded by a fixed timeout.
#[derive(Clone)]
pub struct FreshnessChecker {
    origin: Arc<dyn OriginClient>,
    timeout: Duration,
}

impl FreshnessChecker {
    pub fn new(origin: Arc<dyn OriginClient>, timeout: Duration) -> Self {
        Self { origin, timeout }
    }

    /// HEAD `url`, giving up after the configured timeout or when the caller
    /// cancels, whichever comes first.
    pub async fn probe(&self, url: &Url, cancel: &CancellationToken) -> Result<OriginInfo> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Canceled),
            probed = tokio::time::timeout(self.timeout, self.origin.head(url)) => {
                probed
                    .map_err(|_| Error::Timeout {
                        what: format!("HEAD {}", url),
                        millis: self.timeout.as_millis(),
                    })
                    .and_then(|head| head)
            }
        }
    }
}
