//! The cache coordinator.
//!
//! For each request it resolves the redirect link, takes the key's
//! reservation, and then either redirects to the cached copy or populates
//! the store from the origin in a detached task.

use crate::config::{CoordinatorConfig, ProbeFailurePolicy};
use crate::freshness::{FreshnessChecker, is_fresh};
use crate::inflight::{InFlight, Reservation};
use mirror_core::{Error, LinkResolver, OriginClient, RemoteStore, Result, limit_bytes};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Coordinates cache lookups and populate jobs.
pub struct CacheCoordinator {
    store: Arc<dyn RemoteStore>,
    links: Arc<dyn LinkResolver>,
    origin: Arc<dyn OriginClient>,
    freshness: Option<FreshnessChecker>,
    in_flight: InFlight,
    config: CoordinatorConfig,
}

impl CacheCoordinator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        links: Arc<dyn LinkResolver>,
        origin: Arc<dyn OriginClient>,
        config: CoordinatorConfig,
    ) -> Self {
        let freshness = config
            .freshness_timeout
            .map(|timeout| FreshnessChecker::new(origin.clone(), timeout));

        Self {
            store,
            links,
            origin,
            freshness,
            in_flight: InFlight::new(),
            config,
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Decide how to answer a request for `key`, whose origin copy lives at
    /// `source`. Returns the URL to redirect the client to.
    ///
    /// Not-found kinds of [`Error`] mean the request should get a 404;
    /// [`Error::Canceled`] means `cancel` fired while waiting.
    pub async fn serve(&self, key: &str, source: &Url, cancel: &CancellationToken) -> Result<String> {
        let Some(link) = self.links.resolve(key) else {
            return Err(Error::NotFound(format!("no redirect link for {}", key)));
        };

        let reservation = self.in_flight.acquire(&link, cancel).await?;

        let cached = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Canceled),
            cached = self.store.stat(key) => cached,
        };

        match cached {
            Err(Error::Canceled) => return Err(Error::Canceled),
            Err(err) => info!("Cache miss {}: {}", link, err),
            Ok(info) if info.size == 0 => info!("Cache miss {}: cached entry is empty", link),
            Ok(info) => {
                info!("Cache hit {}", link);
                if self.trust_cached(&link, source, info.size, cancel).await? {
                    return Ok(link);
                }
            }
        }

        self.populate(reservation, key, source, link, cancel).await
    }

    /// Freshness decision for a non-empty hit.
    async fn trust_cached(
        &self,
        link: &str,
        source: &Url,
        cached_size: u64,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(checker) = &self.freshness else {
            return Ok(true);
        };

        match checker.probe(source, cancel).await {
            Ok(origin) if is_fresh(cached_size, origin.size) => Ok(true),
            Ok(origin) => {
                info!(
                    "Source changed {}: origin {:?} bytes, cached {} bytes",
                    link, origin.size, cached_size
                );
                Ok(false)
            }
            Err(Error::Canceled) => Err(Error::Canceled),
            Err(err) => match self.config.probe_failure {
                ProbeFailurePolicy::ServeCached => {
                    warn!("Source miss {}: {}", link, err);
                    Ok(true)
                }
                ProbeFailurePolicy::Refetch => {
                    warn!("Source miss {}: {}, refetching", link, err);
                    Ok(false)
                }
            },
        }
    }

    /// Hand the reservation to a detached populate task and wait for it or
    /// for the caller to go away.
    async fn populate(
        &self,
        reservation: Reservation,
        key: &str,
        source: &Url,
        link: String,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let job = tokio::spawn(populate_job(
            self.store.clone(),
            self.origin.clone(),
            key.to_string(),
            source.clone(),
            link.clone(),
            self.config.populate_timeout,
            reservation,
        ));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Caller went away, populate of {} continues", link);
                Err(Error::Canceled)
            }
            joined = job => match joined {
                Ok(Ok(())) => Ok(link),
                Ok(Err(err)) => Err(err),
                Err(err) => Err(Error::Internal(format!("populate task failed: {}", err))),
            },
        }
    }
}

/// Body of the detached populate task. Owns the reservation and publishes
/// the outcome to waiters when done.
async fn populate_job(
    store: Arc<dyn RemoteStore>,
    origin: Arc<dyn OriginClient>,
    key: String,
    source: Url,
    link: String,
    timeout: Option<Duration>,
    reservation: Reservation,
) -> Result<()> {
    let fetch = fetch_into_store(store.as_ref(), origin.as_ref(), &key, &source, &link);
    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch).await.unwrap_or_else(|_| {
            Err(Error::Timeout {
                what: format!("populate {}", link),
                millis: limit.as_millis(),
            })
        }),
        None => fetch.await,
    };

    reservation.complete(outcome.clone());
    outcome
}

async fn fetch_into_store(
    store: &dyn RemoteStore,
    origin: &dyn OriginClient,
    key: &str,
    source: &Url,
    link: &str,
) -> Result<()> {
    let response = origin.get(source).await?;
    let body = match response.content_length {
        Some(0) => return Err(Error::EmptyOrigin(source.to_string())),
        Some(length) => limit_bytes(response.body, length),
        None => response.body,
    };

    info!("Cache {} ({:?} bytes)", link, response.content_length);
    match store.put(key, body).await {
        Ok(written) => {
            info!("Cached {} ({} bytes)", link, written);
            Ok(())
        }
        Err(err) => {
            error!("Cache error {}: {}", link, err);
            Err(err)
        }
    }
}
