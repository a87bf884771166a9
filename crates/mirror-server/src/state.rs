//! Application state shared across handlers.

use crate::error::ApiError;
use crate::resolver::RequestResolver;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use mirror_cache::CacheCoordinator;
use mirror_core::{Error, OriginClient};
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the response for requests the mirror will not serve.
pub trait NotFoundHandler: Send + Sync {
    fn respond(&self, uri: &Uri) -> Response;
}

/// Plain `404 page not found`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNotFound;

impl NotFoundHandler for DefaultNotFound {
    fn respond(&self, _uri: &Uri) -> Response {
        (StatusCode::NOT_FOUND, "404 page not found").into_response()
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: RequestResolver,
    pub origin: Arc<dyn OriginClient>,
    /// `None` means every request is proxied directly.
    pub cache: Option<Arc<CacheCoordinator>>,
    pub not_found: Arc<dyn NotFoundHandler>,
}

impl AppState {
    pub fn new(resolver: RequestResolver, origin: Arc<dyn OriginClient>) -> Self {
        Self {
            resolver,
            origin,
            cache: None,
            not_found: Arc::new(DefaultNotFound),
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheCoordinator>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_not_found(mut self, handler: Arc<dyn NotFoundHandler>) -> Self {
        self.not_found = handler;
        self
    }

    /// Render `err` for the request at `uri`.
    pub fn error_response(&self, uri: &Uri, err: Error) -> Response {
        if err.is_not_found() {
            debug!("Not found {}: {}", uri, err);
            return self.not_found.respond(uri);
        }
        if err.is_canceled() {
            debug!("Canceled {}", uri);
        } else {
            warn!("Failed {}: {}", uri, err);
        }
        ApiError(err).into_response()
    }
}
