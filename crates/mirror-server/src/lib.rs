//! HTTP front end for httpmirror.
//!
//! Resolves incoming requests to origin URLs, then either redirects to the
//! cached copy through [`mirror_cache::CacheCoordinator`] or proxies the
//! origin directly.

pub mod direct;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use resolver::{RequestResolver, ResolvedRequest, ResolverConfig, is_valid_domain};
pub use state::{AppState, DefaultNotFound, NotFoundHandler};

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the full application: routes, request ids and request tracing.
pub fn build_app(state: AppState) -> Router {
    routes::create_router(Arc::new(state))
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
}
