//! Route definitions.

use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::sync::Arc;

use crate::handlers::{health, mirror};
use crate::middleware::service_host;
use crate::state::AppState;

/// Create the main router.
///
/// Service endpoints live under `/-/` and answer for the server's own host
/// names; on a mirrored host those paths are mirrored instead. Everything
/// else falls through to the mirror handler.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/-/health", get(health::health))
        .route("/-/ready", get(health::ready))
        .route_layer(from_fn_with_state(state.clone(), service_host))
        .fallback(mirror::mirror)
        .with_state(state)
}
