//! Health check handlers.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `cache` or `direct`.
    pub mode: String,
    /// Keys currently being populated.
    pub in_flight: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (mode, in_flight) = match &state.cache {
        Some(cache) => ("cache", cache.in_flight().len()),
        None => ("direct", 0),
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: mode.to_string(),
        in_flight,
    })
}

pub async fn ready() -> StatusCode {
    StatusCode::OK
}
