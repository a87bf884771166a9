//! HTTP middleware.

use crate::handlers::mirror::{mirror, request_host};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

pub static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Tag each request with an id, keeping one supplied by the client.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = match request.headers().get(&REQUEST_ID) {
        Some(value) => value.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string());
            match generated {
                Ok(value) => value,
                Err(_) => return next.run(request).await,
            }
        }
    };
    request.headers_mut().insert(REQUEST_ID.clone(), id.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID.clone(), id);
    response
}

/// Service routes answer only for hosts that are not mirrored. A request
/// for `/-/health` on a mirrored host is a mirror request like any other.
pub async fn service_host(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    if state
        .resolver
        .is_mirrored_host(request_host(&parts.headers, &parts.uri))
    {
        return mirror(State(state), parts.method, parts.uri, parts.headers).await;
    }
    next.run(Request::from_parts(parts, body)).await
}
