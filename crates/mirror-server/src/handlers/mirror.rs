//! The mirror handler: every path not claimed by another route ends here.

use crate::direct;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn mirror(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    // Dropping the handler future (client went away) cancels the token.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let host = request_host(&headers, &uri);

    let resolved = match state.resolver.resolve(&method, host, uri.path()) {
        Ok(resolved) => resolved,
        Err(err) => return state.error_response(&uri, err),
    };

    let Some(cache) = &state.cache else {
        return match direct::forward(state.origin.as_ref(), &resolved, &headers).await {
            Ok(response) => response,
            Err(err) => state.error_response(&uri, err),
        };
    };

    match cache.serve(&resolved.key, &resolved.url, &cancel).await {
        Ok(link) => (StatusCode::FOUND, [(header::LOCATION, link)]).into_response(),
        Err(err) => state.error_response(&uri, err),
    }
}

/// The Host header, falling back to the authority of an absolute URI.
pub(crate) fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
}
