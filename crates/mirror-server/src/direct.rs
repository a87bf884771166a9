//! Direct proxying, used when no cache is configured.

use crate::resolver::ResolvedRequest;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Method, header};
use axum::response::Response;
use futures::StreamExt;
use mirror_core::{OriginClient, Result, limit_bytes};
use tracing::{info, warn};

/// Hop-by-hop headers never forwarded in either direction.
static HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_ignored_response_header(name: &HeaderName) -> bool {
    *name == header::SERVER || HOP_BY_HOP.contains(name)
}

/// Forward `resolved` to the origin and relay its answer.
///
/// The origin status is passed through. For GET the body is streamed,
/// bounded by the declared length; HEAD responses carry no body.
pub async fn forward(
    origin: &dyn OriginClient,
    resolved: &ResolvedRequest,
    inbound: &HeaderMap,
) -> Result<Response> {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }

    let upstream = origin
        .forward(resolved.method.clone(), &resolved.url, headers)
        .await?;

    let body = if resolved.method == Method::GET {
        info!("Response {} ({:?} bytes)", resolved.url, upstream.content_length);
        let stream = match upstream.content_length {
            Some(length) => limit_bytes(upstream.body, length),
            None => upstream.body,
        };
        let url = resolved.url.clone();
        Body::from_stream(stream.inspect(move |chunk| {
            if let Err(err) = chunk {
                warn!("Relaying {} failed: {}", url, err);
            }
        }))
    } else {
        Body::empty()
    };

    let mut response = Response::new(body);
    *response.status_mut() = upstream.status;
    let relayed = response.headers_mut();
    for (name, value) in &upstream.headers {
        if !is_ignored_response_header(name) {
            relayed.append(name.clone(), value.clone());
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_headers() {
        assert!(is_ignored_response_header(&header::SERVER));
        assert!(is_ignored_response_header(&header::CONNECTION));
        assert!(is_ignored_response_header(&HeaderName::from_static("keep-alive")));
        assert!(!is_ignored_response_header(&header::CONTENT_TYPE));
        assert!(!is_ignored_response_header(&header::CONTENT_LENGTH));
    }
}
