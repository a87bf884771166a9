//! Object metadata and origin response types.

use crate::stream::ByteStream;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

/// Metadata of an object held by a [`RemoteStore`](crate::RemoteStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Store key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }
}

/// What an origin HEAD probe reports about a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginInfo {
    /// Declared size; `None` when the origin did not say.
    pub size: Option<u64>,
}

/// A streamed response from the origin.
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Declared `Content-Length`, if any.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Parse a declared `Content-Length` header.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
