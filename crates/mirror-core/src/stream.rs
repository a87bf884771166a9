//! Byte stream helpers.

use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, future, stream};
use std::pin::Pin;

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Truncate `body` after `limit` bytes.
pub fn limit_bytes(body: ByteStream, limit: u64) -> ByteStream {
    Box::pin(body.scan(limit, |remaining, chunk| {
        let item = match chunk {
            Ok(_) if *remaining == 0 => return future::ready(None),
            Ok(mut bytes) => {
                if bytes.len() as u64 > *remaining {
                    bytes.truncate(*remaining as usize);
                }
                *remaining -= bytes.len() as u64;
                Ok(bytes)
            }
            Err(err) => Err(err),
        };
        future::ready(Some(item))
    }))
}

/// A stream yielding `bytes` once.
pub fn once_bytes(bytes: impl Into<Bytes>) -> ByteStream {
    Box::pin(stream::once(future::ready(Ok::<_, Error>(bytes.into()))))
}

/// Drain `body` into memory.
pub async fn collect_bytes(mut body: ByteStream) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
