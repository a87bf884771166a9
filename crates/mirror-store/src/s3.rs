//! S3-compatible store using the AWS SDK.

use crate::config::S3Config;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mirror_core::{ByteStream, Error, ObjectInfo, RemoteStore, Result};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::spool::staging_path;

fn store_error(err: impl std::error::Error) -> Error {
    Error::Store(DisplayErrorContext(err).to_string())
}

fn timestamp(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<DateTime<Utc>> {
    dt.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

/// S3-compatible object store (AWS, MinIO, R2, ...).
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3Store {
    pub fn new(config: &S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::Config("S3 bucket must be set".to_string()));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.access_key_secret,
            None,
            None,
            "httpmirror",
        );
        let mut builder = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint_url(endpoint));
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            prefix: config
                .prefix
                .as_deref()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket unless it already exists.
    pub async fn ensure_bucket(&self) -> Result<()> {
        if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
            return Ok(());
        }

        info!("Creating bucket {}", self.bucket);
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        join_prefix(self.prefix.as_deref(), key)
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        strip_prefix(self.prefix.as_deref(), key)
    }
}

fn join_prefix(prefix: Option<&str>, key: &str) -> String {
    let key = key.trim_start_matches('/');
    match prefix {
        Some(prefix) => format!("{}/{}", prefix, key),
        None => key.to_string(),
    }
}

fn strip_prefix<'a>(prefix: Option<&str>, key: &'a str) -> &'a str {
    match prefix {
        Some(prefix) => key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix('/'))
            .unwrap_or(key),
        None => key,
    }
}

/// The SDK wants a scheme; accept bare `host:port` like other S3 clients.
fn endpoint_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn stat(&self, key: &str) -> Result<ObjectInfo> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Error::NotFound(key.to_string())
                } else {
                    store_error(err)
                }
            })?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified: timestamp(output.last_modified()),
        })
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    Error::NotFound(key.to_string())
                } else {
                    store_error(err)
                }
            })?;

        let stream = ReaderStream::new(output.body.into_async_read())
            .map(|chunk| chunk.map_err(Error::from));
        Ok(Box::pin(stream))
    }

    async fn put(&self, key: &str, mut body: ByteStream) -> Result<u64> {
        // PutObject needs the length up front; spool to disk to learn it.
        let spool = staging_path(None).await?;
        let mut file = tokio::fs::File::create(&spool).await?;
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        let upload = S3ByteStream::from_path(&spool)
            .await
            .map_err(|e| Error::Store(format!("Failed to read spool file: {}", e)))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .content_length(written as i64)
            .body(upload)
            .send()
            .await
            .map_err(store_error)?;

        debug!("Uploaded {} bytes to s3://{}/{}", written, self.bucket, self.full_key(key));
        Ok(written)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        // DeleteObject succeeds on missing keys; check first to report NotFound.
        self.stat(key).await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let full_prefix = self.full_key(prefix);
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(store_error)?;
            for object in output.contents() {
                if let Some(object_key) = object.key() {
                    results.push(ObjectInfo {
                        key: self.strip_prefix(object_key).to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                        last_modified: timestamp(object.last_modified()),
                    });
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            endpoint: Some("minio.local:9000".to_string()),
            bucket: "mirror".to_string(),
            ..S3Config::default()
        }
    }

    #[test]
    fn test_endpoint_url_adds_scheme() {
        assert_eq!(endpoint_url("minio.local:9000"), "https://minio.local:9000");
        assert_eq!(endpoint_url("http://127.0.0.1:9000"), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_prefix_handling() {
        assert_eq!(join_prefix(Some("cache"), "/example.com/a"), "cache/example.com/a");
        assert_eq!(join_prefix(None, "example.com/a"), "example.com/a");
        assert_eq!(strip_prefix(Some("cache"), "cache/example.com/a"), "example.com/a");
        assert_eq!(strip_prefix(Some("cache"), "other/x"), "other/x");
    }

    #[test]
    fn test_bucket_required() {
        let mut config = config();
        config.bucket.clear();
        assert!(matches!(S3Store::new(&config), Err(Error::Config(_))));
    }
}
