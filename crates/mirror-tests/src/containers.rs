//! Testcontainer configurations for integration tests.

use mirror_store::{S3Config, S3Store};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::minio::MinIO;

/// MinIO container for S3 store tests.
pub struct MinioContainer {
    #[allow(dead_code)] // Kept to maintain container lifetime
    container: ContainerAsync<MinIO>,
    endpoint: String,
    access_key: String,
    secret_key: String,
}

impl MinioContainer {
    pub async fn start() -> anyhow::Result<Self> {
        let container = MinIO::default().with_tag("latest").start().await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(9000).await?;

        let endpoint = format!("http://{}:{}", host, port);
        let access_key = "minioadmin".to_string();
        let secret_key = "minioadmin".to_string();

        Ok(Self {
            container,
            endpoint,
            access_key,
            secret_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Store settings for `bucket` on this server.
    pub fn s3_config(&self, bucket: &str) -> S3Config {
        S3Config {
            endpoint: Some(self.endpoint.clone()),
            bucket: bucket.to_string(),
            access_key_id: self.access_key.clone(),
            access_key_secret: self.secret_key.clone(),
            create_bucket: true,
            ..Default::default()
        }
    }

    /// Open `bucket`, creating it when missing.
    pub async fn store(&self, bucket: &str) -> anyhow::Result<S3Store> {
        let store = S3Store::new(&self.s3_config(bucket))?;
        store.ensure_bucket().await?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_minio_container_starts() {
        let minio = MinioContainer::start().await.unwrap();
        assert!(minio.endpoint().contains("http://"));
    }
}
