//! Store configuration.

use crate::{FilesystemStore, MemoryStore, S3Store};
use mirror_core::{RemoteStore, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint URL; `None` uses AWS. A bare `host:port` implies https.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    pub bucket: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
    /// Key prefix inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Path-style addressing, required by most self-hosted servers.
    #[serde(default = "default_path_style")]
    pub path_style: bool,
    /// Create the bucket on startup if it is missing.
    #[serde(default)]
    pub create_bucket: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_path_style() -> bool {
    true
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            bucket: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            prefix: None,
            path_style: default_path_style(),
            create_bucket: false,
        }
    }
}

/// Which backend to cache into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    S3(S3Config),
    Filesystem { root: PathBuf },
    Memory,
}

impl StoreConfig {
    /// Build the configured backend.
    pub async fn build(&self) -> Result<Arc<dyn RemoteStore>> {
        match self {
            StoreConfig::S3(config) => {
                let store = S3Store::new(config)?;
                if config.create_bucket {
                    store.ensure_bucket().await?;
                }
                info!("Using S3 store, bucket {}", store.bucket());
                Ok(Arc::new(store))
            }
            StoreConfig::Filesystem { root } => {
                tokio::fs::create_dir_all(root).await?;
                info!("Using filesystem store at {}", root.display());
                Ok(Arc::new(FilesystemStore::new(root.clone())))
            }
            StoreConfig::Memory => {
                info!("Using in-memory store");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_config_with_defaults() {
        let yaml = r#"
type: s3
endpoint: minio:9000
bucket: mirror
access_key_id: key
access_key_secret: secret
"#;
        let config: StoreConfig = serde_yaml::from_str(yaml).expect("parse");
        match config {
            StoreConfig::S3(s3) => {
                assert_eq!(s3.region, "us-east-1");
                assert!(s3.path_style);
                assert!(!s3.create_bucket);
                assert_eq!(s3.endpoint.as_deref(), Some("minio:9000"));
            }
            other => panic!("unexpected store config: {:?}", other),
        }
    }

    #[test]
    fn test_parse_filesystem_config() {
        let config: StoreConfig =
            serde_yaml::from_str("type: filesystem\nroot: /srv/mirror\n").expect("parse");
        assert!(matches!(config, StoreConfig::Filesystem { ref root } if root == &PathBuf::from("/srv/mirror")));
    }

    #[tokio::test]
    async fn test_build_filesystem_creates_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("nested/cache");
        let store = StoreConfig::Filesystem { root: root.clone() }
            .build()
            .await
            .expect("build");

        assert!(root.is_dir());
        assert!(store.list("").await.expect("list").is_empty());
    }
}
