//! S3 store tests against MinIO.
//!
//! Run with: `cargo test -p mirror-tests --test s3_tests --features integration`

#![cfg(feature = "integration")]

use mirror_cache::{CacheCoordinator, CoordinatorConfig};
use mirror_core::{PrefixLinks, RemoteStore, collect_bytes, once_bytes};
use mirror_store::{S3Store, StoreConfig};
use mirror_tests::{ScriptedOrigin, containers::MinioContainer, init_test_logging};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[tokio::test]
async fn test_s3_object_lifecycle() {
    init_test_logging();
    let minio = MinioContainer::start().await.expect("Failed to start MinIO");
    let store = minio.store("mirror").await.expect("Failed to open bucket");

    let written = store
        .put("example.com/a/one.txt", once_bytes(&b"first"[..]))
        .await
        .unwrap();
    assert_eq!(written, 5);
    store
        .put("example.com/b/two.txt", once_bytes(&b"second"[..]))
        .await
        .unwrap();

    let info = store.stat("example.com/a/one.txt").await.unwrap();
    assert_eq!(info.size, 5);
    assert!(info.last_modified.is_some());

    let body = collect_bytes(store.get("example.com/b/two.txt").await.unwrap())
        .await
        .unwrap();
    assert_eq!(body.as_ref(), b"second");

    let listed = store.list("example.com/a").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "example.com/a/one.txt");

    store.delete("example.com/a/one.txt").await.unwrap();
    assert!(store.stat("example.com/a/one.txt").await.unwrap_err().is_not_found());
    assert!(store.get("example.com/missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_s3_prefix_is_hidden_from_keys() {
    let minio = MinioContainer::start().await.expect("Failed to start MinIO");
    let mut config = minio.s3_config("prefixed");
    config.prefix = Some("cache".to_string());
    let store = StoreConfig::S3(config).build().await.unwrap();

    store
        .put("example.com/file", once_bytes(&b"data"[..]))
        .await
        .unwrap();

    let listed = store.list("").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "example.com/file");
}

#[tokio::test]
async fn test_populate_into_s3() {
    let minio = MinioContainer::start().await.expect("Failed to start MinIO");
    let store: Arc<S3Store> = Arc::new(minio.store("populate").await.unwrap());
    let origin = ScriptedOrigin::new(b"origin payload");
    let cache = CacheCoordinator::new(
        store.clone(),
        Arc::new(PrefixLinks::new("https://cdn.test")),
        origin.clone(),
        CoordinatorConfig::new(),
    );

    let source = Url::parse("https://example.com/pkg.tar").unwrap();
    let link = cache
        .serve("example.com/pkg.tar", &source, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(link, "https://cdn.test/example.com/pkg.tar");

    let info = store.stat("example.com/pkg.tar").await.unwrap();
    assert_eq!(info.size, 14);
    assert_eq!(origin.gets(), 1);
}
