//! Command handlers.

use crate::config::MirrorConfig;
use anyhow::{Context, bail};
use futures::StreamExt;
use mirror_cache::{CacheCoordinator, HttpOrigin};
use mirror_core::{ObjectInfo, OriginClient, PrefixLinks, RemoteStore};
use mirror_server::{AppState, RequestResolver, build_app};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::info;

/// Run the mirror until Ctrl-C.
pub async fn serve(config: &MirrorConfig) -> anyhow::Result<()> {
    let mut origin = HttpOrigin::builder();
    if let Some(proxy) = &config.proxy {
        origin = origin.proxy(proxy.clone());
    }
    if let Some(timeout) = config.origin_connect_timeout()? {
        origin = origin.connect_timeout(timeout);
    }
    let origin: Arc<dyn OriginClient> = Arc::new(origin.build()?);

    let resolver = RequestResolver::new(config.resolver_config());
    let mut state = AppState::new(resolver, origin.clone());

    match &config.store {
        Some(store_config) => {
            let Some(links) = config.redirect_links.as_deref().filter(|l| !l.is_empty()) else {
                bail!("a cache store requires --redirect-links");
            };
            let store = store_config.build().await?;
            let coordinator = CacheCoordinator::new(
                store,
                Arc::new(PrefixLinks::new(links)),
                origin,
                config.coordinator_config()?,
            );
            info!("Cache mode, redirecting to {}", links);
            state = state.with_cache(Arc::new(coordinator));
        }
        None => info!("No store configured, proxying directly"),
    }

    let address = config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn open_store(config: &MirrorConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    let Some(store) = &config.store else {
        bail!("no store configured; pass --config, --s3-bucket or --fs-root");
    };
    Ok(store.build().await?)
}

fn format_object(object: &ObjectInfo) -> String {
    let modified = object
        .last_modified
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    format!("{:>12}  {:<25}  {}", object.size, modified, object.key)
}

/// List cached objects.
pub async fn list_cache(config: &MirrorConfig, prefix: Option<&str>) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let objects = store.list(prefix.unwrap_or_default()).await?;
    for object in &objects {
        println!("{}", format_object(object));
    }
    println!("{} objects", objects.len());
    Ok(())
}

/// Show one object.
pub async fn stat_cache(config: &MirrorConfig, key: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let object = store.stat(key).await?;
    println!("{}", format_object(&object));
    Ok(())
}

/// Copy an object to `output`, or stdout.
pub async fn get_cache(config: &MirrorConfig, key: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let mut body = store.get(key).await?;

    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = match output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    if let Some(path) = output {
        info!("Wrote {} bytes to {}", written, path.display());
    }
    Ok(())
}

/// Remove an object.
pub async fn remove_cache(config: &MirrorConfig, key: &str) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    store.delete(key).await?;
    println!("Removed {}", key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_store::StoreConfig;

    fn fs_config(root: &Path) -> MirrorConfig {
        MirrorConfig {
            store: Some(StoreConfig::Filesystem {
                root: root.to_path_buf(),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cache_get_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let config = fs_config(dir.path());
        let store = open_store(&config).await.unwrap();
        store
            .put("example.com/a.txt", mirror_core::once_bytes(&b"hello"[..]))
            .await
            .unwrap();

        let out = dir.path().join("out.txt");
        get_cache(&config, "example.com/a.txt", Some(&out)).await.unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"hello");

        stat_cache(&config, "example.com/a.txt").await.unwrap();
        remove_cache(&config, "example.com/a.txt").await.unwrap();
        assert!(stat_cache(&config, "example.com/a.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_cache_commands_need_a_store() {
        let config = MirrorConfig::default();
        assert!(list_cache(&config, None).await.is_err());
    }

    #[tokio::test]
    async fn test_serve_requires_redirect_links() {
        let dir = tempfile::tempdir().unwrap();
        let config = fs_config(dir.path());
        let err = serve(&config).await.unwrap_err();
        assert!(err.to_string().contains("redirect-links"));
    }
}
