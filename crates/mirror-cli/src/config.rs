//! Configuration file handling and flag merging.

use crate::commands::{ServeArgs, StoreArgs};
use anyhow::{Context, bail};
use mirror_cache::{CoordinatorConfig, ProbeFailurePolicy};
use mirror_server::ResolverConfig;
use mirror_store::{S3Config, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Contents of the YAML configuration file. Every field may be overridden
/// on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub address: Option<String>,
    /// Cache backend; absent means direct proxying.
    pub store: Option<StoreConfig>,
    pub redirect_links: Option<String>,
    pub host_from_first_path: bool,
    pub base_domain: Option<String>,
    pub block_suffixes: Vec<String>,
    /// Duration string, see [`parse_duration`].
    pub check_sync_timeout: Option<String>,
    pub populate_timeout: Option<String>,
    pub probe_failure: ProbeFailurePolicy,
    pub proxy: Option<String>,
    /// Origin connect timeout, a duration string.
    pub connect_timeout: Option<String>,
}

impl MirrorConfig {
    /// Load the file at `path`, or the defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Overlay `serve` flags.
    pub fn apply_serve(&mut self, args: &ServeArgs) {
        self.apply_store(&args.store);
        if let Some(address) = &args.address {
            self.address = Some(address.clone());
        }
        if let Some(links) = &args.redirect_links {
            self.redirect_links = Some(links.clone());
        }
        if args.host_from_first_path {
            self.host_from_first_path = true;
        }
        if let Some(domain) = &args.base_domain {
            self.base_domain = Some(domain.clone());
        }
        if !args.block_suffixes.is_empty() {
            self.block_suffixes = args.block_suffixes.clone();
        }
        if let Some(timeout) = &args.check_sync_timeout {
            self.check_sync_timeout = Some(timeout.clone());
        }
        if let Some(timeout) = &args.populate_timeout {
            self.populate_timeout = Some(timeout.clone());
        }
        if let Some(proxy) = &args.proxy {
            self.proxy = Some(proxy.clone());
        }
        if let Some(timeout) = &args.connect_timeout {
            self.connect_timeout = Some(timeout.clone());
        }
        if let Some(stale) = args.serve_stale_on_probe_failure {
            self.probe_failure = if stale {
                ProbeFailurePolicy::ServeCached
            } else {
                ProbeFailurePolicy::Refetch
            };
        }
    }

    /// Overlay store flags. Any S3 flag selects the S3 backend, starting
    /// from the file's S3 settings when there are some.
    pub fn apply_store(&mut self, args: &StoreArgs) {
        if let Some(root) = &args.fs_root {
            self.store = Some(StoreConfig::Filesystem { root: root.clone() });
            return;
        }

        let any_s3 = args.s3_endpoint.is_some()
            || args.s3_bucket.is_some()
            || args.s3_access_key_id.is_some()
            || args.s3_access_key_secret.is_some()
            || args.s3_region.is_some()
            || args.s3_prefix.is_some();
        if !any_s3 {
            return;
        }

        let mut s3 = match self.store.take() {
            Some(StoreConfig::S3(existing)) => existing,
            _ => S3Config::default(),
        };
        if let Some(endpoint) = &args.s3_endpoint {
            s3.endpoint = Some(endpoint.clone());
        }
        if let Some(bucket) = &args.s3_bucket {
            s3.bucket = bucket.clone();
        }
        if let Some(id) = &args.s3_access_key_id {
            s3.access_key_id = id.clone();
        }
        if let Some(secret) = &args.s3_access_key_secret {
            s3.access_key_secret = secret.clone();
        }
        if let Some(region) = &args.s3_region {
            s3.region = region.clone();
        }
        if let Some(prefix) = &args.s3_prefix {
            s3.prefix = Some(prefix.clone());
        }
        self.store = Some(StoreConfig::S3(s3));
    }

    /// Address to bind, with a bare `:port` meaning all interfaces.
    pub fn listen_address(&self) -> String {
        normalize_address(self.address.as_deref().unwrap_or(":8080"))
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            host_from_first_path: self.host_from_first_path,
            base_domain: self.base_domain.clone().filter(|d| !d.is_empty()),
            block_suffixes: self.block_suffixes.clone(),
        }
    }

    /// Origin connect timeout; `None` when unset or zero.
    pub fn origin_connect_timeout(&self) -> anyhow::Result<Option<Duration>> {
        let Some(timeout) = &self.connect_timeout else {
            return Ok(None);
        };
        let timeout = parse_duration(timeout)?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }

    pub fn coordinator_config(&self) -> anyhow::Result<CoordinatorConfig> {
        let mut config = CoordinatorConfig::new().with_probe_failure(self.probe_failure);
        if let Some(timeout) = &self.check_sync_timeout {
            config = config.with_freshness_timeout(parse_duration(timeout)?);
        }
        if let Some(timeout) = &self.populate_timeout {
            config = config.with_populate_timeout(parse_duration(timeout)?);
        }
        Ok(config)
    }
}

/// Parse durations like `500ms`, `5s`, `2m`, `1h`. A bare number is seconds.
pub fn parse_duration(value: &str) -> anyhow::Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number
        .parse()
        .with_context(|| format!("invalid duration {:?}", value))?;

    let seconds = match unit.trim() {
        "ms" => number / 1000.0,
        "" | "s" => number,
        "m" => number * 60.0,
        "h" => number * 3600.0,
        other => bail!("invalid duration unit {:?} in {:?}", other, value),
    };
    Duration::try_from_secs_f64(seconds).with_context(|| format!("invalid duration {:?}", value))
}

fn normalize_address(address: &str) -> String {
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => address.to_string(),
    }
}
