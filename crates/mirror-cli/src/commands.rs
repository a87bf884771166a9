//! CLI command definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "httpmirror")]
#[command(author, version, about = "Caching HTTP mirror", long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the mirror server
    Serve(ServeArgs),

    /// Inspect and manage cached objects
    Cache {
        #[command(flatten)]
        store: StoreArgs,

        #[command(subcommand)]
        command: CacheCommands,
    },
}

/// Where the cache lives. Shared by `serve` and `cache`.
#[derive(Args, Debug, Default, Clone)]
pub struct StoreArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// S3 endpoint, e.g. `http://127.0.0.1:9000`
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// S3 bucket
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// S3 access key id
    #[arg(long, env = "HTTPMIRROR_S3_ACCESS_KEY_ID")]
    pub s3_access_key_id: Option<String>,

    /// S3 secret access key
    #[arg(long, env = "HTTPMIRROR_S3_ACCESS_KEY_SECRET", hide_env_values = true)]
    pub s3_access_key_secret: Option<String>,

    /// S3 region
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long)]
    pub s3_prefix: Option<String>,

    /// Cache into a local directory instead of S3
    #[arg(long, conflicts_with = "s3_bucket")]
    pub fs_root: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Listen address; `:8080` listens on all interfaces
    #[arg(short, long)]
    pub address: Option<String>,

    /// Base URL clients are redirected to for cached objects
    #[arg(long, alias = "s3-redirect-links")]
    pub redirect_links: Option<String>,

    /// Take the origin host from the first path segment
    #[arg(long)]
    pub host_from_first_path: bool,

    /// Freshness probe timeout, e.g. `5s` or `500ms`; 0 disables the probe
    #[arg(long)]
    pub check_sync_timeout: Option<String>,

    /// Upper bound on a populate job; 0 means none
    #[arg(long)]
    pub populate_timeout: Option<String>,

    /// Only serve hosts under this domain, stripping it before fetching
    #[arg(long)]
    pub base_domain: Option<String>,

    /// Refuse paths ending with this suffix (repeatable)
    #[arg(long = "block-suffix")]
    pub block_suffixes: Vec<String>,

    /// Outbound proxy for origin requests
    #[arg(long)]
    pub proxy: Option<String>,

    /// Connect timeout for origin requests, e.g. `10s`; 0 means none
    #[arg(long)]
    pub connect_timeout: Option<String>,

    /// Keep serving cached objects when the freshness probe fails
    #[arg(long)]
    pub serve_stale_on_probe_failure: Option<bool>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached objects
    List {
        /// Only keys starting with this prefix
        prefix: Option<String>,
    },

    /// Show metadata for one object
    Stat { key: String },

    /// Write an object to a file or stdout
    Get {
        key: String,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove an object
    Rm { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from([
            "httpmirror",
            "serve",
            "--address",
            ":9090",
            "--fs-root",
            "/var/cache/mirror",
            "--redirect-links",
            "https://cdn.example.net",
            "--block-suffix",
            ".iso",
            "--block-suffix",
            ".img",
            "--serve-stale-on-probe-failure",
            "false",
            "--log-format",
            "json",
        ])
        .expect("parse");

        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.address.as_deref(), Some(":9090"));
        assert_eq!(args.block_suffixes, vec![".iso", ".img"]);
        assert_eq!(args.serve_stale_on_probe_failure, Some(false));
        assert!(!args.host_from_first_path);
    }

    #[test]
    fn test_redirect_links_alias() {
        let cli = Cli::try_parse_from([
            "httpmirror",
            "serve",
            "--s3-redirect-links",
            "https://cdn.example.net",
            "--connect-timeout",
            "10s",
        ])
        .expect("parse");

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.redirect_links.as_deref(), Some("https://cdn.example.net"));
        assert_eq!(args.connect_timeout.as_deref(), Some("10s"));
    }

    #[test]
    fn test_parse_cache_get() {
        let cli = Cli::try_parse_from([
            "httpmirror",
            "cache",
            "--fs-root",
            "/tmp/c",
            "get",
            "example.com/a",
            "-o",
            "out.bin",
        ])
        .expect("parse");

        let Commands::Cache { store, command } = cli.command else {
            panic!("expected cache");
        };
        assert!(store.fs_root.is_some());
        assert!(matches!(
            command,
            CacheCommands::Get { ref key, output: Some(_) } if key == "example.com/a"
        ));
    }

    #[test]
    fn test_store_flags_conflict() {
        let result = Cli::try_parse_from([
            "httpmirror",
            "serve",
            "--fs-root",
            "/tmp/c",
            "--s3-bucket",
            "mirror",
        ]);
        assert!(result.is_err());
    }
}
