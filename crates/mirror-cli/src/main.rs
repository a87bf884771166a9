//! httpmirror entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::{CacheCommands, Cli, Commands, LogFormat};
use config::MirrorConfig;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so `cache get` can write objects to stdout.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Serve(args) => {
            let mut config = MirrorConfig::load(args.store.config.as_deref())?;
            config.apply_serve(&args);
            handlers::serve(&config).await?;
        }
        Commands::Cache { store, command } => {
            let mut config = MirrorConfig::load(store.config.as_deref())?;
            config.apply_store(&store);
            match command {
                CacheCommands::List { prefix } => {
                    handlers::list_cache(&config, prefix.as_deref()).await?
                }
                CacheCommands::Stat { key } => handlers::stat_cache(&config, &key).await?,
                CacheCommands::Get { key, output } => {
                    handlers::get_cache(&config, &key, output.as_deref()).await?
                }
                CacheCommands::Rm { key } => handlers::remove_cache(&config, &key).await?,
            }
        }
    }

    Ok(())
}
