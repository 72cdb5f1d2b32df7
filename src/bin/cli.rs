//! clipdex CLI
//!
//! Runs the crawler and query API, or single maintenance commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use clipdex::{
    api::{self, AppState},
    error::{AppError, Result},
    models::Config,
    pipeline::Crawler,
    services::SourceClient,
    storage::{self, Snapshot, SnapshotKeeper, SnapshotStorage},
    store::ClipStore,
};
use tokio_util::sync::CancellationToken;

/// clipdex - live clip crawler and index
#[derive(Parser, Debug)]
#[command(name = "clipdex", version, about = "Live clip crawler and ranked clip index")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "clipdex.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl continuously and serve the query API
    Serve {
        /// Serve restored clips without crawling
        #[arg(long)]
        no_crawl: bool,
    },

    /// Run a single crawl cycle and back up the result
    Crawl,

    /// Validate the configuration
    Validate,

    /// Show snapshot info
    Info,

    /// Look up a channel id by name
    Channel {
        /// Channel name
        name: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn build_keeper(config: &Config) -> Result<Option<Arc<SnapshotKeeper>>> {
    Ok(storage::from_config(&config.storage)
        .await?
        .map(|storage| Arc::new(SnapshotKeeper::new(storage, config.storage.backup_interval()))))
}

/// Cancel the token on Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Shutting down..."),
            Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
        }
        cancel.cancel();
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Serve { no_crawl } => {
            config.validate()?;
            let store = Arc::new(ClipStore::new(&config.store));
            let keeper = build_keeper(&config).await?;
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let mut state = AppState::new(Arc::clone(&store));
            state.keeper = keeper.clone();

            let crawl_handle = if no_crawl {
                if let Some(keeper) = &keeper {
                    keeper.restore(&store).await;
                }
                None
            } else {
                let source = Arc::new(SourceClient::new(&config.source)?);
                let crawler = Arc::new(Crawler::new(
                    config.clone(),
                    source,
                    Arc::clone(&store),
                    keeper.clone(),
                ));
                state.crawler = Some(Arc::clone(&crawler));

                let cancel = cancel.clone();
                Some(tokio::spawn(async move { crawler.run(cancel).await }))
            };

            let served = api::serve(&config.server.bind, Arc::new(state), cancel.clone()).await;
            cancel.cancel();

            if let Some(handle) = crawl_handle {
                if let Err(e) = handle.await {
                    log::error!("Crawler task failed: {}", e);
                }
            }
            served?;
        }

        Command::Crawl => {
            config.validate()?;
            let store = Arc::new(ClipStore::new(&config.store));
            let keeper = build_keeper(&config).await?;
            let source = Arc::new(SourceClient::new(&config.source)?);

            if let Some(keeper) = &keeper {
                keeper.restore(&store).await;
            }

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let crawler = Crawler::new(config, source, Arc::clone(&store), keeper);
            let summary = crawler.run_once_until(&cancel).await?;

            log::info!(
                "Crawl complete: {} added, {} updated, {} expired, {} total",
                summary.added,
                summary.updated,
                summary.expired,
                summary.total
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("Config OK");
        }

        Command::Info => {
            let Some(storage) = storage::from_config(&config.storage).await? else {
                log::info!("Snapshot storage is disabled.");
                return Ok(());
            };

            match storage.load().await? {
                Some(bytes) => {
                    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                    log::info!("Snapshot version: {}", snapshot.version);
                    log::info!("Clips: {}", snapshot.clips.len());
                    if let Some(newest) = snapshot.clips.iter().map(|c| c.upload_date).max() {
                        log::info!("Newest clip uploaded: {}", newest);
                    }
                }
                None => log::info!("No snapshot found yet."),
            }
        }

        Command::Channel { name } => {
            let source = SourceClient::new(&config.source)?;
            match source.channel_id(&name).await? {
                Some(id) => println!("{id}"),
                None => {
                    return Err(AppError::validation(format!("channel '{name}' not found")));
                }
            }
        }
    }

    Ok(())
}
