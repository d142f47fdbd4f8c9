//! CreditNet indexer - ledger event ingestion and trust-graph maintenance
//!
//! This binary provides:
//! - Ingestion of the ledger transaction feed (TrustSet + Payment events)
//! - Trust-graph edge storage with delete-on-zero semantics
//! - Per-account transaction history
//! - Capacity queries from the command line
//!
//! Note: The HTTP API is provided by the separate `creditnet-api` service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use creditnet_core::types::Address;
use creditnet_indexer::config::Config;
use creditnet_indexer::directory::SqliteDirectory;
use creditnet_indexer::flow::FlowService;
use creditnet_indexer::listener::ChannelEventSource;
use creditnet_indexer::pipeline::IngestionPipeline;
use creditnet_indexer::storage::Storage;

#[derive(Parser)]
#[command(name = "creditnet-indexer")]
#[command(version, about = "CreditNet indexer for ledger trust-line events", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline, reading feed messages from stdin
    /// (one JSON message per line; pipe the subscription transport in)
    Run,

    /// Show database statistics
    Status,

    /// Initialize the database
    InitDb {
        /// Database URL
        #[arg(long, default_value = "sqlite://creditnet.db")]
        database_url: String,
    },

    /// Answer a capacity query from the command line
    Capacity {
        /// Sender address
        source: String,
        /// Recipient address
        target: String,
        /// Hop bound (defaults to the configured value)
        #[arg(long)]
        max_hops: Option<u32>,
    },

    /// Register an account in the directory
    AddAccount {
        /// Ledger address
        address: String,
        /// Display name
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug)?;

    info!("CreditNet indexer starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(&cli.config).await?,
        Commands::Status => show_status(&cli.config).await?,
        Commands::InitDb { database_url } => init_database(&database_url).await?,
        Commands::Capacity {
            source,
            target,
            max_hops,
        } => query_capacity(&cli.config, &source, &target, max_hops).await?,
        Commands::AddAccount { address, username } => {
            add_account(&cli.config, &address, &username).await?
        }
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = if debug {
        EnvFilter::new("creditnet_indexer=debug,creditnet_core=debug,sqlx=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("creditnet_indexer=info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_line_number(true))
        .init();

    Ok(())
}

async fn open_storage(config: &Config) -> Result<Storage> {
    let storage = Storage::new(
        &config.database.url,
        Some(config.database.max_connections),
        Some(config.database.min_connections),
    )
    .await
    .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    Ok(storage)
}

/// Main ingestion service: stdin feed -> pipeline.
async fn run_pipeline(config_path: &str) -> Result<()> {
    info!("Starting ingestion with config: {}", config_path);

    let config = Config::from_file(config_path).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Feed URL: {}", config.ledger.feed_url);
    info!("  Currency: {}", config.ledger.currency);
    info!("  Database: {}", config.database.url);

    let storage = open_storage(&config).await?;
    info!("Database initialized");

    let directory = Arc::new(SqliteDirectory::new(storage.clone()));
    let pipeline = IngestionPipeline::new(
        storage.clone(),
        directory,
        config.ledger.currency.clone(),
        config.pipeline.store_timeout(),
    );

    let (sender, source) = ChannelEventSource::new(config.pipeline.feed_buffer);

    // Feed transport: newline-delimited JSON on stdin. The subscription's
    // connection lifecycle lives in whatever process is piping to us.
    let reader_handle = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<serde_json::Value>(line) {
                        Ok(value) => {
                            if sender.send(value).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Skipping unparsable feed line: {}", e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Feed read error: {}", e);
                    break;
                }
            }
        }
        // Dropping the sender ends the pipeline's source.
    });

    let pipeline_handle = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(source).await })
    };

    info!("Ingestion pipeline is running. Press Ctrl+C to stop.");

    tokio::select! {
        result = pipeline_handle => {
            storage.close().await;
            match result {
                Ok(Ok(())) => {
                    info!("Feed ended, pipeline drained");
                    Ok(())
                }
                Ok(Err(e)) => Err(e).context("Pipeline failed"),
                Err(e) => Err(anyhow::anyhow!("Pipeline task panicked: {}", e)),
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received shutdown signal, gracefully shutting down...");
            reader_handle.abort();
            storage.close().await;
            Ok(())
        }
    }
}

/// Show database statistics
async fn show_status(config_path: &str) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let storage = open_storage(&config).await?;

    let stats = storage.stats().await?;

    println!("\n=== CreditNet Indexer Status ===\n");
    println!("Database: {}", config.database.url);
    println!("  Trust edges:     {}", stats.edge_count);
    println!("  History records: {}", stats.history_count);
    println!("  Accounts:        {}", stats.account_count);
    println!();

    let edges = storage.get_all_edges().await?;
    if !edges.is_empty() {
        println!("Live trust lines:");
        for edge in edges {
            println!("  {} -> {}  {}", edge.source, edge.target, edge.amount);
        }
        println!();
    }

    storage.close().await;

    Ok(())
}

/// Initialize the database
async fn init_database(database_url: &str) -> Result<()> {
    info!("Initializing database: {}", database_url);

    let storage = Storage::new(database_url, None, None)
        .await
        .context("Failed to connect to database")?;

    storage
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    storage
        .health_check()
        .await
        .context("Database health check failed")?;

    let stats = storage.stats().await?;
    info!("Database initialized successfully!");
    info!("  Trust edges: {}", stats.edge_count);
    info!("  History records: {}", stats.history_count);
    info!("  Accounts: {}", stats.account_count);

    storage.close().await;

    Ok(())
}

/// Answer a capacity query from the command line
async fn query_capacity(
    config_path: &str,
    source: &str,
    target: &str,
    max_hops: Option<u32>,
) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let storage = open_storage(&config).await?;

    let flow = FlowService::new(storage.clone());
    let max_hops = max_hops.unwrap_or(config.pipeline.max_hops);

    let capacity = flow
        .max_flow(&Address::from(source), &Address::from(target), max_hops)
        .await
        .context("Capacity query failed")?;

    println!("{capacity}");

    storage.close().await;

    Ok(())
}

/// Register an account in the directory
async fn add_account(config_path: &str, address: &str, username: &str) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let storage = open_storage(&config).await?;

    let directory = SqliteDirectory::new(storage.clone());
    directory
        .create_account(&Address::from(address), username)
        .await
        .context("Failed to register account")?;

    info!("Registered {} as {}", address, username);

    storage.close().await;

    Ok(())
}
