//! Zamp CLI - run engine queries from the command line
//!
//! Loads the engine configuration, boots the provider registry and runs one
//! orchestrator operation, printing the result as JSON.

mod commands;

use clap::{Parser, Subcommand};
use commands::{DatasetMetadataCommand, DatasetParentsCommand, QueryCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "ZAMP_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "ZAMP_LOG_FORMAT", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against the lakehouse backend
    Query(QueryCommand),
    /// Run a query against the real-time backend, falling back to the lakehouse
    QueryRealtime(QueryCommand),
    /// Show merged schema and statistics of a dataset
    DatasetMetadata(DatasetMetadataCommand),
    /// Show the immediate upstream nodes of a dataset
    DatasetParents(DatasetParentsCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        // Zamp crates at the requested level, noisy dependencies at warn
        tracing_subscriber::EnvFilter::new(format!(
            "zamp_cli={level},\
             zamp_providers={level},\
             zamp_query={level},\
             zamp_query_pinot={level},\
             zamp_query_databricks={level},\
             zamp_query_postgres={level},\
             sqlx=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Query(cmd) => cmd.execute(false),
        Commands::QueryRealtime(cmd) => cmd.execute(true),
        Commands::DatasetMetadata(cmd) => cmd.execute(),
        Commands::DatasetParents(cmd) => cmd.execute(),
    }
}
