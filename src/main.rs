//! `jsonindex` command line: ingest JSON files into an index and search it

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{IngestArgs, SearchArgs};

mod cli;

#[derive(Parser)]
#[command(name = "jsonindex")]
#[command(about = "Index and search schemaless JSON documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest NDJSON or JSON array files
    Ingest {
        #[clap(flatten)]
        inner: IngestArgs,
    },
    /// Search an index with a query string
    Search {
        #[clap(flatten)]
        inner: SearchArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest { inner } => inner.run().await,
        Commands::Search { inner } => inner.run().await,
    }
}
